//! Tuning parameters (§6), sourced from CLI flags with an optional ini file
//! providing defaults that the CLI flags override.

use std::path::Path;
use std::time::Duration;

use ini::Ini;

use crate::ring::HashPos;

/// `m` — the ring-size exponent. `M = 2^m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    pub m: u32,
}

impl RingConfig {
    pub fn modulus(&self) -> HashPos {
        1u64.wrapping_shl(self.m)
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig { m: 8 }
    }
}

/// The periodic-maintenance and RPC tuning knobs (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuning {
    pub successor_list_len: usize,
    pub stabilize_interval: Duration,
    pub fix_fingers_interval: Duration,
    pub check_predecessor_interval: Duration,
    pub rpc_timeout: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning {
            successor_list_len: 4,
            stabilize_interval: Duration::from_millis(1000),
            fix_fingers_interval: Duration::from_millis(500),
            check_predecessor_interval: Duration::from_millis(1000),
            rpc_timeout: Duration::from_millis(5000),
        }
    }
}

/// Overrides read from an ini file (all fields optional; CLI flags take
/// precedence over anything set here). Mirrors the teacher's use of
/// `rust-ini` for configuration.
#[derive(Debug, Clone, Default)]
pub struct FileOverrides {
    pub m: Option<u32>,
    pub successor_list_len: Option<usize>,
    pub stabilize_interval_ms: Option<u64>,
    pub fix_fingers_interval_ms: Option<u64>,
    pub check_predecessor_interval_ms: Option<u64>,
    pub rpc_timeout_ms: Option<u64>,
}

impl FileOverrides {
    pub fn load(path: &Path) -> std::io::Result<FileOverrides> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let section = ini.section(Some("tuning"));
        let get_u64 = |key: &str| section.and_then(|s| s.get(key)).and_then(|v| v.parse().ok());
        Ok(FileOverrides {
            m: get_u64("m").map(|v: u64| v as u32),
            successor_list_len: get_u64("successor_list_len").map(|v| v as usize),
            stabilize_interval_ms: get_u64("stabilize_interval_ms"),
            fix_fingers_interval_ms: get_u64("fix_fingers_interval_ms"),
            check_predecessor_interval_ms: get_u64("check_predecessor_interval_ms"),
            rpc_timeout_ms: get_u64("rpc_timeout_ms"),
        })
    }

    pub fn apply(&self, ring: &mut RingConfig, tuning: &mut Tuning) {
        if let Some(m) = self.m {
            ring.m = m;
        }
        if let Some(len) = self.successor_list_len {
            tuning.successor_list_len = len;
        }
        if let Some(ms) = self.stabilize_interval_ms {
            tuning.stabilize_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.fix_fingers_interval_ms {
            tuning.fix_fingers_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.check_predecessor_interval_ms {
            tuning.check_predecessor_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.rpc_timeout_ms {
            tuning.rpc_timeout = Duration::from_millis(ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_modulus_matches_m() {
        let ring = RingConfig::default();
        assert_eq!(ring.modulus(), 256);
    }

    #[test]
    fn file_overrides_apply_only_set_fields() {
        let mut ring = RingConfig::default();
        let mut tuning = Tuning::default();
        let overrides = FileOverrides {
            m: Some(10),
            successor_list_len: None,
            stabilize_interval_ms: Some(2000),
            fix_fingers_interval_ms: None,
            check_predecessor_interval_ms: None,
            rpc_timeout_ms: None,
        };
        overrides.apply(&mut ring, &mut tuning);
        assert_eq!(ring.m, 10);
        assert_eq!(tuning.successor_list_len, 4);
        assert_eq!(tuning.stabilize_interval, Duration::from_millis(2000));
    }
}
