//! CLI surface for the node launcher binary (§6), mirroring the teacher's
//! `clap`-derived `Cli` struct.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "chordring", about = "A Chord DHT node")]
pub struct Cli {
    /// Host/IP this node listens on.
    pub host: String,

    /// Port this node listens on.
    pub port: u16,

    /// Host of an existing ring member to bootstrap from.
    pub bootstrap_host: Option<String>,

    /// Port of an existing ring member to bootstrap from.
    pub bootstrap_port: Option<u16>,

    /// Ring size exponent: the ring has 2^m positions.
    #[arg(long)]
    pub m: Option<u32>,

    /// Number of successors tracked in the successor list.
    #[arg(long)]
    pub successor_list_len: Option<usize>,

    #[arg(long)]
    pub stabilize_interval_ms: Option<u64>,

    #[arg(long)]
    pub fix_fingers_interval_ms: Option<u64>,

    #[arg(long)]
    pub check_predecessor_interval_ms: Option<u64>,

    #[arg(long)]
    pub rpc_timeout_ms: Option<u64>,

    /// Optional ini file supplying defaults for any flag not given on the
    /// command line (section `[tuning]`).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn bootstrap(&self) -> Option<(String, u16)> {
        match (&self.bootstrap_host, self.bootstrap_port) {
            (Some(host), Some(port)) => Some((host.clone(), port)),
            _ => None,
        }
    }

    /// CLI-supplied overrides, in the same shape `FileOverrides` uses so the
    /// two merge with one precedence rule: CLI wins over file, file wins over
    /// built-in defaults.
    pub fn as_overrides(&self) -> crate::config::FileOverrides {
        crate::config::FileOverrides {
            m: self.m,
            successor_list_len: self.successor_list_len,
            stabilize_interval_ms: self.stabilize_interval_ms,
            fix_fingers_interval_ms: self.fix_fingers_interval_ms,
            check_predecessor_interval_ms: self.check_predecessor_interval_ms,
            rpc_timeout_ms: self.rpc_timeout_ms,
        }
    }
}
