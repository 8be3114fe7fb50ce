//! Peer addressing and ring-identifier hashing.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ring::HashPos;

/// A `(host, port)` pair identifying a Chord node on the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Address {
            host: host.into(),
            port,
        }
    }

    /// `hash(host:port) mod M`, using `blake3` as the hash function.
    pub fn identifier(&self, modulus: HashPos) -> HashPos {
        let key = format!("{}:{}", self.host, self.port);
        let digest = blake3::hash(key.as_bytes());
        let bytes: [u8; 8] = digest.as_bytes()[..8].try_into().unwrap();
        u64::from_be_bytes(bytes) % modulus
    }

    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Encode as the two-element JSON array the wire protocol uses for addresses.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!([self.host, self.port])
    }

    /// Decode from the two-element JSON array the wire protocol uses for addresses.
    pub fn from_json(value: &serde_json::Value) -> Option<Address> {
        let arr = value.as_array()?;
        if arr.len() != 2 {
            return None;
        }
        let host = arr[0].as_str()?.to_string();
        let port = arr[1].as_u64()?;
        let port = u16::try_from(port).ok()?;
        Some(Address::new(host, port))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.host, self.port).cmp(&(&other.host, other.port))
    }
}
