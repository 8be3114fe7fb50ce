//! Error kinds shared across the peer-handle, node-state and protocol layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChordError {
    #[error("peer {address} unreachable while performing {operation}: {source}")]
    PeerUnreachable {
        address: String,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed reply from {address} to {operation}: {detail}")]
    MalformedReply {
        address: String,
        operation: &'static str,
        detail: String,
    },

    #[error("ring empty: no reachable successor")]
    RingEmpty,

    #[error("protocol error: {0}")]
    ProtocolError(String),
}

impl ChordError {
    pub fn peer_unreachable(
        address: impl Into<String>,
        operation: &'static str,
        source: std::io::Error,
    ) -> Self {
        ChordError::PeerUnreachable {
            address: address.into(),
            operation,
            source,
        }
    }

    pub fn malformed_reply(
        address: impl Into<String>,
        operation: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        ChordError::MalformedReply {
            address: address.into(),
            operation,
            detail: detail.into(),
        }
    }

    /// `MalformedReply` is treated as `PeerUnreachable` by routing/maintenance logic (§7).
    pub fn is_peer_unreachable(&self) -> bool {
        matches!(
            self,
            ChordError::PeerUnreachable { .. } | ChordError::MalformedReply { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ChordError>;
