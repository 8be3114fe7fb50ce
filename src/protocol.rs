//! The line-oriented wire protocol (§6): request/reply parsing and formatting.
//!
//! Every line is `\r\n`-terminated; that framing is handled by the caller
//! (`peer.rs` on the client side, `server.rs` on the server side). This
//! module only deals with the content of a single line.

use crate::address::Address;
use crate::error::ChordError;
use crate::ring::HashPos;

/// A parsed inbound request line (§4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// An empty line: a liveness probe, answered by closing with no reply.
    Ping,
    GetSuccessor,
    GetPredecessor,
    GetSuccessors,
    FindSuccessor(HashPos),
    ClosestPrecedingFinger(HashPos),
    Notify(Address),
}

impl Command {
    /// Parse a single line (with any trailing `\r\n` already stripped).
    pub fn parse(line: &str) -> Result<Command, ChordError> {
        let line = line.trim_end();
        if line.is_empty() {
            return Ok(Command::Ping);
        }

        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();

        match name {
            "get_successor" => Ok(Command::GetSuccessor),
            "get_predecessor" => Ok(Command::GetPredecessor),
            "get_successors" => Ok(Command::GetSuccessors),
            "find_successor" => {
                let id = parts
                    .next()
                    .ok_or_else(|| ChordError::ProtocolError("find_successor: missing id".into()))?
                    .parse::<HashPos>()
                    .map_err(|e| ChordError::ProtocolError(format!("find_successor: {e}")))?;
                Ok(Command::FindSuccessor(id))
            }
            "closest_preceding_finger" => {
                let id = parts
                    .next()
                    .ok_or_else(|| {
                        ChordError::ProtocolError("closest_preceding_finger: missing id".into())
                    })?
                    .parse::<HashPos>()
                    .map_err(|e| {
                        ChordError::ProtocolError(format!("closest_preceding_finger: {e}"))
                    })?;
                Ok(Command::ClosestPrecedingFinger(id))
            }
            "notify" => {
                let host = parts
                    .next()
                    .ok_or_else(|| ChordError::ProtocolError("notify: missing host".into()))?;
                let port = parts
                    .next()
                    .ok_or_else(|| ChordError::ProtocolError("notify: missing port".into()))?
                    .parse::<u16>()
                    .map_err(|e| ChordError::ProtocolError(format!("notify: {e}")))?;
                Ok(Command::Notify(Address::new(host, port)))
            }
            other => Err(ChordError::ProtocolError(format!(
                "unknown command: {other}"
            ))),
        }
    }

    /// Render as the request line the peer handle sends (no trailing `\r\n`).
    pub fn to_wire(&self) -> String {
        match self {
            Command::Ping => String::new(),
            Command::GetSuccessor => "get_successor".to_string(),
            Command::GetPredecessor => "get_predecessor".to_string(),
            Command::GetSuccessors => "get_successors".to_string(),
            Command::FindSuccessor(id) => format!("find_successor {id}"),
            Command::ClosestPrecedingFinger(id) => format!("closest_preceding_finger {id}"),
            Command::Notify(addr) => format!("notify {} {}", addr.host, addr.port),
        }
    }
}

/// A reply line, rendered or parsed depending on which side produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Address(Address),
    OptionalAddress(Option<Address>),
    AddressList(Vec<Address>),
    Empty,
}

impl Reply {
    pub fn to_wire(&self) -> String {
        match self {
            Reply::Address(addr) => addr.to_json().to_string(),
            Reply::OptionalAddress(Some(addr)) => addr.to_json().to_string(),
            Reply::OptionalAddress(None) => String::new(),
            Reply::AddressList(addrs) => {
                let values: Vec<_> = addrs.iter().map(Address::to_json).collect();
                serde_json::Value::Array(values).to_string()
            }
            Reply::Empty => String::new(),
        }
    }

    pub fn parse_address(line: &str, operation: &'static str, from: &str) -> Result<Address, ChordError> {
        let line = line.trim_end();
        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| ChordError::malformed_reply(from, operation, e.to_string()))?;
        Address::from_json(&value)
            .ok_or_else(|| ChordError::malformed_reply(from, operation, "not an address pair"))
    }

    pub fn parse_optional_address(
        line: &str,
        operation: &'static str,
        from: &str,
    ) -> Result<Option<Address>, ChordError> {
        let line = line.trim_end();
        if line.is_empty() {
            return Ok(None);
        }
        Reply::parse_address(line, operation, from).map(Some)
    }

    pub fn parse_address_list(
        line: &str,
        operation: &'static str,
        from: &str,
    ) -> Result<Vec<Address>, ChordError> {
        let line = line.trim_end();
        if line.is_empty() {
            return Ok(Vec::new());
        }
        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| ChordError::malformed_reply(from, operation, e.to_string()))?;
        let arr = value
            .as_array()
            .ok_or_else(|| ChordError::malformed_reply(from, operation, "not a JSON array"))?;
        arr.iter()
            .map(|entry| {
                Address::from_json(entry)
                    .ok_or_else(|| ChordError::malformed_reply(from, operation, "bad address entry"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_command() {
        assert_eq!(Command::parse("").unwrap(), Command::Ping);
        assert_eq!(Command::parse("get_successor").unwrap(), Command::GetSuccessor);
        assert_eq!(
            Command::parse("get_predecessor").unwrap(),
            Command::GetPredecessor
        );
        assert_eq!(
            Command::parse("get_successors").unwrap(),
            Command::GetSuccessors
        );
        assert_eq!(
            Command::parse("find_successor 42").unwrap(),
            Command::FindSuccessor(42)
        );
        assert_eq!(
            Command::parse("closest_preceding_finger 7").unwrap(),
            Command::ClosestPrecedingFinger(7)
        );
        assert_eq!(
            Command::parse("notify 127.0.0.1 9000").unwrap(),
            Command::Notify(Address::new("127.0.0.1", 9000))
        );
    }

    #[test]
    fn unknown_command_is_protocol_error() {
        let err = Command::parse("frobnicate").unwrap_err();
        assert!(matches!(err, ChordError::ProtocolError(_)));
    }

    #[test]
    fn address_reply_round_trips() {
        let addr = Address::new("10.0.0.1", 4242);
        let wire = Reply::Address(addr.clone()).to_wire();
        let parsed = Reply::parse_address(&wire, "test", "peer").unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn empty_predecessor_round_trips() {
        let wire = Reply::OptionalAddress(None).to_wire();
        assert_eq!(wire, "");
        let parsed = Reply::parse_optional_address(&wire, "test", "peer").unwrap();
        assert_eq!(parsed, None);
    }

    #[test]
    fn address_list_round_trips() {
        let addrs = vec![Address::new("a", 1), Address::new("b", 2)];
        let wire = Reply::AddressList(addrs.clone()).to_wire();
        let parsed = Reply::parse_address_list(&wire, "test", "peer").unwrap();
        assert_eq!(parsed, addrs);
    }

    #[test]
    fn empty_address_list_round_trips() {
        let wire = Reply::AddressList(vec![]).to_wire();
        let parsed = Reply::parse_address_list(&wire, "test", "peer").unwrap();
        assert!(parsed.is_empty());
    }
}
