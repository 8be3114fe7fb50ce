//! A peer handle: request/reply RPC against a remote node (§4.2).
//!
//! Every call opens a fresh TCP connection, sends one `\r\n`-terminated
//! line, reads one `\r\n`-terminated reply, and closes — mirroring the
//! original `Remote`/`requires_connection` decorator in
//! `examples/original_source/core/remote.py`. Calls on a single handle are
//! serialized by an async mutex so concurrent callers never interleave on
//! the same socket; calls across distinct handles may interleave freely.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::address::Address;
use crate::error::ChordError;
use crate::protocol::{Command, Reply};
use crate::ring::HashPos;

pub struct PeerHandle {
    address: Address,
    timeout: Duration,
    lock: Mutex<()>,
}

impl PeerHandle {
    pub fn new(address: Address, timeout: Duration) -> Self {
        PeerHandle {
            address,
            timeout,
            lock: Mutex::new(()),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Liveness probe (§4.2 `ping`): open a connection, send an empty line,
    /// close. Any I/O failure means the peer is considered dead.
    pub async fn ping(&self) -> bool {
        let _guard = self.lock.lock().await;
        timeout(self.timeout, self.connect_and_send_empty())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }

    async fn connect_and_send_empty(&self) -> std::io::Result<()> {
        let mut stream = TcpStream::connect(self.address.socket_addr_string()).await?;
        stream.write_all(b"\r\n").await?;
        stream.shutdown().await?;
        Ok(())
    }

    pub async fn get_successor(&self) -> Result<Address, ChordError> {
        let line = self.call("get_successor", &Command::GetSuccessor).await?;
        Reply::parse_address(&line, "get_successor", &self.address.to_string())
    }

    pub async fn get_predecessor(&self) -> Result<Option<Address>, ChordError> {
        let line = self
            .call("get_predecessor", &Command::GetPredecessor)
            .await?;
        Reply::parse_optional_address(&line, "get_predecessor", &self.address.to_string())
    }

    pub async fn get_successors(&self) -> Result<Vec<Address>, ChordError> {
        let line = self
            .call("get_successors", &Command::GetSuccessors)
            .await?;
        Reply::parse_address_list(&line, "get_successors", &self.address.to_string())
    }

    pub async fn find_successor(&self, id: HashPos) -> Result<Address, ChordError> {
        let line = self
            .call("find_successor", &Command::FindSuccessor(id))
            .await?;
        Reply::parse_address(&line, "find_successor", &self.address.to_string())
    }

    pub async fn closest_preceding_finger(&self, id: HashPos) -> Result<Address, ChordError> {
        let line = self
            .call(
                "closest_preceding_finger",
                &Command::ClosestPrecedingFinger(id),
            )
            .await?;
        Reply::parse_address(&line, "closest_preceding_finger", &self.address.to_string())
    }

    /// Advisory and idempotent (§4.2): failures are reported but the caller
    /// is free to ignore them.
    pub async fn notify(&self, candidate: &Address) -> Result<(), ChordError> {
        self.call("notify", &Command::Notify(candidate.clone()))
            .await?;
        Ok(())
    }

    async fn call(&self, operation: &'static str, command: &Command) -> Result<String, ChordError> {
        let _guard = self.lock.lock().await;
        let address = self.address.to_string();
        match timeout(self.timeout, self.round_trip(command)).await {
            Ok(Ok(line)) => Ok(line),
            Ok(Err(io_err)) => Err(ChordError::peer_unreachable(address, operation, io_err)),
            Err(_elapsed) => Err(ChordError::peer_unreachable(
                address,
                operation,
                std::io::Error::new(std::io::ErrorKind::TimedOut, "rpc timed out"),
            )),
        }
    }

    async fn round_trip(&self, command: &Command) -> std::io::Result<String> {
        let stream = TcpStream::connect(self.address.socket_addr_string()).await?;
        let (read_half, mut write_half) = stream.into_split();
        let request = format!("{}\r\n", command.to_wire());
        write_half.write_all(request.as_bytes()).await?;
        write_half.shutdown().await?;

        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
