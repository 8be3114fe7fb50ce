//! The RPC listener: accepts TCP connections, parses one command line,
//! dispatches it against the local node, writes one reply line, closes
//! (§4.4 RPC dispatch, §6 wire protocol).

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::node::Node;
use crate::protocol::Command;
use crate::shutdown::Shutdown;

/// Bind and serve the RPC listener until `shutdown` is signalled, draining
/// in-flight connections for up to `drain_grace` before returning.
pub async fn serve(
    listener: TcpListener,
    node: Arc<Node>,
    shutdown: Shutdown,
    drain_grace: Duration,
) -> std::io::Result<()> {
    let local_addr = listener.local_addr()?;
    debug!("listening on {local_addr}");

    let mut handlers = Vec::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted?;
                let node = node.clone();
                handlers.retain(|h: &tokio::task::JoinHandle<()>| !h.is_finished());
                handlers.push(tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, node).await {
                        debug!("connection from {peer_addr} ended with error: {err}");
                    }
                }));
            }
            _ = shutdown.wait() => {
                debug!("listener on {local_addr} shutting down");
                break;
            }
        }
    }

    let drain = async {
        for handle in handlers {
            let _ = handle.await;
        }
    };
    if tokio::time::timeout(drain_grace, drain).await.is_err() {
        warn!("listener on {local_addr}: handlers did not drain within grace period, abandoning");
    }
    Ok(())
}

async fn handle_connection(stream: TcpStream, node: Arc<Node>) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    let line = line.trim_end_matches(['\r', '\n']);

    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(err) => {
            warn!("rejected malformed command {line:?}: {err}");
            return write_half.shutdown().await;
        }
    };

    // §6: an empty request is a liveness probe, closed with no reply.
    if matches!(command, Command::Ping) {
        return write_half.shutdown().await;
    }

    let reply_line = match node.handle(command).await {
        Ok(reply) => reply.to_wire(),
        Err(err) => {
            warn!("command {line:?} failed: {err}");
            String::new()
        }
    };

    write_half.write_all(format!("{reply_line}\r\n").as_bytes()).await?;
    write_half.shutdown().await
}
