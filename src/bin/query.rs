//! Query tool binary (§6): resolve a random key against a running node and
//! print the result. Mirrors the reference `query_chord.py` and the
//! teacher's `validate_cluster` binary in spirit — a small standalone binary
//! driving the running cluster over the network.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use rand::Rng;

use chordring::address::Address;
use chordring::peer::PeerHandle;

#[derive(Debug, Parser)]
#[command(name = "chordring-query", about = "Resolve a random key against a running Chord node")]
struct Args {
    /// Port of the node to query.
    port: u16,

    /// Host of the node to query.
    #[arg(default_value = "127.0.0.1")]
    host: String,

    /// Ring size exponent the target node was started with (M = 2^m).
    #[arg(long, default_value_t = 8)]
    m: u32,

    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let modulus: u64 = 1u64.wrapping_shl(args.m);
    let key = rand::thread_rng().gen_range(0..modulus);

    let target = Address::new(args.host.clone(), args.port);
    let handle = PeerHandle::new(target, Duration::from_millis(args.timeout_ms));

    match handle.find_successor(key).await {
        Ok(address) => {
            println!("{key} -> {address}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("query failed: {err}");
            ExitCode::FAILURE
        }
    }
}
