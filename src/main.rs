//! Node launcher binary (§6): `chordring <host> <port> [<bootstrap_host> <bootstrap_port>]`.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, LevelFilter};

use chordring::address::Address;
use chordring::cli::Cli;
use chordring::config::{FileOverrides, RingConfig, Tuning};
use chordring::maintenance;
use chordring::node::Node;
use chordring::server;
use chordring::shutdown::Shutdown;

const DRAIN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> std::io::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .expect("logger already initialized");

    let cli = Cli::parse();

    let mut ring = RingConfig::default();
    let mut tuning = Tuning::default();
    if let Some(path) = &cli.config {
        match FileOverrides::load(path) {
            Ok(overrides) => overrides.apply(&mut ring, &mut tuning),
            Err(err) => error!("failed to read config file {}: {err}", path.display()),
        }
    }
    cli.as_overrides().apply(&mut ring, &mut tuning);

    let self_address = Address::new(cli.host.clone(), cli.port);
    let node = match cli.bootstrap() {
        None => {
            info!("starting a new ring at {self_address}");
            Node::start_lone(self_address.clone(), ring, tuning)
        }
        Some((host, port)) => {
            let bootstrap = Address::new(host, port);
            info!("joining ring via {bootstrap} as {self_address}");
            Node::join(self_address.clone(), bootstrap, ring, tuning)
                .await
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?
        }
    };
    let node = Arc::new(node);

    let listener = tokio::net::TcpListener::bind(self_address.socket_addr_string()).await?;
    let shutdown = Shutdown::new();

    let maintenance_handles = maintenance::spawn_all(node.clone(), shutdown.clone());

    let serve_shutdown = shutdown.clone();
    let serve_node = node.clone();
    let serve_task = tokio::spawn(async move {
        if let Err(err) = server::serve(listener, serve_node, serve_shutdown, DRAIN_GRACE).await {
            error!("listener exited with error: {err}");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown.signal();
    node.state().mark_terminated();

    let _ = serve_task.await;
    for handle in maintenance_handles {
        let _ = handle.await;
    }
    info!("node at {self_address} shut down cleanly");
    Ok(())
}
