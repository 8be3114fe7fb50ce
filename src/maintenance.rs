//! The three periodic maintenance tasks (§4.4, §5): stabilize, fix_fingers,
//! check_predecessor. Each sleeps between rounds and checks the shutdown
//! signal at its sleep boundary, per the teacher's periodic `fix_fingers`
//! `tokio::spawn` loop in `main.rs`.

use std::sync::Arc;

use log::debug;

use crate::node::Node;
use crate::shutdown::Shutdown;

pub fn spawn_all(node: Arc<Node>, shutdown: Shutdown) -> Vec<tokio::task::JoinHandle<()>> {
    vec![
        tokio::spawn(stabilize_loop(node.clone(), shutdown.clone())),
        tokio::spawn(fix_fingers_loop(node.clone(), shutdown.clone())),
        tokio::spawn(check_predecessor_loop(node, shutdown)),
    ]
}

async fn stabilize_loop(node: Arc<Node>, shutdown: Shutdown) {
    let interval = node.tuning().stabilize_interval;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.wait() => break,
        }
        if shutdown.is_shutting_down() {
            break;
        }
        node.stabilize().await;
        node.state().mark_joined();
        debug!("stabilize round complete, successor={}", node.state().immediate_successor());
    }
}

async fn fix_fingers_loop(node: Arc<Node>, shutdown: Shutdown) {
    let interval = node.tuning().fix_fingers_interval;
    let mut next = 0usize;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.wait() => break,
        }
        if shutdown.is_shutting_down() {
            break;
        }
        next = node.fix_fingers(next).await;
    }
}

async fn check_predecessor_loop(node: Arc<Node>, shutdown: Shutdown) {
    let interval = node.tuning().check_predecessor_interval;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.wait() => break,
        }
        if shutdown.is_shutting_down() {
            break;
        }
        node.check_predecessor().await;
    }
}
