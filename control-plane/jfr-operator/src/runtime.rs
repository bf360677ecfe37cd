use kube::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{config::OperatorConfig, controller::run_controller};

/// Spawn the Kubernetes controller loops.
pub fn spawn_controller(
    client: Client,
    cfg: OperatorConfig,
    cancel: CancellationToken,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move { run_controller(client, cfg, cancel).await })
}

/// Cancel `cancel` on SIGINT/SIGTERM.
pub fn spawn_shutdown_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        cancel.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Run the controllers until they stop or a shutdown signal arrives.
pub async fn run_all(
    client: Client,
    cfg: OperatorConfig,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let _signals = spawn_shutdown_listener(cancel.clone());
    spawn_controller(client, cfg, cancel).await?
}
