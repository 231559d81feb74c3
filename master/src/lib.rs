pub mod config;
pub mod handlers;
pub mod monitor;
pub mod state;

use anyhow::Result;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

pub use config::{LeaderSettings, MasterArgs};
pub use state::AppState;

pub const WORKER_STALL_TIMEOUT: Duration = Duration::from_secs(20);
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Sirve heartbeats hasta que todas las máquinas reciben EXIT.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = handlers::build_router(state.clone());

    // monitor de heartbeats en segundo plano
    let monitor_state = state.clone();
    let monitor = tokio::spawn(async move {
        monitor::monitor_workers(monitor_state).await;
    });

    let job_id = state
        .job
        .lock()
        .map(|j| j.id.clone())
        .unwrap_or_default();
    info!("leader del job {} escuchando en {}", job_id, listener.local_addr()?);

    let done = state.done.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { done.notified().await })
        .await?;

    monitor.abort();
    info!("job {} terminado, leader detenido", job_id);
    Ok(())
}
