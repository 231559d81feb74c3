use anyhow::{anyhow, Result};
use clap::Parser;
use mr_common::app;
use mr_worker::WorkerArgs;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mr_worker=debug,mr_common=info,reqwest=info")),
        )
        .init();

    let args = WorkerArgs::parse();
    let application = app::by_name(&args.app).ok_or_else(|| {
        anyhow!(
            "aplicación desconocida '{}' (disponibles: {})",
            args.app,
            app::APP_NAMES.join(", ")
        )
    })?;

    let report = mr_worker::run(args.settings(), application).await?;
    info!(
        "máquina {} terminó: {} tareas en {} heartbeats",
        report.machine, report.tasks_executed, report.heartbeats
    );
    Ok(())
}
