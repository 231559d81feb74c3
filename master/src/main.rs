use anyhow::Result;
use clap::Parser;
use mr_master::{serve, AppState, MasterArgs};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("mr_master=debug,mr_common=info,tower_http=info")
            }),
        )
        .init();

    let args = MasterArgs::parse();

    // errores de configuración: antes de escuchar
    let registry = args.build_registry()?;
    let state = AppState::new(registry, args.settings());

    let listener = TcpListener::bind(&args.bind).await?;
    serve(listener, state).await
}
