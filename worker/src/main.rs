mod worker;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::worker::{build_router, master_base_url, register, WorkerConfig, WorkerState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worker=debug,common=info,reqwest=info")),
        )
        .init();

    let config = WorkerConfig::from_env();
    let state = WorkerState::new(&config)?;

    // 1) Levantar el servidor RPC antes de anunciarse
    let listener = TcpListener::bind(config.bind.as_str())
        .await
        .with_context(|| format!("no se pudo abrir {}", config.bind))?;
    info!(
        "worker escuchando en {} (app={}, workdir={}, corrupción={:?})",
        listener.local_addr()?,
        state.app.name,
        state.work_dir,
        state.policy
    );
    let server = tokio::spawn(async move { axum::serve(listener, build_router(state)).await });

    // 2) Registrarse en el master
    let client = Client::new();
    let base_url = master_base_url();
    let resp = register(&client, &base_url, &config.advertise).await?;
    info!(
        "worker {} registrado en {} (registros: {})",
        config.advertise, base_url, resp.registrations
    );

    // 3) Atender RPCs hasta que el proceso termine
    server.await??;
    Ok(())
}
