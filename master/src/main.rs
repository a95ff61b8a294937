use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use master::{
    config::MasterConfig, expand_inputs, handlers, run_distributed, AppState, HttpRpcClient,
    JobSpec, RpcClient,
};

#[derive(Parser)]
#[command(name = "master")]
#[command(about = "Master MapReduce: recibe workers y reparte un job entre ellos")]
struct Cli {
    /// Nombre del job (prefijo de los archivos mrtmp.*)
    #[arg(value_name = "JOB")]
    job: String,

    /// Cantidad de particiones reduce
    #[arg(long, default_value_t = 1)]
    n_reduce: usize,

    /// Patrones glob de los archivos de entrada
    #[arg(value_name = "INPUT_GLOB", required = true)]
    inputs: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("master=debug,common=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = MasterConfig::from_env();

    let files = expand_inputs(&cli.inputs)?;
    let job = JobSpec {
        job_name: cli.job,
        files,
        n_reduce: cli.n_reduce,
    };

    let state = AppState::new();
    let registry = state.registry.clone();

    // router HTTP: registro de workers
    let app = handlers::build_router(state);
    let listener = TcpListener::bind(config.bind.as_str())
        .await
        .with_context(|| format!("no se pudo abrir {}", config.bind))?;
    info!("master escuchando en {}", listener.local_addr()?);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("servidor HTTP terminó con error: {}", e);
        }
    });

    let rpc: Arc<dyn RpcClient> = Arc::new(HttpRpcClient::new(config.rpc_timeout)?);
    let summary = run_distributed(&job, &registry, rpc, &config).await?;

    info!(
        "map: {} tareas ({} reintentos), reduce: {} tareas ({} reintentos)",
        summary.map.successes,
        summary.map.failed_attempts,
        summary.reduce.successes,
        summary.reduce.failed_attempts
    );
    println!("{}", summary.result_file);

    Ok(())
}
