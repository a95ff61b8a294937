use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use common::{
    apps::app_by_name, merge_outputs, run_sequential, CorruptionPolicy, WorkerInfo,
};
use reqwest::Client;
use std::env;
use tracing::info;

/// Igual que en el worker:
/// - En Docker: MASTER_URL=http://master:8080
/// - Local: default http://localhost:8080
fn master_base_url() -> String {
    env::var("MASTER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "CLI simple para correr jobs locales y hablar con el master")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Corre un job completo en este proceso, sin workers
    Sequential {
        #[arg(value_name = "JOB")]
        job: String,

        /// Archivos de entrada (uno por tarea map)
        #[arg(value_name = "ARCHIVO", required = true)]
        files: Vec<String>,

        #[arg(long, default_value_t = 1)]
        n_reduce: usize,

        /// wordcount | indexer
        #[arg(long, default_value = "wordcount")]
        app: String,

        #[arg(long, default_value = ".")]
        work_dir: String,

        /// abort | skip
        #[arg(long, default_value = "abort")]
        corrupt_policy: String,
    },

    /// Junta las salidas mrtmp.<job>-res-* en mrtmp.<job>
    Merge {
        #[arg(value_name = "JOB")]
        job: String,

        #[arg(long, default_value_t = 1)]
        n_reduce: usize,

        #[arg(long, default_value = ".")]
        work_dir: String,
    },

    /// Lista los workers registrados en el master
    Workers,
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sequential {
            job,
            files,
            n_reduce,
            app,
            work_dir,
            corrupt_policy,
        } => {
            let app = app_by_name(&app).ok_or_else(|| anyhow!("aplicación desconocida: {app}"))?;
            let policy: CorruptionPolicy = corrupt_policy.parse().map_err(|e: String| anyhow!(e))?;
            if n_reduce == 0 {
                return Err(anyhow!("--n-reduce tiene que ser > 0"));
            }

            let out = tokio::task::spawn_blocking(move || {
                run_sequential(&work_dir, &job, &files, n_reduce, app, policy)
            })
            .await??;

            info!("job secuencial terminado");
            println!("{out}");
        }
        Commands::Merge {
            job,
            n_reduce,
            work_dir,
        } => {
            let out =
                tokio::task::spawn_blocking(move || merge_outputs(&work_dir, &job, n_reduce))
                    .await??;
            println!("{out}");
        }
        Commands::Workers => {
            let url = format!("{}/api/v1/workers", master_base_url());
            let resp = Client::new().get(&url).send().await?;

            if !resp.status().is_success() {
                println!("El master respondió {}", resp.status());
                return Ok(());
            }

            let workers: Vec<WorkerInfo> = resp.json().await?;
            if workers.is_empty() {
                println!("No hay workers registrados");
            }
            for w in workers {
                println!(
                    "{}  registros={}  hace {}s",
                    w.address, w.registrations, w.registered_secs_ago
                );
            }
        }
    }

    Ok(())
}
