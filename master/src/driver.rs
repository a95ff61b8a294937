//! Orquestación de un job distribuido completo:
//! fase map, fase reduce, merge de salidas y limpieza de intermedios.

use std::{fs, io, sync::Arc};

use common::{merge_outputs, naming::cleanup_intermediate, JobPhase, TaskError};
use glob::glob;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::MasterConfig;
use crate::pool::WorkerPool;
use crate::rpc::RpcClient;
use crate::schedule::{schedule, PhaseError, PhaseReport, ScheduleOptions};
use crate::state::WorkerRegistry;

#[derive(Debug, Clone)]
pub struct JobSpec {
    pub job_name: String,
    /// Archivos de entrada; uno por tarea map
    pub files: Vec<String>,
    pub n_reduce: usize,
}

#[derive(Debug)]
pub struct JobSummary {
    pub result_file: String,
    pub map: PhaseReport,
    pub reduce: PhaseReport,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("patrón de entrada inválido {pattern}: {source}")]
    BadPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("ningún archivo coincide con {0:?}")]
    NoInputs(Vec<String>),

    #[error("job inválido: {0}")]
    InvalidJob(String),

    #[error("no se pudo preparar el directorio de trabajo {path}: {source}")]
    WorkDir { path: String, source: io::Error },

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error("merge de salidas: {0}")]
    Merge(#[from] TaskError),

    #[error("tarea bloqueante abortada: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Expande los patrones glob a la lista de archivos de entrada,
/// ordenada y sin repetidos.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<String>, DriverError> {
    let mut files = Vec::new();

    for pattern in patterns {
        let entries = glob(pattern).map_err(|source| DriverError::BadPattern {
            pattern: pattern.clone(),
            source,
        })?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => files.push(path.to_string_lossy().to_string()),
                Ok(_) => {}
                Err(e) => warn!("no se pudo leer {}: {}", e.path().display(), e),
            }
        }
    }

    files.sort();
    files.dedup();

    if files.is_empty() {
        return Err(DriverError::NoInputs(patterns.to_vec()));
    }
    Ok(files)
}

async fn run_phase(
    job: &JobSpec,
    phase: JobPhase,
    registry: &WorkerRegistry,
    rpc: &Arc<dyn RpcClient>,
    config: &MasterConfig,
) -> Result<PhaseReport, PhaseError> {
    // pool nuevo por fase, con todos los workers conocidos hasta ahora
    let pool = WorkerPool::spawn(registry.subscribe(), config.pool_capacity);
    let options = ScheduleOptions {
        deadline: config.phase_deadline,
    };
    schedule(
        &job.job_name,
        &job.files,
        job.n_reduce,
        phase,
        pool,
        Arc::clone(rpc),
        &options,
    )
    .await
}

/// Corre el job completo sobre los workers del registro.
/// Devuelve la ruta del resultado final (`mrtmp.<job>`).
pub async fn run_distributed(
    job: &JobSpec,
    registry: &WorkerRegistry,
    rpc: Arc<dyn RpcClient>,
    config: &MasterConfig,
) -> Result<JobSummary, DriverError> {
    if job.n_reduce == 0 {
        return Err(DriverError::InvalidJob("n_reduce tiene que ser > 0".into()));
    }
    if job.files.is_empty() {
        return Err(DriverError::InvalidJob("no hay archivos de entrada".into()));
    }

    fs::create_dir_all(&config.work_dir).map_err(|source| DriverError::WorkDir {
        path: config.work_dir.clone(),
        source,
    })?;

    info!(
        "job {}: {} maps, {} reduces, workdir {}",
        job.job_name,
        job.files.len(),
        job.n_reduce,
        config.work_dir
    );

    let phases = async {
        let map = run_phase(job, JobPhase::Map, registry, &rpc, config).await?;
        let reduce = run_phase(job, JobPhase::Reduce, registry, &rpc, config).await?;
        Ok::<_, PhaseError>((map, reduce))
    }
    .await;

    // los pools que quedaron drenando terminan acá
    registry.close_subscriptions();
    let (map, reduce) = phases?;

    let work_dir = config.work_dir.clone();
    let job_name = job.job_name.clone();
    let n_map = job.files.len();
    let n_reduce = job.n_reduce;

    let result_file = tokio::task::spawn_blocking(move || {
        let out = merge_outputs(&work_dir, &job_name, n_reduce)?;
        if let Err(e) = cleanup_intermediate(&work_dir, &job_name, n_map, n_reduce) {
            warn!("no se pudieron borrar todos los intermedios: {}", e);
        }
        Ok::<_, TaskError>(out)
    })
    .await??;

    info!("job {} terminado -> {}", job.job_name, result_file);

    Ok(JobSummary {
        result_file,
        map,
        reduce,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcOutcome;
    use async_trait::async_trait;
    use common::{apps::app_by_name, execute, CorruptionPolicy, TaskDescriptor};
    use std::{env, path::PathBuf, time::Duration};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("driver_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    /// Ejecuta las tareas en este mismo proceso, como lo haría un worker.
    struct InProcessRpc {
        work_dir: String,
    }

    #[async_trait]
    impl RpcClient for InProcessRpc {
        async fn call(&self, _worker: &str, _method: &str, args: &TaskDescriptor) -> RpcOutcome {
            let task = args.clone();
            let dir = self.work_dir.clone();
            let res = tokio::task::spawn_blocking(move || {
                let app = app_by_name("wordcount").unwrap();
                execute(&task, &dir, app, CorruptionPolicy::AbortTask)
            })
            .await
            .unwrap();
            match res {
                Ok(()) => RpcOutcome::Succeeded,
                Err(e) if e.is_transient() => RpcOutcome::Retryable(e.to_string()),
                Err(e) => RpcOutcome::Fatal(e.to_string()),
            }
        }
    }

    fn config_for(dir: &str) -> MasterConfig {
        MasterConfig {
            work_dir: dir.to_string(),
            phase_deadline: Some(Duration::from_secs(10)),
            ..MasterConfig::default()
        }
    }

    #[tokio::test]
    async fn wordcount_distribuido_end_to_end() {
        let tmp = temp_dir("wc");
        let dir = tmp.to_string_lossy().to_string();
        let inputs = ["a b", "b c c", "a c"];
        let mut files = Vec::new();
        for (i, text) in inputs.iter().enumerate() {
            let p = tmp.join(format!("in-{}.txt", i));
            fs::write(&p, text).unwrap();
            files.push(p.to_string_lossy().to_string());
        }

        let registry = WorkerRegistry::new();
        registry.register("local-1".into());
        registry.register("local-2".into());
        let rpc: Arc<dyn RpcClient> = Arc::new(InProcessRpc {
            work_dir: dir.clone(),
        });

        let job = JobSpec {
            job_name: "wc".into(),
            files,
            n_reduce: 2,
        };
        let summary = run_distributed(&job, &registry, rpc, &config_for(&dir))
            .await
            .unwrap();

        assert_eq!(summary.map.successes, 3);
        assert_eq!(summary.reduce.successes, 2);

        let content = fs::read_to_string(&summary.result_file).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["a: 2", "b: 2", "c: 3"]);

        // sólo quedan las entradas y el resultado
        assert!(!tmp.join("mrtmp.wc-0-0").exists());
        assert!(!tmp.join("mrtmp.wc-res-0").exists());
        assert!(tmp.join("mrtmp.wc").exists());
    }

    #[tokio::test]
    async fn entrada_inexistente_aborta_el_job() {
        let tmp = temp_dir("sin_entrada");
        let dir = tmp.to_string_lossy().to_string();

        let registry = WorkerRegistry::new();
        registry.register("local-1".into());
        let rpc: Arc<dyn RpcClient> = Arc::new(InProcessRpc {
            work_dir: dir.clone(),
        });

        let job = JobSpec {
            job_name: "roto".into(),
            files: vec![tmp.join("no-existe.txt").to_string_lossy().to_string()],
            n_reduce: 1,
        };
        let err = run_distributed(&job, &registry, rpc, &config_for(&dir))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DriverError::Phase(PhaseError::TaskFailed {
                phase: JobPhase::Map,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn n_reduce_cero_es_invalido() {
        let registry = WorkerRegistry::new();
        let rpc: Arc<dyn RpcClient> = Arc::new(InProcessRpc {
            work_dir: "/tmp".into(),
        });
        let job = JobSpec {
            job_name: "j".into(),
            files: vec!["x".into()],
            n_reduce: 0,
        };
        let err = run_distributed(&job, &registry, rpc, &MasterConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::InvalidJob(_)));
    }

    #[test]
    fn expand_inputs_ordena_y_quita_repetidos() {
        let tmp = temp_dir("glob");
        fs::write(tmp.join("b.txt"), "").unwrap();
        fs::write(tmp.join("a.txt"), "").unwrap();
        fs::create_dir_all(tmp.join("sub.txt")).unwrap();

        let pattern = format!("{}/*.txt", tmp.to_string_lossy());
        let files = expand_inputs(&[pattern.clone(), pattern]).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.txt"));
        assert!(files[1].ends_with("b.txt"));
    }

    #[test]
    fn expand_inputs_sin_coincidencias_es_error() {
        let tmp = temp_dir("glob_vacio");
        let pattern = format!("{}/*.nada", tmp.to_string_lossy());
        assert!(matches!(
            expand_inputs(&[pattern]),
            Err(DriverError::NoInputs(_))
        ));
    }
}
