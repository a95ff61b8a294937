//! Scheduler de una fase (map o reduce).
//!
//! Cada tarea corre en su propia task de tokio: pide un worker al pool,
//! le manda `Worker.DoTask` y reintenta con otro worker hasta que alguno
//! la complete. `schedule` vuelve recién cuando todas las tareas terminaron.

use std::{sync::Arc, time::Duration};

use common::{JobPhase, TaskDescriptor, DO_TASK_METHOD};
use thiserror::Error;
use tokio::{task::JoinSet, time::timeout};
use tracing::{debug, info, warn};

use crate::pool::WorkerPool;
use crate::rpc::{RpcClient, RpcOutcome};

#[derive(Debug, Clone, Default)]
pub struct ScheduleOptions {
    /// Tiempo máximo para la fase completa. `None`: se reintenta para siempre.
    pub deadline: Option<Duration>,
}

/// Resumen de una fase terminada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: JobPhase,
    pub tasks: usize,
    pub successes: usize,
    /// Intentos fallidos (worker caído o fallo pasajero) que se reintentaron
    pub failed_attempts: usize,
}

#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("{phase} tarea {task} falló sin reintento posible: {reason}")]
    TaskFailed {
        phase: JobPhase,
        task: usize,
        reason: String,
    },

    #[error("{phase} no terminó en {deadline:?} ({done}/{tasks} tareas completas)")]
    DeadlineExceeded {
        phase: JobPhase,
        deadline: Duration,
        done: usize,
        tasks: usize,
    },

    #[error("{phase}: el pool de workers se cerró con tareas pendientes")]
    PoolClosed { phase: JobPhase },

    #[error("{phase}: una tarea de scheduling terminó de forma anormal: {reason}")]
    Crashed { phase: JobPhase, reason: String },
}

/// Descriptores de todas las tareas de la fase, en orden de número de tarea.
pub fn build_tasks(
    job_name: &str,
    map_files: &[String],
    n_reduce: usize,
    phase: JobPhase,
) -> Vec<TaskDescriptor> {
    match phase {
        JobPhase::Map => map_files
            .iter()
            .enumerate()
            .map(|(i, file)| TaskDescriptor::map(job_name, i, file, n_reduce))
            .collect(),
        JobPhase::Reduce => (0..n_reduce)
            .map(|r| TaskDescriptor::reduce(job_name, r, map_files.len()))
            .collect(),
    }
}

/// Lleva una tarea hasta el final. Devuelve la cantidad de intentos fallidos.
async fn run_task(
    task: TaskDescriptor,
    pool: WorkerPool,
    rpc: Arc<dyn RpcClient>,
) -> Result<usize, PhaseError> {
    let mut failed_attempts = 0;

    loop {
        let worker = pool
            .acquire()
            .await
            .ok_or(PhaseError::PoolClosed { phase: task.phase })?;
        debug!("{} tarea {} -> {}", task.phase, task.task_number, worker);

        match rpc.call(&worker, DO_TASK_METHOD, &task).await {
            RpcOutcome::Succeeded => {
                pool.release(worker);
                return Ok(failed_attempts);
            }
            RpcOutcome::Unreachable(reason) => {
                failed_attempts += 1;
                warn!(
                    "Schedule: {} tarea {} falló en {} (worker descartado): {}",
                    task.phase, task.task_number, worker, reason
                );
                pool.discard(worker);
            }
            RpcOutcome::Retryable(reason) => {
                failed_attempts += 1;
                warn!(
                    "Schedule: {} tarea {} falló en {}, se reintenta: {}",
                    task.phase, task.task_number, worker, reason
                );
                pool.release(worker);
            }
            RpcOutcome::Fatal(reason) => {
                pool.release(worker);
                return Err(PhaseError::TaskFailed {
                    phase: task.phase,
                    task: task.task_number,
                    reason,
                });
            }
        }
    }
}

async fn join_all(
    set: &mut JoinSet<Result<usize, PhaseError>>,
    report: &mut PhaseReport,
) -> Result<(), PhaseError> {
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(failed)) => {
                report.successes += 1;
                report.failed_attempts += failed;
            }
            Ok(Err(e)) => return Err(e),
            Err(e) => {
                return Err(PhaseError::Crashed {
                    phase: report.phase,
                    reason: e.to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Ejecuta todas las tareas de `phase` sobre los workers de `pool`.
///
/// Para map hay una tarea por archivo de entrada; para reduce, `n_reduce`.
/// Un worker nunca tiene dos tareas de este scheduler a la vez. Al volver
/// (con éxito o no) el pool queda drenándose en segundo plano.
pub async fn schedule(
    job_name: &str,
    map_files: &[String],
    n_reduce: usize,
    phase: JobPhase,
    pool: WorkerPool,
    rpc: Arc<dyn RpcClient>,
    options: &ScheduleOptions,
) -> Result<PhaseReport, PhaseError> {
    let tasks = build_tasks(job_name, map_files, n_reduce, phase);
    let n_other = match phase {
        JobPhase::Map => n_reduce,
        JobPhase::Reduce => map_files.len(),
    };
    info!("Schedule: {} {} tareas ({} I/Os)", tasks.len(), phase, n_other);

    let mut report = PhaseReport {
        phase,
        tasks: tasks.len(),
        successes: 0,
        failed_attempts: 0,
    };

    let mut set = JoinSet::new();
    for task in tasks {
        set.spawn(run_task(task, pool.clone(), Arc::clone(&rpc)));
    }

    let result = match options.deadline {
        Some(deadline) => {
            let waited = timeout(deadline, join_all(&mut set, &mut report)).await;
            match waited {
                Ok(r) => r,
                Err(_) => Err(PhaseError::DeadlineExceeded {
                    phase,
                    deadline,
                    done: report.successes,
                    tasks: report.tasks,
                }),
            }
        }
        None => join_all(&mut set, &mut report).await,
    };

    if result.is_err() {
        set.shutdown().await;
    }

    // lo que quede en el pool (o llegue después) ya no le sirve a esta fase
    drop(pool.drain());

    match result {
        Ok(()) => {
            info!(
                "Schedule: {} terminada ({} tareas, {} reintentos)",
                phase, report.successes, report.failed_attempts
            );
            Ok(report)
        }
        Err(e) => {
            warn!("Schedule: {} abortada: {}", phase, e);
            Err(e)
        }
    }
}
