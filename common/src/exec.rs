use tracing::debug;

use crate::apps::App;
use crate::error::TaskError;
use crate::map::{do_map, MapTask};
use crate::naming::{in_dir, merge_name};
use crate::reduce::{do_reduce, CorruptionPolicy, ReduceTask};
use crate::task::{JobPhase, TaskDescriptor};

/// Ejecuta localmente la tarea que describe `task` sobre `work_dir`.
/// Es lo que hace un worker al recibir `Worker.DoTask`.
pub fn execute(
    task: &TaskDescriptor,
    work_dir: &str,
    app: App,
    policy: CorruptionPolicy,
) -> Result<(), TaskError> {
    debug!(
        "ejecutando {} tarea {} del job {} (app={})",
        task.phase, task.task_number, task.job_name, app.name
    );

    match task.phase {
        JobPhase::Map => {
            let input_file = task.file.clone().ok_or_else(|| TaskError::MissingInput {
                job: task.job_name.clone(),
                task: task.task_number,
            })?;
            let map = MapTask {
                work_dir: work_dir.to_string(),
                job_name: task.job_name.clone(),
                map_task: task.task_number,
                input_file,
                n_reduce: task.num_other_phase,
            };
            do_map(&map, app.map_f)?;
        }
        JobPhase::Reduce => {
            let reduce = ReduceTask {
                work_dir: work_dir.to_string(),
                job_name: task.job_name.clone(),
                reduce_task: task.task_number,
                out_file: in_dir(work_dir, &merge_name(&task.job_name, task.task_number)),
                n_map: task.num_other_phase,
            };
            do_reduce(&reduce, policy, app.reduce_f)?;
        }
    }
    Ok(())
}
