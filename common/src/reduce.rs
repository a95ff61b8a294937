//! Motor de merge del lado reduce.
//!
//! Lee un stream intermedio por cada tarea map, ordena todo por clave
//! (sort estable, así los valores de una misma clave quedan en orden de
//! índice de map), agrupa las claves iguales y llama a la función reduce
//! una sola vez por clave. La salida queda ordenada por clave para que el
//! merge final pueda combinar las salidas de todos los reduce.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::codec::{KeyValueReader, ReadError, StagedWriter};
use crate::error::TaskError;
use crate::kv::{self, KeyValue};
use crate::naming::{in_dir, reduce_name};

/// Qué hacer con un registro corrupto (que no es fin de archivo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionPolicy {
    /// Se loguea y se deja de leer ese archivo; lo que venía después se pierde.
    SkipCorruptTail,
    /// La tarea falla con un error que nombra archivo y línea.
    #[default]
    AbortTask,
}

impl FromStr for CorruptionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "skip_corrupt_tail" => Ok(CorruptionPolicy::SkipCorruptTail),
            "abort" | "abort_task" => Ok(CorruptionPolicy::AbortTask),
            other => Err(format!("política de corrupción desconocida: {other}")),
        }
    }
}

/// Parámetros de una tarea reduce.
#[derive(Debug, Clone)]
pub struct ReduceTask {
    /// Directorio donde están los intermedios
    pub work_dir: String,
    pub job_name: String,
    pub reduce_task: usize,
    /// Ruta completa del archivo de salida
    pub out_file: String,
    /// Cantidad de tareas map (una entrada por cada una)
    pub n_map: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOutcome {
    /// Se escribió un registro por clave distinta
    Written { keys: usize },
    /// No había ningún registro: no se escribe salida
    Empty,
}

/// Lee los registros de un archivo intermedio y los agrega a `out`.
fn read_shard(
    path: &str,
    policy: CorruptionPolicy,
    out: &mut Vec<KeyValue>,
) -> Result<(), TaskError> {
    let reader = KeyValueReader::open(path).map_err(|source| TaskError::OpenIntermediate {
        path: path.to_string(),
        source,
    })?;

    for rec in reader {
        match rec {
            Ok(kv) => out.push(kv),
            Err(ReadError::Io(source)) => {
                return Err(TaskError::ReadIntermediate {
                    path: path.to_string(),
                    source,
                });
            }
            Err(ReadError::Decode { line, source }) => match policy {
                CorruptionPolicy::SkipCorruptTail => {
                    warn!(
                        "registro corrupto en {} (línea {}): {}; se descarta el resto del archivo",
                        path, line, source
                    );
                    break;
                }
                CorruptionPolicy::AbortTask => {
                    return Err(TaskError::Corrupt {
                        path: path.to_string(),
                        line,
                        source,
                    });
                }
            },
        }
    }

    Ok(())
}

/// Ejecuta una tarea reduce completa.
///
/// 1. Lee `reduce_name(job, m, r)` para cada `m` en `0..n_map`.
/// 2. Ordena por clave (estable).
/// 3. Llama `reduce_f(clave, valores)` una vez por clave.
/// 4. Escribe un registro por clave, en orden, en `out_file`.
///
/// Si no hubo ningún registro no se crea `out_file`.
pub fn do_reduce<F>(
    task: &ReduceTask,
    policy: CorruptionPolicy,
    mut reduce_f: F,
) -> Result<ReduceOutcome, TaskError>
where
    F: FnMut(&str, &[String]) -> String,
{
    let mut records: Vec<KeyValue> = Vec::new();

    for m in 0..task.n_map {
        let path = in_dir(
            &task.work_dir,
            &reduce_name(&task.job_name, m, task.reduce_task),
        );
        read_shard(&path, policy, &mut records)?;
    }

    if records.is_empty() {
        info!(
            "reduce {} del job {}: no se encontró ningún registro",
            task.reduce_task, task.job_name
        );
        return Ok(ReduceOutcome::Empty);
    }

    kv::sort_by_key(&mut records);

    let mut writer =
        StagedWriter::create(&task.out_file).map_err(|source| TaskError::CreateOutput {
            path: task.out_file.clone(),
            source,
        })?;
    let write_err = |source| TaskError::Write {
        path: task.out_file.clone(),
        source,
    };

    let groups = kv::group_sorted(&records);
    for (key, values) in &groups {
        let reduced = reduce_f(key, values);
        writer
            .write(&KeyValue::new(*key, reduced))
            .map_err(write_err)?;
    }
    writer.commit().map_err(write_err)?;

    info!(
        "reduce {} del job {}: {} registros, {} claves -> {}",
        task.reduce_task,
        task.job_name,
        records.len(),
        groups.len(),
        task.out_file
    );

    Ok(ReduceOutcome::Written { keys: groups.len() })
}
