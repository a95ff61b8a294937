use std::{
    collections::hash_map::DefaultHasher,
    fs,
    hash::{Hash, Hasher},
};

use tracing::info;

use crate::codec::StagedWriter;
use crate::error::TaskError;
use crate::kv::KeyValue;
use crate::naming::{in_dir, reduce_name};

/// Parámetros de una tarea map.
#[derive(Debug, Clone)]
pub struct MapTask {
    pub work_dir: String,
    pub job_name: String,
    pub map_task: usize,
    pub input_file: String,
    pub n_reduce: usize,
}

/// Partición de una clave. Tiene que dar lo mismo en todos los procesos
/// que ejecuten maps de un mismo job.
///
/// `DefaultHasher` no garantiza el mismo algoritmo entre versiones de Rust:
/// todos los workers de un job tienen que ser el mismo build.
pub fn hash_key_to_partition(key: &str, num_partitions: usize) -> usize {
    let mut h = DefaultHasher::new();
    key.hash(&mut h);
    (h.finish() % num_partitions as u64) as usize
}

/// Ejecuta una tarea map:
///   - lee el archivo de entrada completo
///   - llama a `map_f(nombre, contenido)`
///   - reparte los registros en `n_reduce` archivos intermedios por hash(clave)
///
/// Siempre crea los `n_reduce` archivos, aunque queden vacíos, así el reduce
/// puede distinguir "sin datos" de "archivo perdido". Cada archivo se escribe
/// en un temporal y se renombra al final, así un intento repetido de la misma
/// tarea nunca mezcla registros con otro.
pub fn do_map<F>(task: &MapTask, map_f: F) -> Result<usize, TaskError>
where
    F: Fn(&str, &str) -> Vec<KeyValue>,
{
    let contents =
        fs::read_to_string(&task.input_file).map_err(|source| TaskError::ReadInput {
            path: task.input_file.clone(),
            source,
        })?;

    let records = map_f(&task.input_file, &contents);
    let n_reduce = task.n_reduce.max(1);

    // Un writer por partición
    let mut writers = Vec::with_capacity(n_reduce);
    let mut paths = Vec::with_capacity(n_reduce);
    for r in 0..n_reduce {
        let path = in_dir(&task.work_dir, &reduce_name(&task.job_name, task.map_task, r));
        let w = StagedWriter::create(&path).map_err(|source| TaskError::CreateOutput {
            path: path.clone(),
            source,
        })?;
        writers.push(w);
        paths.push(path);
    }

    for kv in &records {
        let r = hash_key_to_partition(&kv.key, n_reduce);
        writers[r].write(kv).map_err(|source| TaskError::Write {
            path: paths[r].clone(),
            source,
        })?;
    }

    for (w, path) in writers.into_iter().zip(paths.iter()) {
        w.commit().map_err(|source| TaskError::Write {
            path: path.clone(),
            source,
        })?;
    }

    info!(
        "map {} del job {}: {} registros desde {} en {} particiones",
        task.map_task,
        task.job_name,
        records.len(),
        task.input_file,
        n_reduce
    );

    Ok(records.len())
}
