use tracing::info;

use crate::apps::App;
use crate::error::TaskError;
use crate::map::{do_map, MapTask};
use crate::merge::merge_outputs;
use crate::naming::{in_dir, merge_name};
use crate::reduce::{do_reduce, CorruptionPolicy, ReduceTask};

/// Ejecuta un job completo en este proceso, sin workers:
/// todos los maps, después todos los reduces y al final el merge.
/// Devuelve la ruta del resultado.
pub fn run_sequential(
    work_dir: &str,
    job_name: &str,
    files: &[String],
    n_reduce: usize,
    app: App,
    policy: CorruptionPolicy,
) -> Result<String, TaskError> {
    info!(
        "job {} secuencial: {} maps, {} reduces (app={})",
        job_name,
        files.len(),
        n_reduce,
        app.name
    );

    for (i, file) in files.iter().enumerate() {
        let task = MapTask {
            work_dir: work_dir.to_string(),
            job_name: job_name.to_string(),
            map_task: i,
            input_file: file.clone(),
            n_reduce,
        };
        do_map(&task, app.map_f)?;
    }

    for r in 0..n_reduce {
        let task = ReduceTask {
            work_dir: work_dir.to_string(),
            job_name: job_name.to_string(),
            reduce_task: r,
            out_file: in_dir(work_dir, &merge_name(job_name, r)),
            n_map: files.len(),
        };
        do_reduce(&task, policy, app.reduce_f)?;
    }

    merge_outputs(work_dir, job_name, n_reduce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::app_by_name;
    use std::{env, fs, path::PathBuf};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("sequential_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    #[test]
    fn wordcount_secuencial_end_to_end() {
        let tmp = temp_dir("wc");
        let dir = tmp.to_string_lossy().to_string();

        let f0 = tmp.join("a.txt");
        let f1 = tmp.join("b.txt");
        fs::write(&f0, "Hola hola mundo").unwrap();
        fs::write(&f1, "mundo mundo prueba").unwrap();
        let files = vec![
            f0.to_string_lossy().to_string(),
            f1.to_string_lossy().to_string(),
        ];

        let app = app_by_name("wordcount").unwrap();
        let out = run_sequential(&dir, "wc", &files, 3, app, CorruptionPolicy::AbortTask).unwrap();

        let content = fs::read_to_string(out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["hola: 2", "mundo: 3", "prueba: 1"]);
    }
}
