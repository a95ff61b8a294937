use std::{fs, io, path::Path};

use tracing::debug;

/// Archivo intermedio que la tarea map `map_task` produce para la tarea reduce `reduce_task`.
/// Lo usan igual el map (escritor) y el reduce (lector).
pub fn reduce_name(job_name: &str, map_task: usize, reduce_task: usize) -> String {
    format!("mrtmp.{}-{}-{}", job_name, map_task, reduce_task)
}

/// Salida de la tarea reduce `reduce_task`.
pub fn merge_name(job_name: &str, reduce_task: usize) -> String {
    format!("mrtmp.{}-res-{}", job_name, reduce_task)
}

/// Resultado final del job, ya mezclado y ordenado.
pub fn result_name(job_name: &str) -> String {
    format!("mrtmp.{}", job_name)
}

/// Une un nombre con el directorio de trabajo.
pub fn in_dir(work_dir: &str, name: &str) -> String {
    Path::new(work_dir).join(name).to_string_lossy().to_string()
}

fn remove_if_exists(path: &str) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Borra los archivos intermedios y las salidas de cada reduce.
/// El resultado final (`result_name`) se deja.
pub fn cleanup_intermediate(
    work_dir: &str,
    job_name: &str,
    n_map: usize,
    n_reduce: usize,
) -> io::Result<()> {
    for r in 0..n_reduce {
        for m in 0..n_map {
            remove_if_exists(&in_dir(work_dir, &reduce_name(job_name, m, r)))?;
        }
        remove_if_exists(&in_dir(work_dir, &merge_name(job_name, r)))?;
    }
    debug!(
        "limpieza de intermedios del job {} ({} maps x {} reduces)",
        job_name, n_map, n_reduce
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, path::PathBuf};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("naming_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    #[test]
    fn nombres_son_deterministas() {
        assert_eq!(reduce_name("wc", 3, 1), "mrtmp.wc-3-1");
        assert_eq!(reduce_name("wc", 3, 1), reduce_name("wc", 3, 1));
        assert_eq!(merge_name("wc", 2), "mrtmp.wc-res-2");
        assert_eq!(result_name("wc"), "mrtmp.wc");
    }

    #[test]
    fn cleanup_borra_intermedios_y_deja_resultado() {
        let tmp = temp_dir("cleanup");
        let dir = tmp.to_string_lossy().to_string();

        fs::write(in_dir(&dir, &reduce_name("j", 0, 0)), "").unwrap();
        fs::write(in_dir(&dir, &reduce_name("j", 1, 0)), "").unwrap();
        fs::write(in_dir(&dir, &merge_name("j", 0)), "").unwrap();
        fs::write(in_dir(&dir, &result_name("j")), "x").unwrap();

        // n_reduce = 2: los archivos del reduce 1 no existen y no debe fallar
        cleanup_intermediate(&dir, "j", 2, 2).unwrap();

        assert!(!tmp.join(reduce_name("j", 0, 0)).exists());
        assert!(!tmp.join(merge_name("j", 0)).exists());
        assert!(tmp.join(result_name("j")).exists());
    }
}
