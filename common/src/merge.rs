use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use tracing::{debug, info};

use crate::codec::read_key_values;
use crate::error::TaskError;
use crate::kv::{self, KeyValue};
use crate::naming::{in_dir, merge_name, result_name};

/// Junta las salidas de los `n_reduce` reduce en un único archivo
/// ordenado globalmente por clave, con líneas `clave: valor`.
///
/// Un reduce que terminó vacío no deja archivo; se saltea.
/// Devuelve la ruta del resultado.
pub fn merge_outputs(work_dir: &str, job_name: &str, n_reduce: usize) -> Result<String, TaskError> {
    let mut all: Vec<KeyValue> = Vec::new();

    for r in 0..n_reduce {
        let path = in_dir(work_dir, &merge_name(job_name, r));
        if !Path::new(&path).exists() {
            debug!("reduce {} no dejó salida ({}), se omite", r, path);
            continue;
        }
        all.extend(read_key_values(&path)?);
    }

    kv::sort_by_key(&mut all);

    let out_path = in_dir(work_dir, &result_name(job_name));
    let file = File::create(&out_path).map_err(|source| TaskError::CreateOutput {
        path: out_path.clone(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let write_all = |writer: &mut BufWriter<File>| -> io::Result<()> {
        for kv in &all {
            writeln!(writer, "{}: {}", kv.key, kv.value)?;
        }
        writer.flush()
    };
    write_all(&mut writer).map_err(|source| TaskError::Write {
        path: out_path.clone(),
        source,
    })?;

    info!(
        "merge del job {}: {} claves de {} reduces -> {}",
        job_name,
        all.len(),
        n_reduce,
        out_path
    );

    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write_key_values;
    use std::{env, fs, path::PathBuf};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("merge_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    #[test]
    fn merge_outputs_ordena_globalmente() {
        let tmp = temp_dir("global");
        let dir = tmp.to_string_lossy().to_string();

        write_key_values(
            &in_dir(&dir, &merge_name("j", 0)),
            &[KeyValue::new("b", "2"), KeyValue::new("d", "4")],
        )
        .unwrap();
        write_key_values(
            &in_dir(&dir, &merge_name("j", 1)),
            &[KeyValue::new("a", "1"), KeyValue::new("c", "3")],
        )
        .unwrap();
        // el reduce 2 quedó vacío y no tiene archivo

        let out = merge_outputs(&dir, "j", 3).unwrap();
        let content = fs::read_to_string(out).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines, vec!["a: 1", "b: 2", "c: 3", "d: 4"]);
    }
}
