//! Formato de registros intermedios y de salida: JSON lines,
//! un objeto `{"Key": .., "Value": ..}` por línea.
//!
//! Se lee de a un registro por vez; el fin de archivo no es un error.

use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    process,
    sync::atomic::{AtomicUsize, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use thiserror::Error;

use crate::error::TaskError;
use crate::kv::KeyValue;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("línea {line}: {source}")]
    Decode {
        line: usize,
        source: serde_json::Error,
    },
}

/// Decodificador en streaming sobre cualquier `BufRead`.
///
/// Lee bytes crudos por línea: un registro que no es UTF-8 válido es un
/// registro corrupto (`ReadError::Decode`), no un error de E/S.
pub struct KeyValueReader<R> {
    reader: R,
    buf: Vec<u8>,
    line: usize,
}

impl<R: BufRead> KeyValueReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line: 0,
        }
    }
}

impl KeyValueReader<BufReader<File>> {
    pub fn open(path: &str) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> Iterator for KeyValueReader<R> {
    type Item = Result<KeyValue, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(ReadError::Io(e))),
            }
            self.line += 1;

            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let line_no = self.line;
            return Some(
                serde_json::from_slice(&self.buf).map_err(|source| ReadError::Decode {
                    line: line_no,
                    source,
                }),
            );
        }
    }
}

/// Codificador de registros: una línea JSON por registro.
pub struct KeyValueWriter<W: Write> {
    inner: BufWriter<W>,
}

impl<W: Write> KeyValueWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: BufWriter::new(writer),
        }
    }

    pub fn write(&mut self, kv: &KeyValue) -> io::Result<()> {
        serde_json::to_writer(&mut self.inner, kv)?;
        self.inner.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn finish(mut self) -> io::Result<()> {
        self.flush()
    }
}

impl KeyValueWriter<File> {
    pub fn create(path: &str) -> io::Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

static STAGE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Nombre temporal único por intento, en el mismo directorio que `path`
/// (así el `rename` final no cruza de filesystem).
fn stage_path(path: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!(
        "{}.tmp-{}-{}-{}",
        path,
        process::id(),
        nanos,
        STAGE_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Writer de registros sobre un archivo temporal que recién ocupa su nombre
/// final en `commit`.
///
/// Dos intentos de la misma tarea (por ejemplo, un worker que siguió
/// trabajando después de un timeout del master) nunca escriben el mismo
/// archivo: cada uno deja un resultado completo y el último `rename` gana.
/// Si no se llega a `commit`, el temporal se borra.
pub struct StagedWriter {
    writer: KeyValueWriter<File>,
    stage_path: String,
    final_path: String,
    committed: bool,
}

impl StagedWriter {
    pub fn create(final_path: &str) -> io::Result<Self> {
        let stage_path = stage_path(final_path);
        let writer = KeyValueWriter::create(&stage_path)?;
        Ok(Self {
            writer,
            stage_path,
            final_path: final_path.to_string(),
            committed: false,
        })
    }

    pub fn write(&mut self, kv: &KeyValue) -> io::Result<()> {
        self.writer.write(kv)
    }

    pub fn final_path(&self) -> &str {
        &self.final_path
    }

    pub fn commit(mut self) -> io::Result<()> {
        self.writer.flush()?;
        fs::rename(&self.stage_path, &self.final_path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedWriter {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.stage_path);
        }
    }
}

/// Escribe todos los registros en un archivo nuevo.
pub fn write_key_values(path: &str, records: &[KeyValue]) -> Result<(), TaskError> {
    let mut writer = StagedWriter::create(path).map_err(|source| TaskError::CreateOutput {
        path: path.to_string(),
        source,
    })?;

    let write_err = |source| TaskError::Write {
        path: path.to_string(),
        source,
    };
    for kv in records {
        writer.write(kv).map_err(write_err)?;
    }
    writer.commit().map_err(write_err)
}

/// Lee un archivo completo; cualquier registro corrupto es un error.
pub fn read_key_values(path: &str) -> Result<Vec<KeyValue>, TaskError> {
    let reader = KeyValueReader::open(path).map_err(|source| TaskError::OpenIntermediate {
        path: path.to_string(),
        source,
    })?;

    let mut out = Vec::new();
    for rec in reader {
        match rec {
            Ok(kv) => out.push(kv),
            Err(ReadError::Io(source)) => {
                return Err(TaskError::ReadIntermediate {
                    path: path.to_string(),
                    source,
                })
            }
            Err(ReadError::Decode { line, source }) => {
                return Err(TaskError::Corrupt {
                    path: path.to_string(),
                    line,
                    source,
                })
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, io::Cursor, path::PathBuf};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("codec_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    fn leftovers(dir: &PathBuf) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.contains(".tmp-"))
            .collect()
    }

    #[test]
    fn encode_y_decode_reproducen_la_secuencia() {
        let records = vec![
            KeyValue::new("cat", "1"),
            KeyValue::new("dog", "línea\ncon salto"),
            KeyValue::new("", ""),
            KeyValue::new("cat", "{\"json\": true}"),
        ];

        let mut buf = Vec::new();
        let mut writer = KeyValueWriter::new(&mut buf);
        for kv in &records {
            writer.write(kv).unwrap();
        }
        writer.finish().unwrap();

        let decoded: Vec<KeyValue> = KeyValueReader::new(Cursor::new(buf))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(decoded, records);
    }

    #[test]
    fn reader_ignora_lineas_vacias_y_reporta_linea_corrupta() {
        let input = "{\"Key\":\"a\",\"Value\":\"1\"}\n\n{\"Key\":\"b\",\"Val\n";
        let mut reader = KeyValueReader::new(Cursor::new(input));

        assert_eq!(reader.next().unwrap().unwrap(), KeyValue::new("a", "1"));
        match reader.next().unwrap() {
            Err(ReadError::Decode { line, .. }) => assert_eq!(line, 3),
            other => panic!("se esperaba error de decode, llegó {other:?}"),
        }
    }

    #[test]
    fn reader_sobre_entrada_vacia_termina_sin_error() {
        let mut reader = KeyValueReader::new(Cursor::new(""));
        assert!(reader.next().is_none());
    }

    #[test]
    fn utf8_invalido_es_registro_corrupto_no_error_de_lectura() {
        let mut input = b"{\"Key\":\"a\",\"Value\":\"1\"}\n".to_vec();
        input.extend_from_slice(b"{\"Key\":\"\xff\xfe\",\"Value\":\"1\"}\n");
        let mut reader = KeyValueReader::new(Cursor::new(input));

        assert_eq!(reader.next().unwrap().unwrap(), KeyValue::new("a", "1"));
        match reader.next().unwrap() {
            Err(ReadError::Decode { line, .. }) => assert_eq!(line, 2),
            other => panic!("se esperaba error de decode, llegó {other:?}"),
        }
    }

    #[test]
    fn staged_writer_sin_commit_no_deja_nada() {
        let tmp = temp_dir("sin_commit");
        let path = tmp.join("mrtmp.j-res-0").to_string_lossy().to_string();

        let mut w = StagedWriter::create(&path).unwrap();
        w.write(&KeyValue::new("a", "1")).unwrap();
        drop(w);

        assert!(fs::metadata(&path).is_err());
        assert!(leftovers(&tmp).is_empty());
    }

    #[test]
    fn dos_intentos_sobre_la_misma_salida_no_se_mezclan() {
        let tmp = temp_dir("dos_intentos");
        let path = tmp.join("mrtmp.j-res-0").to_string_lossy().to_string();

        // los dos intentos escriben a la vez; cada uno sobre su temporal
        let mut first = StagedWriter::create(&path).unwrap();
        let mut second = StagedWriter::create(&path).unwrap();
        for i in 0..100 {
            first.write(&KeyValue::new(format!("k{i}"), "viejo")).unwrap();
            second.write(&KeyValue::new(format!("k{i}"), "nuevo")).unwrap();
        }
        second.commit().unwrap();
        first.commit().unwrap();

        let out = read_key_values(&path).unwrap();
        assert_eq!(out.len(), 100);
        assert!(out.iter().all(|kv| kv.value == "viejo"));
        assert!(leftovers(&tmp).is_empty());
    }
}
