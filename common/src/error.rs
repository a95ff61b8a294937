use std::io;

use thiserror::Error;

/// Fallo local de una tarea (map o reduce). Siempre nombra el archivo involucrado.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("no se pudo leer la entrada {path}: {source}")]
    ReadInput { path: String, source: io::Error },

    #[error("no se pudo abrir el archivo intermedio {path}: {source}")]
    OpenIntermediate { path: String, source: io::Error },

    #[error("error de lectura en {path}: {source}")]
    ReadIntermediate { path: String, source: io::Error },

    #[error("registro corrupto en {path} (línea {line}): {source}")]
    Corrupt {
        path: String,
        line: usize,
        source: serde_json::Error,
    },

    #[error("no se pudo crear la salida {path}: {source}")]
    CreateOutput { path: String, source: io::Error },

    #[error("error escribiendo {path}: {source}")]
    Write { path: String, source: io::Error },

    #[error("la tarea map {task} del job {job} no trae archivo de entrada")]
    MissingInput { job: String, task: usize },
}

impl TaskError {
    /// Un fallo pasajero (disco ocupado, timeout) se reintenta;
    /// el resto (archivo o directorio inexistente, datos corruptos) escala.
    pub fn is_transient(&self) -> bool {
        let source = match self {
            TaskError::ReadInput { source, .. }
            | TaskError::OpenIntermediate { source, .. }
            | TaskError::ReadIntermediate { source, .. }
            | TaskError::CreateOutput { source, .. }
            | TaskError::Write { source, .. } => source,
            TaskError::Corrupt { .. } | TaskError::MissingInput { .. } => return false,
        };

        matches!(
            source.kind(),
            io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        )
    }
}
