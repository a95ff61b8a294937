use serde::{Deserialize, Serialize};
use std::fmt;

/// Fase de un job: map o reduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobPhase {
    #[serde(rename = "mapPhase")]
    Map,
    #[serde(rename = "reducePhase")]
    Reduce,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::Map => write!(f, "mapPhase"),
            JobPhase::Reduce => write!(f, "reducePhase"),
        }
    }
}

/// Descriptor inmutable de una tarea, tal como viaja al worker en `Worker.DoTask`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskDescriptor {
    pub job_name: String,
    pub phase: JobPhase,
    pub task_number: usize,

    /// Archivo de entrada (sólo en la fase map)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Cantidad de tareas de la *otra* fase:
    /// nReduce para una tarea map, nMap para una tarea reduce.
    pub num_other_phase: usize,
}

impl TaskDescriptor {
    pub fn map(job_name: &str, task_number: usize, file: &str, n_reduce: usize) -> Self {
        Self {
            job_name: job_name.to_string(),
            phase: JobPhase::Map,
            task_number,
            file: Some(file.to_string()),
            num_other_phase: n_reduce,
        }
    }

    pub fn reduce(job_name: &str, task_number: usize, n_map: usize) -> Self {
        Self {
            job_name: job_name.to_string(),
            phase: JobPhase::Reduce,
            task_number,
            file: None,
            num_other_phase: n_map,
        }
    }
}

/// Respuesta del worker a `Worker.DoTask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoTaskReply {
    pub ok: bool,
    /// Sólo tiene sentido si `ok == false`: el fallo parece pasajero
    /// y la tarea puede reintentarse.
    #[serde(default)]
    pub retryable: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl DoTaskReply {
    pub fn done() -> Self {
        Self {
            ok: true,
            retryable: false,
            error: None,
        }
    }

    pub fn failed(error: String, retryable: bool) -> Self {
        Self {
            ok: false,
            retryable,
            error: Some(error),
        }
    }
}
