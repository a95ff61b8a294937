use serde::{Deserialize, Serialize};

/// Dirección RPC de un worker (`host:port`). También sirve de identificador.
pub type WorkerAddr = String;

/// Método RPC que ejecuta una tarea en el worker.
pub const DO_TASK_METHOD: &str = "Worker.DoTask";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegisterRequest {
    pub address: WorkerAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegisterResponse {
    pub ok: bool,
    /// Cantidad de registros recibidos por el master hasta ahora
    pub registrations: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkerInfo {
    pub address: WorkerAddr,
    /// Veces que se registró (un worker puede volver a anunciarse)
    pub registrations: u32,
    pub registered_secs_ago: u64,
}
