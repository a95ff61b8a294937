use std::time::Duration;

use async_trait::async_trait;
use common::{DoTaskReply, TaskDescriptor};
use reqwest::Client;
use tracing::debug;

/// Resultado de una llamada RPC a un worker. Nunca es un error de Rust:
/// el scheduler decide qué hacer con cada caso.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcOutcome {
    Succeeded,
    /// No hubo respuesta válida: el worker se da por muerto
    Unreachable(String),
    /// El worker respondió pero la tarea falló de forma pasajera
    Retryable(String),
    /// Falla sistémica (directorio inexistente, datos corruptos, ...)
    Fatal(String),
}

impl RpcOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RpcOutcome::Succeeded)
    }
}

/// Capacidad de invocar un método remoto en un worker.
/// Tiene que poder usarse en paralelo desde muchas tareas.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn call(&self, worker: &str, method: &str, args: &TaskDescriptor) -> RpcOutcome;
}

/// Cliente RPC sobre HTTP + JSON: `POST http://<worker>/rpc/<method>`.
#[derive(Clone)]
pub struct HttpRpcClient {
    client: Client,
}

impl HttpRpcClient {
    /// `timeout`: límite por llamada; `None` espera indefinidamente.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

pub fn rpc_url(worker: &str, method: &str) -> String {
    if worker.starts_with("http://") || worker.starts_with("https://") {
        format!("{}/rpc/{}", worker.trim_end_matches('/'), method)
    } else {
        format!("http://{}/rpc/{}", worker, method)
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn call(&self, worker: &str, method: &str, args: &TaskDescriptor) -> RpcOutcome {
        let url = rpc_url(worker, method);
        debug!("RPC {} -> {}", method, url);

        let resp = match self.client.post(&url).json(args).send().await {
            Ok(r) => r,
            Err(e) => return RpcOutcome::Unreachable(e.to_string()),
        };

        if !resp.status().is_success() {
            let status = resp.status();
            return RpcOutcome::Unreachable(format!("{} devolvió status {}", worker, status));
        }

        match resp.json::<DoTaskReply>().await {
            Ok(reply) if reply.ok => RpcOutcome::Succeeded,
            Ok(reply) => {
                let reason = reply.error.unwrap_or_else(|| "sin detalle".to_string());
                if reply.retryable {
                    RpcOutcome::Retryable(reason)
                } else {
                    RpcOutcome::Fatal(reason)
                }
            }
            Err(e) => RpcOutcome::Unreachable(format!("respuesta inválida de {}: {}", worker, e)),
        }
    }
}
