use anyhow::{bail, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use common::{
    apps::{app_by_name, App},
    execute, CorruptionPolicy, DoTaskReply, TaskDescriptor, WorkerRegisterRequest,
    WorkerRegisterResponse, DO_TASK_METHOD,
};
use reqwest::Client;
use std::{
    env,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{info, warn};

const DEFAULT_WORKER_BIND: &str = "0.0.0.0:7070";
const DEFAULT_WORK_DIR: &str = "/data/tmp";
const REGISTER_ATTEMPTS: u32 = 10;

/// Obtiene la URL base del master.
/// - En Docker usaremos: MASTER_URL=http://master:8080
/// - Si no está definida, usa http://localhost:8080 (para pruebas locales)
pub fn master_base_url() -> String {
    env::var("MASTER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub bind: String,
    /// Dirección con la que el master nos llama (WORKER_ADDR)
    pub advertise: String,
    pub work_dir: String,
    pub app: String,
    pub policy: CorruptionPolicy,
    /// Después de tantas tareas el worker deja de responder (prueba de fallas)
    pub max_tasks: Option<usize>,
}

fn port_of(bind: &str) -> &str {
    bind.rsplit(':').next().unwrap_or("7070")
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let bind = env::var("WORKER_BIND").unwrap_or_else(|_| DEFAULT_WORKER_BIND.to_string());

        let advertise = env::var("WORKER_ADDR").unwrap_or_else(|_| {
            let host = hostname::get()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            format!("{}:{}", host, port_of(&bind))
        });

        let policy = match env::var("CORRUPT_POLICY") {
            Ok(s) => s.parse().unwrap_or_else(|e| {
                warn!("{}; se usa abort", e);
                CorruptionPolicy::AbortTask
            }),
            Err(_) => CorruptionPolicy::default(),
        };

        Self {
            bind,
            advertise,
            work_dir: env::var("WORK_DIR").unwrap_or_else(|_| DEFAULT_WORK_DIR.to_string()),
            app: env::var("MR_APP").unwrap_or_else(|_| "wordcount".to_string()),
            policy,
            max_tasks: env::var("WORKER_MAX_TASKS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok()),
        }
    }
}

#[derive(Clone)]
pub struct WorkerState {
    pub work_dir: String,
    pub app: App,
    pub policy: CorruptionPolicy,
    pub max_tasks: Option<usize>,
    // una tarea a la vez
    slot: Arc<Semaphore>,
    served: Arc<AtomicUsize>,
}

impl WorkerState {
    pub fn new(config: &WorkerConfig) -> Result<Self> {
        let Some(app) = app_by_name(&config.app) else {
            bail!("aplicación desconocida: {}", config.app);
        };
        Ok(Self {
            work_dir: config.work_dir.clone(),
            app,
            policy: config.policy,
            max_tasks: config.max_tasks,
            slot: Arc::new(Semaphore::new(1)),
            served: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn served(&self) -> usize {
        self.served.load(Ordering::Relaxed)
    }
}

pub fn build_router(state: WorkerState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/rpc/:method", post(rpc))
        .with_state(state)
}

/* ---------------- RPC ---------------- */

async fn rpc(
    State(state): State<WorkerState>,
    Path(method): Path<String>,
    Json(task): Json<TaskDescriptor>,
) -> Result<Json<DoTaskReply>, StatusCode> {
    if method != DO_TASK_METHOD {
        warn!("método RPC desconocido: {}", method);
        return Err(StatusCode::NOT_FOUND);
    }

    if let Some(max) = state.max_tasks {
        if state.served() >= max {
            // simulamos un worker caído
            warn!("límite de {} tareas alcanzado, no respondo {}", max, task.task_number);
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    let Ok(permit) = state.slot.clone().try_acquire_owned() else {
        warn!(
            "{} tarea {} rechazada: ya hay una en curso",
            task.phase, task.task_number
        );
        return Ok(Json(DoTaskReply::failed("worker ocupado".into(), true)));
    };
    state.served.fetch_add(1, Ordering::Relaxed);

    info!(
        "tengo {} tarea {} del job {}",
        task.phase, task.task_number, task.job_name
    );

    let work_dir = state.work_dir.clone();
    let app = state.app;
    let policy = state.policy;
    let t = task.clone();
    let handle = tokio::task::spawn_blocking(move || execute(&t, &work_dir, app, policy));

    let reply = match handle.await {
        Ok(Ok(())) => {
            info!("terminé {} tarea {} correctamente", task.phase, task.task_number);
            DoTaskReply::done()
        }
        Ok(Err(e)) => {
            warn!("error en {} tarea {}: {}", task.phase, task.task_number, e);
            DoTaskReply::failed(e.to_string(), e.is_transient())
        }
        Err(e) => {
            warn!("panic o join error en tarea {}: {:?}", task.task_number, e);
            drop(permit);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    drop(permit);
    Ok(Json(reply))
}

/* ---------------- registro ---------------- */

/// Se anuncia al master. Reintenta un rato por si el master todavía no levantó.
pub async fn register(
    client: &Client,
    base_url: &str,
    address: &str,
) -> Result<WorkerRegisterResponse> {
    let url = format!("{}/api/v1/workers/register", base_url);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let res = client
            .post(&url)
            .json(&WorkerRegisterRequest {
                address: address.to_string(),
            })
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match res {
            Ok(resp) => return Ok(resp.json().await?),
            Err(e) if attempt < REGISTER_ATTEMPTS => {
                warn!("registro falló (intento {}): {}", attempt, e);
                sleep(Duration::from_secs(1)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
