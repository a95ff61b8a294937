use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use common::{WorkerInfo, WorkerRegisterRequest, WorkerRegisterResponse};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/workers", get(list_workers))
        .route("/api/v1/workers/register", post(register_worker))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// Un worker se anuncia; su dirección pasa a los pools de las fases en curso
async fn register_worker(
    State(state): State<AppState>,
    Json(req): Json<WorkerRegisterRequest>,
) -> Result<Json<WorkerRegisterResponse>, StatusCode> {
    let address = req.address.trim().to_string();
    if address.is_empty() {
        warn!("registro de worker sin dirección");
        return Err(StatusCode::BAD_REQUEST);
    }

    let registrations = state.registry.register(address);
    Ok(Json(WorkerRegisterResponse {
        ok: true,
        registrations,
    }))
}

async fn list_workers(State(state): State<AppState>) -> Json<Vec<WorkerInfo>> {
    Json(state.registry.list())
}
