use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use mr_common::{
    HeartbeatError, HeartbeatRequest, JobInfo, JobResults, Task, TaskDescriptor, WorkerMetrics,
};
use std::time::SystemTime;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::state::AppState;

type ApiError = (StatusCode, String);

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/heartbeat", post(heartbeat))
        .route("/api/v1/job", get(get_job))
        .route("/api/v1/job/results", get(get_job_results))
        .route("/api/v1/tasks", get(list_tasks))
        .route("/api/v1/workers", get(list_workers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn lock_error(what: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("lock {} envenenado", what),
    )
}

fn heartbeat_error(e: HeartbeatError) -> ApiError {
    let code = if e.is_conflict() {
        StatusCode::CONFLICT
    } else {
        StatusCode::BAD_REQUEST
    };
    (code, e.to_string())
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// Heartbeat de worker: marca completadas y devuelve la siguiente tarea
async fn heartbeat(
    State(state): State<AppState>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<TaskDescriptor>, ApiError> {
    // 1) Sección crítica: marcar, propagar y elegir bajo el mismo lock
    let (task, newly_completed, job_done) = {
        let mut registry = state.registry.lock().map_err(|_| lock_error("registry"))?;
        let newly_completed = registry.newly_completed(&req.completed_task_ids);
        match registry.heartbeat(req.machine, &req.completed_task_ids) {
            Ok(task) => (task, newly_completed, registry.is_completed()),
            Err(e) => {
                warn!("heartbeat rechazado de máquina {}: {}", req.machine, e);
                return Err(heartbeat_error(e));
            }
        }
    };

    // 2) Métricas del worker
    {
        let mut workers = state.workers.lock().map_err(|_| lock_error("workers"))?;
        if let Some(meta) = workers.get_mut(&req.machine) {
            meta.record(newly_completed, &task, SystemTime::now());
        }
    }

    // 3) Tiempos del job
    {
        let mut job = state.job.lock().map_err(|_| lock_error("job"))?;
        if job.started_at.is_none() {
            job.started_at = Some(Utc::now());
        }
        if job_done && job.finished_at.is_none() {
            job.finished_at = Some(Utc::now());
        }
    }

    match task.task_id() {
        Some(id) => info!(
            "máquina {} -> {} {} (completadas: {:?})",
            req.machine,
            task.kind_name(),
            id,
            req.completed_task_ids
        ),
        None => debug!(
            "máquina {} -> {} (completadas: {:?})",
            req.machine,
            task.kind_name(),
            req.completed_task_ids
        ),
    }

    if job_done {
        info!("todas las máquinas recibieron EXIT, apagando el leader");
        state.done.notify_one();
    }

    Ok(Json(task))
}

// Estado del job con conteos por fase
async fn get_job(State(state): State<AppState>) -> Result<Json<JobInfo>, ApiError> {
    let registry = state.registry.lock().map_err(|_| lock_error("registry"))?;
    let job = state.job.lock().map_err(|_| lock_error("job"))?;
    Ok(Json(job.info(&registry)))
}

// Archivos de salida del job (existan o no todavía)
async fn get_job_results(State(state): State<AppState>) -> Result<Json<JobResults>, ApiError> {
    let (layout, partitions) = {
        let registry = state.registry.lock().map_err(|_| lock_error("registry"))?;
        (registry.layout().clone(), registry.num_reduce_partitions())
    };
    let job_id = state.job.lock().map_err(|_| lock_error("job"))?.id.clone();

    Ok(Json(JobResults {
        job_id,
        partition_outputs: (0..partitions)
            .map(|p| layout.partition_output_path(p))
            .collect(),
        final_output: layout.final_output_path(),
    }))
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiError> {
    let registry = state.registry.lock().map_err(|_| lock_error("registry"))?;
    Ok(Json(registry.tasks().to_vec()))
}

async fn list_workers(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkerMetrics>>, ApiError> {
    let now = SystemTime::now();
    let timeout = state.settings.stall_timeout;

    let workers = state.workers.lock().map_err(|_| lock_error("workers"))?;
    let mut out: Vec<WorkerMetrics> = workers
        .iter()
        .map(|(machine, meta)| meta.metrics(*machine, now, timeout))
        .collect();
    out.sort_by_key(|w| w.machine);

    Ok(Json(out))
}
