// master/src/state.rs

use chrono::{DateTime, Utc};
use mr_common::{
    JobId, JobInfo, JobStatus, MachineId, TaskDescriptor, TaskId, TaskRegistry, WorkerMetrics,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};
use tokio::sync::Notify;

use crate::config::LeaderSettings;

#[derive(Clone)]
pub struct AppState {
    /// Único punto de coordinación: todo heartbeat toma este lock para
    /// marcar, propagar y elegir tarea de una sola vez.
    pub registry: Arc<Mutex<TaskRegistry>>,
    pub job: Arc<Mutex<JobMeta>>,
    pub workers: Arc<Mutex<HashMap<MachineId, WorkerMeta>>>,
    /// Se dispara cuando la última máquina recibe EXIT
    pub done: Arc<Notify>,
    pub settings: LeaderSettings,
}

impl AppState {
    pub fn new(registry: TaskRegistry, settings: LeaderSettings) -> Self {
        let workers: HashMap<MachineId, WorkerMeta> = registry
            .machines()
            .iter()
            .map(|m| (*m, WorkerMeta::default()))
            .collect();
        let job = JobMeta {
            id: uuid::Uuid::new_v4().to_string(),
            work_dir: registry.layout().base_dir().to_string_lossy().to_string(),
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };

        Self {
            registry: Arc::new(Mutex::new(registry)),
            job: Arc::new(Mutex::new(job)),
            workers: Arc::new(Mutex::new(workers)),
            done: Arc::new(Notify::new()),
            settings,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobMeta {
    pub id: JobId,
    pub work_dir: String,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobMeta {
    pub fn info(&self, registry: &TaskRegistry) -> JobInfo {
        let status = if registry.is_completed() {
            JobStatus::Succeeded
        } else if self.started_at.is_some() {
            JobStatus::Running
        } else {
            JobStatus::Accepted
        };

        JobInfo {
            id: self.id.clone(),
            status,
            work_dir: self.work_dir.clone(),
            summary: registry.summary(),
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerMeta {
    pub last_heartbeat: Option<SystemTime>,
    /// Tarea entregada en el último heartbeat y aún no reportada
    pub current_task: Option<TaskId>,
    pub exited: bool,

    // Métricas
    pub tasks_assigned: u64,
    pub tasks_completed: u64,

    /// Última tarea por la que ya se avisó que el worker está trabado
    pub stall_reported_for: Option<TaskId>,
}

impl WorkerMeta {
    /// Registra un heartbeat ya aceptado por el registro.
    /// `newly_completed` cuenta sólo las tareas que este heartbeat pasó a COMPLETED.
    pub fn record(&mut self, newly_completed: usize, response: &TaskDescriptor, now: SystemTime) {
        self.last_heartbeat = Some(now);
        self.tasks_completed += newly_completed as u64;
        self.current_task = response.task_id();
        if self.current_task.is_some() {
            self.tasks_assigned += 1;
        }
        if matches!(response, TaskDescriptor::Exit) {
            self.exited = true;
        }
    }

    pub fn is_stalled(&self, now: SystemTime, timeout: Duration) -> bool {
        let (Some(_), Some(last)) = (self.current_task, self.last_heartbeat) else {
            return false;
        };
        now.duration_since(last)
            .map(|elapsed| elapsed > timeout)
            .unwrap_or(false)
    }

    pub fn metrics(&self, machine: MachineId, now: SystemTime, timeout: Duration) -> WorkerMetrics {
        WorkerMetrics {
            machine,
            last_heartbeat_secs_ago: self
                .last_heartbeat
                .map(|t| now.duration_since(t).unwrap_or_default().as_secs()),
            current_task: self.current_task,
            tasks_assigned: self.tasks_assigned,
            tasks_completed: self.tasks_completed,
            exited: self.exited,
            stalled: self.is_stalled(now, timeout),
        }
    }
}
