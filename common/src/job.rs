use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::RegistrySummary;

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Registro creado, ningún heartbeat todavía
    Accepted,
    Running,
    /// Todas las tareas terminadas y todos los workers recibieron EXIT
    Succeeded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub status: JobStatus,
    pub work_dir: String,

    /// Conteos por fase y por estado
    pub summary: RegistrySummary,

    /// -------- Métricas del job --------
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobInfo {
    /// Fracción de tareas terminadas, entre 0 y 1.
    pub fn progress(&self) -> f64 {
        let s = &self.summary;
        let total = s.map.total() + s.reduce_read.total() + s.reduce_group.total();
        if total == 0 {
            return 1.0;
        }
        let done = s.map.completed + s.reduce_read.completed + s.reduce_group.completed;
        done as f64 / total as f64
    }
}
