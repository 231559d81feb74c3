use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// Archivos de salida de un job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResults {
    pub job_id: JobId,
    /// Un archivo por partición de reduce, en orden de partición
    pub partition_outputs: Vec<String>,
    /// Salida unida y ordenada (la escribe el cliente con `merge`)
    pub final_output: String,
}
