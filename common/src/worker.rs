use serde::{Deserialize, Serialize};

use crate::task::{MachineId, TaskId};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkerMetrics {
    pub machine: MachineId,
    /// None si la máquina nunca mandó heartbeat
    pub last_heartbeat_secs_ago: Option<u64>,
    /// Tarea entregada y todavía no reportada
    pub current_task: Option<TaskId>,
    pub tasks_assigned: u64,
    pub tasks_completed: u64,
    pub exited: bool,
    /// Tiene tarea y no manda heartbeat hace más del timeout
    pub stalled: bool,
}
