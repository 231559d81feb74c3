use serde::{Deserialize, Serialize};

pub type TaskId = u32;
pub type MachineId = u32;
pub type PartitionId = u32;

/// Trozo de entrada asignado a una máquina antes de arrancar el job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Ruta del archivo en el disco local de la máquina
    pub path: String,
    pub machine: MachineId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Idle,
    InProgress,
    Completed,
}

/// Parte específica de cada tipo de tarea.
///
/// Los campos que se resuelven más tarde (`input_file`, `machine`) son `Option`:
/// `None` significa "todavía no disponible".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Map {
        chunk: Chunk,
        num_reduce_partitions: u32,
    },
    ReduceRead {
        map_task_id: TaskId,
        partition: PartitionId,
        /// Se llena cuando termina la tarea MAP productora
        input_file: Option<String>,
        /// Se fija cuando alguien reclama la partición
        machine: Option<MachineId>,
    },
    ReduceGroup {
        partition: PartitionId,
        machine: Option<MachineId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Máquina a la que se entregó la tarea (si ya se entregó)
    pub assigned_to: Option<MachineId>,
    #[serde(flatten)]
    pub kind: TaskKind,
}

impl Task {
    pub fn new(id: TaskId, kind: TaskKind) -> Self {
        Self {
            id,
            status: TaskStatus::Idle,
            assigned_to: None,
            kind,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Descriptor que viaja al worker. Sólo se llama sobre tareas ya elegibles,
    /// así que `input_file` y `machine` están resueltos.
    pub fn descriptor(&self, caller: MachineId) -> TaskDescriptor {
        match &self.kind {
            TaskKind::Map {
                chunk,
                num_reduce_partitions,
            } => TaskDescriptor::Map {
                id: self.id,
                status: self.status,
                chunk: chunk.clone(),
                num_reduce_partitions: *num_reduce_partitions,
            },
            TaskKind::ReduceRead {
                map_task_id,
                partition,
                input_file,
                machine,
            } => TaskDescriptor::ReduceRead {
                id: self.id,
                status: self.status,
                map_task_id: *map_task_id,
                partition: *partition,
                input_file: input_file.clone().unwrap_or_default(),
                machine: machine.unwrap_or(caller),
            },
            TaskKind::ReduceGroup { partition, machine } => TaskDescriptor::ReduceGroup {
                id: self.id,
                status: self.status,
                partition: *partition,
                machine: machine.unwrap_or(caller),
            },
        }
    }
}

/* --------- Protocolo de heartbeat --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub machine: MachineId,
    /// Tareas terminadas desde el heartbeat anterior
    #[serde(default)]
    pub completed_task_ids: Vec<TaskId>,
}

/// Respuesta del leader: una tarea, o SLEEP / EXIT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskDescriptor {
    Map {
        id: TaskId,
        status: TaskStatus,
        chunk: Chunk,
        num_reduce_partitions: u32,
    },
    ReduceRead {
        id: TaskId,
        status: TaskStatus,
        map_task_id: TaskId,
        partition: PartitionId,
        input_file: String,
        machine: MachineId,
    },
    ReduceGroup {
        id: TaskId,
        status: TaskStatus,
        partition: PartitionId,
        machine: MachineId,
    },
    Sleep,
    Exit,
}

impl TaskDescriptor {
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            TaskDescriptor::Map { id, .. }
            | TaskDescriptor::ReduceRead { id, .. }
            | TaskDescriptor::ReduceGroup { id, .. } => Some(*id),
            TaskDescriptor::Sleep | TaskDescriptor::Exit => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            TaskDescriptor::Map { .. } => "MAP",
            TaskDescriptor::ReduceRead { .. } => "REDUCE_READ",
            TaskDescriptor::ReduceGroup { .. } => "REDUCE_GROUP",
            TaskDescriptor::Sleep => "SLEEP",
            TaskDescriptor::Exit => "EXIT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_map_se_serializa_con_tag_type() {
        let task = Task::new(
            0,
            TaskKind::Map {
                chunk: Chunk {
                    path: "in/a.txt".to_string(),
                    machine: 1,
                },
                num_reduce_partitions: 2,
            },
        );

        let v = serde_json::to_value(task.descriptor(1)).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "MAP",
                "id": 0,
                "status": "IDLE",
                "chunk": {"path": "in/a.txt", "machine": 1},
                "num_reduce_partitions": 2,
            })
        );
    }

    #[test]
    fn sleep_y_exit_son_solo_el_tag() {
        assert_eq!(
            serde_json::to_value(TaskDescriptor::Sleep).unwrap(),
            json!({"type": "SLEEP"})
        );
        let exit: TaskDescriptor = serde_json::from_value(json!({"type": "EXIT"})).unwrap();
        assert_eq!(exit, TaskDescriptor::Exit);
        assert_eq!(exit.task_id(), None);
    }

    #[test]
    fn reduce_read_resuelto_viaja_sin_options() {
        let task = Task::new(
            1,
            TaskKind::ReduceRead {
                map_task_id: 0,
                partition: 3,
                input_file: Some("tmp/0-3.jsonl".to_string()),
                machine: Some(7),
            },
        );

        let v = serde_json::to_value(task.descriptor(7)).unwrap();
        assert_eq!(v["type"], json!("REDUCE_READ"));
        assert_eq!(v["input_file"], json!("tmp/0-3.jsonl"));
        assert_eq!(v["machine"], json!(7));
    }

    #[test]
    fn heartbeat_request_sin_completadas_usa_lista_vacia() {
        let req: HeartbeatRequest = serde_json::from_value(json!({"machine": 2})).unwrap();
        assert_eq!(req.machine, 2);
        assert!(req.completed_task_ids.is_empty());
    }
}
