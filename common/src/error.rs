use crate::task::{MachineId, TaskId};

/// Errores de configuración: se detectan al construir el job, nunca al planificar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobConfigError {
    /// Lista de chunks vacía
    NoChunks,
    /// R = 0
    ZeroPartitions,
    /// Chunk sin ruta
    EmptyChunkPath { machine: MachineId },
}

impl std::fmt::Display for JobConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobConfigError::NoChunks => write!(f, "el job necesita al menos un chunk de entrada"),
            JobConfigError::ZeroPartitions => {
                write!(f, "num_reduce_partitions tiene que ser al menos 1")
            }
            JobConfigError::EmptyChunkPath { machine } => {
                write!(f, "el chunk de la máquina {} tiene la ruta vacía", machine)
            }
        }
    }
}

impl std::error::Error for JobConfigError {}

/// Heartbeats que violan el protocolo. Se validan antes de tocar el registro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatError {
    /// La máquina no tiene ningún chunk asignado
    UnknownMachine(MachineId),
    UnknownTask(TaskId),
    /// Se reporta como terminada una tarea que nunca se entregó
    TaskNotInProgress(TaskId),
    /// La tarea se entregó a otra máquina
    WrongMachine {
        task: TaskId,
        expected: MachineId,
        actual: MachineId,
    },
}

impl HeartbeatError {
    /// Errores de estado (no de identificadores inválidos).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            HeartbeatError::TaskNotInProgress(_) | HeartbeatError::WrongMachine { .. }
        )
    }
}

impl std::fmt::Display for HeartbeatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeartbeatError::UnknownMachine(m) => {
                write!(f, "la máquina {} no tiene ningún chunk", m)
            }
            HeartbeatError::UnknownTask(id) => write!(f, "la tarea {} no existe", id),
            HeartbeatError::TaskNotInProgress(id) => {
                write!(f, "la tarea {} se reportó terminada pero no está en progreso", id)
            }
            HeartbeatError::WrongMachine {
                task,
                expected,
                actual,
            } => write!(
                f,
                "la tarea {} es de la máquina {}, la reportó la máquina {}",
                task, expected, actual
            ),
        }
    }
}

impl std::error::Error for HeartbeatError {}
