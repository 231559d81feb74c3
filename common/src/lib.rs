pub mod app;
pub mod engine;
pub mod error;
pub mod job;
pub mod layout;
pub mod merge;
pub mod partition;
pub mod records;
pub mod registry;
pub mod results;
pub mod task;
pub mod wordcount;
pub mod worker;

pub use app::Application;
pub use engine::Engine;
pub use error::{HeartbeatError, JobConfigError};
pub use job::{JobId, JobInfo, JobStatus};
pub use layout::JobLayout;
pub use records::KeyValue;
pub use registry::{PhaseCounts, RegistrySummary, TaskRegistry};
pub use results::JobResults;
pub use task::{
    Chunk, HeartbeatRequest, MachineId, PartitionId, Task, TaskDescriptor, TaskId, TaskKind,
    TaskStatus,
};
pub use worker::WorkerMetrics;
