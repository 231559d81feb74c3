use std::path::{Path, PathBuf};

use crate::task::{PartitionId, TaskId};

/// Nombres de archivo del job. Cualquier proceso puede recalcularlos
/// sin coordinación a partir del directorio de trabajo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    base_dir: PathBuf,
}

impl JobLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<base>/<map_task_id>-<partition>.jsonl`
    pub fn intermediate_path(&self, map_task_id: TaskId, partition: PartitionId) -> String {
        self.base_dir
            .join(format!("{}-{}.jsonl", map_task_id, partition))
            .to_string_lossy()
            .to_string()
    }

    /// `<base>/out_<partition>.jsonl`
    pub fn partition_output_path(&self, partition: PartitionId) -> String {
        self.base_dir
            .join(format!("out_{}.jsonl", partition))
            .to_string_lossy()
            .to_string()
    }

    /// `<base>/out.jsonl`
    pub fn final_output_path(&self) -> String {
        self.base_dir.join("out.jsonl").to_string_lossy().to_string()
    }
}
