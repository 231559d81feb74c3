use anyhow::{bail, Context, Result};
use clap::Parser;
use mr_common::{records, Chunk, JobLayout, TaskRegistry};
use std::time::Duration;

use crate::{MONITOR_INTERVAL, WORKER_STALL_TIMEOUT};

/// Opciones del leader. Cada una se puede pasar también por variable de entorno.
#[derive(Parser, Debug, Clone)]
#[command(name = "mr-master")]
#[command(about = "Leader MapReduce: reparte tareas a los workers vía heartbeat")]
pub struct MasterArgs {
    /// Dirección donde escucha el leader
    #[arg(long, env = "MR_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// JSON con la lista de chunks `[{"path": .., "machine": ..}]`
    #[arg(long, env = "MR_CHUNKS", conflicts_with = "input_glob")]
    pub chunks: Option<String>,

    /// Patrón de archivos de entrada, ej: "tmp/split_*"
    #[arg(long, env = "MR_INPUT_GLOB")]
    pub input_glob: Option<String>,

    /// Máquinas entre las que se reparten los archivos de `--input-glob`
    #[arg(long, env = "MR_MACHINES", default_value_t = 2)]
    pub machines: u32,

    /// Número de particiones de reduce (R)
    #[arg(short = 'r', long, env = "MR_PARTITIONS", default_value_t = 4)]
    pub partitions: u32,

    /// Directorio de archivos intermedios y de salida
    #[arg(long, env = "MR_WORK_DIR", default_value = "tmp")]
    pub work_dir: String,

    /// Segundos sin heartbeat (con tarea asignada) antes de avisar
    #[arg(long, env = "MR_STALL_TIMEOUT_SECS", default_value_t = WORKER_STALL_TIMEOUT.as_secs())]
    pub stall_timeout_secs: u64,
}

impl MasterArgs {
    pub fn load_chunks(&self) -> Result<Vec<Chunk>> {
        match (&self.chunks, &self.input_glob) {
            (Some(path), _) => records::load_chunks(path)
                .with_context(|| format!("no se pudo leer la lista de chunks {}", path)),
            (None, Some(pattern)) => records::chunks_from_glob(pattern, self.machines),
            (None, None) => bail!("hace falta --chunks o --input-glob"),
        }
    }

    /// Construye el registro; los errores de configuración salen aquí.
    pub fn build_registry(&self) -> Result<TaskRegistry> {
        let chunks = self.load_chunks()?;
        let registry = TaskRegistry::new(chunks, self.partitions, JobLayout::new(&self.work_dir))?;
        Ok(registry)
    }

    pub fn settings(&self) -> LeaderSettings {
        LeaderSettings {
            stall_timeout: Duration::from_secs(self.stall_timeout_secs),
            ..LeaderSettings::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LeaderSettings {
    pub stall_timeout: Duration,
    pub monitor_interval: Duration,
}

impl Default for LeaderSettings {
    fn default() -> Self {
        Self {
            stall_timeout: WORKER_STALL_TIMEOUT,
            monitor_interval: MONITOR_INTERVAL,
        }
    }
}
