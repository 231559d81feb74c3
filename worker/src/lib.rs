pub mod worker;

use clap::Parser;
use mr_common::{JobLayout, MachineId};
use std::time::Duration;

pub use worker::{run, WorkerReport};

/// Opciones del worker. Cada una se puede pasar también por variable de entorno.
#[derive(Parser, Debug, Clone)]
#[command(name = "mr-worker")]
#[command(about = "Worker MapReduce: pide tareas al leader por heartbeat y las ejecuta")]
pub struct WorkerArgs {
    /// Id de la máquina que simula este worker
    #[arg(long, env = "MR_MACHINE")]
    pub machine: MachineId,

    /// URL base del leader. En Docker: http://master:8080
    #[arg(long, env = "MASTER_URL", default_value = "http://localhost:8080")]
    pub master_url: String,

    /// Aplicación a ejecutar (wordcount, wordcount-nocombine, topk)
    #[arg(long, env = "MR_APP", default_value = "wordcount")]
    pub app: String,

    /// Directorio de archivos intermedios y de salida (el mismo que el leader)
    #[arg(long, env = "MR_WORK_DIR", default_value = "tmp")]
    pub work_dir: String,

    /// Milisegundos entre heartbeats cuando el leader responde SLEEP
    #[arg(long, env = "MR_POLL_INTERVAL_MS", default_value_t = 2000)]
    pub poll_interval_ms: u64,

    /// Reintentos si el leader todavía no escucha al arrancar
    #[arg(long, env = "MR_CONNECT_RETRIES", default_value_t = 10)]
    pub connect_retries: u32,
}

impl WorkerArgs {
    pub fn settings(&self) -> WorkerSettings {
        WorkerSettings {
            machine: self.machine,
            master_url: self.master_url.trim_end_matches('/').to_string(),
            layout: JobLayout::new(&self.work_dir),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            connect_retries: self.connect_retries,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub machine: MachineId,
    pub master_url: String,
    pub layout: JobLayout,
    pub poll_interval: Duration,
    pub connect_retries: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_y_url_sin_barra_final() {
        let args = WorkerArgs::try_parse_from([
            "mr-worker",
            "--machine",
            "3",
            "--master-url",
            "http://leader:8080/",
        ])
        .unwrap();

        assert_eq!(args.app, "wordcount");
        let settings = args.settings();
        assert_eq!(settings.machine, 3);
        assert_eq!(settings.master_url, "http://leader:8080");
        assert_eq!(settings.poll_interval, Duration::from_millis(2000));
        assert_eq!(settings.connect_retries, 10);
    }

    #[test]
    fn machine_es_obligatorio() {
        assert!(WorkerArgs::try_parse_from(["mr-worker"]).is_err());
    }
}
