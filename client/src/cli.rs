use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand};
use mr_common::{
    app, merge::merge_partition_outputs, records, Chunk, JobInfo, JobLayout, KeyValue, Task,
    TaskKind, WorkerMetrics,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::runner::{run_local, LocalJob};

#[derive(Parser)]
#[command(name = "mr-client")]
#[command(about = "CLI para correr y consultar jobs MapReduce")]
pub struct Cli {
    /// URL base del leader. En Docker: http://master:8080
    #[arg(long, global = true, env = "MASTER_URL", default_value = "http://localhost:8080")]
    master_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simula un job completo en este proceso: leader y un worker por máquina
    Run(RunArgs),
    /// Estado del job del leader
    Status,
    /// Lista las tareas del registro
    Tasks,
    /// Métricas de los workers
    Workers,
    /// Une out_<p>.jsonl en out.jsonl ordenado por clave
    Merge {
        #[arg(long, env = "MR_WORK_DIR", default_value = "tmp")]
        work_dir: String,

        #[arg(short = 'r', long, env = "MR_PARTITIONS", default_value_t = 4)]
        partitions: u32,
    },
}

#[derive(Args)]
struct RunArgs {
    /// JSON con la lista de chunks `[{"path": .., "machine": ..}]`
    #[arg(long, conflicts_with = "input_glob")]
    chunks: Option<String>,

    /// Patrón de archivos de entrada, ej: "tmp/split_*"
    #[arg(long)]
    input_glob: Option<String>,

    #[arg(long, default_value_t = 2)]
    machines: u32,

    #[arg(short = 'r', long, default_value_t = 4)]
    partitions: u32,

    #[arg(long, default_value = "tmp")]
    work_dir: String,

    #[arg(long, default_value = "wordcount")]
    app: String,

    #[arg(long, default_value_t = 200)]
    poll_interval_ms: u64,

    /// Cuántos registros del resultado imprimir
    #[arg(long, default_value_t = 20)]
    show: usize,
}

impl RunArgs {
    fn load_chunks(&self) -> Result<Vec<Chunk>> {
        match (&self.chunks, &self.input_glob) {
            (Some(path), _) => Ok(records::load_chunks(path)?),
            (None, Some(pattern)) => records::chunks_from_glob(pattern, self.machines),
            (None, None) => bail!("hace falta --chunks o --input-glob"),
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = cli.master_url.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Run(args) => {
            let application = app::by_name(&args.app).ok_or_else(|| {
                anyhow!(
                    "aplicación desconocida '{}' (disponibles: {})",
                    args.app,
                    app::APP_NAMES.join(", ")
                )
            })?;
            let layout = JobLayout::new(&args.work_dir);

            let outcome = run_local(LocalJob {
                chunks: args.load_chunks()?,
                num_reduce_partitions: args.partitions,
                layout: layout.clone(),
                app: application,
                poll_interval: Duration::from_millis(args.poll_interval_ms),
            })
            .await?;

            println!("Job terminado:");
            for report in &outcome.reports {
                println!(
                    "  máquina {}: {} tareas, {} heartbeats",
                    report.machine, report.tasks_executed, report.heartbeats
                );
            }
            println!("  salida: {}", layout.final_output_path());
            print_pairs(&outcome.results, args.show)?;
        }
        Commands::Status => {
            let job: JobInfo = get_json(&client, &format!("{}/api/v1/job", base_url)).await?;
            println!("Job:");
            println!("  id: {}", job.id);
            println!("  estado: {:?}", job.status);
            println!("  directorio: {}", job.work_dir);
            println!("  progreso: {:.0}%", job.progress() * 100.0);
            println!(
                "  map: {}/{}  reduce_read: {}/{}  reduce_group: {}/{}",
                job.summary.map.completed,
                job.summary.map.total(),
                job.summary.reduce_read.completed,
                job.summary.reduce_read.total(),
                job.summary.reduce_group.completed,
                job.summary.reduce_group.total()
            );
            println!(
                "  workers con EXIT: {}/{}",
                job.summary.workers_exited, job.summary.workers
            );
            if let Some(started) = job.started_at {
                println!("  inicio: {}", started);
            }
            if let Some(finished) = job.finished_at {
                println!("  fin: {}", finished);
            }
        }
        Commands::Tasks => {
            let tasks: Vec<Task> = get_json(&client, &format!("{}/api/v1/tasks", base_url)).await?;
            for task in &tasks {
                println!(
                    "{:>4}  {:<12} {:<12} {}",
                    task.id,
                    kind_label(&task.kind),
                    format!("{:?}", task.status),
                    task.assigned_to
                        .map(|m| format!("máquina {}", m))
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        Commands::Workers => {
            let workers: Vec<WorkerMetrics> =
                get_json(&client, &format!("{}/api/v1/workers", base_url)).await?;
            if workers.is_empty() {
                println!("No hay workers en el job");
            }
            for w in workers {
                println!(
                    "máquina {}: asignadas={} completadas={} tarea={:?} \
                     último_hb={:?}s exit={} trabado={}",
                    w.machine,
                    w.tasks_assigned,
                    w.tasks_completed,
                    w.current_task,
                    w.last_heartbeat_secs_ago,
                    w.exited,
                    w.stalled
                );
            }
        }
        Commands::Merge {
            work_dir,
            partitions,
        } => {
            let layout = JobLayout::new(&work_dir);
            let merged = merge_partition_outputs(&layout, partitions)?;
            println!(
                "{} registros escritos en {}",
                merged.len(),
                layout.final_output_path()
            );
        }
    }

    Ok(())
}

async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        bail!("el leader devolvió {} para {}", resp.status(), url);
    }
    Ok(resp.json().await?)
}

fn kind_label(kind: &TaskKind) -> String {
    match kind {
        TaskKind::Map { .. } => "MAP".to_string(),
        TaskKind::ReduceRead { partition, .. } => format!("READ[{}]", partition),
        TaskKind::ReduceGroup { partition, .. } => format!("GROUP[{}]", partition),
    }
}

fn print_pairs(pairs: &[KeyValue], limit: usize) -> Result<()> {
    for pair in pairs.iter().take(limit) {
        println!("  {}", serde_json::to_string(pair)?);
    }
    if pairs.len() > limit {
        println!("  ... ({} más)", pairs.len() - limit);
    }
    Ok(())
}
