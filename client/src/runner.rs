use anyhow::{anyhow, Context, Result};
use mr_common::{
    merge::merge_partition_outputs, Application, Chunk, JobLayout, KeyValue, Task, TaskRegistry,
};
use mr_master::{serve, AppState, LeaderSettings};
use mr_worker::{WorkerReport, WorkerSettings};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Lo necesario para simular un job completo en un solo proceso.
pub struct LocalJob {
    pub chunks: Vec<Chunk>,
    pub num_reduce_partitions: u32,
    pub layout: JobLayout,
    pub app: Arc<dyn Application>,
    pub poll_interval: Duration,
}

#[derive(Debug)]
pub struct LocalOutcome {
    /// Contenido de `out.jsonl`
    pub results: Vec<KeyValue>,
    pub reports: Vec<WorkerReport>,
    /// Registro tal como quedó al terminar
    pub tasks: Vec<Task>,
}

/// Levanta el leader en un puerto libre y un worker por máquina, espera a que
/// todos reciban EXIT y une las salidas de las particiones.
pub async fn run_local(job: LocalJob) -> Result<LocalOutcome> {
    let LocalJob {
        chunks,
        num_reduce_partitions,
        layout,
        app,
        poll_interval,
    } = job;

    let registry = TaskRegistry::new(chunks, num_reduce_partitions, layout.clone())?;
    let machines: Vec<_> = registry.machines().iter().copied().collect();
    let state = AppState::new(registry, LeaderSettings::default());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let master_url = format!("http://{}", listener.local_addr()?);
    let leader = tokio::spawn(serve(listener, state.clone()));

    info!(
        "simulación local: {} máquinas, R={}, app={}",
        machines.len(),
        num_reduce_partitions,
        app.name()
    );

    let workers: Vec<_> = machines
        .iter()
        .map(|&machine| {
            let settings = WorkerSettings {
                machine,
                master_url: master_url.clone(),
                layout: layout.clone(),
                poll_interval,
                connect_retries: 10,
            };
            tokio::spawn(mr_worker::run(settings, app.clone()))
        })
        .collect();

    let mut reports = Vec::with_capacity(workers.len());
    for handle in workers {
        match handle.await.map_err(anyhow::Error::from).and_then(|r| r) {
            Ok(report) => reports.push(report),
            Err(e) => {
                // sin ese worker el leader no termina nunca
                warn!("un worker falló, se detiene el leader");
                leader.abort();
                return Err(e);
            }
        }
    }

    leader.await.context("el leader entró en pánico")??;

    let tasks = state
        .registry
        .lock()
        .map_err(|_| anyhow!("lock del registro envenenado"))?
        .tasks()
        .to_vec();

    let results = merge_partition_outputs(&layout, num_reduce_partitions)
        .context("no se pudieron unir las salidas de las particiones")?;
    info!(
        "job terminado: {} registros en {}",
        results.len(),
        layout.final_output_path()
    );

    Ok(LocalOutcome {
        results,
        reports,
        tasks,
    })
}
