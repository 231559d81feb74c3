use anyhow::{Context, Result};
use mr_common::{Application, Engine, HeartbeatRequest, MachineId, TaskDescriptor, TaskId};
use reqwest::Client;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::WorkerSettings;

/// Resumen de lo que hizo un worker hasta recibir EXIT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub machine: MachineId,
    pub tasks_executed: u32,
    pub heartbeats: u32,
}

/// Loop principal del worker.
/// - Manda un heartbeat con las tareas terminadas desde el anterior.
/// - SLEEP: espera `poll_interval` y vuelve a preguntar.
/// - EXIT: termina.
/// - Cualquier otra cosa: la ejecuta y la reporta en el próximo heartbeat.
///
/// Un error ejecutando una tarea corta el worker: el leader no tiene
/// estado de fallo, así que la tarea queda en progreso.
pub async fn run(settings: WorkerSettings, app: Arc<dyn Application>) -> Result<WorkerReport> {
    let client = Client::new();
    let hb_url = format!("{}/api/v1/heartbeat", settings.master_url);

    let mut engine = Engine::new(settings.machine, app.clone(), settings.layout.clone());
    let mut report = WorkerReport {
        machine: settings.machine,
        ..WorkerReport::default()
    };
    let mut completed: Vec<TaskId> = Vec::new();

    info!(
        "worker de la máquina {} ({}) contra {}",
        settings.machine,
        app.name(),
        settings.master_url
    );

    loop {
        let request = HeartbeatRequest {
            machine: settings.machine,
            completed_task_ids: completed.clone(),
        };
        let task = send_heartbeat(&client, &hb_url, &request, &settings, report.heartbeats == 0)
            .await?;
        report.heartbeats += 1;
        completed.clear();

        match task {
            TaskDescriptor::Exit => {
                info!("máquina {} recibió EXIT", settings.machine);
                break;
            }
            TaskDescriptor::Sleep => {
                debug!("nada que hacer, esperando {:?}", settings.poll_interval);
                sleep(settings.poll_interval).await;
            }
            task => {
                info!(
                    "máquina {} ejecuta {} {:?}",
                    settings.machine,
                    task.kind_name(),
                    task.task_id()
                );

                // el engine va y vuelve del hilo de bloqueo junto con el resultado
                let handle = tokio::task::spawn_blocking(move || {
                    let res = engine.execute(&task);
                    (engine, task, res)
                });
                let (returned, task, res) = handle
                    .await
                    .context("el hilo que ejecutaba la tarea entró en pánico")?;
                engine = returned;

                match res {
                    Ok(Some(id)) => {
                        completed.push(id);
                        report.tasks_executed += 1;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(
                            "máquina {} falló en {} {:?}: {:#}",
                            settings.machine,
                            task.kind_name(),
                            task.task_id(),
                            e
                        );
                        return Err(e);
                    }
                }
            }
        }
    }

    Ok(report)
}

/// POST del heartbeat. Mientras el worker no haya hablado nunca con el
/// leader, los errores de conexión se reintentan `connect_retries` veces.
async fn send_heartbeat(
    client: &Client,
    url: &str,
    request: &HeartbeatRequest,
    settings: &WorkerSettings,
    first: bool,
) -> Result<TaskDescriptor> {
    let mut attempt = 0;
    loop {
        match client.post(url).json(request).send().await {
            Ok(resp) => {
                let resp = resp.error_for_status().with_context(|| {
                    format!(
                        "el leader rechazó el heartbeat de la máquina {}",
                        request.machine
                    )
                })?;
                let task: TaskDescriptor = resp
                    .json()
                    .await
                    .context("respuesta de heartbeat inválida")?;
                return Ok(task);
            }
            Err(e) if first && e.is_connect() && attempt < settings.connect_retries => {
                attempt += 1;
                warn!(
                    "leader no disponible en {} (intento {}/{}), reintentando",
                    url, attempt, settings.connect_retries
                );
                sleep(settings.poll_interval).await;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("no se pudo contactar al leader en {}", url))
            }
        }
    }
}
