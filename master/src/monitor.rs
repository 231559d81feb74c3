use mr_common::MachineId;
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::state::AppState;

/// Vigila los heartbeats: avisa (una vez por tarea) de los workers que tienen
/// una tarea asignada y no vuelven a llamar dentro del timeout.
///
/// No reencola nada: una tarea en progreso sigue siendo de su worker.
pub async fn monitor_workers(state: AppState) {
    loop {
        tokio::time::sleep(state.settings.monitor_interval).await;

        let finished = state
            .registry
            .lock()
            .map(|r| r.is_completed())
            .unwrap_or(true);
        if finished {
            debug!("monitor de workers detenido");
            return;
        }

        sweep_once(&state);
    }
}

/// Una pasada de chequeo. Devuelve las máquinas marcadas como trabadas en esta pasada.
pub fn sweep_once(state: &AppState) -> Vec<MachineId> {
    let now = SystemTime::now();
    let timeout = state.settings.stall_timeout;
    let mut newly_stalled = Vec::new();

    let Ok(mut workers) = state.workers.lock() else {
        warn!("lock de workers envenenado, se salta la pasada");
        return newly_stalled;
    };

    for (machine, meta) in workers.iter_mut() {
        if !meta.is_stalled(now, timeout) || meta.stall_reported_for == meta.current_task {
            continue;
        }
        let elapsed = meta
            .last_heartbeat
            .and_then(|t| now.duration_since(t).ok())
            .unwrap_or_default();
        warn!(
            "máquina {} sin heartbeat hace {:?} con la tarea {:?} en progreso",
            machine, elapsed, meta.current_task
        );
        meta.stall_reported_for = meta.current_task;
        newly_stalled.push(*machine);
    }

    newly_stalled
}
