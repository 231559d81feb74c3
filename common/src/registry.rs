use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::error::{HeartbeatError, JobConfigError};
use crate::layout::JobLayout;
use crate::task::{
    Chunk, MachineId, PartitionId, Task, TaskDescriptor, TaskId, TaskKind, TaskStatus,
};

/// Registro de todas las tareas del job y de las reglas de transición.
///
/// No hace I/O. Quien lo use debe serializar el acceso: `heartbeat` marca,
/// propaga y elige en una sola sección crítica.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    /// Orden de inserción: cada MAP seguida de sus R REDUCE_READ, luego los
    /// R REDUCE_GROUP. `tasks[i].id == i`.
    tasks: Vec<Task>,
    num_reduce_partitions: u32,
    layout: JobLayout,
    machines: BTreeSet<MachineId>,
    /// Máquinas que ya recibieron EXIT
    exited: BTreeSet<MachineId>,
    completed: bool,
}

/// Conteo de tareas por estado dentro de una fase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCounts {
    pub idle: u32,
    pub in_progress: u32,
    pub completed: u32,
}

impl PhaseCounts {
    fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Idle => self.idle += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Completed => self.completed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.idle + self.in_progress + self.completed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySummary {
    pub num_reduce_partitions: u32,
    pub workers: u32,
    pub workers_exited: u32,
    pub completed: bool,
    pub map: PhaseCounts,
    pub reduce_read: PhaseCounts,
    pub reduce_group: PhaseCounts,
}

impl TaskRegistry {
    /// Crea todas las tareas de una vez. Falla si no hay chunks, si R = 0
    /// o si algún chunk no tiene ruta.
    pub fn new(
        chunks: Vec<Chunk>,
        num_reduce_partitions: u32,
        layout: JobLayout,
    ) -> Result<Self, JobConfigError> {
        if chunks.is_empty() {
            return Err(JobConfigError::NoChunks);
        }
        if num_reduce_partitions == 0 {
            return Err(JobConfigError::ZeroPartitions);
        }
        if let Some(bad) = chunks.iter().find(|c| c.path.trim().is_empty()) {
            return Err(JobConfigError::EmptyChunkPath {
                machine: bad.machine,
            });
        }

        let machines: BTreeSet<MachineId> = chunks.iter().map(|c| c.machine).collect();
        let mut tasks: Vec<Task> = Vec::new();

        for chunk in chunks {
            let map_task_id = tasks.len() as TaskId;
            tasks.push(Task::new(
                map_task_id,
                TaskKind::Map {
                    chunk,
                    num_reduce_partitions,
                },
            ));

            for partition in 0..num_reduce_partitions {
                let id = tasks.len() as TaskId;
                tasks.push(Task::new(
                    id,
                    TaskKind::ReduceRead {
                        map_task_id,
                        partition,
                        input_file: None,
                        machine: None,
                    },
                ));
            }
        }

        for partition in 0..num_reduce_partitions {
            let id = tasks.len() as TaskId;
            tasks.push(Task::new(
                id,
                TaskKind::ReduceGroup {
                    partition,
                    machine: None,
                },
            ));
        }

        info!(
            "registro creado: {} tareas, {} máquinas, R={}",
            tasks.len(),
            machines.len(),
            num_reduce_partitions
        );

        Ok(Self {
            tasks,
            num_reduce_partitions,
            layout,
            machines,
            exited: BTreeSet::new(),
            completed: false,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id as usize)
    }

    pub fn machines(&self) -> &BTreeSet<MachineId> {
        &self.machines
    }

    pub fn num_reduce_partitions(&self) -> u32 {
        self.num_reduce_partitions
    }

    pub fn layout(&self) -> &JobLayout {
        &self.layout
    }

    /// Todas las tareas terminadas y todas las máquinas recibieron EXIT.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn all_tasks_completed(&self) -> bool {
        self.tasks.iter().all(Task::is_completed)
    }

    /// Cuántas de `ids` cambiarían de estado al reportarse: sin repetidas y
    /// sin las que ya estaban COMPLETED.
    pub fn newly_completed(&self, ids: &[TaskId]) -> usize {
        let unique: BTreeSet<TaskId> = ids.iter().copied().collect();
        unique
            .into_iter()
            .filter(|id| self.task(*id).is_some_and(|t| !t.is_completed()))
            .count()
    }

    /// Marca las tareas terminadas y devuelve la siguiente tarea para `machine`.
    ///
    /// Si el heartbeat es inválido no se modifica nada.
    pub fn heartbeat(
        &mut self,
        machine: MachineId,
        completed_task_ids: &[TaskId],
    ) -> Result<TaskDescriptor, HeartbeatError> {
        if !self.machines.contains(&machine) {
            return Err(HeartbeatError::UnknownMachine(machine));
        }

        self.complete(machine, completed_task_ids)?;
        Ok(self.next_task(machine))
    }

    /// Marca como COMPLETED las tareas reportadas por `machine` y propaga
    /// el archivo intermedio a las REDUCE_READ de cada MAP terminada.
    pub fn complete(
        &mut self,
        machine: MachineId,
        completed_task_ids: &[TaskId],
    ) -> Result<(), HeartbeatError> {
        // validar todo antes de mutar
        for &id in completed_task_ids {
            let task = self.task(id).ok_or(HeartbeatError::UnknownTask(id))?;
            match task.status {
                TaskStatus::Completed => {}
                TaskStatus::Idle => return Err(HeartbeatError::TaskNotInProgress(id)),
                TaskStatus::InProgress => {
                    if let Some(owner) = task.assigned_to {
                        if owner != machine {
                            return Err(HeartbeatError::WrongMachine {
                                task: id,
                                expected: owner,
                                actual: machine,
                            });
                        }
                    }
                }
            }
        }

        for &id in completed_task_ids {
            let task = &mut self.tasks[id as usize];
            if task.is_completed() {
                warn!("tarea {} reportada dos veces por máquina {}", id, machine);
                continue;
            }
            task.status = TaskStatus::Completed;
            debug!("tarea {} completada por máquina {}", id, machine);

            if matches!(task.kind, TaskKind::Map { .. }) {
                self.propagate_map_output(id);
            }
        }

        Ok(())
    }

    /// Con la MAP terminada, cada REDUCE_READ hija conoce su archivo de entrada.
    fn propagate_map_output(&mut self, map_id: TaskId) {
        for partition in 0..self.num_reduce_partitions {
            let path = self.layout.intermediate_path(map_id, partition);
            let target = self.tasks.iter_mut().find(|t| {
                matches!(
                    &t.kind,
                    TaskKind::ReduceRead { map_task_id, partition: p, input_file: None, .. }
                        if *map_task_id == map_id && *p == partition
                )
            });

            if let Some(Task {
                kind: TaskKind::ReduceRead { input_file, .. },
                ..
            }) = target
            {
                *input_file = Some(path);
            }
        }
    }

    /// Elige la siguiente tarea para `machine`: EXIT si ya terminó todo,
    /// la primera tarea IDLE elegible en orden de registro, o SLEEP.
    pub fn next_task(&mut self, machine: MachineId) -> TaskDescriptor {
        if self.all_tasks_completed() {
            if self.exited.insert(machine) {
                info!(
                    "máquina {} recibe EXIT ({}/{})",
                    machine,
                    self.exited.len(),
                    self.machines.len()
                );
            }
            if self.exited.len() >= self.machines.len() && !self.completed {
                self.completed = true;
                info!("job completado: todas las máquinas recibieron EXIT");
            }
            return TaskDescriptor::Exit;
        }

        let reads_done = self.reads_completed_by_partition();
        let Some(idx) = self
            .tasks
            .iter()
            .position(|t| is_eligible(t, machine, &reads_done))
        else {
            return TaskDescriptor::Sleep;
        };

        if let TaskKind::ReduceRead {
            partition,
            machine: None,
            ..
        } = self.tasks[idx].kind
        {
            self.pin_partition(partition, machine);
        }

        let task = &mut self.tasks[idx];
        task.status = TaskStatus::InProgress;
        task.assigned_to = Some(machine);
        debug!("tarea {} asignada a máquina {}", task.id, machine);
        task.descriptor(machine)
    }

    /// `reads_done[p]` es true si todas las REDUCE_READ de la partición p terminaron.
    fn reads_completed_by_partition(&self) -> Vec<bool> {
        let mut done = vec![true; self.num_reduce_partitions as usize];
        for task in &self.tasks {
            if let TaskKind::ReduceRead { partition, .. } = task.kind {
                if !task.is_completed() {
                    done[partition as usize] = false;
                }
            }
        }
        done
    }

    /// El primer reclamo de una partición la fija a esa máquina.
    fn pin_partition(&mut self, partition: PartitionId, owner: MachineId) {
        info!("partición {} fijada a máquina {}", partition, owner);
        for task in self.tasks.iter_mut() {
            match &mut task.kind {
                TaskKind::ReduceRead {
                    partition: p,
                    machine,
                    ..
                }
                | TaskKind::ReduceGroup {
                    partition: p,
                    machine,
                } if *p == partition => {
                    debug_assert!(machine.is_none());
                    *machine = Some(owner);
                }
                _ => {}
            }
        }
    }

    pub fn summary(&self) -> RegistrySummary {
        let mut summary = RegistrySummary {
            num_reduce_partitions: self.num_reduce_partitions,
            workers: self.machines.len() as u32,
            workers_exited: self.exited.len() as u32,
            completed: self.completed,
            ..Default::default()
        };
        for task in &self.tasks {
            match task.kind {
                TaskKind::Map { .. } => summary.map.add(task.status),
                TaskKind::ReduceRead { .. } => summary.reduce_read.add(task.status),
                TaskKind::ReduceGroup { .. } => summary.reduce_group.add(task.status),
            }
        }
        summary
    }
}

fn is_eligible(task: &Task, caller: MachineId, reads_done: &[bool]) -> bool {
    if task.status != TaskStatus::Idle {
        return false;
    }
    match &task.kind {
        TaskKind::Map { chunk, .. } => chunk.machine == caller,
        TaskKind::ReduceRead {
            input_file,
            machine,
            ..
        } => input_file.is_some() && machine.map_or(true, |m| m == caller),
        TaskKind::ReduceGroup { partition, machine } => {
            reads_done[*partition as usize] && *machine == Some(caller)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, machine: MachineId) -> Chunk {
        Chunk {
            path: path.to_string(),
            machine,
        }
    }

    fn registry(chunks: Vec<Chunk>, r: u32) -> TaskRegistry {
        TaskRegistry::new(chunks, r, JobLayout::new("tmp")).unwrap()
    }

    fn reduce_read_of(reg: &TaskRegistry, map_id: TaskId, part: PartitionId) -> Task {
        reg.tasks()
            .iter()
            .find(|t| {
                matches!(t.kind, TaskKind::ReduceRead { map_task_id, partition, .. }
                    if map_task_id == map_id && partition == part)
            })
            .cloned()
            .unwrap()
    }

    /* ============
       CONSTRUCCIÓN
       ============ */

    #[test]
    fn rechaza_chunks_vacios_y_r_cero() {
        let err = TaskRegistry::new(vec![], 1, JobLayout::new("tmp")).unwrap_err();
        assert_eq!(err, JobConfigError::NoChunks);

        let err = TaskRegistry::new(vec![chunk("a", 0)], 0, JobLayout::new("tmp")).unwrap_err();
        assert_eq!(err, JobConfigError::ZeroPartitions);

        let err = TaskRegistry::new(vec![chunk(" ", 3)], 1, JobLayout::new("tmp")).unwrap_err();
        assert_eq!(err, JobConfigError::EmptyChunkPath { machine: 3 });
    }

    #[test]
    fn crea_map_con_sus_hijas_y_luego_los_group() {
        let reg = registry(vec![chunk("a", 0), chunk("b", 1)], 2);
        let kinds: Vec<&str> = reg
            .tasks()
            .iter()
            .map(|t| t.descriptor(0).kind_name())
            .collect();

        assert_eq!(
            kinds,
            vec![
                "MAP",
                "REDUCE_READ",
                "REDUCE_READ",
                "MAP",
                "REDUCE_READ",
                "REDUCE_READ",
                "REDUCE_GROUP",
                "REDUCE_GROUP",
            ]
        );
        for (i, t) in reg.tasks().iter().enumerate() {
            assert_eq!(t.id as usize, i);
            assert_eq!(t.status, TaskStatus::Idle);
        }
        assert_eq!(reg.machines().len(), 2);
    }

    /* ============
       SELECCIÓN
       ============ */

    #[test]
    fn map_solo_para_la_maquina_del_chunk() {
        let mut reg = registry(vec![chunk("a", 0), chunk("b", 1)], 1);

        let t = reg.heartbeat(1, &[]).unwrap();
        match t {
            TaskDescriptor::Map { id, chunk, status, .. } => {
                assert_eq!(id, 2);
                assert_eq!(chunk.machine, 1);
                assert_eq!(status, TaskStatus::InProgress);
            }
            other => panic!("esperaba MAP, llegó {:?}", other),
        }

        // la máquina 1 ya no tiene nada más que hacer
        assert_eq!(reg.heartbeat(1, &[]).unwrap(), TaskDescriptor::Sleep);
    }

    #[test]
    fn reduce_read_no_es_elegible_antes_de_que_termine_su_map() {
        let mut reg = registry(vec![chunk("a", 0)], 2);

        let map = reg.heartbeat(0, &[]).unwrap();
        assert_eq!(map.task_id(), Some(0));

        // MAP en progreso: las REDUCE_READ siguen sin archivo
        assert_eq!(reduce_read_of(&reg, 0, 0).kind, TaskKind::ReduceRead {
            map_task_id: 0,
            partition: 0,
            input_file: None,
            machine: None,
        });
        assert_eq!(reg.heartbeat(0, &[]).unwrap(), TaskDescriptor::Sleep);

        // al reportar la MAP se propaga el archivo intermedio
        let next = reg.heartbeat(0, &[0]).unwrap();
        for p in 0..2 {
            match reduce_read_of(&reg, 0, p).kind {
                TaskKind::ReduceRead { input_file, .. } => {
                    assert_eq!(input_file, Some(format!("tmp/0-{}.jsonl", p)));
                }
                _ => unreachable!(),
            }
        }
        match next {
            TaskDescriptor::ReduceRead { input_file, machine, .. } => {
                assert_eq!(input_file, "tmp/0-0.jsonl");
                assert_eq!(machine, 0);
            }
            other => panic!("esperaba REDUCE_READ, llegó {:?}", other),
        }
    }

    #[test]
    fn primer_reclamo_fija_la_particion_entera() {
        let mut reg = registry(vec![chunk("a", 0), chunk("b", 1)], 1);

        assert_eq!(reg.heartbeat(0, &[]).unwrap().task_id(), Some(0));
        assert_eq!(reg.heartbeat(1, &[]).unwrap().task_id(), Some(2));

        // la máquina 1 termina su MAP y reclama la REDUCE_READ de la partición 0
        let t = reg.heartbeat(1, &[2]).unwrap();
        assert_eq!(t.task_id(), Some(3));

        for task in reg.tasks() {
            match task.kind {
                TaskKind::ReduceRead { machine, .. } | TaskKind::ReduceGroup { machine, .. } => {
                    assert_eq!(machine, Some(1));
                }
                TaskKind::Map { .. } => {}
            }
        }

        // la máquina 0 termina su MAP pero la partición ya es de la 1
        assert_eq!(reg.heartbeat(0, &[0]).unwrap(), TaskDescriptor::Sleep);
        assert_eq!(reg.heartbeat(1, &[3]).unwrap().task_id(), Some(1));
    }

    #[test]
    fn reduce_group_espera_todas_las_lecturas_de_su_particion() {
        let mut reg = registry(vec![chunk("a", 0), chunk("b", 0)], 1);

        assert_eq!(reg.heartbeat(0, &[]).unwrap().task_id(), Some(0));
        assert_eq!(reg.heartbeat(0, &[0]).unwrap().task_id(), Some(1)); // read de map 0
        assert_eq!(reg.heartbeat(0, &[1]).unwrap().task_id(), Some(2)); // map 1
        // la read de map 1 todavía no tiene archivo, el group no puede salir
        assert_eq!(reg.heartbeat(0, &[]).unwrap(), TaskDescriptor::Sleep);

        assert_eq!(reg.heartbeat(0, &[2]).unwrap().task_id(), Some(3));
        match reg.heartbeat(0, &[3]).unwrap() {
            TaskDescriptor::ReduceGroup { id, partition, machine, .. } => {
                assert_eq!((id, partition, machine), (4, 0, 0));
            }
            other => panic!("esperaba REDUCE_GROUP, llegó {:?}", other),
        }
    }

    #[test]
    fn exit_a_cada_maquina_y_luego_job_completado() {
        let mut reg = registry(vec![chunk("a", 0), chunk("b", 1)], 1);

        // drenar todo con la máquina 0 (la 1 sólo hace su MAP)
        assert_eq!(reg.heartbeat(0, &[]).unwrap().task_id(), Some(0));
        assert_eq!(reg.heartbeat(1, &[]).unwrap().task_id(), Some(2));
        assert_eq!(reg.heartbeat(0, &[0]).unwrap().task_id(), Some(1));
        assert_eq!(reg.heartbeat(1, &[2]).unwrap(), TaskDescriptor::Sleep);
        assert_eq!(reg.heartbeat(0, &[1]).unwrap().task_id(), Some(3));
        assert_eq!(reg.heartbeat(0, &[3]).unwrap().task_id(), Some(4));

        assert_eq!(reg.heartbeat(0, &[4]).unwrap(), TaskDescriptor::Exit);
        assert!(reg.all_tasks_completed());
        assert!(!reg.is_completed());

        // un segundo EXIT a la misma máquina no cuenta dos veces
        assert_eq!(reg.heartbeat(0, &[]).unwrap(), TaskDescriptor::Exit);
        assert!(!reg.is_completed());

        assert_eq!(reg.heartbeat(1, &[]).unwrap(), TaskDescriptor::Exit);
        assert!(reg.is_completed());
        assert_eq!(reg.summary().workers_exited, 2);
    }

    #[test]
    fn una_maquina_un_chunk_llega_a_exit() {
        let mut reg = registry(vec![chunk("solo", 0)], 1);

        let mut completed = Vec::new();
        let mut steps = 0;
        loop {
            let t = reg.heartbeat(0, &completed).unwrap();
            completed.clear();
            match t {
                TaskDescriptor::Exit => break,
                TaskDescriptor::Sleep => panic!("un único worker nunca debería dormir aquí"),
                other => completed.push(other.task_id().unwrap()),
            }
            steps += 1;
            assert!(steps < 10);
        }

        assert_eq!(steps, 3); // MAP, REDUCE_READ, REDUCE_GROUP
        assert!(reg.is_completed());
    }

    /* ============
       PROTOCOLO
       ============ */

    #[test]
    fn newly_completed_ignora_repetidas_y_ya_terminadas() {
        let mut reg = registry(vec![chunk("a", 0)], 1);
        assert_eq!(reg.heartbeat(0, &[]).unwrap().task_id(), Some(0));

        assert_eq!(reg.newly_completed(&[0, 0]), 1);
        reg.heartbeat(0, &[0]).unwrap();
        assert_eq!(reg.newly_completed(&[0]), 0);
        assert_eq!(reg.newly_completed(&[99]), 0);
    }

    #[test]
    fn heartbeat_invalido_no_modifica_el_registro() {
        let mut reg = registry(vec![chunk("a", 0), chunk("b", 1)], 1);
        assert_eq!(reg.heartbeat(0, &[]).unwrap().task_id(), Some(0));

        assert_eq!(
            reg.heartbeat(9, &[]).unwrap_err(),
            HeartbeatError::UnknownMachine(9)
        );
        assert_eq!(
            reg.heartbeat(0, &[0, 99]).unwrap_err(),
            HeartbeatError::UnknownTask(99)
        );
        assert_eq!(
            reg.heartbeat(0, &[2]).unwrap_err(),
            HeartbeatError::TaskNotInProgress(2)
        );
        assert_eq!(
            reg.heartbeat(1, &[0]).unwrap_err(),
            HeartbeatError::WrongMachine {
                task: 0,
                expected: 0,
                actual: 1
            }
        );

        // la tarea 0 sigue en progreso y sin propagar
        assert_eq!(reg.task(0).unwrap().status, TaskStatus::InProgress);
        assert_eq!(reg.summary().map.completed, 0);
    }

    #[test]
    fn reporte_repetido_es_idempotente() {
        let mut reg = registry(vec![chunk("a", 0)], 1);
        reg.heartbeat(0, &[]).unwrap();
        reg.heartbeat(0, &[0]).unwrap();

        // volver a reportar la MAP no rompe nada
        assert_eq!(reg.heartbeat(0, &[0]).unwrap(), TaskDescriptor::Sleep);
        assert_eq!(reg.summary().map.completed, 1);
    }

    #[test]
    fn summary_cuenta_por_fase() {
        let mut reg = registry(vec![chunk("a", 0), chunk("b", 0)], 3);
        reg.heartbeat(0, &[]).unwrap();

        let s = reg.summary();
        assert_eq!(s.map, PhaseCounts { idle: 1, in_progress: 1, completed: 0 });
        assert_eq!(s.reduce_read.total(), 6);
        assert_eq!(s.reduce_group.total(), 3);
        assert_eq!(s.workers, 1);
        assert!(!s.completed);
    }
}
