use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::{BufRead, BufReader},
    sync::Arc,
};
use tracing::{debug, info};

use crate::app::Application;
use crate::layout::JobLayout;
use crate::partition::partition_for_key;
use crate::records::{read_pairs, write_pairs, KeyValue};
use crate::task::{Chunk, MachineId, PartitionId, TaskDescriptor, TaskId};

/// Datos agrupados de una partición: clave -> valores en orden de llegada.
pub type Grouped = BTreeMap<String, Vec<Value>>;

/// Ejecuta las tareas que el leader entrega a un worker.
///
/// Guarda en memoria lo leído por las REDUCE_READ de cada partición hasta que
/// llega la REDUCE_GROUP correspondiente.
pub struct Engine {
    machine: MachineId,
    app: Arc<dyn Application>,
    layout: JobLayout,
    partitions: HashMap<PartitionId, Grouped>,
}

impl Engine {
    pub fn new(machine: MachineId, app: Arc<dyn Application>, layout: JobLayout) -> Self {
        Self {
            machine,
            app,
            layout,
            partitions: HashMap::new(),
        }
    }

    /// Claves acumuladas para una partición (aún sin reducir).
    pub fn buffered(&self, partition: PartitionId) -> Option<&Grouped> {
        self.partitions.get(&partition)
    }

    /// Ejecuta una tarea y devuelve su id. SLEEP y EXIT no ejecutan nada.
    pub fn execute(&mut self, task: &TaskDescriptor) -> Result<Option<TaskId>> {
        match task {
            TaskDescriptor::Map {
                id,
                chunk,
                num_reduce_partitions,
                ..
            } => {
                self.run_map(*id, chunk, *num_reduce_partitions)?;
                Ok(Some(*id))
            }
            TaskDescriptor::ReduceRead {
                id,
                partition,
                input_file,
                ..
            } => {
                self.run_reduce_read(*partition, input_file)?;
                Ok(Some(*id))
            }
            TaskDescriptor::ReduceGroup { id, partition, .. } => {
                self.run_reduce_group(*partition)?;
                Ok(Some(*id))
            }
            TaskDescriptor::Sleep | TaskDescriptor::Exit => Ok(None),
        }
    }

    /// MAP: chunk -> mapper -> combiner -> un archivo por partición (aunque quede vacío).
    fn run_map(&self, task_id: TaskId, chunk: &Chunk, num_partitions: u32) -> Result<()> {
        if chunk.machine != self.machine {
            bail!(
                "tarea MAP {} es para la máquina {}, no para la {}",
                task_id,
                chunk.machine,
                self.machine
            );
        }
        if num_partitions == 0 {
            bail!("tarea MAP {} sin particiones de reduce", task_id);
        }

        let file = File::open(&chunk.path)
            .with_context(|| format!("no se pudo abrir el chunk {}", chunk.path))?;
        let reader = BufReader::new(file);

        let mut key_to_values: Grouped = BTreeMap::new();
        for line in reader.lines() {
            let line = line.with_context(|| format!("error leyendo {}", chunk.path))?;
            let pairs = self
                .app
                .map(&chunk.path, &line)
                .with_context(|| format!("mapper falló en {}", chunk.path))?;
            for (key, value) in pairs {
                key_to_values.entry(key).or_default().push(value);
            }
        }

        let mut by_partition: Vec<Vec<KeyValue>> = vec![Vec::new(); num_partitions as usize];
        for (key, values) in key_to_values {
            let partition = partition_for_key(&key, num_partitions) as usize;
            let groups = self
                .app
                .combine(&key, values)
                .with_context(|| format!("combiner falló para la clave '{}'", key))?;
            for group in groups {
                for value in group {
                    by_partition[partition].push((key.clone(), value));
                }
            }
        }

        for (partition, pairs) in by_partition.iter().enumerate() {
            let path = self.layout.intermediate_path(task_id, partition as PartitionId);
            write_pairs(&path, pairs).with_context(|| format!("no se pudo escribir {}", path))?;
        }

        info!(
            "MAP {} terminada: {} -> {} particiones",
            task_id, chunk.path, num_partitions
        );
        Ok(())
    }

    /// REDUCE_READ: el "shuffle". En un cluster real sería una lectura remota
    /// al worker que produjo el archivo; aquí se lee del disco compartido.
    fn run_reduce_read(&mut self, partition: PartitionId, input_file: &str) -> Result<()> {
        let pairs =
            read_pairs(input_file).with_context(|| format!("no se pudo leer {}", input_file))?;
        let count = pairs.len();

        let grouped = self.partitions.entry(partition).or_default();
        for (key, value) in pairs {
            grouped.entry(key).or_default().push(value);
        }

        debug!(
            "REDUCE_READ partición {}: {} pares desde {}",
            partition, count, input_file
        );
        Ok(())
    }

    /// REDUCE_GROUP: reducer por clave y archivo de salida de la partición.
    fn run_reduce_group(&mut self, partition: PartitionId) -> Result<()> {
        // toda partición pasa antes por al menos una REDUCE_READ en esta máquina
        let Some(grouped) = self.partitions.remove(&partition) else {
            bail!(
                "partición {} sin lecturas en la máquina {}",
                partition,
                self.machine
            );
        };

        let mut out: Vec<KeyValue> = Vec::new();
        for (key, values) in grouped {
            let reduced = self
                .app
                .reduce(&key, values)
                .with_context(|| format!("reducer falló para la clave '{}'", key))?;
            for value in reduced {
                out.push((key.clone(), value));
            }
        }

        let path = self.layout.partition_output_path(partition);
        write_pairs(&path, &out).with_context(|| format!("no se pudo escribir {}", path))?;

        info!(
            "REDUCE_GROUP partición {} terminada: {} registros en {}",
            partition,
            out.len(),
            path
        );
        Ok(())
    }
}
