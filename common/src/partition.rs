use std::hash::Hasher;

use crate::task::PartitionId;

/// Hash estable de una clave: FNV-1a de 64 bits sobre los bytes UTF-8.
/// No depende del proceso ni de la máquina, así que dos tareas MAP
/// cualesquiera mandan la misma clave a la misma partición.
pub fn stable_hash(key: &str) -> u64 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(key.as_bytes());
    hasher.finish()
}

/// `stable_hash(key) mod num_partitions`
pub fn partition_for_key(key: &str, num_partitions: u32) -> PartitionId {
    debug_assert!(num_partitions > 0);
    (stable_hash(key) % num_partitions as u64) as PartitionId
}
