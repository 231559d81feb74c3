use serde_json::Value;
use std::sync::Arc;

use crate::records::KeyValue;
use crate::wordcount::{TopKWords, WordCount};

/// Funciones de usuario de un job MapReduce.
///
/// Deben ser puras respecto al estado de coordinación: el runtime puede
/// llamarlas en cualquier worker y en cualquier orden de chunks.
pub trait Application: Send + Sync {
    fn name(&self) -> &str;

    /// `source` identifica el chunk (su ruta); `record` es una línea.
    fn map(&self, source: &str, record: &str) -> anyhow::Result<Vec<KeyValue>>;

    /// Combina los valores de una clave dentro de una tarea MAP.
    /// Por defecto un solo grupo con todos los valores.
    fn combine(&self, _key: &str, values: Vec<Value>) -> anyhow::Result<Vec<Vec<Value>>> {
        Ok(vec![values])
    }

    /// Valores de salida para una clave, en el orden en que llegaron.
    fn reduce(&self, key: &str, values: Vec<Value>) -> anyhow::Result<Vec<Value>>;
}

/// Nombres aceptados por `by_name`.
pub const APP_NAMES: &[&str] = &["wordcount", "wordcount-nocombine", "topk"];

/// Busca una aplicación incluida por nombre.
pub fn by_name(name: &str) -> Option<Arc<dyn Application>> {
    match name {
        "wordcount" => Some(Arc::new(WordCount::new(true))),
        "wordcount-nocombine" => Some(Arc::new(WordCount::new(false))),
        "topk" => Some(Arc::new(TopKWords::new(5))),
        _ => None,
    }
}
