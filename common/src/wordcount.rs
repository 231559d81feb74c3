use anyhow::Context;
use serde_json::{json, Value};
use std::{cmp::Reverse, collections::BinaryHeap};

use crate::app::Application;
use crate::records::KeyValue;

/// Separa una línea en tokens: secuencias de caracteres de palabra
/// (alfanuméricos o '_') y cada signo suelto que no sea espacio.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut word = String::new();

    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            word.push(c);
            continue;
        }
        if !word.is_empty() {
            out.push(std::mem::take(&mut word));
        }
        if !c.is_whitespace() {
            out.push(c.to_string());
        }
    }
    if !word.is_empty() {
        out.push(word);
    }

    out
}

fn sum_counts(key: &str, values: &[Value]) -> anyhow::Result<u64> {
    let mut total = 0u64;
    for v in values {
        total += v
            .as_u64()
            .with_context(|| format!("valor no numérico para '{}': {}", key, v))?;
    }
    Ok(total)
}

/// WordCount: (palabra, 1) por token, suma en el reduce.
pub struct WordCount {
    use_combiner: bool,
}

impl WordCount {
    pub fn new(use_combiner: bool) -> Self {
        Self { use_combiner }
    }
}

impl Application for WordCount {
    fn name(&self) -> &str {
        if self.use_combiner {
            "wordcount"
        } else {
            "wordcount-nocombine"
        }
    }

    fn map(&self, _source: &str, record: &str) -> anyhow::Result<Vec<KeyValue>> {
        Ok(tokenize(record)
            .into_iter()
            .map(|w| (w, json!(1)))
            .collect())
    }

    fn combine(&self, key: &str, values: Vec<Value>) -> anyhow::Result<Vec<Vec<Value>>> {
        if !self.use_combiner {
            return Ok(vec![values]);
        }
        Ok(vec![vec![json!(sum_counts(key, &values)?)]])
    }

    fn reduce(&self, key: &str, values: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        Ok(vec![json!(sum_counts(key, &values)?)])
    }
}

/// Clave única bajo la que TopK agrupa todo.
pub const TOP_K_KEY: &str = "top_k";

/// Top K palabras a partir de la salida de WordCount (líneas `[palabra, conteo]`).
pub struct TopKWords {
    k: usize,
}

impl TopKWords {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl Application for TopKWords {
    fn name(&self) -> &str {
        "topk"
    }

    fn map(&self, source: &str, record: &str) -> anyhow::Result<Vec<KeyValue>> {
        if record.trim().is_empty() {
            return Ok(Vec::new());
        }
        let kv: Value = serde_json::from_str(record)
            .with_context(|| format!("línea inválida en {}: {}", source, record))?;
        Ok(vec![(TOP_K_KEY.to_string(), kv)])
    }

    /// Devuelve `[palabra, conteo]` de menor a mayor conteo.
    fn reduce(&self, _key: &str, values: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        let mut heap: BinaryHeap<Reverse<(u64, String)>> = BinaryHeap::new();

        for v in values {
            let (word, count): (String, u64) = serde_json::from_value(v.clone())
                .with_context(|| format!("se esperaba [palabra, conteo], llegó {}", v))?;
            heap.push(Reverse((count, word)));
            if heap.len() > self.k {
                heap.pop();
            }
        }

        let mut out = Vec::with_capacity(heap.len());
        while let Some(Reverse((count, word))) = heap.pop() {
            out.push(json!([word, count]));
        }
        Ok(out)
    }
}
