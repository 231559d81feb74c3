use std::io;

use crate::layout::JobLayout;
use crate::records::{read_pairs, write_pairs, KeyValue};

/// Une las salidas de las R particiones, ordena por clave y escribe
/// `out.jsonl`. El orden es estable: los valores de una misma clave
/// quedan como los dejó el reducer.
pub fn merge_partition_outputs(
    layout: &JobLayout,
    num_reduce_partitions: u32,
) -> io::Result<Vec<KeyValue>> {
    let mut all: Vec<KeyValue> = Vec::new();
    for partition in 0..num_reduce_partitions {
        let mut pairs = read_pairs(&layout.partition_output_path(partition))?;
        all.append(&mut pairs);
    }

    all.sort_by(|a, b| a.0.cmp(&b.0));
    write_pairs(&layout.final_output_path(), &all)?;
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{env, fs, path::PathBuf};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("merge_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    #[test]
    fn merge_ordena_por_clave_entre_particiones() {
        let tmp = temp_dir("sorted");
        let layout = JobLayout::new(&tmp);

        write_pairs(
            &layout.partition_output_path(0),
            &[("c".to_string(), json!(1)), ("a".to_string(), json!(2))],
        )
        .unwrap();
        write_pairs(&layout.partition_output_path(1), &[("b".to_string(), json!(2))]).unwrap();

        let merged = merge_partition_outputs(&layout, 2).unwrap();
        let keys: Vec<&str> = merged.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        let content = fs::read_to_string(layout.final_output_path()).unwrap();
        assert_eq!(content, "[\"a\",2]\n[\"b\",2]\n[\"c\",1]\n");
    }

    #[test]
    fn merge_mantiene_orden_de_valores_de_una_clave() {
        let tmp = temp_dir("stable");
        let layout = JobLayout::new(&tmp);

        write_pairs(
            &layout.partition_output_path(0),
            &[
                ("k".to_string(), json!(3)),
                ("a".to_string(), json!(0)),
                ("k".to_string(), json!(1)),
            ],
        )
        .unwrap();

        let merged = merge_partition_outputs(&layout, 1).unwrap();
        assert_eq!(
            merged,
            vec![
                ("a".to_string(), json!(0)),
                ("k".to_string(), json!(3)),
                ("k".to_string(), json!(1)),
            ]
        );
    }

    #[test]
    fn merge_falla_si_falta_una_particion() {
        let tmp = temp_dir("missing");
        let layout = JobLayout::new(&tmp);
        assert!(merge_partition_outputs(&layout, 1).is_err());
    }
}
