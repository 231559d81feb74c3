use serde_json::Value;
use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use crate::task::{Chunk, MachineId};

/// Par clave/valor intermedio o de salida. En disco: una línea `[key, value]`.
pub type KeyValue = (String, Value);

fn ensure_parent_dir(path: &str) -> io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Escribe los pares como JSON lines. Crea el archivo aunque no haya pares.
pub fn write_pairs(path: &str, pairs: &[KeyValue]) -> io::Result<()> {
    ensure_parent_dir(path)?;

    let mut writer = BufWriter::new(File::create(path)?);
    for kv in pairs {
        serde_json::to_writer(&mut writer, kv)?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(())
}

/// Lee un archivo JSON lines de pares `[key, value]`, en orden.
pub fn read_pairs(path: &str) -> io::Result<Vec<KeyValue>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let kv: KeyValue = serde_json::from_str(&line).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("línea inválida en {}: {e}", path),
            )
        })?;
        out.push(kv);
    }

    Ok(out)
}

/// Carga la asignación de chunks desde un JSON `[{"path": .., "machine": ..}, ..]`.
pub fn load_chunks(path: &str) -> io::Result<Vec<Chunk>> {
    let file = File::open(path)?;
    let chunks: Vec<Chunk> = serde_json::from_reader(BufReader::new(file))?;
    Ok(chunks)
}

/// Reparte los archivos que hacen match con `pattern` entre `machines` máquinas:
/// el archivo i va a la máquina `i % machines`.
pub fn chunks_from_glob(pattern: &str, machines: u32) -> anyhow::Result<Vec<Chunk>> {
    anyhow::ensure!(machines > 0, "se necesita al menos una máquina");

    let mut paths = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry?;
        if path.is_file() {
            paths.push(path.to_string_lossy().to_string());
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(i, path)| Chunk {
            path,
            machine: (i as u32 % machines) as MachineId,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{env, path::PathBuf};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("records_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    #[test]
    fn write_pairs_crea_archivo_vacio_sin_pares() {
        let tmp = temp_dir("empty");
        let path = tmp.join("sub").join("0-0.jsonl");
        let path_str = path.to_string_lossy().to_string();

        write_pairs(&path_str, &[]).unwrap();

        assert!(path.exists());
        assert!(read_pairs(&path_str).unwrap().is_empty());
    }

    #[test]
    fn formato_de_linea_es_array_clave_valor() {
        let tmp = temp_dir("format");
        let path = tmp.join("out.jsonl");
        let path_str = path.to_string_lossy().to_string();

        write_pairs(
            &path_str,
            &[("a".to_string(), json!(2)), ("b".to_string(), json!([1, 2]))],
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[\"a\",2]\n[\"b\",[1,2]]\n");

        let back = read_pairs(&path_str).unwrap();
        assert_eq!(back[1], ("b".to_string(), json!([1, 2])));
    }

    #[test]
    fn read_pairs_rechaza_lineas_que_no_son_pares() {
        let tmp = temp_dir("invalid");
        let path = tmp.join("bad.jsonl");
        fs::write(&path, "{\"k\":1}\n").unwrap();

        let err = read_pairs(path.to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn chunks_from_glob_reparte_round_robin() {
        let tmp = temp_dir("glob");
        for name in ["split_aa", "split_ab", "split_ac"] {
            fs::write(tmp.join(name), "x\n").unwrap();
        }
        let pattern = format!("{}/split_*", tmp.display());

        let chunks = chunks_from_glob(&pattern, 2).unwrap();
        let machines: Vec<MachineId> = chunks.iter().map(|c| c.machine).collect();

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].path.ends_with("split_aa"));
        assert_eq!(machines, vec![0, 1, 0]);
    }

    #[test]
    fn load_chunks_lee_lista_json() {
        let tmp = temp_dir("chunks");
        let path = tmp.join("chunks.json");
        fs::write(
            &path,
            r#"[{"path": "a.txt", "machine": 0}, {"path": "b.txt", "machine": 1}]"#,
        )
        .unwrap();

        let chunks = load_chunks(path.to_str().unwrap()).unwrap();
        assert_eq!(
            chunks[1],
            Chunk {
                path: "b.txt".to_string(),
                machine: 1
            }
        );
    }
}
