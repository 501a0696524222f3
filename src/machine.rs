use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data::assemble::NamedQubit;
use crate::error::{Result, StorageError};

// ---------------------------------------------------------------------------
// Transmon – one entry of the qubit registry
// ---------------------------------------------------------------------------

/// A qubit of the calibration state. Its properties are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transmon {
    /// Registry key; filled in after loading.
    #[serde(skip)]
    pub name: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Transmon {
    /// Look up a property by a `/`-separated path, e.g. `"resonator/frequency"`.
    pub fn property(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('/');
        let first = self.properties.get(parts.next()?)?;
        parts.try_fold(first, |value, key| value.get(key))
    }
}

impl NamedQubit for Transmon {
    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Machine – the persisted calibration state
// ---------------------------------------------------------------------------

/// Calibration state of the machine a run was measured on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    #[serde(default)]
    pub qubits: BTreeMap<String, Transmon>,
    #[serde(default)]
    pub active_qubit_names: Vec<String>,
    /// Every other top-level section (wiring, network, pairs…).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Machine {
    /// Load the state from a JSON file, or from a directory whose `*.json`
    /// files hold disjoint top-level sections (e.g. `state.json` and
    /// `wiring.json`).
    pub fn load(path: &Path) -> Result<Self> {
        let root = if path.is_dir() {
            merge_directory(path)?
        } else {
            read_json(path)?
        };
        let mut machine: Machine = serde_json::from_value(root)?;
        for (name, qubit) in machine.qubits.iter_mut() {
            qubit.name = name.clone();
        }
        Ok(machine)
    }

    pub fn qubit(&self, name: &str) -> Option<&Transmon> {
        self.qubits.get(name)
    }

    /// Active qubits in `active_qubit_names` order; unknown names are skipped.
    pub fn active_qubits(&self) -> Vec<&Transmon> {
        self.active_qubit_names
            .iter()
            .filter_map(|n| self.qubits.get(n))
            .collect()
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn merge_directory(dir: &Path) -> Result<Value> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .map_err(|e| StorageError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"))
        .collect();
    paths.sort();

    let mut merged = Map::new();
    for path in paths {
        match read_json(&path)? {
            Value::Object(sections) => merged.extend(sections),
            _ => {
                return Err(StorageError::InvalidState(format!(
                    "{} is not a JSON object",
                    path.display()
                )))
            }
        }
    }
    Ok(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn state() -> Value {
        json!({
            "qubits": {
                "qA1": { "id": "qA1", "resonator": { "frequency": 7.1e9 } },
                "qA2": { "id": "qA2", "T1": 2.5e-5 }
            },
            "active_qubit_names": ["qA2", "qA9", "qA1"],
            "network": { "host": "127.0.0.1" }
        })
    }

    #[test]
    fn load_names_qubits_after_registry_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("quam_state.json");
        fs::write(&path, state().to_string()).unwrap();

        let machine = Machine::load(&path).unwrap();

        assert_eq!(machine.qubit("qA1").unwrap().name(), "qA1");
        assert_eq!(
            machine.qubit("qA1").unwrap().property("resonator/frequency"),
            Some(&json!(7.1e9))
        );
        let active: Vec<&str> = machine
            .active_qubits()
            .into_iter()
            .map(|q| q.name.as_str())
            .collect();
        assert_eq!(active, vec!["qA2", "qA1"]);
        assert!(machine.extra.contains_key("network"));
    }

    #[test]
    fn load_merges_split_state_directory() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("state.json"), json!({ "qubits": { "q1": {} } }).to_string())
            .unwrap();
        fs::write(tmp.path().join("wiring.json"), json!({ "wiring": { "q1": "con1" } }).to_string())
            .unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let machine = Machine::load(tmp.path()).unwrap();

        assert!(machine.qubit("q1").is_some());
        assert_eq!(machine.extra["wiring"]["q1"], json!("con1"));
    }

    #[test]
    fn malformed_state_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("quam_state.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Machine::load(&path), Err(StorageError::Json(_))));
        assert!(matches!(
            Machine::load(&tmp.path().join("missing.json")),
            Err(StorageError::Io { .. })
        ));
    }
}
