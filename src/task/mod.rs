use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Operator definition from the catalog. Immutable once loaded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Operator {
    pub name: String,

    #[serde(default)]
    pub params: Vec<String>,

    /// Precondition set: variable -> required value
    #[serde(default)]
    pub condition: BTreeMap<String, Value>,

    /// Effect set: variable -> established value
    #[serde(default)]
    pub effect: BTreeMap<String, Value>,
}

/// Operator catalog, keyed by operator name. Consumed read-only.
pub type Catalog = BTreeMap<String, Operator>;

/// A compiled planning task as produced by the external compiler: the encoded
/// SAS+ problem text plus the catalog, initial state, and goal needed to build
/// representations from a solved plan.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Task {
    /// Encoded problem (line-oriented SAS+ text)
    pub sas: String,

    #[serde(default)]
    pub operators: Catalog,

    /// Initial-state tree. An array value marks a non-deterministic variable
    /// whose admissible values are the array's elements.
    #[serde(default)]
    pub initial: Value,

    /// Goal: variable path -> required value
    #[serde(default)]
    pub goal: BTreeMap<String, Value>,
}

impl Task {
    pub fn from_file(path: &Path) -> Result<Self, TaskError> {
        let content = std::fs::read_to_string(path).map_err(|source| TaskError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// A task is conformant when any initial-state variable admits more than
    /// one value.
    pub fn is_conformant(&self) -> bool {
        !crate::conformant::nondeterministic_variables(&self.initial).is_empty()
    }

    /// Flatten the initial-state tree into path -> value entries.
    /// Metadata keys (leading underscore) are skipped.
    pub fn flat_initial(&self) -> BTreeMap<String, Value> {
        let mut flat = BTreeMap::new();
        flatten(&self.initial, String::new(), &mut flat);
        flat
    }
}

fn flatten(value: &Value, path: String, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key.starts_with('_') {
                    continue;
                }
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten(child, child_path, out);
            }
        }
        other => {
            if !path.is_empty() {
                out.insert(path, other.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_with_initial(initial: Value) -> Task {
        Task {
            sas: String::new(),
            operators: Catalog::new(),
            initial,
            goal: BTreeMap::new(),
        }
    }

    #[test]
    fn test_flat_initial_skips_metadata() {
        let task = task_with_initial(json!({
            "host": { "state": "up", "_parent": "root" },
            "_context": "state"
        }));

        let flat = task.flat_initial();
        assert_eq!(flat.get("host.state"), Some(&json!("up")));
        assert!(!flat.contains_key("_context"));
        assert!(!flat.contains_key("host._parent"));
    }

    #[test]
    fn test_conformant_detection() {
        let deterministic = task_with_initial(json!({ "a": { "x": 1 } }));
        assert!(!deterministic.is_conformant());

        let conformant = task_with_initial(json!({ "a": { "x": [1, 2] } }));
        assert!(conformant.is_conformant());
    }
}
