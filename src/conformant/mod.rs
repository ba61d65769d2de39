//! Conformant initial-state enumeration.
//!
//! A task whose initial state leaves some variables with a set of admissible
//! values is solved scenario by scenario: every concrete combination is
//! enumerated, applied to a cloned task, and solved independently. Merging the
//! per-scenario plans into one conformant plan is future work; the collection
//! itself is the contract.

use crate::plan::Plan;
use crate::task::Task;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// One concrete assignment of every non-deterministic variable.
pub type PartialInitialState = BTreeMap<String, Value>;

/// Outcome of one enumerated scenario. `plan` is absent when the scenario has
/// no solution.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSolution {
    pub assignment: PartialInitialState,
    pub plan: Option<Plan>,
    pub task: Task,
}

/// Per-scenario solution collection. No combined plan is derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct ConformantReport {
    pub solutions: Vec<ScenarioSolution>,
}

/// Collect every state path whose admissible value is a set rather than a
/// single value, keyed by dot-separated path. Metadata keys (leading
/// underscore) are skipped.
pub fn nondeterministic_variables(initial: &Value) -> BTreeMap<String, Vec<Value>> {
    let mut variables = BTreeMap::new();
    collect(initial, String::new(), &mut variables);
    variables
}

fn collect(value: &Value, path: String, variables: &mut BTreeMap<String, Vec<Value>>) {
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
                collect(child, child_path, variables);
            }
        }
        Value::Array(values) => {
            variables.insert(path, values.clone());
        }
        _ => {}
    }
}

/// Cartesian product of the admissible value sets, depth-first over a fixed
/// (sorted-path) variable ordering. Each combination is distinct by
/// construction; with no non-deterministic variables the product is a single
/// empty assignment.
pub fn enumerate_assignments(
    variables: &BTreeMap<String, Vec<Value>>,
) -> Vec<PartialInitialState> {
    let entries: Vec<(&String, &Vec<Value>)> = variables.iter().collect();
    let mut bucket = Vec::new();
    combine(&entries, 0, &mut BTreeMap::new(), &mut bucket);
    bucket
}

fn combine(
    entries: &[(&String, &Vec<Value>)],
    index: usize,
    current: &mut PartialInitialState,
    bucket: &mut Vec<PartialInitialState>,
) {
    if index >= entries.len() {
        bucket.push(current.clone());
        return;
    }
    let (path, values) = entries[index];
    for value in values.iter() {
        current.insert((*path).clone(), value.clone());
        combine(entries, index + 1, current, bucket);
    }
}

/// Overwrite the assigned paths in a cloned initial state with their concrete
/// values.
pub fn apply_assignment(initial: &mut Value, assignment: &PartialInitialState) {
    for (path, value) in assignment {
        set_path(initial, path, value.clone());
    }
}

fn set_path(state: &mut Value, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            if let Value::Object(map) = state {
                map.insert(path.to_string(), value);
            } else {
                warn!(path, "initial-state path does not resolve to an object");
            }
        }
        Some((head, rest)) => match state {
            Value::Object(map) => match map.get_mut(head) {
                Some(child) => set_path(child, rest, value),
                None => warn!(branch = head, "missing initial-state branch"),
            },
            _ => warn!(path, "initial-state path does not resolve to an object"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn test_collects_set_valued_variables() {
        let initial = json!({
            "db": { "state": ["up", "down"], "port": 5432 },
            "web": { "replicas": [1, 2, 3] },
            "_context": ["ignored"]
        });

        let variables = nondeterministic_variables(&initial);
        assert_eq!(variables.len(), 2);
        assert_eq!(
            variables.get("db.state"),
            Some(&vec![json!("up"), json!("down")])
        );
        assert_eq!(variables.get("web.replicas").map(Vec::len), Some(3));
    }

    #[test]
    fn test_product_size_and_totality() {
        let variables = BTreeMap::from([
            ("a".to_string(), vec![json!(1), json!(2)]),
            ("b".to_string(), vec![json!("x"), json!("y"), json!("z")]),
        ]);

        let assignments = enumerate_assignments(&variables);
        assert_eq!(assignments.len(), 6);

        // every assignment is a total function over both variables
        for assignment in &assignments {
            assert!(assignment.contains_key("a"));
            assert!(assignment.contains_key("b"));
        }

        // and all combinations are distinct
        let distinct: BTreeSet<String> = assignments
            .iter()
            .map(|a| serde_json::to_string(a).unwrap())
            .collect();
        assert_eq!(distinct.len(), 6);
    }

    #[test]
    fn test_no_variables_yields_single_empty_assignment() {
        let assignments = enumerate_assignments(&BTreeMap::new());
        assert_eq!(assignments.len(), 1);
        assert!(assignments[0].is_empty());
    }

    #[test]
    fn test_empty_admissible_set_yields_no_assignment() {
        let variables = BTreeMap::from([("a".to_string(), Vec::new())]);
        assert!(enumerate_assignments(&variables).is_empty());
    }

    #[test]
    fn test_apply_assignment_overwrites_cloned_paths() {
        let mut initial = json!({
            "db": { "state": ["up", "down"] },
            "web": { "replicas": [1, 2] }
        });
        let assignment = BTreeMap::from([
            ("db.state".to_string(), json!("down")),
            ("web.replicas".to_string(), json!(2)),
        ]);

        apply_assignment(&mut initial, &assignment);
        assert_eq!(initial["db"]["state"], json!("down"));
        assert_eq!(initial["web"]["replicas"], json!(2));
    }
}
