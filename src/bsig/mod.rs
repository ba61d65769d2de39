//! Behavioural-signature construction.
//!
//! A signature enriches each plan step's conditions with the effects of the
//! step(s) that causally precede it, so an executor can fire a step as soon as
//! its enriched condition set holds.

use crate::error::ModelError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

pub const BSIG_VERSION: u32 = 1;

/// One operator occurrence in a workflow. Predecessor/successor index sets are
/// supplied by the external partial-order extractor; sequential workflows
/// leave them empty.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowNode {
    pub name: String,

    #[serde(default)]
    pub condition: BTreeMap<String, Value>,

    #[serde(default)]
    pub effect: BTreeMap<String, Value>,

    #[serde(default)]
    pub predecessors: Vec<usize>,

    #[serde(default)]
    pub successors: Vec<usize>,
}

/// Public signature operator: graph plumbing stripped, priority kept for
/// parallel models.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BsigOperator {
    pub name: String,
    pub condition: BTreeMap<String, Value>,
    pub effect: BTreeMap<String, Value>,

    #[serde(rename = "pi", skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

/// Versioned behavioural-signature model. Built fresh per request.
#[derive(Debug, Clone, Serialize)]
pub struct Bsig {
    pub version: u32,
    pub id: i64,
    pub operators: Vec<BsigOperator>,
    pub goal: BTreeMap<String, Value>,
    pub goal_operator: BTreeMap<String, String>,
}

impl Bsig {
    fn template() -> Self {
        Self {
            version: BSIG_VERSION,
            id: Utc::now().timestamp(),
            operators: Vec::new(),
            goal: BTreeMap::new(),
            goal_operator: BTreeMap::new(),
        }
    }
}

/// Build a signature from a linear workflow: walking from the last node to
/// the second, every node absorbs its immediate predecessor's effects into its
/// own conditions (the predecessor's effect wins on key collision).
pub fn sequential_bsig(workflow: &[WorkflowNode], goal: &BTreeMap<String, Value>) -> Bsig {
    let mut bsig = Bsig::template();
    if workflow.is_empty() {
        return bsig;
    }

    let mut nodes = workflow.to_vec();
    for i in (1..nodes.len()).rev() {
        let effects = nodes[i - 1].effect.clone();
        for (variable, value) in effects {
            nodes[i].condition.insert(variable, value);
        }
    }

    let (goal_map, goal_operator) = resolve_goal(&nodes, goal);
    bsig.operators = strip(nodes, None);
    bsig.goal = goal_map;
    bsig.goal_operator = goal_operator;
    bsig
}

/// Build a signature from a dependency-annotated workflow: compute a priority
/// index per node, then fold each predecessor's effects into the node's
/// conditions. Edge and identity fields are stripped from the result.
pub fn parallel_bsig(
    workflow: &[WorkflowNode],
    goal: &BTreeMap<String, Value>,
) -> Result<Bsig, ModelError> {
    let mut bsig = Bsig::template();
    if workflow.is_empty() {
        return Ok(bsig);
    }

    validate_edges(workflow)?;
    let priorities = priority_indices(workflow);

    let mut nodes = workflow.to_vec();
    for i in 0..nodes.len() {
        let predecessors = nodes[i].predecessors.clone();
        for p in predecessors {
            let effects = nodes[p].effect.clone();
            for (variable, value) in effects {
                nodes[i].condition.insert(variable, value);
            }
        }
    }

    let (goal_map, goal_operator) = resolve_goal(&nodes, goal);
    bsig.operators = strip(nodes, Some(&priorities));
    bsig.goal = goal_map;
    bsig.goal_operator = goal_operator;
    Ok(bsig)
}

fn validate_edges(workflow: &[WorkflowNode]) -> Result<(), ModelError> {
    for (index, node) in workflow.iter().enumerate() {
        for &edge in node.successors.iter().chain(node.predecessors.iter()) {
            if edge >= workflow.len() {
                return Err(ModelError::InvalidWorkflowEdge {
                    node: index,
                    successor: edge,
                });
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Priority index per node: one more than the maximum index among reachable
/// successors, with leaves at 1. The successor graph comes from an external
/// component and is not trusted to be acyclic: the walk memoizes finished
/// nodes and skips back edges instead of recursing into them.
fn priority_indices(workflow: &[WorkflowNode]) -> Vec<u32> {
    let mut priorities = vec![1u32; workflow.len()];
    let mut marks = vec![Mark::Unvisited; workflow.len()];

    for root in 0..workflow.len() {
        if workflow[root].predecessors.is_empty() && marks[root] == Mark::Unvisited {
            visit(root, workflow, &mut priorities, &mut marks);
        }
    }
    priorities
}

fn visit(root: usize, workflow: &[WorkflowNode], priorities: &mut [u32], marks: &mut [Mark]) {
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
    marks[root] = Mark::InProgress;

    while let Some(&mut (node, ref mut cursor)) = stack.last_mut() {
        if *cursor < workflow[node].successors.len() {
            let successor = workflow[node].successors[*cursor];
            *cursor += 1;
            match marks[successor] {
                Mark::Unvisited => {
                    marks[successor] = Mark::InProgress;
                    stack.push((successor, 0));
                }
                Mark::InProgress => {
                    warn!(node, successor, "dependency cycle detected, skipping back edge");
                }
                Mark::Done => {}
            }
        } else {
            let mut priority = 1;
            for &successor in &workflow[node].successors {
                if marks[successor] == Mark::Done {
                    priority = priority.max(priorities[successor] + 1);
                }
            }
            priorities[node] = priority;
            marks[node] = Mark::Done;
            stack.pop();
        }
    }
}

/// For each goal variable, find the most recent node whose effects establish
/// exactly the required value. A goal variable with no supporting node is
/// omitted: its value may already hold in the initial state.
fn resolve_goal(
    workflow: &[WorkflowNode],
    goal: &BTreeMap<String, Value>,
) -> (BTreeMap<String, Value>, BTreeMap<String, String>) {
    let mut goal_map = BTreeMap::new();
    let mut goal_operator = BTreeMap::new();

    for (variable, value) in goal {
        for node in workflow.iter().rev() {
            if let Some(established) = node.effect.get(variable) {
                if established == value {
                    goal_map.insert(variable.clone(), value.clone());
                    goal_operator.insert(variable.clone(), node.name.clone());
                    break;
                }
                // a differing effect on the same variable is not a supporter;
                // keep scanning earlier nodes
            }
        }
    }
    (goal_map, goal_operator)
}

fn strip(nodes: Vec<WorkflowNode>, priorities: Option<&[u32]>) -> Vec<BsigOperator> {
    nodes
        .into_iter()
        .enumerate()
        .map(|(index, node)| BsigOperator {
            name: node.name,
            condition: node.condition,
            effect: node.effect,
            priority: priorities.map(|p| p[index]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(name: &str, condition: &[(&str, Value)], effect: &[(&str, Value)]) -> WorkflowNode {
        WorkflowNode {
            name: name.to_string(),
            condition: condition
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            effect: effect
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    #[test]
    fn test_sequential_propagation_and_goal() {
        // A establishes x=1, B needs x=1 and establishes y=2
        let workflow = vec![
            node("A", &[], &[("x", json!(1))]),
            node("B", &[("x", json!(1))], &[("y", json!(2))]),
        ];
        let goal = BTreeMap::from([("y".to_string(), json!(2))]);

        let bsig = sequential_bsig(&workflow, &goal);

        assert_eq!(bsig.version, BSIG_VERSION);
        assert_eq!(bsig.operators[1].condition.get("x"), Some(&json!(1)));
        assert_eq!(bsig.goal, goal);
        assert_eq!(bsig.goal_operator.get("y"), Some(&"B".to_string()));
    }

    #[test]
    fn test_sequential_predecessor_effect_wins_collision() {
        let workflow = vec![
            node("A", &[], &[("x", json!("new"))]),
            node("B", &[("x", json!("old"))], &[]),
        ];
        let bsig = sequential_bsig(&workflow, &BTreeMap::new());
        assert_eq!(bsig.operators[1].condition.get("x"), Some(&json!("new")));
    }

    #[test]
    fn test_sequential_idempotent_on_propagated_workflow() {
        let workflow = vec![
            node("A", &[], &[("x", json!(1))]),
            node("B", &[], &[("y", json!(2))]),
            node("C", &[("z", json!(0))], &[("z", json!(3))]),
        ];
        let goal = BTreeMap::from([("z".to_string(), json!(3))]);

        let first = sequential_bsig(&workflow, &goal);
        let propagated: Vec<WorkflowNode> = first
            .operators
            .iter()
            .map(|op| WorkflowNode {
                name: op.name.clone(),
                condition: op.condition.clone(),
                effect: op.effect.clone(),
                predecessors: Vec::new(),
                successors: Vec::new(),
            })
            .collect();

        let second = sequential_bsig(&propagated, &goal);
        for (a, b) in first.operators.iter().zip(second.operators.iter()) {
            assert_eq!(a.condition, b.condition);
            assert_eq!(a.effect, b.effect);
        }
        assert_eq!(first.goal, second.goal);
    }

    #[test]
    fn test_empty_workflow_yields_template() {
        let bsig = sequential_bsig(&[], &BTreeMap::from([("y".to_string(), json!(2))]));
        assert!(bsig.operators.is_empty());
        assert!(bsig.goal.is_empty());
        assert!(bsig.goal_operator.is_empty());
    }

    #[test]
    fn test_goal_requires_exact_value_match() {
        // C sets y=3 last, B set y=2 earlier: the supporter for y=2 is B
        let workflow = vec![
            node("B", &[], &[("y", json!(2))]),
            node("C", &[], &[("y", json!(3))]),
        ];
        let goal = BTreeMap::from([("y".to_string(), json!(2))]);

        let bsig = sequential_bsig(&workflow, &goal);
        assert_eq!(bsig.goal_operator.get("y"), Some(&"B".to_string()));
    }

    #[test]
    fn test_goal_without_supporter_is_omitted() {
        let workflow = vec![node("A", &[], &[("x", json!(1))])];
        let goal = BTreeMap::from([("y".to_string(), json!(2))]);

        let bsig = sequential_bsig(&workflow, &goal);
        assert!(bsig.goal.is_empty());
        assert!(bsig.goal_operator.is_empty());
    }

    fn diamond() -> Vec<WorkflowNode> {
        // 0 -> {1, 2} -> 3
        let mut workflow = vec![
            node("root", &[], &[("r", json!(1))]),
            node("left", &[], &[("l", json!(1))]),
            node("right", &[], &[("r", json!(2))]),
            node("join", &[], &[("j", json!(1))]),
        ];
        workflow[0].successors = vec![1, 2];
        workflow[1].predecessors = vec![0];
        workflow[1].successors = vec![3];
        workflow[2].predecessors = vec![0];
        workflow[2].successors = vec![3];
        workflow[3].predecessors = vec![1, 2];
        workflow
    }

    #[test]
    fn test_parallel_priority_tiers() {
        let bsig = parallel_bsig(&diamond(), &BTreeMap::new()).unwrap();

        assert_eq!(bsig.operators[0].priority, Some(3));
        assert_eq!(bsig.operators[1].priority, Some(2));
        assert_eq!(bsig.operators[2].priority, Some(2));
        assert_eq!(bsig.operators[3].priority, Some(1));
    }

    #[test]
    fn test_parallel_folds_predecessor_effects() {
        let bsig = parallel_bsig(&diamond(), &BTreeMap::new()).unwrap();

        // join absorbs both predecessors; last predecessor scanned wins for r
        assert_eq!(bsig.operators[3].condition.get("l"), Some(&json!(1)));
        assert_eq!(bsig.operators[3].condition.get("r"), Some(&json!(2)));
        // left and right absorb the root's effect
        assert_eq!(bsig.operators[1].condition.get("r"), Some(&json!(1)));
    }

    #[test]
    fn test_parallel_cycle_terminates() {
        // 0 -> 1 -> 2 -> 1: malformed input from the extractor
        let mut workflow = vec![
            node("a", &[], &[]),
            node("b", &[], &[]),
            node("c", &[], &[]),
        ];
        workflow[0].successors = vec![1];
        workflow[1].predecessors = vec![0, 2];
        workflow[1].successors = vec![2];
        workflow[2].predecessors = vec![1];
        workflow[2].successors = vec![1];

        let bsig = parallel_bsig(&workflow, &BTreeMap::new()).unwrap();
        assert_eq!(bsig.operators[0].priority, Some(3));
        assert_eq!(bsig.operators[1].priority, Some(2));
        assert_eq!(bsig.operators[2].priority, Some(1));
    }

    #[test]
    fn test_parallel_rejects_out_of_range_edge() {
        let mut workflow = vec![node("a", &[], &[])];
        workflow[0].successors = vec![7];

        let err = parallel_bsig(&workflow, &BTreeMap::new()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::InvalidWorkflowEdge { node: 0, successor: 7 }
        ));
    }

    #[test]
    fn test_edges_stripped_from_public_model() {
        let bsig = parallel_bsig(&diamond(), &BTreeMap::new()).unwrap();
        let rendered = serde_json::to_string(&bsig).unwrap();
        assert!(!rendered.contains("predecessors"));
        assert!(!rendered.contains("successors"));
    }
}
