use crate::error::ModelError;
use crate::task::Catalog;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One step of a solved plan: `(name arg1 arg2 ...)` in the artifact.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Action {
    pub name: String,

    #[serde(default)]
    pub args: Vec<String>,
}

/// An ordered action sequence produced by exactly one successful solver run.
/// Never mutated in place; refinement produces a new artifact.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    /// Parse a plan artifact. Every action's operator identity must resolve in
    /// the catalog; a plan referencing unknown operators cannot be trusted.
    pub fn parse(artifact: &str, catalog: &Catalog) -> Result<Self, ModelError> {
        let mut actions = Vec::new();
        for line in artifact.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let body = line
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| ModelError::MalformedPlanLine(line.to_string()))?;
            let mut tokens = body.split_whitespace();
            let name = tokens
                .next()
                .ok_or_else(|| ModelError::MalformedPlanLine(line.to_string()))?;
            if !catalog.contains_key(name) {
                return Err(ModelError::UnknownOperator(name.to_string()));
            }
            actions.push(Action {
                name: name.to_string(),
                args: tokens.map(str::to_string).collect(),
            });
        }
        Ok(Self { actions })
    }

    /// Drop synthetic compiler operators (goal, globalop, sometime name
    /// segments) and remember the goal operator if one was present.
    pub fn strip_synthetic(self) -> (Self, Option<String>) {
        let mut goal_operator = None;
        let mut actions = Vec::new();
        for action in self.actions {
            match action.name.split('-').nth(1) {
                Some("goal") => goal_operator = Some(action.name.clone()),
                Some("globalop") | Some("sometime") => {}
                _ => actions.push(action),
            }
        }
        (Self { actions }, goal_operator)
    }

    /// Fold the plan's effects over a flattened initial state.
    pub fn final_state(
        &self,
        catalog: &Catalog,
        initial: &BTreeMap<String, Value>,
    ) -> BTreeMap<String, Value> {
        let mut state = initial.clone();
        for action in &self.actions {
            if let Some(operator) = catalog.get(&action.name) {
                for (variable, value) in &operator.effect {
                    state.insert(variable.clone(), value.clone());
                }
            }
        }
        state
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}
