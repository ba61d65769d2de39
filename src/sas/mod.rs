//! Line-oriented rewriting of the encoded SAS+ problem text.
//!
//! Operator blocks sit between `begin_operator`/`end_operator` delimiters and
//! the first content line of each block carries the operator identity token.
//! The line after `end_goal` holds the total-operator count, which must be
//! rewritten after filtering.

use std::collections::BTreeSet;

const TOTAL_PLACEHOLDER: &str = "__TOTAL_OPERATORS__";

/// Extract the operator identities referenced by a plan artifact.
pub fn selected_identities(plan_artifact: &str) -> BTreeSet<String> {
    plan_artifact
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let body = line.strip_prefix('(')?.strip_suffix(')')?;
            body.split_whitespace().next().map(str::to_string)
        })
        .collect()
}

/// Rewrite an encoded problem so it contains only the operator blocks whose
/// identity is in `selected`, copying every non-operator section verbatim and
/// recomputing the total-operator count.
pub fn filter_operators(sas: &str, selected: &BTreeSet<String>) -> String {
    let mut output = String::new();
    let mut block: Option<String> = None;
    let mut identity: Option<String> = None;
    let mut total_pending = false;
    let mut kept = 0usize;

    for line in sas.lines() {
        if line.starts_with("end_goal") {
            total_pending = true;
        } else if total_pending {
            // the line after end_goal is the total-operator count
            output.push_str(TOTAL_PLACEHOLDER);
            output.push('\n');
            total_pending = false;
            continue;
        }

        if line.starts_with("begin_operator") {
            block = Some(String::new());
            identity = None;
        } else if line.starts_with("end_operator") {
            if let (Some(body), Some(id)) = (block.take(), identity.take()) {
                if selected.contains(&id) {
                    output.push_str("begin_operator\n");
                    output.push_str(&body);
                    output.push_str("end_operator\n");
                    kept += 1;
                }
            }
        } else if let Some(body) = block.as_mut() {
            if identity.is_none() {
                identity = line.split_whitespace().next().map(str::to_string);
            }
            body.push_str(line);
            body.push('\n');
        } else {
            output.push_str(line);
            output.push('\n');
        }
    }

    output.replacen(TOTAL_PLACEHOLDER, &kept.to_string(), 1)
}
