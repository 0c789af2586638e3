//! Deterministic rewrites. No external dependency, same input always gives the same output.

use super::Applied;
use crate::graph::{EdgeKey, Graph};
use crate::issue::{Issue, IssueCode};

/// Edge deletions run before renames so a rename never moves an edge the
/// same pass was about to delete.
fn priority(code: IssueCode) -> u8 {
    match code {
        IssueCode::MissingSourceNode | IssueCode::MissingTargetNode => 0,
        IssueCode::SelfLoop => 1,
        IssueCode::DuplicateEdge => 2,
        IssueCode::EmptyLabel => 3,
        IssueCode::DuplicateNodeId => 4,
        _ => 5,
    }
}

pub(crate) fn apply(graph: &mut Graph, issues: &[&Issue]) -> Applied {
    let mut ordered = issues.to_vec();
    ordered.sort_by_key(|i| priority(i.code));

    let mut applied = Applied::default();
    for issue in ordered {
        let change = match issue.code {
            IssueCode::DuplicateNodeId => issue
                .node_id
                .as_deref()
                .and_then(|id| fix_duplicate_node_id(graph, id)),
            IssueCode::DuplicateEdge => issue.edge.as_ref().and_then(|key| fix_duplicate_edge(graph, key)),
            IssueCode::MissingSourceNode => issue
                .edge
                .as_ref()
                .and_then(|key| fix_missing_reference(graph, key, &key.source, "source")),
            IssueCode::MissingTargetNode => issue
                .edge
                .as_ref()
                .and_then(|key| fix_missing_reference(graph, key, &key.target, "target")),
            IssueCode::SelfLoop => issue.node_id.as_deref().and_then(|id| fix_self_loop(graph, id)),
            IssueCode::EmptyLabel => issue.node_id.as_deref().and_then(|id| fix_empty_label(graph, id)),
            _ => None,
        };
        if let Some(change) = change {
            tracing::debug!(code = %issue.code, change = %change, "auto fix");
            applied.record(issue.code, change);
        }
    }
    applied
}

/// Rename every occurrence after the first to `<id>_<n>`, rewriting edges that referenced `id`.
fn fix_duplicate_node_id(graph: &mut Graph, id: &str) -> Option<String> {
    let duplicates: Vec<usize> = graph
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.id == id)
        .map(|(i, _)| i)
        .skip(1)
        .collect();
    if duplicates.is_empty() {
        return None;
    }

    let mut renamed = Vec::with_capacity(duplicates.len());
    for index in duplicates {
        let new_id = graph.unique_id(id);
        graph.rename_node_at(index, &new_id)?;
        renamed.push(new_id);
    }
    Some(format!("Renamed duplicate node {}: {}", id, renamed.join(", ")))
}

/// Keep the first edge with this (source, target, relation), drop the rest.
fn fix_duplicate_edge(graph: &mut Graph, key: &EdgeKey) -> Option<String> {
    let before = graph.edges.len();
    let mut seen = false;
    graph.edges.retain(|e| {
        if !e.matches(key) {
            return true;
        }
        !std::mem::replace(&mut seen, true)
    });
    let removed = before - graph.edges.len();
    (removed > 0).then(|| format!("Removed duplicate edge: {}", key))
}

fn fix_missing_reference(graph: &mut Graph, key: &EdgeKey, endpoint: &str, side: &str) -> Option<String> {
    if graph.contains_node(endpoint) {
        return None;
    }
    let removed = graph.remove_edges(|e| e.matches(key));
    (removed > 0).then(|| format!("Removed edge with missing {}: {}", side, key))
}

fn fix_self_loop(graph: &mut Graph, id: &str) -> Option<String> {
    let removed = graph.remove_edges(|e| e.source == id && e.target == id);
    (removed > 0).then(|| format!("Removed self-loop on: {}", id))
}

fn fix_empty_label(graph: &mut Graph, id: &str) -> Option<String> {
    let label = title_case(id);
    if label.is_empty() {
        return None;
    }
    let node = graph
        .nodes
        .iter_mut()
        .find(|n| n.id == id && n.label.trim().is_empty())?;
    node.label = label;
    Some(format!("Set default label for: {}", id))
}

/// `order_db-primary` -> `Order Db Primary`.
fn title_case(id: &str) -> String {
    id.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
