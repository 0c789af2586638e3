//! LLM-assisted edge suggestions.
//!
//! Builds a prompt around the current graph, hands it to the injected
//! [`Collaborator`] and parses the first JSON array of proposed edges out of the
//! reply. Any failure is returned as an [`AssistError`] so the fixer can fall back
//! to heuristics for the same issues.

mod parse;
pub mod prompt;

pub use parse::parse_llm_output;

use crate::collab::{Collaborator, CollaboratorError};
use crate::graph::{Edge, Graph};
use crate::issue::Issue;

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error("response contained no usable edges")]
    NoUsableEdges,
}

/// Ask the collaborator for edges attaching the given orphans.
pub fn suggest_for_orphans(
    collaborator: &dyn Collaborator,
    graph: &Graph,
    orphan_ids: &[&str],
) -> Result<Vec<Edge>, AssistError> {
    if orphan_ids.is_empty() {
        return Ok(vec![]);
    }
    let prompt = prompt::orphan_prompt(graph, orphan_ids);
    request(collaborator, &prompt, graph, "connects to")
}

/// Ask the collaborator for edges resolving actor/database/service connectivity issues.
pub fn suggest_for_connectivity(
    collaborator: &dyn Collaborator,
    graph: &Graph,
    issues: &[&Issue],
) -> Result<Vec<Edge>, AssistError> {
    if issues.is_empty() {
        return Ok(vec![]);
    }
    let prompt = prompt::connectivity_prompt(graph, issues);
    request(collaborator, &prompt, graph, "uses")
}

fn request(
    collaborator: &dyn Collaborator,
    prompt: &str,
    graph: &Graph,
    default_relation: &str,
) -> Result<Vec<Edge>, AssistError> {
    tracing::debug!(prompt_len = prompt.len(), "requesting edge suggestions");
    let raw = collaborator.generate(prompt)?;
    tracing::debug!(raw = %raw, "raw collaborator output");

    let edges = parse_llm_output(&raw, graph, default_relation);
    tracing::debug!(count = edges.len(), "parsed suggested edges");
    if edges.is_empty() {
        return Err(AssistError::NoUsableEdges);
    }
    Ok(edges)
}
