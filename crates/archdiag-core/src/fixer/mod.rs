//! Bounded repair loop.
//!
//! Each iteration validates the working copy, applies deterministic fixes, then
//! resolves connectivity issues through the collaborator when one is injected,
//! falling back to type-directed heuristics for any bucket it could not handle.

mod auto;
mod fallback;

use serde::Serialize;

use crate::assist::{self, AssistError};
use crate::classify::classify;
use crate::collab::Collaborator;
use crate::graph::{Edge, Graph};
use crate::issue::{Issue, IssueCode};
use crate::validator::{ValidationResult, Validator};

pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Which tier produced the repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FixType {
    /// Nothing needed fixing.
    None,
    Auto,
    Llm,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixResult {
    pub success: bool,
    pub fix_type: FixType,
    pub issues_fixed: Vec<IssueCode>,
    pub issues_remaining: Vec<IssueCode>,
    pub changes_made: Vec<String>,
    pub llm_used: bool,
    /// Repair iterations actually run.
    #[serde(skip)]
    pub iterations: usize,
}

impl FixResult {
    /// Result for a graph that was already valid and complete.
    pub fn none() -> Self {
        Self {
            success: true,
            fix_type: FixType::None,
            issues_fixed: vec![],
            issues_remaining: vec![],
            changes_made: vec!["No fixes needed".to_string()],
            llm_used: false,
            iterations: 0,
        }
    }

    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "success": self.success,
            "fix_type": self.fix_type,
            "issues_fixed": self.issues_fixed,
            "issues_remaining": self.issues_remaining,
            "changes_made": self.changes_made,
            "llm_used": self.llm_used,
        })
    }
}

/// Changes applied by one phase and the issue codes they addressed.
#[derive(Debug, Default)]
pub(crate) struct Applied {
    pub changes: Vec<String>,
    pub fixed: Vec<IssueCode>,
}

impl Applied {
    pub fn record(&mut self, code: IssueCode, change: String) {
        self.changes.push(change);
        push_unique(&mut self.fixed, code);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn push_unique(codes: &mut Vec<IssueCode>, code: IssueCode) {
    if !codes.contains(&code) {
        codes.push(code);
    }
}

/// Whether the condition an issue reported still holds in `graph`.
fn is_open(graph: &Graph, issue: &Issue) -> bool {
    let Some(id) = issue.node_id.as_deref() else {
        return true;
    };
    if !graph.contains_node(id) {
        return false;
    }
    match issue.code {
        IssueCode::OrphanedNode | IssueCode::IsolatedService => !graph.is_connected(id),
        IssueCode::ActorNoOutgoing => !graph.has_outgoing(id),
        IssueCode::DatabaseNoIncoming => !graph.has_incoming(id),
        _ => true,
    }
}

#[derive(Debug, Clone, Copy)]
enum Bucket {
    Orphan,
    Connectivity,
}

impl Bucket {
    fn name(self) -> &'static str {
        match self {
            Bucket::Orphan => "orphan",
            Bucket::Connectivity => "connectivity",
        }
    }
}

/// Totals accumulated across iterations.
#[derive(Default)]
struct Progress {
    changes: Vec<String>,
    fixed: Vec<IssueCode>,
    llm_used: bool,
    fallback_used: bool,
}

impl Progress {
    fn absorb(&mut self, applied: Applied) -> bool {
        let any = !applied.is_empty();
        self.changes.extend(applied.changes);
        for code in applied.fixed {
            push_unique(&mut self.fixed, code);
        }
        any
    }
}

/// Repairs a graph within a bounded number of validate/fix iterations.
///
/// The caller's graph is never touched; all edits happen on a private copy that is
/// returned alongside the [`FixResult`].
pub struct Fixer<'c> {
    max_iterations: usize,
    validator: Validator,
    collaborator: Option<&'c dyn Collaborator>,
}

impl Default for Fixer<'_> {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            validator: Validator::new(),
            collaborator: None,
        }
    }
}

impl<'c> Fixer<'c> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.validator.strict = strict;
        self
    }

    /// Consult `collaborator` for orphan and connectivity issues before heuristics.
    pub fn collaborator(mut self, collaborator: &'c dyn Collaborator) -> Self {
        self.collaborator = Some(collaborator);
        self
    }

    /// Repair `graph`. `validation`, when supplied, stands in for the first iteration's check.
    pub fn fix(&self, graph: &Graph, validation: Option<&ValidationResult>) -> (Graph, FixResult) {
        let mut working = graph.clone();
        let mut progress = Progress::default();
        let mut supplied = validation.cloned();
        let mut iterations = 0;

        for iteration in 1..=self.max_iterations {
            let result = match supplied.take() {
                Some(result) => result,
                None => self.validator.validate(&working),
            };
            if result.is_valid && result.is_complete {
                break;
            }
            iterations = iteration;

            let classified = classify(&result.issues);
            tracing::info!(
                iteration,
                max = self.max_iterations,
                auto = classified.auto.len(),
                llm = classified.llm.len(),
                unresolved = classified.unresolved.len(),
                "repair iteration"
            );

            let mut changed = progress.absorb(auto::apply(&mut working, &classified.auto));
            changed |= self.repair_connectivity(&mut working, &classified.llm, &mut progress);

            if !changed {
                tracing::debug!(iteration, "no applicable fixes left");
                break;
            }
        }

        let final_validation = self.validator.validate(&working);
        let mut remaining = Vec::new();
        for issue in &final_validation.issues {
            push_unique(&mut remaining, issue.code);
        }

        let fix_type = if progress.llm_used {
            FixType::Llm
        } else if progress.fallback_used {
            FixType::Fallback
        } else {
            FixType::Auto
        };

        let result = FixResult {
            success: final_validation.is_valid,
            fix_type,
            issues_fixed: progress.fixed,
            issues_remaining: remaining,
            changes_made: progress.changes,
            llm_used: progress.llm_used,
            iterations,
        };
        tracing::info!(
            success = result.success,
            fix_type = ?result.fix_type,
            changes = result.changes_made.len(),
            iterations,
            "repair finished"
        );
        (working, result)
    }

    /// Validate, and repair only when the graph is not already valid and complete.
    pub fn validate_and_fix(&self, graph: &Graph) -> (Graph, ValidationResult, FixResult) {
        let initial = self.validator.validate(graph);
        if initial.is_valid && initial.is_complete {
            return (graph.clone(), initial, FixResult::none());
        }
        let (fixed, result) = self.fix(graph, Some(&initial));
        let final_validation = self.validator.validate(&fixed);
        (fixed, final_validation, result)
    }

    /// Phases B and C. Returns whether anything changed.
    fn repair_connectivity(&self, graph: &mut Graph, issues: &[&Issue], progress: &mut Progress) -> bool {
        let mut orphans = Vec::new();
        let mut connectivity = Vec::new();
        let mut rest = Vec::new();
        for &issue in issues {
            match issue.code {
                IssueCode::OrphanedNode => orphans.push(issue),
                IssueCode::ActorNoOutgoing | IssueCode::DatabaseNoIncoming | IssueCode::IsolatedService => {
                    connectivity.push(issue)
                }
                _ => rest.push(issue),
            }
        }

        // Whole-graph issues have no per-node prompt; they go straight to heuristics.
        let mut changed = self.run_fallback(graph, &rest, progress);
        changed |= self.repair_bucket(graph, Bucket::Orphan, &orphans, progress);
        changed |= self.repair_bucket(graph, Bucket::Connectivity, &connectivity, progress);
        changed
    }

    fn repair_bucket(&self, graph: &mut Graph, bucket: Bucket, issues: &[&Issue], progress: &mut Progress) -> bool {
        let open: Vec<&Issue> = issues.iter().copied().filter(|i| is_open(graph, i)).collect();
        if open.is_empty() {
            return false;
        }

        if let Some(collaborator) = self.collaborator {
            match ask_collaborator(collaborator, graph, bucket, &open) {
                Ok(edges) => {
                    let applied = apply_suggestions(graph, edges, &open);
                    if !applied.is_empty() {
                        progress.llm_used = true;
                        return progress.absorb(applied);
                    }
                    tracing::warn!(bucket = bucket.name(), "suggested edges were all rejected, using heuristics");
                }
                Err(e) => {
                    tracing::warn!(bucket = bucket.name(), error = %e, "collaborator failed, using heuristics");
                }
            }
        }

        self.run_fallback(graph, &open, progress)
    }

    fn run_fallback(&self, graph: &mut Graph, issues: &[&Issue], progress: &mut Progress) -> bool {
        if issues.is_empty() {
            return false;
        }
        let applied = fallback::apply(graph, issues);
        if applied.is_empty() {
            return false;
        }
        progress.fallback_used = true;
        progress.absorb(applied)
    }
}

fn ask_collaborator(
    collaborator: &dyn Collaborator,
    graph: &Graph,
    bucket: Bucket,
    issues: &[&Issue],
) -> Result<Vec<Edge>, AssistError> {
    match bucket {
        Bucket::Orphan => {
            let ids: Vec<&str> = issues.iter().filter_map(|i| i.node_id.as_deref()).collect();
            assist::suggest_for_orphans(collaborator, graph, &ids)
        }
        Bucket::Connectivity => assist::suggest_for_connectivity(collaborator, graph, issues),
    }
}

/// Add suggested edges and credit the issues they resolved.
fn apply_suggestions(graph: &mut Graph, edges: Vec<Edge>, issues: &[&Issue]) -> Applied {
    let mut applied = Applied::default();
    let mut changes = Vec::new();
    for edge in edges {
        let change = format!("Added suggested edge: {} -> {} ({})", edge.source, edge.target, edge.relation);
        if graph.connect(edge) {
            changes.push(change);
        }
    }
    if changes.is_empty() {
        return applied;
    }
    applied.changes = changes;
    for issue in issues {
        if !is_open(graph, issue) {
            push_unique(&mut applied.fixed, issue.code);
        }
    }
    applied
}

/// Validate and repair with default settings.
pub fn validate_and_fix(graph: &Graph, collaborator: Option<&dyn Collaborator>) -> (Graph, ValidationResult, FixResult) {
    let mut fixer = Fixer::new();
    if let Some(collaborator) = collaborator {
        fixer = fixer.collaborator(collaborator);
    }
    fixer.validate_and_fix(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::CollaboratorError;
    use crate::graph::{Node, NodeType};

    fn connected_pair_plus(extra: Node) -> Graph {
        Graph::new(
            vec![
                Node::new("user", "User", NodeType::Actor),
                Node::new("api", "API", NodeType::Service),
                extra,
            ],
            vec![Edge::new("user", "api", "uses")],
        )
    }

    #[test]
    fn already_valid_graph_short_circuits() {
        let g = Graph::new(
            vec![Node::new("user", "User", NodeType::Actor), Node::new("api", "API", NodeType::Service)],
            vec![Edge::new("user", "api", "uses")],
        );
        let (fixed, validation, result) = validate_and_fix(&g, None);
        assert_eq!(fixed, g);
        assert!(validation.is_complete);
        assert_eq!(result.fix_type, FixType::None);
        assert_eq!(result.changes_made, vec!["No fixes needed"]);
    }

    #[test]
    fn zero_iterations_changes_nothing() {
        let g = connected_pair_plus(Node::new("db", "DB", NodeType::Database));
        let (fixed, result) = Fixer::new().max_iterations(0).fix(&g, None);
        assert_eq!(fixed, g);
        assert_eq!(result.iterations, 0);
        assert!(result.changes_made.is_empty());
    }

    #[test]
    fn fallback_marks_fix_type() {
        let g = connected_pair_plus(Node::new("db", "DB", NodeType::Database));
        let (fixed, result) = Fixer::new().fix(&g, None);
        assert!(fixed.has_incoming("db"));
        assert_eq!(result.fix_type, FixType::Fallback);
        assert!(!result.llm_used);
        assert!(result.issues_fixed.contains(&IssueCode::OrphanedNode));
    }

    #[test]
    fn failing_collaborator_degrades_to_heuristics() {
        let failing = |_: &str| -> Result<String, CollaboratorError> { Err(CollaboratorError::Backend("boom".into())) };
        let g = connected_pair_plus(Node::new("db", "DB", NodeType::Database));
        let (fixed, result) = Fixer::new().collaborator(&failing).fix(&g, None);
        assert!(fixed.has_incoming("db"));
        assert!(!result.llm_used);
        assert_eq!(result.fix_type, FixType::Fallback);
    }

    #[test]
    fn accepted_suggestions_mark_llm_used() {
        let scripted = |_: &str| -> Result<String, CollaboratorError> {
            Ok(r#"[{"from":"api","to":"db","relation":"stores orders"}]"#.to_string())
        };
        let g = connected_pair_plus(Node::new("db", "DB", NodeType::Database));
        let (fixed, result) = Fixer::new().collaborator(&scripted).fix(&g, None);
        assert!(fixed.contains_edge(&Edge::new("api", "db", "stores orders").key()));
        assert!(result.llm_used);
        assert_eq!(result.fix_type, FixType::Llm);
        assert!(result.success);
    }

    #[test]
    fn open_issue_tracking() {
        let g = connected_pair_plus(Node::new("db", "DB", NodeType::Database));
        let orphan = Issue::warning(IssueCode::OrphanedNode, "orphan").on_node("db");
        let gone = Issue::warning(IssueCode::OrphanedNode, "orphan").on_node("ghost");
        let actor = Issue::warning(IssueCode::ActorNoOutgoing, "actor").on_node("user");
        assert!(is_open(&g, &orphan));
        assert!(!is_open(&g, &gone));
        assert!(!is_open(&g, &actor));
    }
}
