use crate::issue::{Issue, IssueCode};

/// Which repair tier can handle an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixClass {
    /// Deterministic rewrite, no external dependency.
    Auto,
    /// Needs semantic judgment: LLM first, heuristics as fallback.
    Llm,
    /// Nothing repairs it; surfaces in `issues_remaining`.
    Unresolved,
}

pub const AUTO_FIXABLE: [IssueCode; 6] = [
    IssueCode::DuplicateNodeId,
    IssueCode::DuplicateEdge,
    IssueCode::MissingSourceNode,
    IssueCode::MissingTargetNode,
    IssueCode::SelfLoop,
    IssueCode::EmptyLabel,
];

pub const LLM_FIXABLE: [IssueCode; 6] = [
    IssueCode::OrphanedNode,
    IssueCode::NoEdges,
    IssueCode::ActorNoOutgoing,
    IssueCode::DatabaseNoIncoming,
    IssueCode::IsolatedService,
    IssueCode::CircularDependency,
];

impl IssueCode {
    pub fn fix_class(&self) -> FixClass {
        if AUTO_FIXABLE.contains(self) {
            FixClass::Auto
        } else if LLM_FIXABLE.contains(self) {
            FixClass::Llm
        } else {
            FixClass::Unresolved
        }
    }
}

/// Issues partitioned by repair tier. The three lists are disjoint.
#[derive(Debug, Clone, Default)]
pub struct Classified<'a> {
    pub auto: Vec<&'a Issue>,
    pub llm: Vec<&'a Issue>,
    pub unresolved: Vec<&'a Issue>,
}

pub fn classify(issues: &[Issue]) -> Classified<'_> {
    let mut out = Classified::default();
    for issue in issues {
        match issue.code.fix_class() {
            FixClass::Auto => out.auto.push(issue),
            FixClass::Llm => out.llm.push(issue),
            FixClass::Unresolved => out.unresolved.push(issue),
        }
    }
    out
}
