use serde::{Serialize, Serializer};
use std::fmt;

use crate::graph::EdgeKey;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The diagram will not render correctly.
    Error,
    /// Renders, but something is structurally off.
    Warning,
    /// Suggestion for improvement.
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// Machine-readable issue code. Serialized as the SCREAMING_SNAKE name.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    EmptyDiagram,
    NoNodes,
    NoEdges,
    DuplicateNodeId,
    EmptyLabel,
    OrphanedNode,
    MissingSourceNode,
    MissingTargetNode,
    SelfLoop,
    DuplicateEdge,
    MissingLayer,
    CircularDependency,
    ActorNoOutgoing,
    DatabaseNoIncoming,
    IsolatedService,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::EmptyDiagram => "EMPTY_DIAGRAM",
            IssueCode::NoNodes => "NO_NODES",
            IssueCode::NoEdges => "NO_EDGES",
            IssueCode::DuplicateNodeId => "DUPLICATE_NODE_ID",
            IssueCode::EmptyLabel => "EMPTY_LABEL",
            IssueCode::OrphanedNode => "ORPHANED_NODE",
            IssueCode::MissingSourceNode => "MISSING_SOURCE_NODE",
            IssueCode::MissingTargetNode => "MISSING_TARGET_NODE",
            IssueCode::SelfLoop => "SELF_LOOP",
            IssueCode::DuplicateEdge => "DUPLICATE_EDGE",
            IssueCode::MissingLayer => "MISSING_LAYER",
            IssueCode::CircularDependency => "CIRCULAR_DEPENDENCY",
            IssueCode::ActorNoOutgoing => "ACTOR_NO_OUTGOING",
            IssueCode::DatabaseNoIncoming => "DATABASE_NO_INCOMING",
            IssueCode::IsolatedService => "ISOLATED_SERVICE",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structural defect found by the validator.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Issue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    pub node_id: Option<String>,
    /// The offending edge, rendered as `source -> target` in serialized output.
    #[serde(rename = "edge_info", serialize_with = "edge_info")]
    pub edge: Option<EdgeKey>,
    pub suggestion: Option<String>,
    /// Node path of a detected cycle, closed (first id repeated at the end).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycle: Vec<String>,
}

fn edge_info<S: Serializer>(edge: &Option<EdgeKey>, s: S) -> Result<S::Ok, S::Error> {
    match edge {
        Some(key) => s.serialize_some(&key.to_string()),
        None => s.serialize_none(),
    }
}

impl Issue {
    pub fn new(severity: Severity, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            node_id: None,
            edge: None,
            suggestion: None,
            cycle: Vec::new(),
        }
    }

    pub fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn info(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    pub fn on_node(mut self, id: impl Into<String>) -> Self {
        self.node_id = Some(id.into());
        self
    }

    pub fn on_edge(mut self, key: EdgeKey) -> Self {
        self.edge = Some(key);
        self
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_cycle(mut self, cycle: Vec<String>) -> Self {
        self.cycle = cycle;
        self
    }
}
