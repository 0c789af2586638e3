//! Structural validation and repair for architecture diagrams.
//!
//! A [`Graph`] coming out of upstream extraction is checked by the [`Validator`]
//! and, when it falls short, repaired by the [`Fixer`]: deterministic rewrites
//! first, then connectivity repairs through an optional [`Collaborator`] with
//! heuristic fallback.

pub mod assist;
pub mod classify;
pub mod collab;
pub mod fixer;
pub mod graph;
pub mod issue;
pub mod rules;
pub mod validator;

pub use classify::{classify, Classified, FixClass};
pub use collab::{Collaborator, CollaboratorError};
pub use fixer::{validate_and_fix, FixResult, FixType, Fixer, DEFAULT_MAX_ITERATIONS};
pub use graph::{Edge, EdgeKey, EdgeStyle, Graph, Layer, Node, NodeType};
pub use issue::{Issue, IssueCode, Severity};
pub use validator::{validate, Stats, ValidationResult, Validator};
