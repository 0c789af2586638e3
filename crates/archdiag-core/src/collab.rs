use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("collaborator returned empty text")]
    EmptyResponse,
}

/// External text generator consulted for semantic repairs.
///
/// Calls block until the backend answers or its own timeout fires. Failures are
/// ordinary values: the fixer falls back to heuristics instead of propagating them.
pub trait Collaborator {
    fn generate(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

impl<F> Collaborator for F
where
    F: Fn(&str) -> Result<String, CollaboratorError>,
{
    fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        self(prompt)
    }
}
