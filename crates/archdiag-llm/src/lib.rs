//! `llm`-crate backed [`Collaborator`] for the archdiag repair engine.
//!
//! The repair loop is synchronous, so each request runs on a private
//! current-thread tokio runtime and is cut off after the configured timeout.

pub mod engine;
pub mod settings;

use std::time::Duration;

use archdiag_core::{Collaborator, CollaboratorError};

pub use settings::{AiSettings, SettingsError};

const SYSTEM_PROMPT: &str = "You repair software architecture diagrams. \
You answer with a JSON array of edges and nothing else.";

pub struct LlmCollaborator {
    settings: AiSettings,
    runtime: tokio::runtime::Runtime,
}

impl LlmCollaborator {
    pub fn new(settings: AiSettings) -> Result<Self, CollaboratorError> {
        if !settings.ai_configured() {
            return Err(CollaboratorError::Unavailable(format!(
                "provider '{}' is not configured (model and API key required)",
                settings.provider
            )));
        }
        engine::map_backend(&settings.provider)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CollaboratorError::Unavailable(format!("tokio runtime: {e}")))?;

        Ok(Self { settings, runtime })
    }

    /// Collaborator from the settings file and environment.
    pub fn from_env() -> Result<Self, CollaboratorError> {
        let settings = AiSettings::load().map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        Self::new(settings)
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_secs)
    }
}

impl Collaborator for LlmCollaborator {
    fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let timeout = self.timeout();
        tracing::info!(
            provider = %self.settings.provider,
            model = %self.settings.model,
            timeout_secs = timeout.as_secs(),
            "requesting suggestions"
        );

        let request = engine::generate(&self.settings, SYSTEM_PROMPT, prompt);
        let outcome = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, request).await });

        match outcome {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_provider_is_unavailable() {
        let settings = AiSettings {
            provider: "openai".to_string(),
            ..AiSettings::default()
        };
        assert!(matches!(
            LlmCollaborator::new(settings),
            Err(CollaboratorError::Unavailable(_))
        ));
    }

    #[test]
    fn unknown_provider_is_rejected_up_front() {
        let settings = AiSettings {
            provider: "ollama-ish".to_string(),
            api_key: "k".to_string(),
            ..AiSettings::default()
        };
        assert!(matches!(
            LlmCollaborator::new(settings),
            Err(CollaboratorError::UnknownProvider(_))
        ));
    }

    #[test]
    fn default_settings_build_a_collaborator() {
        let collaborator = LlmCollaborator::new(AiSettings::default()).unwrap();
        assert_eq!(collaborator.timeout(), Duration::from_secs(settings::DEFAULT_TIMEOUT_SECS));
    }
}
