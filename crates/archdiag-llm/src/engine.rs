use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use archdiag_core::CollaboratorError;

use crate::settings::AiSettings;

/// Low temperature: the reply must be a parseable edge list, not prose.
const TEMPERATURE: f32 = 0.2;

pub fn map_backend(provider: &str) -> Result<LLMBackend, CollaboratorError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(CollaboratorError::UnknownProvider(other.to_string())),
    }
}

pub async fn generate(settings: &AiSettings, system: &str, user_msg: &str) -> Result<String, CollaboratorError> {
    let backend = map_backend(&settings.provider)?;

    let mut builder = LLMBuilder::new()
        .backend(backend)
        .model(&settings.model)
        .system(system)
        .temperature(TEMPERATURE);

    if !settings.api_key.is_empty() {
        builder = builder.api_key(&settings.api_key);
    }
    if let Some(url) = &settings.base_url {
        builder = builder.base_url(url);
    }

    let llm = builder
        .build()
        .map_err(|e| CollaboratorError::Unavailable(format!("build LLM: {e}")))?;

    let messages = vec![ChatMessage::user().content(user_msg).build()];

    let response = llm
        .chat(&messages)
        .await
        .map_err(|e| CollaboratorError::Backend(format!("chat: {e}")))?;

    match response.text() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(CollaboratorError::EmptyResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_providers() {
        for provider in ["openai", "anthropic", "google", "ollama", "groq", "mistral", "deepseek"] {
            assert!(map_backend(provider).is_ok(), "{provider}");
        }
    }

    #[test]
    fn rejects_unknown_provider() {
        match map_backend("watson") {
            Err(CollaboratorError::UnknownProvider(name)) => assert_eq!(name, "watson"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }
}
