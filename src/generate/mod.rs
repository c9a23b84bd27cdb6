mod line_split;
mod llm;

pub use line_split::LineSplitGenerator;
pub use llm::LlmGenerator;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::LlmClient;
use crate::model::CardDraft;

#[derive(Debug, Error)]
pub enum GenerateError {
    /// No study text was provided. Raised before any strategy runs; the
    /// generation service itself is never invoked.
    #[error("no study text provided")]
    EmptyInput,

    /// The generation service failed or returned content that does not
    /// match the expected shape. All-or-nothing: no partial card lists.
    #[error("{reason}")]
    Service {
        reason: String,
        details: Option<String>,
    },
}

impl GenerateError {
    pub fn service(reason: impl Into<String>) -> Self {
        GenerateError::Service {
            reason: reason.into(),
            details: None,
        }
    }

    pub fn service_with_details(reason: impl Into<String>, details: impl Into<String>) -> Self {
        GenerateError::Service {
            reason: reason.into(),
            details: Some(details.into()),
        }
    }
}

/// A strategy that turns raw study text into an ordered list of candidate
/// cards. The returned sequence's length is authoritative; callers must
/// not assume any fixed count. Input is guaranteed non-blank (see
/// [`generate_cards`]).
#[async_trait]
pub trait CardGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, text: &str) -> Result<Vec<CardDraft>, GenerateError>;
}

/// Entry point used by callers: rejects blank input locally, then defers
/// to the configured strategy.
pub async fn generate_cards(
    generator: &dyn CardGenerator,
    text: &str,
) -> Result<Vec<CardDraft>, GenerateError> {
    if text.trim().is_empty() {
        return Err(GenerateError::EmptyInput);
    }
    generator.generate(text).await
}

/// Pick the active strategy: an explicit `GENERATOR_STRATEGY=llm|split`
/// wins; otherwise the language-model path when an API key is configured,
/// the local line-split fallback when not.
pub fn generator_from_env() -> Arc<dyn CardGenerator> {
    let client = LlmClient::from_env();
    let strategy = std::env::var("GENERATOR_STRATEGY")
        .ok()
        .map(|v| v.trim().to_ascii_lowercase());

    match strategy.as_deref() {
        Some("split") => Arc::new(LineSplitGenerator::new()),
        Some("llm") => Arc::new(LlmGenerator::new(client)),
        _ => {
            if client.is_available() {
                Arc::new(LlmGenerator::new(client))
            } else {
                tracing::info!("LLM not configured, using line-split generation");
                Arc::new(LineSplitGenerator::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_input_never_reaches_the_strategy() {
        struct Panicking;

        #[async_trait]
        impl CardGenerator for Panicking {
            fn name(&self) -> &'static str {
                "panicking"
            }

            async fn generate(&self, _text: &str) -> Result<Vec<CardDraft>, GenerateError> {
                panic!("strategy must not be invoked for blank input");
            }
        }

        let err = generate_cards(&Panicking, "   \n\t ").await.unwrap_err();
        assert!(matches!(err, GenerateError::EmptyInput));
    }
}
