use async_trait::async_trait;
use serde::Deserialize;

use super::{CardGenerator, GenerateError};
use crate::llm::LlmClient;
use crate::model::CardDraft;

const SYSTEM_PROMPT: &str = "You are a flashcard creator. You take in text and create multiple \
flashcards from it. Make sure to create exactly 10 flashcards. Both front and back should be one \
sentence long. You should return in the following JSON format:\n\
{\n  \"flashcards\": [\n    {\n      \"front\": \"Front of the card\",\n      \"back\": \"Back of the card\"\n    }\n  ]\n}";

/// Language-model strategy: one chat-completion call with a fixed system
/// prompt, expecting strict `{"flashcards": [{front, back}]}` JSON back.
/// The response length is taken as authoritative; any shape violation
/// rejects the whole response.
pub struct LlmGenerator {
    client: LlmClient,
}

impl LlmGenerator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CardGenerator for LlmGenerator {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn generate(&self, text: &str) -> Result<Vec<CardDraft>, GenerateError> {
        let content = self
            .client
            .complete_with_system(SYSTEM_PROMPT, text)
            .await
            .map_err(|err| {
                GenerateError::service_with_details("flashcard generation failed", err.to_string())
            })?;

        parse_flashcards(&content)
    }
}

#[derive(Debug, Deserialize)]
struct FlashcardsDocument {
    flashcards: Vec<FlashcardItem>,
}

#[derive(Debug, Deserialize)]
struct FlashcardItem {
    front: String,
    back: String,
}

/// Parse the model's reply. All-or-nothing: a missing `flashcards` array,
/// a non-object item, or an empty front/back rejects the entire response.
fn parse_flashcards(content: &str) -> Result<Vec<CardDraft>, GenerateError> {
    let body = strip_code_fence(content);

    let document: FlashcardsDocument = serde_json::from_str(body).map_err(|err| {
        GenerateError::service_with_details(
            "generation service returned unparseable content",
            err.to_string(),
        )
    })?;

    if document.flashcards.is_empty() {
        return Err(GenerateError::service(
            "generation service returned no flashcards",
        ));
    }

    let mut drafts = Vec::with_capacity(document.flashcards.len());
    for (index, item) in document.flashcards.into_iter().enumerate() {
        let front = item.front.trim().to_string();
        let back = item.back.trim().to_string();
        if front.is_empty() || back.is_empty() {
            return Err(GenerateError::service_with_details(
                "generation service returned a card with an empty side",
                format!("card {}", index + 1),
            ));
        }
        drafts.push(CardDraft { front, back });
    }
    Ok(drafts)
}

/// Models occasionally wrap the JSON object in a markdown code fence even
/// when asked for a bare object; accept both.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_strict_document() {
        let cards = parse_flashcards(
            r#"{"flashcards": [{"front": "Paris", "back": "Capital of France"}]}"#,
        )
        .unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].front, "Paris");
    }

    #[test]
    fn response_length_is_authoritative() {
        let items: Vec<String> = (0..7)
            .map(|i| format!(r#"{{"front": "q{i}", "back": "a{i}"}}"#))
            .collect();
        let doc = format!(r#"{{"flashcards": [{}]}}"#, items.join(","));
        assert_eq!(parse_flashcards(&doc).unwrap().len(), 7);
    }

    #[test]
    fn rejects_missing_flashcards_array() {
        assert!(parse_flashcards(r#"{"cards": []}"#).is_err());
        assert!(parse_flashcards(r#"{"flashcards": "nope"}"#).is_err());
    }

    #[test]
    fn rejects_items_missing_a_side() {
        assert!(parse_flashcards(r#"{"flashcards": [{"front": "only"}]}"#).is_err());
        assert!(parse_flashcards(r#"{"flashcards": [{"front": "q", "back": "  "}]}"#).is_err());
    }

    #[test]
    fn rejects_non_json_prose() {
        assert!(parse_flashcards("Here are your flashcards!").is_err());
    }

    #[test]
    fn accepts_fenced_json() {
        let cards = parse_flashcards(
            "```json\n{\"flashcards\": [{\"front\": \"q\", \"back\": \"a\"}]}\n```",
        )
        .unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(parse_flashcards(r#"{"flashcards": []}"#).is_err());
    }
}
