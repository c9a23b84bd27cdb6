use async_trait::async_trait;

use super::{CardGenerator, GenerateError};
use crate::model::CardDraft;

/// Local fallback strategy: one card per non-blank line, front and back
/// separated by the first colon. Both sides are trimmed and must be
/// non-empty; a malformed line fails the whole request.
pub struct LineSplitGenerator;

impl LineSplitGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LineSplitGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CardGenerator for LineSplitGenerator {
    fn name(&self) -> &'static str {
        "split"
    }

    async fn generate(&self, text: &str) -> Result<Vec<CardDraft>, GenerateError> {
        split_lines(text)
    }
}

fn split_lines(text: &str) -> Result<Vec<CardDraft>, GenerateError> {
    let mut drafts = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((front, back)) = line.split_once(':') else {
            return Err(GenerateError::service_with_details(
                "line is not front:back formatted",
                format!("line {}", line_no + 1),
            ));
        };
        let front = front.trim();
        let back = back.trim();
        if front.is_empty() || back.is_empty() {
            return Err(GenerateError::service_with_details(
                "line has an empty front or back",
                format!("line {}", line_no + 1),
            ));
        }
        drafts.push(CardDraft {
            front: front.to_string(),
            back: back.to_string(),
        });
    }

    if drafts.is_empty() {
        return Err(GenerateError::service(
            "no front:back lines found in the input",
        ));
    }
    Ok(drafts)
}
