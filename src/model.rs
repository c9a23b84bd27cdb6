use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The five allowed self-assessment levels, in ascending order.
pub const MASTERY_LEVELS: [u8; 5] = [0, 25, 50, 75, 100];

/// Discrete self-reported recall confidence. Always one of 0/25/50/75/100;
/// construction is fallible and nothing else can produce a value outside
/// that set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MasteryLevel(u8);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid mastery level {0}, expected one of 0/25/50/75/100")]
pub struct InvalidMasteryLevel(pub i64);

impl MasteryLevel {
    pub const ZERO: MasteryLevel = MasteryLevel(0);
    pub const MAX: MasteryLevel = MasteryLevel(100);

    pub fn from_percent(value: i64) -> Result<Self, InvalidMasteryLevel> {
        if (0..=100).contains(&value) && MASTERY_LEVELS.contains(&(value as u8)) {
            Ok(MasteryLevel(value as u8))
        } else {
            Err(InvalidMasteryLevel(value))
        }
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    pub fn is_max(self) -> bool {
        self.0 == 100
    }
}

impl Default for MasteryLevel {
    fn default() -> Self {
        MasteryLevel::ZERO
    }
}

impl TryFrom<u8> for MasteryLevel {
    type Error = InvalidMasteryLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MasteryLevel::from_percent(value as i64)
    }
}

impl From<MasteryLevel> for u8 {
    fn from(level: MasteryLevel) -> u8 {
        level.0
    }
}

/// A front/back pair produced by a generation strategy, before any save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDraft {
    pub front: String,
    pub back: String,
}

/// A study card. `id` is assigned by the set store at save time and is
/// `None` for a generated card that was never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub front: String,
    pub back: String,
    pub mastery: MasteryLevel,
    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn from_draft(draft: CardDraft) -> Self {
        Self {
            id: None,
            front: draft.front,
            back: draft.back,
            mastery: MasteryLevel::ZERO,
            created_at: Utc::now(),
        }
    }
}

/// A named, owned collection of cards persisted together. Card order is
/// presentation order and is stable once created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Set {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub cards: Vec<Card>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_the_five_levels() {
        for value in MASTERY_LEVELS {
            assert_eq!(
                MasteryLevel::from_percent(value as i64).unwrap().percent(),
                value
            );
        }
        for value in [-25, 1, 10, 60, 99, 101, 250] {
            assert!(MasteryLevel::from_percent(value).is_err());
        }
    }

    #[test]
    fn serde_rejects_out_of_range() {
        let ok: MasteryLevel = serde_json::from_str("75").unwrap();
        assert_eq!(ok.percent(), 75);
        assert!(serde_json::from_str::<MasteryLevel>("60").is_err());
    }

    #[test]
    fn draft_becomes_untouched_card() {
        let card = Card::from_draft(CardDraft {
            front: "Paris".into(),
            back: "Capital of France".into(),
        });
        assert!(card.id.is_none());
        assert_eq!(card.mastery, MasteryLevel::ZERO);
    }
}
