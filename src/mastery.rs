use serde::Serialize;

use crate::model::{Card, MasteryLevel};

/// Display emphasis bucket for a set-level mastery percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryTier {
    Low,
    Medium,
    High,
}

/// Rounded arithmetic mean of the per-card mastery values, 0 for an empty
/// list. Pure; used identically for live sessions and stored set summaries.
pub fn aggregate(cards: &[Card]) -> u8 {
    aggregate_levels(cards.iter().map(|card| card.mastery))
}

pub fn aggregate_levels(levels: impl IntoIterator<Item = MasteryLevel>) -> u8 {
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for level in levels {
        sum += level.percent() as u64;
        count += 1;
    }
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u8
}

/// Thresholds are exact: `< 50` low, `50..=79` medium, `>= 80` high.
pub fn tier(percentage: u8) -> MasteryTier {
    match percentage {
        0..=49 => MasteryTier::Low,
        50..=79 => MasteryTier::Medium,
        _ => MasteryTier::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn card(mastery: i64) -> Card {
        Card {
            id: None,
            front: "front".into(),
            back: "back".into(),
            mastery: MasteryLevel::from_percent(mastery).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_list_aggregates_to_zero() {
        assert_eq!(aggregate(&[]), 0);
    }

    #[test]
    fn mean_is_rounded() {
        assert_eq!(aggregate(&[card(0), card(100)]), 50);
        assert_eq!(aggregate(&[card(25), card(50), card(75)]), 50);
        assert_eq!(aggregate(&[card(25), card(25), card(100)]), 50);
        assert_eq!(aggregate(&[card(100), card(100), card(0)]), 67);
    }

    #[test]
    fn tier_thresholds_are_exact() {
        assert_eq!(tier(0), MasteryTier::Low);
        assert_eq!(tier(49), MasteryTier::Low);
        assert_eq!(tier(50), MasteryTier::Medium);
        assert_eq!(tier(79), MasteryTier::Medium);
        assert_eq!(tier(80), MasteryTier::High);
        assert_eq!(tier(100), MasteryTier::High);
    }
}
