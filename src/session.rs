use crate::mastery::aggregate_levels;
use crate::model::{Card, InvalidMasteryLevel, MasteryLevel};

/// Outcome of a successful `record_mastery` call, handed to the host so it
/// can publish the celebration event and schedule the detached store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasteryRecorded {
    pub index: usize,
    pub card_id: Option<String>,
    pub level: MasteryLevel,
    /// True whenever the recorded level is 100. Deliberately reported on
    /// every call, so repeated taps at 100 re-trigger the celebration.
    pub maxed: bool,
}

/// Transient cursor/flip/mastery state for one study pass over a card list.
///
/// The engine is synchronous and self-contained: persistence and the
/// celebration hook are the caller's job, driven by the values returned
/// from `record_mastery`. `epoch` guards against a stale async load
/// overwriting a newer one.
#[derive(Debug)]
pub struct StudySession {
    owner_id: String,
    set_id: Option<String>,
    cards: Vec<Card>,
    cursor: usize,
    flipped: bool,
    mastery: Vec<MasteryLevel>,
    epoch: u64,
}

impl StudySession {
    /// A session with no cards; the terminal "no cards" display state until
    /// a `load` supplies content.
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            set_id: None,
            cards: Vec::new(),
            cursor: 0,
            flipped: false,
            mastery: Vec::new(),
            epoch: 0,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn set_id(&self) -> Option<&str> {
        self.set_id.as_deref()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn flipped(&self) -> bool {
        self.flipped
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn mastery_at(&self, index: usize) -> Option<MasteryLevel> {
        self.mastery.get(index).copied()
    }

    /// Replace the card list. Cursor returns to the first card, the card
    /// shows its front, and the mastery mirror is seeded from each card's
    /// stored value. An empty list is legal and leaves navigation as a
    /// no-op.
    pub fn load(&mut self, set_id: Option<String>, cards: Vec<Card>) {
        self.mastery = cards.iter().map(|card| card.mastery).collect();
        self.cards = cards;
        self.set_id = set_id;
        self.cursor = 0;
        self.flipped = false;
        self.epoch += 1;
    }

    /// Apply an asynchronously fetched load only if no newer `load` has
    /// happened since `observed_epoch` was captured. Returns false when the
    /// response is stale and was discarded.
    pub fn load_if_current(
        &mut self,
        observed_epoch: u64,
        set_id: Option<String>,
        cards: Vec<Card>,
    ) -> bool {
        if self.epoch != observed_epoch {
            return false;
        }
        self.load(set_id, cards);
        true
    }

    /// Toggle between front and back. No side effects; defined even with no
    /// cards loaded.
    pub fn flip(&mut self) {
        self.flipped = !self.flipped;
    }

    /// Advance to the next card, showing its front. Saturates at the last
    /// card: the no-op case leaves `flipped` untouched as well.
    pub fn next(&mut self) -> bool {
        if self.cursor + 1 < self.cards.len() {
            self.cursor += 1;
            self.flipped = false;
            true
        } else {
            false
        }
    }

    /// Step back to the previous card, showing its front. Saturates at the
    /// first card.
    pub fn previous(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.flipped = false;
            true
        } else {
            false
        }
    }

    /// Record a self-assessment for the current card. The value must be one
    /// of the five levels; anything else is a caller defect and leaves the
    /// mirror untouched. Mastery moves freely in both directions. With no
    /// cards loaded the call validates the level and is otherwise a no-op.
    pub fn record_mastery(
        &mut self,
        value: i64,
    ) -> Result<Option<MasteryRecorded>, InvalidMasteryLevel> {
        let level = MasteryLevel::from_percent(value)?;
        let index = self.cursor;
        let Some(slot) = self.mastery.get_mut(index) else {
            return Ok(None);
        };
        *slot = level;
        Ok(Some(MasteryRecorded {
            index,
            card_id: self.cards[index].id.clone(),
            level,
            maxed: level.is_max(),
        }))
    }

    pub fn current_card(&self) -> Option<&Card> {
        self.cards.get(self.cursor)
    }

    /// `(cursor + 1) / len` for display, 0 when no cards are loaded.
    pub fn progress_fraction(&self) -> f64 {
        if self.cards.is_empty() {
            0.0
        } else {
            (self.cursor + 1) as f64 / self.cards.len() as f64
        }
    }

    /// Set-level mastery over the live mirror, not the stored card values.
    pub fn set_mastery(&self) -> u8 {
        aggregate_levels(self.mastery.iter().copied())
    }
}
