use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 1024;

/// Events the study engine's host publishes for the presentation layer.
/// The engine itself never touches this bus; it reports outcomes and the
/// host decides what to announce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum StudyEvent {
    /// A card was rated at the maximum level. Fired once per rating call,
    /// so rating 100 twice celebrates twice.
    #[serde(rename = "CARD_MASTERED")]
    CardMastered(CardMasteredPayload),

    /// The detached mastery write failed; the in-memory value was kept.
    #[serde(rename = "MASTERY_SAVE_FAILED")]
    MasterySaveFailed(MasterySaveFailedPayload),
}

impl StudyEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            StudyEvent::CardMastered(_) => "CARD_MASTERED",
            StudyEvent::MasterySaveFailed(_) => "MASTERY_SAVE_FAILED",
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            StudyEvent::CardMastered(p) => &p.owner_id,
            StudyEvent::MasterySaveFailed(p) => &p.owner_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMasteredPayload {
    pub owner_id: String,
    pub session_id: String,
    pub set_id: Option<String>,
    pub card_index: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterySaveFailedPayload {
    pub owner_id: String,
    pub session_id: String,
    pub set_id: String,
    pub card_id: String,
    pub level: u8,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub id: String,
    pub event: StudyEvent,
    pub created_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: StudyEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            created_at: Utc::now(),
        }
    }
}

/// Broadcast fan-out for study events. Receivers filter by owner; a send
/// with no listeners is fine, the event is simply dropped.
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: StudyEvent) {
        let envelope = EventEnvelope::new(event);
        let event_type = envelope.event.event_type();
        if self.sender.send(envelope).is_err() {
            debug!(event_type, "no subscribers for study event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mastered(owner: &str) -> StudyEvent {
        StudyEvent::CardMastered(CardMasteredPayload {
            owner_id: owner.to_string(),
            session_id: "session-1".to_string(),
            set_id: None,
            card_index: 0,
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish(mastered("user-1"));

        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.event.event_type(), "CARD_MASTERED");
        assert_eq!(envelope.event.owner_id(), "user-1");
    }

    #[tokio::test]
    async fn repeated_max_ratings_are_not_deduplicated() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish(mastered("user-1"));
        bus.publish(mastered("user-1"));

        receiver.recv().await.unwrap();
        receiver.recv().await.unwrap();
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(mastered("user-1"));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
