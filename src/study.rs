use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::events::{EventBus, MasterySaveFailedPayload, StudyEvent};
use crate::model::MasteryLevel;
use crate::session::StudySession;
use crate::store::SetStore;

#[derive(Debug, Error)]
pub enum SessionAccessError {
    #[error("study session not found")]
    NotFound,
    #[error("study session belongs to another user")]
    Forbidden,
}

/// In-memory home of live study sessions, keyed by a generated id. Each
/// session is owned by the identity that opened it; the lock serializes
/// overlapping operations from one session, and no await happens while it
/// is held.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, StudySession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a fresh, empty session for `owner_id` and return its id.
    pub fn create(&self, owner_id: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .insert(id.clone(), StudySession::new(owner_id));
        id
    }

    pub fn with_session<T>(
        &self,
        id: &str,
        owner_id: &str,
        f: impl FnOnce(&StudySession) -> T,
    ) -> Result<T, SessionAccessError> {
        let sessions = self.sessions.read();
        let session = sessions.get(id).ok_or(SessionAccessError::NotFound)?;
        if session.owner_id() != owner_id {
            return Err(SessionAccessError::Forbidden);
        }
        Ok(f(session))
    }

    pub fn with_session_mut<T>(
        &self,
        id: &str,
        owner_id: &str,
        f: impl FnOnce(&mut StudySession) -> T,
    ) -> Result<T, SessionAccessError> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(id).ok_or(SessionAccessError::NotFound)?;
        if session.owner_id() != owner_id {
            return Err(SessionAccessError::Forbidden);
        }
        Ok(f(session))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Detached persistence of a recorded mastery value. The caller's response
/// never waits on this: the in-memory value is already updated, and a
/// failed write is reported once on the event bus instead of rolling
/// anything back.
pub fn spawn_mastery_persist(
    store: Arc<SetStore>,
    events: Arc<EventBus>,
    owner_id: String,
    session_id: String,
    set_id: String,
    card_id: String,
    level: MasteryLevel,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = store
            .update_card_mastery(&owner_id, &set_id, &card_id, level)
            .await
        {
            tracing::warn!(
                error = %err,
                set_id = %set_id,
                card_id = %card_id,
                "mastery persistence failed, keeping local value"
            );
            events.publish(StudyEvent::MasterySaveFailed(MasterySaveFailedPayload {
                owner_id,
                session_id,
                set_id,
                card_id,
                level: level.percent(),
                reason: err.to_string(),
                timestamp: Utc::now(),
            }));
        }
    })
}
