use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::events::EventBus;
use crate::generate::CardGenerator;
use crate::store::SetStore;
use crate::study::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    store: Option<Arc<SetStore>>,
    generator: Arc<dyn CardGenerator>,
    events: Arc<EventBus>,
    sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(store: Option<Arc<SetStore>>, generator: Arc<dyn CardGenerator>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            store,
            generator,
            events: Arc::new(EventBus::new()),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn store(&self) -> Option<Arc<SetStore>> {
        self.store.clone()
    }

    pub fn generator(&self) -> Arc<dyn CardGenerator> {
        Arc::clone(&self.generator)
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }
}
