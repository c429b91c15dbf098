//! Committed-change notifications.
//!
//! Events are published only after the store has committed the mutation, so
//! a subscriber that re-reads a thread always sees at least that state.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{ThreadId, UserId};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ThreadEvent {
    Created {
        thread_id: ThreadId,
        creator_id: UserId,
    },
    Updated { thread_id: ThreadId },
    Deleted { thread_id: ThreadId, by_admin: bool },
    JoinRequested {
        thread_id: ThreadId,
        user_id: UserId,
    },
    RequestResolved {
        thread_id: ThreadId,
        user_id: UserId,
        approved: bool,
    },
    MessagePosted {
        thread_id: ThreadId,
        user_id: UserId,
    },
}

impl ThreadEvent {
    pub fn thread_id(&self) -> ThreadId {
        match self {
            ThreadEvent::Created { thread_id, .. }
            | ThreadEvent::Updated { thread_id }
            | ThreadEvent::Deleted { thread_id, .. }
            | ThreadEvent::JoinRequested { thread_id, .. }
            | ThreadEvent::RequestResolved { thread_id, .. }
            | ThreadEvent::MessagePosted { thread_id, .. } => *thread_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ThreadEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ThreadEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, event: ThreadEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}
