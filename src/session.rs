//! Session registry for the SSE transport.
//!
//! Every open `/sse` stream owns exactly one [`Session`]. POSTs to
//! `/messages?session_id=...` push their JSON-RPC responses into the session's
//! queue through the shared [`SessionRegistry`]; the stream drains it.

use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session closed: {0}")]
    Closed(String),
}

/// Outcome of waiting on a session queue
#[derive(Debug)]
pub enum Delivery {
    Message(Value),
    Idle,
    Closed,
}

/// Process-wide map from session id to the producing end of its queue
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, mpsc::UnboundedSender<Value>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session with an empty queue.
    pub fn create(&self) -> Session {
        let (sender, receiver) = mpsc::unbounded_channel();

        loop {
            let id = Uuid::new_v4().to_string();
            match self.sessions.entry(id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(sender);
                    info!("Session created: {} (live sessions: {})", id, self.len());
                    return Session {
                        id,
                        receiver,
                        registry: self.clone(),
                    };
                }
            }
        }
    }

    /// Push a message onto a live session's queue.
    pub fn enqueue(&self, id: &str, message: Value) -> Result<(), SessionError> {
        let result = match self.sessions.get(id) {
            Some(sender) => sender
                .send(message)
                .map_err(|_| SessionError::Closed(id.to_string())),
            None => return Err(SessionError::NotFound(id.to_string())),
        };

        if result.is_err() {
            // Consumer is gone but its guard has not run yet
            self.remove(id);
        } else {
            trace!("Message queued for session {}", id);
        }

        result
    }

    /// Forget a session. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &str) {
        if self.sessions.remove(id).is_some() {
            debug!("Session removed: {}", id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every queue so that all live streams run to completion.
    pub fn close_all(&self) {
        let count = self.sessions.len();
        self.sessions.clear();
        info!("Closed {} live sessions", count);
    }
}

/// One client's session: its id and the consuming end of its queue.
///
/// Dropping the session removes it from the registry, whichever way the owning
/// stream ends.
#[derive(Debug)]
pub struct Session {
    id: String,
    receiver: mpsc::UnboundedReceiver<Value>,
    registry: SessionRegistry,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Relative URI the client must POST its messages to.
    pub fn endpoint_uri(&self) -> String {
        format!("/messages?session_id={}", self.id)
    }

    /// Wait for the next queued message, giving up after `idle` without one.
    pub async fn next_delivery(&mut self, idle: Duration) -> Delivery {
        match tokio::time::timeout(idle, self.receiver.recv()).await {
            Ok(Some(message)) => Delivery::Message(message),
            Ok(None) => Delivery::Closed,
            Err(_) => Delivery::Idle,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
        info!("Cleaned up session {}", self.id);
    }
}
