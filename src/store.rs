use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::api::models::Message;

/// Ordered, append-only message sequence for one conversation, keyed by the
/// counterpart's user id. Push delivery, poll results and optimistic local
/// appends all funnel through here; ordering and deduplication live in this
/// one place so the transports never have to coordinate.
#[derive(Debug)]
pub struct MessageStore {
    counterpart_id: String,
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new(counterpart_id: impl Into<String>) -> Self {
        Self {
            counterpart_id: counterpart_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.counterpart_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Insert a message, keeping ascending `created_at` order. Ties keep
    /// arrival order.
    pub fn append(&mut self, message: Message) {
        let at = self
            .messages
            .partition_point(|m| m.created_at <= message.created_at);
        self.messages.insert(at, message);
    }

    /// Merge a batch from the push channel or a poll. Idempotent: a message
    /// already present (by id, or by the optimistic composite key) is never
    /// inserted twice.
    pub fn merge(&mut self, batch: Vec<Message>) {
        for incoming in batch {
            if let Some(pos) = self.messages.iter().position(|m| m.id == incoming.id) {
                // Same id twice with different bodies should not happen;
                // let the later copy win and keep going.
                if self.messages[pos].body != incoming.body {
                    log::warn!(
                        "message {} arrived with a conflicting body; keeping the later copy",
                        incoming.id
                    );
                    self.messages.remove(pos);
                    self.append(incoming);
                }
                continue;
            }

            if !incoming.is_local() {
                if let Some(pos) = self.optimistic_match(&incoming) {
                    // Server-confirmed counterpart of an optimistic entry:
                    // adopt the server copy wholesale.
                    self.messages.remove(pos);
                    self.append(incoming);
                    continue;
                }
            }

            self.append(incoming);
        }
    }

    /// Replace a known optimistic entry with its server-confirmed message.
    /// Used when the durable send path already returned the persisted copy.
    pub fn reconcile(&mut self, local_id: &str, confirmed: Message) {
        self.remove(local_id);
        self.merge(vec![confirmed]);
    }

    /// Drop a message by id (optimistic rollback). Returns the removed entry.
    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let pos = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(pos))
    }

    /// Best-effort read flags: everything the counterpart sent is now read.
    pub fn mark_all_read(&mut self, viewer_id: &str) {
        for message in &mut self.messages {
            if message.sender_id != viewer_id {
                message.read = true;
            }
        }
    }

    /// Optimistic entries lack a server id, so their confirmation is matched
    /// on sender + body + minute-truncated timestamp.
    fn optimistic_match(&self, incoming: &Message) -> Option<usize> {
        self.messages.iter().position(|m| {
            m.is_local()
                && m.sender_id == incoming.sender_id
                && m.body == incoming.body
                && minute_bucket(m.created_at) == minute_bucket(incoming.created_at)
        })
    }
}

fn minute_bucket(at: DateTime<Utc>) -> i64 {
    at.timestamp() / 60
}

/// Lock helper shared by everything that mutates a store concurrently. A
/// poisoned lock still yields the data; messages are plain values and a
/// panicked peer cannot leave them half-written.
pub(crate) fn lock(store: &Mutex<MessageStore>) -> MutexGuard<'_, MessageStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}
