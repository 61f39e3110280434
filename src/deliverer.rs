use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::api::ChatApi;
use crate::api::models::{LOCAL_ID_PREFIX, Message};
use crate::connection::PushLink;
use crate::error::{ChatError, Result};
use crate::store::{MessageStore, lock};

/// Compose-field state owned by the conversation view. The deliverer clears
/// it on a successful local append and restores the text when a send fails.
#[derive(Debug, Default, Clone)]
pub struct Compose {
    pub text: String,
    pub attachment: Option<StagedFile>,
}

#[derive(Debug, Clone)]
pub struct StagedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Takes a send intent (text and/or one staged attachment) and moves it over
/// the best available transport: the attachment goes through the durable
/// upload endpoint first, then the text rides the push channel when it is up
/// and the durable send endpoint otherwise. Text is appended optimistically
/// before any confirmation and rolled back on failure.
pub struct Deliverer<A, P> {
    api: Arc<A>,
    push: P,
    sender_id: String,
    max_upload_bytes: u64,
    seq: AtomicU64,
}

impl<A: ChatApi, P: PushLink> Deliverer<A, P> {
    pub fn new(api: Arc<A>, push: P, sender_id: impl Into<String>, max_upload_bytes: u64) -> Self {
        Self {
            api,
            push,
            sender_id: sender_id.into(),
            max_upload_bytes,
            seq: AtomicU64::new(1),
        }
    }

    pub async fn send(
        &self,
        store: &Mutex<MessageStore>,
        recipient_id: &str,
        compose: &mut Compose,
    ) -> Result<()> {
        let text = compose.text.trim().to_string();
        if text.is_empty() && compose.attachment.is_none() {
            return Ok(());
        }

        // Attachment first: the text send must not go out if the upload
        // fails, and compose state stays intact so the user can retry.
        if let Some(staged) = &compose.attachment {
            if staged.bytes.len() as u64 > self.max_upload_bytes {
                return Err(ChatError::Upload(format!(
                    "{} exceeds the {} byte upload limit",
                    staged.filename, self.max_upload_bytes
                )));
            }
            self.api
                .upload(recipient_id, &staged.filename, staged.bytes.clone())
                .await
                .map_err(|err| ChatError::Upload(err.to_string()))?;
            compose.attachment = None;

            // The backend wrote the FILE: message; pull history so it shows
            // up without waiting for the next poll tick.
            match self.api.history(recipient_id).await {
                Ok(batch) => lock(store).merge(batch),
                Err(err) => log::warn!("history refresh after upload failed: {err}"),
            }
        }

        if text.is_empty() {
            compose.text.clear();
            return Ok(());
        }

        let local = self.optimistic(recipient_id, &text);
        let local_id = local.id.clone();
        lock(store).append(local);
        // Input latency reads as zero: compose clears on the local append,
        // not on server confirmation.
        compose.text.clear();

        if self.push.is_connected() {
            if let Err(err) = self.push.send_message(recipient_id, &text) {
                self.rollback(store, &local_id, compose, text);
                return Err(ChatError::Send(err.to_string()));
            }
        } else {
            match self.api.send_text(recipient_id, &text).await {
                // The durable response already carries the persisted message;
                // reconcile now instead of waiting for the next poll.
                Ok(confirmed) => lock(store).reconcile(&local_id, confirmed),
                Err(err) => {
                    self.rollback(store, &local_id, compose, text);
                    return Err(ChatError::Send(err.to_string()));
                }
            }
        }
        Ok(())
    }

    fn optimistic(&self, recipient_id: &str, text: &str) -> Message {
        Message {
            id: format!("{LOCAL_ID_PREFIX}{}", self.seq.fetch_add(1, Ordering::SeqCst)),
            sender_id: self.sender_id.clone(),
            recipient_id: recipient_id.to_string(),
            body: text.to_string(),
            created_at: Utc::now(),
            read: true,
        }
    }

    fn rollback(
        &self,
        store: &Mutex<MessageStore>,
        local_id: &str,
        compose: &mut Compose,
        text: String,
    ) {
        lock(store).remove(local_id);
        compose.text = text;
    }
}
