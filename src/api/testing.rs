use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use chrono::Utc;

use crate::api::ChatApi;
use crate::api::models::{ContactSummary, CurrentUser, Message};
use crate::attachment;
use crate::error::{ChatError, Result};

/// In-memory stand-in for the backend. Mimics the real server closely
/// enough for deliverer/poller/session tests: durable sends land in the
/// history log, and uploads create the `FILE:`-encoded message server-side.
pub(crate) struct FakeApi {
    pub history_log: Mutex<Vec<Message>>,
    pub history_calls: AtomicUsize,
    pub sent: Mutex<Vec<(String, String)>>,
    pub uploads: Mutex<Vec<(String, String)>>,
    pub read_marks: Mutex<Vec<String>>,
    pub contact_rows: Mutex<Vec<ContactSummary>>,
    pub fail_send: AtomicBool,
    pub fail_upload: AtomicBool,
    pub fail_history: AtomicBool,
    self_id: String,
    seq: AtomicU64,
}

impl FakeApi {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            history_log: Mutex::new(Vec::new()),
            history_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            read_marks: Mutex::new(Vec::new()),
            contact_rows: Mutex::new(Vec::new()),
            fail_send: AtomicBool::new(false),
            fail_upload: AtomicBool::new(false),
            fail_history: AtomicBool::new(false),
            self_id: self_id.into(),
            seq: AtomicU64::new(1),
        }
    }

    pub fn seed_history(&self, message: Message) {
        self.history_log.lock().unwrap().push(message);
    }

    fn next_id(&self) -> String {
        format!("srv-{}", self.seq.fetch_add(1, Ordering::SeqCst))
    }
}

impl ChatApi for FakeApi {
    async fn history(&self, _counterpart_id: &str) -> Result<Vec<Message>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(ChatError::Status(500));
        }
        Ok(self.history_log.lock().unwrap().clone())
    }

    async fn send_text(&self, recipient_id: &str, content: &str) -> Result<Message> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(ChatError::Status(500));
        }
        let message = Message {
            id: self.next_id(),
            sender_id: self.self_id.clone(),
            recipient_id: recipient_id.to_string(),
            body: content.to_string(),
            created_at: Utc::now(),
            read: false,
        };
        self.history_log.lock().unwrap().push(message.clone());
        self.sent
            .lock()
            .unwrap()
            .push((recipient_id.to_string(), content.to_string()));
        Ok(message)
    }

    async fn upload(&self, recipient_id: &str, filename: &str, _bytes: Vec<u8>) -> Result<String> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(ChatError::Status(500));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((recipient_id.to_string(), filename.to_string()));
        self.history_log.lock().unwrap().push(Message {
            id: self.next_id(),
            sender_id: self.self_id.clone(),
            recipient_id: recipient_id.to_string(),
            body: attachment::encode(filename),
            created_at: Utc::now(),
            read: false,
        });
        Ok(filename.to_string())
    }

    async fn mark_read(&self, counterpart_id: &str) -> Result<()> {
        self.read_marks
            .lock()
            .unwrap()
            .push(counterpart_id.to_string());
        Ok(())
    }

    async fn contacts(&self, _user: &CurrentUser) -> Result<Vec<ContactSummary>> {
        Ok(self.contact_rows.lock().unwrap().clone())
    }
}
