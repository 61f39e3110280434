use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::api::ChatApi;
use crate::api::client::{ApiClient, Credential};
use crate::api::events::ServerEvent;
use crate::api::models::{ContactSummary, CurrentUser, Message};
use crate::attachment::{self, Attachment};
use crate::config::ChatConfig;
use crate::connection::{ConnectionManager, PushHandle};
use crate::deliverer::{Compose, Deliverer};
use crate::directory;
use crate::error::{ChatError, Result};
use crate::poller::PollingFallback;
use crate::store::{MessageStore, lock};

/// One user's chat surface: the active conversation, its message store, the
/// push channel and the polling backstop, wired together the way the
/// individual pieces expect. A client instance drives exactly one session,
/// and a session has at most one active conversation at a time.
pub struct ChatSession<A: ChatApi + Send + Sync + 'static> {
    api: Arc<A>,
    config: ChatConfig,
    user: CurrentUser,
    connection: ConnectionManager,
    events_rx: mpsc::Receiver<ServerEvent>,
    deliverer: Deliverer<A, PushHandle>,
    poller: PollingFallback,
    active: Option<String>,
    store: Arc<Mutex<MessageStore>>,
    pub compose: Compose,
    online: HashSet<String>,
}

impl ChatSession<ApiClient> {
    /// Build a live session against the configured backend. Must be called
    /// from within a tokio runtime; the push channel starts connecting
    /// immediately.
    pub fn open(config: ChatConfig, user: CurrentUser, token: &str) -> Result<Self> {
        let credential = Credential::new(token);
        let api = Arc::new(ApiClient::new(&config, credential.clone())?);
        let connection = ConnectionManager::new(&config, credential)?;
        Ok(Self::new(api, config, user, connection))
    }
}

impl<A: ChatApi + Send + Sync + 'static> ChatSession<A> {
    pub fn new(
        api: Arc<A>,
        config: ChatConfig,
        user: CurrentUser,
        mut connection: ConnectionManager,
    ) -> Self {
        let events_rx = connection.connect();
        let deliverer = Deliverer::new(
            api.clone(),
            connection.push_handle(),
            user.id.clone(),
            config.max_upload_bytes,
        );
        Self {
            api,
            config,
            user,
            connection,
            events_rx,
            deliverer,
            poller: PollingFallback::new(),
            active: None,
            store: Arc::new(Mutex::new(MessageStore::new(""))),
            compose: Compose::default(),
            online: HashSet::new(),
        }
    }

    pub fn user(&self) -> &CurrentUser {
        &self.user
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn active_conversation(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The selectable counterparts for this user, deduplicated and ordered.
    pub async fn contacts(&self) -> Result<Vec<ContactSummary>> {
        directory::list(self.api.as_ref(), &self.user).await
    }

    /// Make a counterpart the active conversation. The previous poller is
    /// stopped first so nothing keeps firing against the old key, the push
    /// room is rescoped, and the new poller's immediate first tick hydrates
    /// history into a fresh store. A stale response from the previous
    /// conversation can only reach the store it was started with, which is
    /// discarded here.
    pub fn select_conversation(&mut self, counterpart_id: &str) {
        self.poller.stop();
        self.active = Some(counterpart_id.to_string());
        self.store = Arc::new(Mutex::new(MessageStore::new(counterpart_id)));
        self.compose = Compose::default();
        self.connection.join_room(counterpart_id);
        self.poller.start(
            self.api.clone(),
            self.connection.signal(),
            counterpart_id.to_string(),
            self.store.clone(),
            self.config.poll_intervals(),
        );
    }

    /// Drain pending push events. Messages for the active counterpart merge
    /// into the store; anything else is dropped, since the poller re-fetches
    /// a conversation's history whenever it becomes active.
    pub fn pump_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                ServerEvent::ReceiveMessage(message) => {
                    let mut guard = lock(&self.store);
                    let belongs = {
                        let key = guard.key();
                        !key.is_empty()
                            && (message.sender_id == key || message.recipient_id == key)
                    };
                    if belongs {
                        guard.merge(vec![message]);
                    } else {
                        log::debug!("dropping push message outside the active conversation");
                    }
                }
                ServerEvent::OnlineUsers { users } => {
                    self.online = users.into_iter().collect();
                }
                ServerEvent::Unknown => {}
            }
        }
    }

    /// Send the current compose state to the active counterpart.
    pub async fn send(&mut self) -> Result<()> {
        let Some(counterpart_id) = self.active.clone() else {
            return Err(ChatError::NoConversation);
        };
        self.deliverer
            .send(&self.store, &counterpart_id, &mut self.compose)
            .await
    }

    /// Snapshot of the active conversation, ascending by time.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.store).messages().to_vec()
    }

    /// Render-time attachment view of a message body.
    pub fn attachment(&self, message: &Message) -> Option<Attachment> {
        attachment::decode(&message.body, &self.config.asset_base())
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    /// Tell the server the active conversation has been read and flip the
    /// local flags.
    pub async fn mark_read(&mut self) -> Result<()> {
        let Some(counterpart_id) = self.active.clone() else {
            return Ok(());
        };
        self.api.mark_read(&counterpart_id).await?;
        lock(&self.store).mark_all_read(&self.user.id);
        Ok(())
    }

    /// Tear down the poller and the push channel. Called on view teardown;
    /// dropping the session does the same.
    pub fn close(&mut self) {
        self.poller.stop();
        self.connection.disconnect();
        self.active = None;
    }
}
