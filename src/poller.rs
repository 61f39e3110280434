use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::api::ChatApi;
use crate::connection::ConnectivitySignal;
use crate::store::{MessageStore, lock};

#[derive(Debug, Clone, Copy)]
pub struct PollIntervals {
    /// Cadence while the push channel is up: a relaxed backstop.
    pub connected: Duration,
    /// Cadence while the push channel is down: the only delivery path.
    pub disconnected: Duration,
}

/// Re-fetches conversation history on a timer and merges it into the store.
/// Push delivery is not trusted to be complete, so this runs alongside the
/// push channel the whole time, backing off while the socket is healthy.
#[derive(Debug, Default)]
pub struct PollingFallback {
    handle: Option<JoinHandle<()>>,
}

impl PollingFallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling one conversation. The first fetch happens immediately,
    /// which doubles as history hydration on conversation switch. The task
    /// owns its own handles to the store and key, so a tick that is already
    /// in flight when the conversation changes can only ever touch the store
    /// it was started with.
    pub fn start<A>(
        &mut self,
        api: Arc<A>,
        signal: ConnectivitySignal,
        counterpart_id: String,
        store: Arc<Mutex<MessageStore>>,
        intervals: PollIntervals,
    ) where
        A: ChatApi + Send + Sync + 'static,
    {
        self.stop();
        self.handle = Some(tokio::spawn(async move {
            loop {
                match api.history(&counterpart_id).await {
                    Ok(batch) => lock(&store).merge(batch),
                    Err(err) => {
                        log::warn!("history poll for {counterpart_id} failed: {err}");
                    }
                }
                let wait = if signal.is_up() {
                    intervals.connected
                } else {
                    intervals.disconnected
                };
                tokio::time::sleep(wait).await;
            }
        }));
    }

    /// Stop polling. Must be called on conversation switch and teardown so
    /// no timer keeps firing against a stale key.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for PollingFallback {
    fn drop(&mut self) {
        self.stop();
    }
}
