use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::api::client::Credential;
use crate::api::events::{ClientEvent, ServerEvent};
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Cloneable view of the push channel's connectivity flag. Consumed by the
/// deliverer (transport selection), the poller (interval selection) and any
/// connectivity indicator, so nothing re-derives connect/disconnect state on
/// its own.
#[derive(Debug, Clone)]
pub struct ConnectivitySignal(Arc<AtomicBool>);

impl ConnectivitySignal {
    pub(crate) fn new(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }

    pub fn is_up(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outbound view of the push channel, handed to the deliverer.
pub trait PushLink {
    fn is_connected(&self) -> bool;
    /// Emit a message over the push channel. Fails fast with
    /// [`ChatError::Disconnected`] instead of buffering while down.
    fn send_message(&self, recipient_id: &str, content: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PushHandle {
    connected: Arc<AtomicBool>,
    outbound: mpsc::Sender<ClientEvent>,
}

impl PushLink for PushHandle {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_message(&self, recipient_id: &str, content: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(ChatError::Disconnected);
        }
        self.outbound
            .try_send(ClientEvent::SendMessage {
                recipient_id: recipient_id.to_string(),
                content: content.to_string(),
            })
            .map_err(|_| ChatError::Disconnected)
    }
}

/// Owns the push channel lifecycle: connect, authenticate, join the active
/// room, forward inbound events, and reconnect forever after drops. Failures
/// only flip the connectivity flag; the durable API and the poller carry the
/// session while the socket is down.
pub struct ConnectionManager {
    ws_url: String,
    credential: Credential,
    reconnect_delay: Duration,
    connected: Arc<AtomicBool>,
    room: Arc<Mutex<Option<String>>>,
    outbound_tx: Option<mpsc::Sender<ClientEvent>>,
    shutdown: Arc<AtomicBool>,
    driver: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(config: &ChatConfig, credential: Credential) -> Result<Self> {
        let ws_url = config.ws_endpoint();
        Url::parse(&ws_url)?;
        Ok(Self {
            ws_url,
            credential,
            reconnect_delay: config.reconnect_delay(),
            connected: Arc::new(AtomicBool::new(false)),
            room: Arc::new(Mutex::new(None)),
            outbound_tx: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            driver: None,
        })
    }

    /// Spawn the driver task and return the inbound event stream. Must be
    /// called from within a tokio runtime. Calling again tears down the
    /// previous driver first.
    pub fn connect(&mut self) -> mpsc::Receiver<ServerEvent> {
        self.disconnect();
        self.shutdown = Arc::new(AtomicBool::new(false));

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.outbound_tx = Some(outbound_tx);

        self.driver = Some(tokio::spawn(drive(
            self.ws_url.clone(),
            self.credential.clone(),
            self.connected.clone(),
            self.room.clone(),
            outbound_rx,
            events_tx,
            self.shutdown.clone(),
            self.reconnect_delay,
        )));
        events_rx
    }

    /// Scope inbound delivery to one counterpart. The room is remembered and
    /// re-joined after every reconnect; switching rooms rescopes event
    /// routing without tearing down the socket.
    pub fn join_room(&self, counterpart_id: &str) {
        *self.room.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(counterpart_id.to_string());
        if self.is_connected() {
            if let Some(tx) = &self.outbound_tx {
                let _ = tx.try_send(ClientEvent::JoinRoom {
                    counterpart_id: counterpart_id.to_string(),
                });
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn signal(&self) -> ConnectivitySignal {
        ConnectivitySignal::new(self.connected.clone())
    }

    pub fn push_handle(&self) -> PushHandle {
        let outbound = self.outbound_tx.clone().unwrap_or_else(|| {
            // Not connected yet; hand out a closed channel so sends fail fast.
            let (tx, _rx) = mpsc::channel(1);
            tx
        });
        PushHandle {
            connected: self.connected.clone(),
            outbound,
        }
    }

    /// Stop the driver and mark the channel down. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.outbound_tx = None;
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[allow(clippy::too_many_arguments)]
async fn drive(
    ws_url: String,
    credential: Credential,
    connected: Arc<AtomicBool>,
    room: Arc<Mutex<Option<String>>>,
    mut outbound_rx: mpsc::Receiver<ClientEvent>,
    events_tx: mpsc::Sender<ServerEvent>,
    shutdown: Arc<AtomicBool>,
    reconnect_delay: Duration,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match connect_async(ws_url.as_str()).await {
            Ok((socket, _)) => {
                log::info!("push channel connected");
                let keep_running = run_socket(
                    socket,
                    &credential,
                    &connected,
                    &room,
                    &mut outbound_rx,
                    &events_tx,
                )
                .await;
                connected.store(false, Ordering::SeqCst);
                log::info!("push channel disconnected");
                if !keep_running {
                    break;
                }
            }
            Err(err) => {
                log::warn!("push channel connect failed: {err}");
            }
        }
        if shutdown.load(Ordering::SeqCst) || events_tx.is_closed() {
            break;
        }
        tokio::time::sleep(reconnect_delay).await;
    }
    connected.store(false, Ordering::SeqCst);
}

/// Run one established socket until it drops. Returns false when the session
/// itself is over (the manager or its consumer went away).
async fn run_socket(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    credential: &Credential,
    connected: &Arc<AtomicBool>,
    room: &Arc<Mutex<Option<String>>>,
    outbound_rx: &mut mpsc::Receiver<ClientEvent>,
    events_tx: &mpsc::Sender<ServerEvent>,
) -> bool {
    let (mut sink, mut stream) = socket.split();

    let auth = ClientEvent::Auth {
        token: credential.token(),
    };
    if send_event(&mut sink, &auth).await.is_err() {
        return true;
    }
    // Flag first, then re-join: a room selected while the join below is in
    // flight lands on the outbound channel instead of getting lost, and a
    // doubled join is harmless.
    connected.store(true, Ordering::SeqCst);
    let current_room = room.lock().unwrap_or_else(PoisonError::into_inner).clone();
    if let Some(counterpart_id) = current_room {
        let join = ClientEvent::JoinRoom { counterpart_id };
        if send_event(&mut sink, &join).await.is_err() {
            return true;
        }
    }

    loop {
        tokio::select! {
            command = outbound_rx.recv() => match command {
                Some(event) => {
                    if send_event(&mut sink, &event).await.is_err() {
                        return true;
                    }
                }
                None => return false,
            },
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if events_tx.send(event).await.is_err() {
                                return false;
                            }
                        }
                        Err(err) => log::debug!("ignoring unrecognized push frame: {err}"),
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => return true,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    log::warn!("push channel read error: {err}");
                    return true;
                }
            }
        }
    }
}

async fn send_event<S>(sink: &mut S, event: &ClientEvent) -> std::result::Result<(), ()>
where
    S: futures::Sink<WsMessage> + Unpin,
{
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(err) => {
            log::warn!("failed to encode push event: {err}");
            return Ok(());
        }
    };
    sink.send(WsMessage::Text(payload)).await.map_err(|_| ())
}
