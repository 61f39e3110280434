//! Real-time messaging core for the Haki legal-services marketplace client.
//!
//! Conversations are addressed by the counterpart's user id rather than a
//! stored conversation object. Delivery rides a WebSocket push channel when
//! it is up and falls back to the durable REST API when it is not, with a
//! polling backstop running either way; [`store::MessageStore`] reconciles
//! whatever arrives into one ordered, duplicate-free sequence.

pub mod api;
pub mod attachment;
pub mod config;
pub mod connection;
pub mod deliverer;
pub mod directory;
pub mod error;
pub mod poller;
pub mod session;
pub mod store;

pub use api::ChatApi;
pub use api::client::{ApiClient, Credential};
pub use api::events::{ClientEvent, ServerEvent};
pub use api::models::{ContactSummary, CurrentUser, Message, UserRole};
pub use attachment::{Attachment, AttachmentKind, FILE_MARKER};
pub use config::ChatConfig;
pub use connection::{ConnectionManager, ConnectivitySignal, PushHandle, PushLink};
pub use deliverer::{Compose, Deliverer, StagedFile};
pub use error::{ChatError, Result};
pub use poller::{PollIntervals, PollingFallback};
pub use session::ChatSession;
pub use store::MessageStore;
