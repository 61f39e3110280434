use thiserror::Error;

/// Errors surfaced at the operation boundaries of the messaging core.
///
/// Network failures are caught where they happen (send, upload, fetch) and
/// mapped onto these variants so callers always get a recoverable state
/// instead of a crashed view.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("push channel error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("push channel is not connected")]
    Disconnected,

    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("file upload failed: {0}")]
    Upload(String),

    #[error("message send failed: {0}")]
    Send(String),

    #[error("no active conversation selected")]
    NoConversation,
}

pub type Result<T> = std::result::Result<T, ChatError>;
