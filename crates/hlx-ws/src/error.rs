//! WebSocket error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    /// A second subscriber attempted to attach to a singleton feed.
    #[error("already subscribed to singleton feed: {0}")]
    DuplicateSingletonSubscription(String),

    /// Operation requires a live connection.
    #[error("websocket is not connected")]
    NotConnected,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("transport error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type WsResult<T> = Result<T, WsError>;
