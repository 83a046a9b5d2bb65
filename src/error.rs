use thiserror::Error;

use crate::network::stomp::FrameError;

/// Errors surfaced by the chat session, the REST client and configuration.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed STOMP frame: {0}")]
    Frame(#[from] FrameError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid bearer token")]
    InvalidToken,

    #[error("no bearer token configured; run `login` first or set SOCIAL_TOKEN")]
    MissingToken,

    #[error("broker refused the connection: {0}")]
    ConnectRefused(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("broker rejected message {client_ref}: {reason}")]
    SendRejected { client_ref: String, reason: String },

    #[error("no receipt for message {0} before the deadline")]
    AckTimeout(String),

    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, ChatError>;
