//! Real-time chat client for the social backend: a STOMP-over-WebSocket
//! session with delivery receipts and duplicate suppression, the REST calls
//! around it, and the conversation state a front end renders.

pub mod api;
pub mod common;
pub mod config;
pub mod error;
pub mod network;
pub mod session;
pub mod ui;

pub use error::{ChatError, Result};
pub use session::{ChatSession, SessionConfig};
