use tokio::sync::oneshot;

use crate::error::ChatError;

use super::types::{CallSignal, ClientRef};

/// Commands the UI hands to the network task.
#[derive(Debug)]
pub enum SessionCommand {
    /// Text message to a user. `reply` resolves once the broker acknowledges
    /// the frame carrying `client_ref`, or with the reason it did not.
    SendText {
        receiver: String,
        content: String,
        client_ref: ClientRef,
        reply: oneshot::Sender<Result<(), ChatError>>,
    },
    Typing {
        receiver: Option<String>,
        group_id: Option<i64>,
    },
    Read {
        receiver: String,
        message_id: Option<i64>,
        group_id: Option<i64>,
    },
    CallSignal(CallSignal),
    /// Disconnect without draining in-flight sends.
    Close,
}
