use super::types::{CallSignal, ChatMessage, EventPayload, Notification};

/// Events the network task raises for the UI.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    MessageReceived(ChatMessage),
    Typing(EventPayload),
    Read(EventPayload),
    Notification(Notification),
    CallSignal(CallSignal),
    /// ERROR frame not tied to a pending send.
    BrokerError(String),
    Disconnected,
}
