pub mod commands;
pub mod events;
pub mod types;

pub use commands::SessionCommand;
pub use events::SessionEvent;
pub use types::{
    CallSignal, CallSignalType, ChatMessage, ClientRef, Comment, ConversationSummary, EntryId,
    EventPayload, Listing, Notification, SocketEvent, SocketEventType,
};
