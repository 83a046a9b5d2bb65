pub mod app;
pub mod comments;
pub mod components;
pub mod notifications;
pub mod state;
pub mod typing;

pub use app::ChatApp;
pub use comments::CommentThread;
pub use notifications::NotificationFeed;
pub use state::{ConversationTarget, ConversationView, Delivery, ReadReceipt, ViewEntry};
pub use typing::{TypingIndicator, TypingThrottle};
