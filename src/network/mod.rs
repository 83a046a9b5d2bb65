pub mod client;
pub mod dedup;
pub mod dispatcher;
pub mod stomp;
pub mod transport;

pub use client::ChatClient;
pub use dedup::FingerprintFilter;
pub use dispatcher::{Channel, InboundDispatcher};
pub use stomp::{Command, Frame, FrameError};
