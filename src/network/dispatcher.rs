use serde::de::DeserializeOwned;

use crate::common::{
    CallSignal, ChatMessage, Notification, SessionEvent, SocketEvent, SocketEventType,
};

use super::dedup::FingerprintFilter;
use super::stomp::{Command, Frame};

/// Private per-user queues multiplexed over the one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Messages,
    Events,
    Notifications,
    Calls,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Messages,
        Channel::Events,
        Channel::Notifications,
        Channel::Calls,
    ];

    pub fn destination(&self) -> &'static str {
        match self {
            Self::Messages => "/user/queue/messages",
            Self::Events => "/user/queue/events",
            Self::Notifications => "/user/queue/notifications",
            Self::Calls => "/user/queue/call",
        }
    }

    pub fn subscription_id(&self) -> &'static str {
        match self {
            Self::Messages => "sub-0",
            Self::Events => "sub-1",
            Self::Notifications => "sub-2",
            Self::Calls => "sub-3",
        }
    }

    pub fn subscribe_frame(&self) -> Frame {
        Frame::new(Command::Subscribe)
            .header("id", self.subscription_id())
            .header("destination", self.destination())
            .header("ack", "auto")
    }

    fn for_frame(frame: &Frame) -> Option<Self> {
        if let Some(sub) = frame.get("subscription") {
            if let Some(channel) = Self::ALL.iter().find(|c| c.subscription_id() == sub) {
                return Some(*channel);
            }
        }
        let destination = frame.get("destination")?;
        Self::ALL
            .iter()
            .find(|c| c.destination() == destination)
            .copied()
    }
}

/// Turns MESSAGE frames into UI events. Owns the connection's
/// de-duplication state.
#[derive(Debug, Default)]
pub struct InboundDispatcher {
    filter: FingerprintFilter,
}

impl InboundDispatcher {
    pub fn new() -> Self {
        Self {
            filter: FingerprintFilter::new(),
        }
    }

    pub fn dispatch(&mut self, frame: &Frame) -> Option<SessionEvent> {
        if frame.command != Command::Message {
            return None;
        }
        let Some(channel) = Channel::for_frame(frame) else {
            log::debug!(
                "Dropping frame for unknown destination {:?}",
                frame.get("destination")
            );
            return None;
        };
        if frame.body.trim().is_empty() {
            return None;
        }

        match channel {
            Channel::Messages => {
                let message: ChatMessage = parse_body(channel, &frame.body)?;
                if self.filter.admit(&message) {
                    Some(SessionEvent::MessageReceived(message))
                } else {
                    log::debug!("Suppressed duplicate message from {}", message.sender);
                    None
                }
            }
            Channel::Events => {
                let event: SocketEvent = parse_body(channel, &frame.body)?;
                Some(match event.kind {
                    SocketEventType::Typing => SessionEvent::Typing(event.payload),
                    SocketEventType::Read => SessionEvent::Read(event.payload),
                })
            }
            Channel::Notifications => {
                let notification: Notification = parse_body(channel, &frame.body)?;
                Some(SessionEvent::Notification(notification))
            }
            Channel::Calls => {
                let signal: CallSignal = parse_body(channel, &frame.body)?;
                Some(SessionEvent::CallSignal(signal))
            }
        }
    }
}

fn parse_body<T: DeserializeOwned>(channel: Channel, body: &str) -> Option<T> {
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(err) => {
            log::error!(
                "Failed to parse frame on {}: {err}; body={body}",
                channel.destination()
            );
            None
        }
    }
}
