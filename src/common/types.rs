use std::fmt;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation id attached to every optimistic entry and echoed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientRef(String);

impl ClientRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientRef {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ClientRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ClientRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a displayed entry: a provisional placeholder (current time in
/// milliseconds) until the server assigns a real id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryId {
    Provisional(i64),
    Server(i64),
}

impl EntryId {
    pub fn provisional_now() -> Self {
        Self::Provisional(Local::now().timestamp_millis())
    }

    pub fn server_id(&self) -> Option<i64> {
        match self {
            Self::Server(id) => Some(*id),
            Self::Provisional(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    pub reaction: String,
}

/// Domain model of a chat message, as the backend serializes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<i64>,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_profile_image: Option<String>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_url: Option<String>,
    #[serde(default, rename = "isRead", alias = "read")]
    pub is_read: bool,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<ClientRef>,
}

impl ChatMessage {
    /// Receiver username for direct messages, group id for group messages.
    pub fn recipient_key(&self) -> String {
        match (&self.receiver, self.group_id) {
            (Some(receiver), _) => receiver.clone(),
            (None, Some(group_id)) => group_id.to_string(),
            (None, None) => String::new(),
        }
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SocketEventType {
    Typing,
    Read,
}

/// Body of a typing/read signal. In both directions `receiver` names the
/// other party: the peer on send, the typing user or reader on delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub receiver: Option<String>,
    #[serde(default)]
    pub message_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketEvent {
    #[serde(rename = "type")]
    pub kind: SocketEventType,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub id: Option<i64>,
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub reference_id: Option<i64>,
    #[serde(default)]
    pub actor_username: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallSignalType {
    Offer,
    Answer,
    Ice,
    End,
}

/// Peer-connection signaling relayed through the broker. The payload is
/// opaque to this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSignal {
    #[serde(rename = "type")]
    pub kind: CallSignalType,
    pub target_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub author_username: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<ClientRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub username: String,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

/// Collection endpoints answer either with a Spring page (newest first) or
/// with a plain chronological array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page { content: Vec<T> },
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_chronological(self) -> Vec<T> {
        match self {
            Self::Page { mut content } => {
                content.reverse();
                content
            }
            Self::Plain(items) => items,
        }
    }

    /// Items in the order the server sent them.
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Page { content } => content,
            Self::Plain(items) => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_accepts_server_shape_with_null_id() {
        let json = r#"{
            "id": null,
            "sender": "alice",
            "receiver": "bob",
            "content": "hello",
            "imageUrl": null,
            "read": false,
            "createdAt": "2024-05-01T10:00:00.123"
        }"#;
        let msg: ChatMessage = serde_json::from_str(json).expect("parse");
        assert_eq!(msg.id, None);
        assert_eq!(msg.recipient_key(), "bob");
        assert!(!msg.is_read);
        assert!(msg.reactions.is_empty());
        assert!(msg.client_ref.is_none());
    }

    #[test]
    fn group_message_keys_by_group_id() {
        let json = r#"{"id": 7, "sender": "alice", "groupId": 12, "content": "hi",
                      "isRead": true, "createdAt": "2024-05-01T10:00:00"}"#;
        let msg: ChatMessage = serde_json::from_str(json).expect("parse");
        assert_eq!(msg.recipient_key(), "12");
        assert!(msg.is_read);
    }

    #[test]
    fn socket_event_uses_upper_case_type() {
        let json = r#"{"type":"READ","payload":{"receiver":"bob","messageId":41,"groupId":null}}"#;
        let event: SocketEvent = serde_json::from_str(json).expect("parse");
        assert_eq!(event.kind, SocketEventType::Read);
        assert_eq!(event.payload.message_id, Some(41));
    }

    #[test]
    fn page_listing_is_reversed_plain_is_kept() {
        let page: Listing<i64> = serde_json::from_str(r#"{"content":[3,2,1],"last":true}"#).unwrap();
        assert_eq!(page.into_chronological(), vec![1, 2, 3]);

        let plain: Listing<i64> = serde_json::from_str("[1,2,3]").unwrap();
        assert_eq!(plain.into_chronological(), vec![1, 2, 3]);
    }

    #[test]
    fn client_refs_are_unique() {
        assert_ne!(ClientRef::new(), ClientRef::new());
    }

    #[test]
    fn client_ref_travels_as_a_plain_string() {
        let client_ref = ClientRef::new();
        let json = serde_json::to_value(&client_ref).unwrap();
        assert_eq!(json, serde_json::Value::String(client_ref.to_string()));

        let echoed: ClientRef = serde_json::from_value(json).unwrap();
        assert_eq!(echoed, client_ref);
    }
}
