use chrono::Local;
use tokio::time::Instant;

use crate::common::{ChatMessage, ClientRef, EntryId, EventPayload};

use super::typing::TypingIndicator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationTarget {
    Direct(String),
    Group(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Pending,
    Sent,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ViewEntry {
    pub id: EntryId,
    pub client_ref: Option<ClientRef>,
    pub message: ChatMessage,
    pub delivery: Delivery,
}

impl ViewEntry {
    fn from_server(message: ChatMessage) -> Self {
        let id = match message.id {
            Some(id) => EntryId::Server(id),
            None => EntryId::provisional_now(),
        };
        Self {
            id,
            client_ref: message.client_ref.clone(),
            message,
            delivery: Delivery::Sent,
        }
    }
}

/// Read acknowledgement to send for the newest inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReceipt {
    pub receiver: String,
    /// `None` for live messages the server pushed without an id; the peer
    /// then treats everything it sent as read.
    pub message_id: Option<i64>,
    pub group_id: Option<i64>,
}

/// Messages of one open conversation as the local user sees them.
#[derive(Debug)]
pub struct ConversationView {
    me: String,
    target: ConversationTarget,
    entries: Vec<ViewEntry>,
    last_acknowledged: Option<i64>,
    typing: TypingIndicator,
}

impl ConversationView {
    pub fn new(me: impl Into<String>, target: ConversationTarget) -> Self {
        Self {
            me: me.into(),
            target,
            entries: Vec::new(),
            last_acknowledged: None,
            typing: TypingIndicator::new(),
        }
    }

    pub fn me(&self) -> &str {
        &self.me
    }

    pub fn target(&self) -> &ConversationTarget {
        &self.target
    }

    pub fn entries(&self) -> &[ViewEntry] {
        &self.entries
    }

    pub fn accepts(&self, message: &ChatMessage) -> bool {
        match &self.target {
            ConversationTarget::Group(group_id) => message.group_id == Some(*group_id),
            ConversationTarget::Direct(peer) => {
                if message.group_id.is_some() {
                    return false;
                }
                let receiver = message.receiver.as_deref();
                (message.sender == *peer && receiver == Some(self.me.as_str()))
                    || (message.sender == self.me && receiver == Some(peer.as_str()))
            }
        }
    }

    /// Appends the optimistic entry for an outgoing text and returns the
    /// correlation id the send must carry.
    pub fn begin_send(&mut self, content: &str) -> ClientRef {
        let client_ref = ClientRef::new();
        let (receiver, group_id) = match &self.target {
            ConversationTarget::Direct(peer) => (Some(peer.clone()), None),
            ConversationTarget::Group(id) => (None, Some(*id)),
        };
        let message = ChatMessage {
            id: None,
            sender: self.me.clone(),
            sender_profile_image: None,
            receiver,
            group_id,
            content: Some(content.to_string()),
            image_url: None,
            voice_url: None,
            is_read: false,
            reactions: Vec::new(),
            created_at: Local::now().naive_local(),
            client_ref: Some(client_ref.clone()),
        };
        self.entries.push(ViewEntry {
            id: EntryId::provisional_now(),
            client_ref: Some(client_ref.clone()),
            message,
            delivery: Delivery::Pending,
        });
        client_ref
    }

    pub fn mark_sent(&mut self, client_ref: &ClientRef) -> bool {
        self.settle(client_ref, Delivery::Sent)
    }

    pub fn mark_failed(&mut self, client_ref: &ClientRef, reason: impl Into<String>) -> bool {
        self.settle(client_ref, Delivery::Failed(reason.into()))
    }

    fn settle(&mut self, client_ref: &ClientRef, delivery: Delivery) -> bool {
        match self.find_by_ref(client_ref) {
            Some(index) => {
                let entry = &mut self.entries[index];
                // A server echo may already have confirmed the entry.
                if entry.delivery == Delivery::Pending {
                    entry.delivery = delivery;
                }
                true
            }
            None => false,
        }
    }

    /// Merges a message delivered over the socket. Returns false when the
    /// message did not change the view.
    pub fn push_inbound(&mut self, message: ChatMessage) -> bool {
        if !self.accepts(&message) {
            return false;
        }
        if message.sender != self.me {
            if let Some(typing) = self.typing.typing_user(Instant::now()) {
                if typing == message.sender {
                    self.typing.clear();
                }
            }
        }

        if let Some(index) = message.client_ref.as_ref().and_then(|r| self.find_by_ref(r)) {
            let entry = &mut self.entries[index];
            if let Some(id) = message.id {
                entry.id = EntryId::Server(id);
            }
            entry.message = message;
            entry.delivery = Delivery::Sent;
            return true;
        }

        if let Some(id) = message.id {
            if self.entries.iter().any(|e| e.id == EntryId::Server(id)) {
                log::debug!("Ignoring already displayed message {id}");
                return false;
            }
        }

        self.entries.push(ViewEntry::from_server(message));
        true
    }

    /// Swaps in the server's history. Unconfirmed local sends that the
    /// history does not contain stay at the end.
    pub fn replace_history(&mut self, messages: Vec<ChatMessage>) {
        let mut entries: Vec<ViewEntry> = messages
            .into_iter()
            .filter(|m| self.accepts(m))
            .map(ViewEntry::from_server)
            .collect();

        let local: Vec<ViewEntry> = self
            .entries
            .drain(..)
            .filter(|e| e.delivery != Delivery::Sent)
            .filter(|e| {
                !entries
                    .iter()
                    .any(|known| known.client_ref.is_some() && known.client_ref == e.client_ref)
            })
            .collect();
        entries.extend(local);
        self.entries = entries;
    }

    /// Applies a READ signal from the peer to the local user's own messages.
    pub fn apply_read(&mut self, payload: &EventPayload) -> usize {
        let relevant = match &self.target {
            ConversationTarget::Direct(peer) => {
                payload.group_id.is_none() && payload.receiver.as_deref() == Some(peer.as_str())
            }
            ConversationTarget::Group(id) => payload.group_id == Some(*id),
        };
        if !relevant {
            return 0;
        }

        let direct = matches!(self.target, ConversationTarget::Direct(_));
        let mut changed = 0;
        for entry in self.entries.iter_mut() {
            if entry.message.sender != self.me || entry.message.is_read {
                continue;
            }
            let covered = match (entry.id, payload.message_id) {
                (EntryId::Server(id), Some(acked)) => id <= acked,
                (EntryId::Server(_), None) => true,
                (EntryId::Provisional(_), _) => direct && entry.delivery == Delivery::Sent,
            };
            if covered {
                entry.message.is_read = true;
                changed += 1;
            }
        }
        changed
    }

    /// Yields the receipt for the newest unread inbound message at most
    /// once, marking inbound entries read locally.
    pub fn take_read_receipt(&mut self) -> Option<ReadReceipt> {
        let newest = self
            .entries
            .iter()
            .rev()
            .find(|e| e.message.sender != self.me)?;
        if newest.message.is_read {
            return None;
        }
        let message_id = newest.id.server_id();
        match message_id {
            Some(id) if self.last_acknowledged.is_some_and(|acked| acked >= id) => return None,
            None if !matches!(self.target, ConversationTarget::Direct(_)) => return None,
            _ => {}
        }

        let receipt = ReadReceipt {
            receiver: newest.message.sender.clone(),
            message_id,
            group_id: newest.message.group_id,
        };
        let me = self.me.clone();
        self.entries
            .iter_mut()
            .filter(|e| e.message.sender != me)
            .for_each(|e| e.message.is_read = true);
        if message_id.is_some() {
            self.last_acknowledged = message_id;
        }
        Some(receipt)
    }

    pub fn on_typing(&mut self, payload: &EventPayload, now: Instant) {
        let Some(user) = payload.receiver.as_deref() else {
            return;
        };
        if user == self.me {
            return;
        }
        let relevant = match &self.target {
            ConversationTarget::Direct(peer) => payload.group_id.is_none() && user == peer,
            ConversationTarget::Group(id) => payload.group_id == Some(*id),
        };
        if relevant {
            self.typing.signal(user, now);
        }
    }

    pub fn typing_user(&self, now: Instant) -> Option<&str> {
        self.typing.typing_user(now)
    }

    fn find_by_ref(&self, client_ref: &ClientRef) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.client_ref.as_ref() == Some(client_ref))
    }
}
