use std::collections::{HashSet, VecDeque};

use crate::common::ChatMessage;

/// Number of fingerprints remembered per connection.
pub const FINGERPRINT_RETENTION: usize = 100;

/// Composite key `sender-receiver-content-createdAt`. Exact match only.
pub fn fingerprint(message: &ChatMessage) -> String {
    format!(
        "{}-{}-{}-{}",
        message.sender,
        message.recipient_key(),
        message.content_str(),
        message.created_at.format("%Y-%m-%dT%H:%M:%S%.f"),
    )
}

/// Suppresses re-delivery of messages already passed to the UI.
///
/// Fingerprints are kept in arrival order; once the log grows past the
/// retention limit it is trimmed back to the newest entries. Seeing a
/// fingerprint again does not refresh its position.
#[derive(Debug)]
pub struct FingerprintFilter {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl FingerprintFilter {
    pub fn new() -> Self {
        Self::with_capacity(FINGERPRINT_RETENTION)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            seen: HashSet::with_capacity(capacity + 1),
        }
    }

    /// Returns `true` the first time a message's fingerprint is observed.
    pub fn admit(&mut self, message: &ChatMessage) -> bool {
        self.admit_key(fingerprint(message))
    }

    pub fn admit_key(&mut self, key: String) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for FingerprintFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn message(sender: &str, receiver: &str, content: &str, millis: u32) -> ChatMessage {
        ChatMessage {
            id: None,
            sender: sender.to_string(),
            sender_profile_image: None,
            receiver: Some(receiver.to_string()),
            group_id: None,
            content: Some(content.to_string()),
            image_url: None,
            voice_url: None,
            is_read: false,
            reactions: Vec::new(),
            created_at: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_milli_opt(10, 0, 1, millis)
                .unwrap(),
            client_ref: None,
        }
    }

    #[test]
    fn fingerprint_joins_fields() {
        let msg = message("A", "B", "hello", 0);
        assert_eq!(fingerprint(&msg), "A-B-hello-2024-05-01T10:00:01");
    }

    #[test]
    fn echo_delivered_twice_passes_once() {
        let mut filter = FingerprintFilter::new();
        let msg = message("A", "B", "hello", 0);
        assert!(filter.admit(&msg));
        assert!(!filter.admit(&msg.clone()));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn timestamp_must_match_exactly() {
        let mut filter = FingerprintFilter::new();
        assert!(filter.admit(&message("A", "B", "hello", 0)));
        assert!(filter.admit(&message("A", "B", "hello", 1)));
    }

    #[test]
    fn oldest_fingerprints_are_forgotten() {
        let mut filter = FingerprintFilter::with_capacity(3);
        for key in ["a", "b", "c", "d"] {
            assert!(filter.admit_key(key.to_string()));
        }
        assert_eq!(filter.len(), 3);
        // "a" was trimmed and is accepted again; "d" is still remembered.
        assert!(filter.admit_key("a".to_string()));
        assert!(!filter.admit_key("d".to_string()));
    }

    proptest! {
        #[test]
        fn retention_stays_bounded(keys in prop::collection::hash_set("[a-z]{1,8}", 101..300)) {
            let mut filter = FingerprintFilter::new();
            for key in keys {
                prop_assert!(filter.admit_key(key));
                prop_assert!(filter.len() <= FINGERPRINT_RETENTION);
            }
            prop_assert_eq!(filter.len(), FINGERPRINT_RETENTION);
        }
    }
}
