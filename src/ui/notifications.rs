use crate::common::Notification;

/// Notifications, newest first, with an unread counter.
#[derive(Debug, Default)]
pub struct NotificationFeed {
    items: Vec<Notification>,
    unread: usize,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all(&mut self, items: Vec<Notification>) {
        self.unread = items.iter().filter(|n| !n.read).count();
        self.items = items;
    }

    pub fn push(&mut self, notification: Notification) {
        if notification.id.is_some() && self.items.iter().any(|n| n.id == notification.id) {
            return;
        }
        if !notification.read {
            self.unread += 1;
        }
        self.items.insert(0, notification);
    }

    pub fn mark_read(&mut self, id: i64) {
        if let Some(item) = self.items.iter_mut().find(|n| n.id == Some(id)) {
            if !item.read {
                item.read = true;
                self.unread = self.unread.saturating_sub(1);
            }
        }
    }

    pub fn mark_all_read(&mut self) {
        self.items.iter_mut().for_each(|n| n.read = true);
        self.unread = 0;
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }
}
