use chrono::Local;

use crate::api::RestClient;
use crate::common::{ClientRef, Comment, EntryId};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CommentEntry {
    pub id: EntryId,
    pub client_ref: Option<ClientRef>,
    pub comment: Comment,
}

/// Comments under one post, with optimistic posting.
#[derive(Debug)]
pub struct CommentThread {
    post_id: i64,
    entries: Vec<CommentEntry>,
}

impl CommentThread {
    pub fn new(post_id: i64) -> Self {
        Self {
            post_id,
            entries: Vec::new(),
        }
    }

    pub fn post_id(&self) -> i64 {
        self.post_id
    }

    pub fn entries(&self) -> &[CommentEntry] {
        &self.entries
    }

    pub fn replace_all(&mut self, comments: Vec<Comment>) {
        self.entries = comments.into_iter().map(Self::settled).collect();
    }

    pub fn begin(&mut self, author: &str, content: &str) -> ClientRef {
        self.begin_with_id(Local::now().timestamp_millis(), author, content)
    }

    fn begin_with_id(&mut self, provisional: i64, author: &str, content: &str) -> ClientRef {
        let client_ref = ClientRef::new();
        self.entries.push(CommentEntry {
            id: EntryId::Provisional(provisional),
            client_ref: Some(client_ref.clone()),
            comment: Comment {
                id: provisional,
                content: content.to_string(),
                author_username: author.to_string(),
                created_at: Some(Local::now().naive_local()),
                client_ref: Some(client_ref.clone()),
            },
        });
        client_ref
    }

    /// Replaces the provisional entry with the server's copy. If the copy
    /// already arrived in real time, the provisional entry is dropped.
    pub fn confirm(&mut self, client_ref: &ClientRef, comment: Comment) {
        let Some(index) = self.position(client_ref) else {
            self.apply_remote(comment);
            return;
        };
        let server_id = EntryId::Server(comment.id);
        let shown_elsewhere = self
            .entries
            .iter()
            .enumerate()
            .any(|(i, e)| i != index && e.id == server_id);
        if shown_elsewhere {
            self.entries.remove(index);
        } else {
            self.entries[index] = Self::with_ref(comment, client_ref.clone());
        }
    }

    pub fn rollback(&mut self, client_ref: &ClientRef) -> Option<CommentEntry> {
        let index = self.position(client_ref)?;
        Some(self.entries.remove(index))
    }

    /// Merges a comment delivered in real time.
    pub fn apply_remote(&mut self, comment: Comment) {
        if let Some(index) = comment.client_ref.as_ref().and_then(|r| self.position(r)) {
            self.entries[index] = Self::settled(comment);
            return;
        }
        if self.entries.iter().any(|e| e.id == EntryId::Server(comment.id)) {
            return;
        }
        self.entries.push(Self::settled(comment));
    }

    /// Posts a comment optimistically; the provisional entry is rolled back
    /// if the server refuses it.
    pub async fn submit(&mut self, rest: &RestClient, author: &str, content: &str) -> Result<i64> {
        let client_ref = self.begin(author, content);
        match rest.add_comment(self.post_id, content, &client_ref).await {
            Ok(comment) => {
                let id = comment.id;
                self.confirm(&client_ref, comment);
                Ok(id)
            }
            Err(err) => {
                log::warn!("Comment on post {} failed: {err}", self.post_id);
                self.rollback(&client_ref);
                Err(err)
            }
        }
    }

    fn settled(comment: Comment) -> CommentEntry {
        CommentEntry {
            id: EntryId::Server(comment.id),
            client_ref: comment.client_ref.clone(),
            comment,
        }
    }

    fn with_ref(comment: Comment, client_ref: ClientRef) -> CommentEntry {
        let mut entry = Self::settled(comment);
        entry.client_ref.get_or_insert(client_ref);
        entry
    }

    fn position(&self, client_ref: &ClientRef) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.client_ref.as_ref() == Some(client_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_comment(id: i64, author: &str, content: &str, client_ref: Option<ClientRef>) -> Comment {
        Comment {
            id,
            content: content.into(),
            author_username: author.into(),
            created_at: None,
            client_ref,
        }
    }

    fn ids(thread: &CommentThread) -> Vec<EntryId> {
        thread.entries().iter().map(|e| e.id).collect()
    }

    #[test]
    fn confirmation_replaces_provisional_id() {
        let mut thread = CommentThread::new(1);
        let client_ref = thread.begin_with_id(1_700_000_000_000, "alice", "nice");
        assert_eq!(ids(&thread), vec![EntryId::Provisional(1_700_000_000_000)]);

        thread.confirm(&client_ref, server_comment(42, "alice", "nice", None));
        assert_eq!(ids(&thread), vec![EntryId::Server(42)]);
        assert_eq!(thread.entries()[0].comment.id, 42);
    }

    #[test]
    fn realtime_echo_before_confirmation_is_not_duplicated() {
        let mut thread = CommentThread::new(1);
        let client_ref = thread.begin_with_id(1_700_000_000_000, "alice", "nice");

        thread.apply_remote(server_comment(42, "alice", "nice", Some(client_ref.clone())));
        thread.confirm(&client_ref, server_comment(42, "alice", "nice", None));
        assert_eq!(ids(&thread), vec![EntryId::Server(42)]);
    }

    #[test]
    fn realtime_copy_without_ref_then_confirmation_keeps_one_entry() {
        let mut thread = CommentThread::new(1);
        thread.replace_all(vec![server_comment(3, "bob", "first", None)]);
        let client_ref = thread.begin_with_id(1_700_000_000_000, "alice", "nice");

        thread.apply_remote(server_comment(42, "alice", "nice", None));
        thread.confirm(&client_ref, server_comment(42, "alice", "nice", None));
        assert_eq!(ids(&thread), vec![EntryId::Server(3), EntryId::Server(42)]);
    }

    #[test]
    fn identical_texts_do_not_cross_match() {
        let mut thread = CommentThread::new(1);
        let first = thread.begin_with_id(1_700_000_000_000, "alice", "+1");
        let second = thread.begin_with_id(1_700_000_000_001, "alice", "+1");

        thread.apply_remote(server_comment(8, "alice", "+1", Some(second)));
        assert_eq!(
            ids(&thread),
            vec![EntryId::Provisional(1_700_000_000_000), EntryId::Server(8)]
        );

        thread.confirm(&first, server_comment(7, "alice", "+1", None));
        assert_eq!(ids(&thread), vec![EntryId::Server(7), EntryId::Server(8)]);
    }

    #[test]
    fn rollback_removes_entry() {
        let mut thread = CommentThread::new(1);
        thread.replace_all(vec![server_comment(3, "bob", "first", None)]);
        let client_ref = thread.begin("alice", "oops");

        let removed = thread.rollback(&client_ref).unwrap();
        assert_eq!(removed.comment.content, "oops");
        assert_eq!(ids(&thread), vec![EntryId::Server(3)]);
        assert!(thread.rollback(&client_ref).is_none());
    }

    #[test]
    fn unrelated_remote_comments_append_once() {
        let mut thread = CommentThread::new(1);
        thread.apply_remote(server_comment(5, "bob", "hey", None));
        thread.apply_remote(server_comment(5, "bob", "hey", None));
        assert_eq!(ids(&thread), vec![EntryId::Server(5)]);
    }

    #[tokio::test]
    async fn failed_submit_rolls_back() {
        // Nothing listens on the discard port, so the request fails fast.
        let rest = RestClient::new("http://127.0.0.1:9/api", None);
        let mut thread = CommentThread::new(1);

        assert!(thread.submit(&rest, "alice", "hello").await.is_err());
        assert!(thread.entries().is_empty());
    }
}
