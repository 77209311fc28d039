use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use campustalk_db::Database;
use campustalk_db::models::{InsertMessage, MessageRow};
use campustalk_types::models::Message;

use crate::error::{ApiError, ApiResult};
use crate::timestamp::{format_timestamp, parse_timestamp};

pub const MAX_BODY_CHARS: usize = 4000;
pub const MAX_THREAD_LIMIT: u32 = 500;

/// Reject bodies that are blank after trimming or too long. The body itself
/// is stored as submitted.
pub fn validate_body(body: &str) -> ApiResult<()> {
    if body.trim().is_empty() {
        return Err(ApiError::EmptyBody);
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(ApiError::Validation(format!(
            "message body must be at most {} characters",
            MAX_BODY_CHARS
        )));
    }
    Ok(())
}

pub fn validate_limit(limit: Option<u32>) -> ApiResult<()> {
    match limit {
        Some(n) if n == 0 || n > MAX_THREAD_LIMIT => Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_THREAD_LIMIT
        ))),
        _ => Ok(()),
    }
}

/// Owns message records, keyed by the unordered pair of participants.
#[derive(Clone)]
pub struct ConversationStore {
    db: Arc<Database>,
}

impl ConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new message with a fresh id and the current time.
    pub fn append(&self, sender: &str, receiver: &str, body: &str) -> ApiResult<Message> {
        validate_body(body)?;

        let id = Uuid::new_v4();
        let created_at = format_timestamp(Utc::now());

        match self
            .db
            .insert_message(&id.to_string(), sender, receiver, body, &created_at)?
        {
            InsertMessage::Inserted(row) => Ok(message_from_row(row)),
            InsertMessage::UnknownParticipant(name) => {
                debug!("Message {} -> {} rejected, unknown user '{}'", sender, receiver, name);
                Err(ApiError::InvalidParticipant)
            }
        }
    }

    /// The thread between `a` and `b` in either direction, ascending by
    /// timestamp then insertion order. Empty when they never talked.
    ///
    /// Every message is returned unless `limit` is given, which must be in
    /// `1..=MAX_THREAD_LIMIT`.
    pub fn thread(
        &self,
        a: &str,
        b: &str,
        after: Option<Uuid>,
        limit: Option<u32>,
    ) -> ApiResult<Vec<Message>> {
        validate_limit(limit)?;
        let after = after.map(|id| id.to_string());

        let rows = self.db.get_thread(a, b, after.as_deref(), limit)?;
        Ok(rows.into_iter().map(message_from_row).collect())
    }
}

fn message_from_row(row: MessageRow) -> Message {
    let timestamp = parse_timestamp(&row.created_at, &format!("message '{}'", row.id));
    Message {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}' (seq {}): {}", row.id, row.seq, e);
            Uuid::default()
        }),
        sender: row.sender,
        receiver: row.receiver,
        body: row.body,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityStore;

    fn stores(users: &[&str]) -> ConversationStore {
        let db = Arc::new(Database::open_in_memory().unwrap());
        for name in users {
            db.create_user(name, "hash", "2026-01-01T00:00:00.000Z").unwrap();
        }
        ConversationStore::new(db)
    }

    #[test]
    fn replies_follow_in_call_order() {
        let convo = stores(&["alice", "bob"]);

        let m1 = convo.append("alice", "bob", "hi bob").unwrap();
        let m2 = convo.append("bob", "alice", "hi alice").unwrap();

        let thread = convo.thread("alice", "bob", None, None).unwrap();
        assert_eq!(thread, vec![m1.clone(), m2.clone()]);
        assert!(thread.iter().all(|m| {
            (m.sender == "alice" && m.receiver == "bob") || (m.sender == "bob" && m.receiver == "alice")
        }));
        assert!(m1.timestamp <= m2.timestamp);
        assert_ne!(m1.id, m2.id);
    }

    #[test]
    fn blank_body_is_not_stored() {
        let convo = stores(&["alice", "bob"]);

        assert!(matches!(convo.append("alice", "bob", ""), Err(ApiError::EmptyBody)));
        assert!(matches!(convo.append("alice", "bob", " \n\t "), Err(ApiError::EmptyBody)));
        assert!(convo.thread("alice", "bob", None, None).unwrap().is_empty());
    }

    #[test]
    fn oversized_body_is_rejected() {
        let convo = stores(&["alice", "bob"]);
        let body = "a".repeat(MAX_BODY_CHARS + 1);
        assert!(matches!(convo.append("alice", "bob", &body), Err(ApiError::Validation(_))));
    }

    #[test]
    fn unknown_participant_is_rejected() {
        let convo = stores(&["alice"]);

        assert!(matches!(convo.append("alice", "ghost", "hi"), Err(ApiError::InvalidParticipant)));
        assert!(matches!(convo.append("ghost", "alice", "hi"), Err(ApiError::InvalidParticipant)));
    }

    #[test]
    fn threads_are_isolated_per_pair() {
        let convo = stores(&["alice", "bob", "carol"]);
        convo.append("alice", "bob", "for bob").unwrap();
        let to_carol = convo.append("alice", "carol", "for carol").unwrap();

        assert_eq!(convo.thread("carol", "alice", None, None).unwrap(), vec![to_carol]);
        assert!(convo.thread("bob", "carol", None, None).unwrap().is_empty());
    }

    #[test]
    fn long_threads_are_returned_in_full() {
        let convo = stores(&["alice", "bob"]);
        for i in 0..250 {
            convo.append("alice", "bob", &format!("m{}", i)).unwrap();
        }

        let thread = convo.thread("alice", "bob", None, None).unwrap();
        assert_eq!(thread.len(), 250);
        assert_eq!(thread[0].body, "m0");
        assert_eq!(thread[249].body, "m249");

        let latest = convo.thread("alice", "bob", None, Some(MAX_THREAD_LIMIT)).unwrap();
        assert_eq!(latest.len(), 250);
        let last_two = convo.thread("alice", "bob", None, Some(2)).unwrap();
        assert_eq!(last_two[0].body, "m248");
    }

    #[test]
    fn out_of_range_limit_is_rejected() {
        let convo = stores(&["alice", "bob"]);
        convo.append("alice", "bob", "hi").unwrap();

        for limit in [0, MAX_THREAD_LIMIT + 1, 10_000] {
            assert!(matches!(
                convo.thread("alice", "bob", None, Some(limit)),
                Err(ApiError::Validation(_))
            ));
        }
    }

    #[test]
    fn polling_with_a_cursor_returns_only_new_messages() {
        let convo = stores(&["alice", "bob"]);
        let seen = convo.append("alice", "bob", "one").unwrap();
        let fresh = convo.append("bob", "alice", "two").unwrap();

        let update = convo.thread("alice", "bob", Some(seen.id), None).unwrap();
        assert_eq!(update, vec![fresh]);
    }

    #[test]
    fn works_with_registered_identities() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ids = IdentityStore::new(db.clone());
        ids.register("alice", "pw1").unwrap();
        ids.register("bob", "pw2").unwrap();

        let convo = ConversationStore::new(db);
        let msg = convo.append("alice", "bob", "hi").unwrap();
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.receiver, "bob");
        assert_eq!(msg.body, "hi");
    }
}
