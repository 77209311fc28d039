/// Database row types — these map directly to SQLite rows.
/// Distinct from campustalk-types models to keep the DB layer independent.

pub struct UserRow {
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub seq: i64,
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub created_at: String,
}

/// Result of a message insert.
#[derive(Debug)]
pub enum InsertMessage {
    Inserted(MessageRow),
    /// The named participant has no user row; nothing was written.
    UnknownParticipant(String),
}
