use crate::Database;
use crate::models::{InsertMessage, MessageRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

// Timestamps are stored as fixed-width UTC RFC 3339 strings
// ("2026-01-02T03:04:05.678Z"), so text order is chronological order.

const PAIR_FILTER: &str = "((sender = ?1 AND receiver = ?2) OR (sender = ?2 AND receiver = ?1))";

impl Database {
    // -- Users --

    /// Insert a user. Returns `false` if the username is already taken, in
    /// which case the existing row is left untouched.
    pub fn create_user(&self, username: &str, password_hash: &str, created_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                (username, password_hash, created_at),
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn user_exists(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| query_user_exists(conn, username))
    }

    /// All usernames except `excluding`, sorted.
    pub fn list_usernames(&self, excluding: Option<&str>) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT username FROM users
                 WHERE ?1 IS NULL OR username <> ?1
                 ORDER BY username ASC",
            )?;

            let names = stmt
                .query_map([excluding], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(names)
        })
    }

    // -- Messages --

    /// Insert a message after checking that both participants exist.
    ///
    /// The stored timestamp is `created_at`, raised to the newest timestamp
    /// already in the pair's thread if the clock went backwards.
    pub fn insert_message(
        &self,
        id: &str,
        sender: &str,
        receiver: &str,
        body: &str,
        created_at: &str,
    ) -> Result<InsertMessage> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            for participant in [sender, receiver] {
                if !query_user_exists(&tx, participant)? {
                    return Ok(InsertMessage::UnknownParticipant(participant.to_string()));
                }
            }

            let latest: Option<String> = tx.query_row(
                &format!("SELECT MAX(created_at) FROM messages WHERE {PAIR_FILTER}"),
                (sender, receiver),
                |row| row.get(0),
            )?;
            let created_at = match latest {
                Some(latest) if latest.as_str() > created_at => latest,
                _ => created_at.to_string(),
            };

            tx.execute(
                "INSERT INTO messages (id, sender, receiver, body, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, sender, receiver, body, created_at],
            )?;
            let seq = tx.last_insert_rowid();
            tx.commit()?;

            Ok(InsertMessage::Inserted(MessageRow {
                seq,
                id: id.to_string(),
                sender: sender.to_string(),
                receiver: receiver.to_string(),
                body: body.to_string(),
                created_at,
            }))
        })
    }

    /// Messages exchanged between `a` and `b`, oldest first.
    ///
    /// Without a cursor this is the whole thread, or its newest `limit`
    /// messages. With `after` set to a message id from the same thread it is
    /// everything (or the first `limit` messages) that follows it. A cursor
    /// that does not belong to the thread is ignored.
    pub fn get_thread(
        &self,
        a: &str,
        b: &str,
        after: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<MessageRow>> {
        // SQLite reads a negative LIMIT as "no limit"
        let limit = limit.map(i64::from).unwrap_or(-1);

        self.with_conn(|conn| {
            let cursor = match after {
                Some(id) => query_cursor(conn, a, b, id)?,
                None => None,
            };

            match cursor {
                Some((created_at, seq)) => query_thread_after(conn, a, b, &created_at, seq, limit),
                None => query_thread_latest(conn, a, b, limit),
            }
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT username, password_hash, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                username: row.get(0)?,
                password_hash: row.get(1)?,
                created_at: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_user_exists(conn: &Connection, username: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn query_cursor(conn: &Connection, a: &str, b: &str, id: &str) -> Result<Option<(String, i64)>> {
    conn.query_row(
        &format!("SELECT created_at, seq FROM messages WHERE id = ?3 AND {PAIR_FILTER}"),
        (a, b, id),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

fn query_thread_latest(conn: &Connection, a: &str, b: &str, limit: i64) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT seq, id, sender, receiver, body, created_at FROM (
             SELECT seq, id, sender, receiver, body, created_at
             FROM messages
             WHERE {PAIR_FILTER}
             ORDER BY created_at DESC, seq DESC
             LIMIT ?3
         )
         ORDER BY created_at ASC, seq ASC"
    ))?;

    let rows = stmt
        .query_map(rusqlite::params![a, b, limit], map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_thread_after(
    conn: &Connection,
    a: &str,
    b: &str,
    created_at: &str,
    seq: i64,
    limit: i64,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT seq, id, sender, receiver, body, created_at
         FROM messages
         WHERE {PAIR_FILTER}
           AND (created_at > ?3 OR (created_at = ?3 AND seq > ?4))
         ORDER BY created_at ASC, seq ASC
         LIMIT ?5"
    ))?;

    let rows = stmt
        .query_map(rusqlite::params![a, b, created_at, seq, limit], map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        seq: row.get(0)?,
        id: row.get(1)?,
        sender: row.get(2)?,
        receiver: row.get(3)?,
        body: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
