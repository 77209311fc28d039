use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use campustalk_db::Database;
use campustalk_types::models::User;

use crate::credentials::{hash_password, verify_dummy, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::timestamp::{format_timestamp, parse_timestamp};

pub const MAX_USERNAME_LEN: usize = 32;

/// Owns user records. All methods block on SQLite and Argon2, so async
/// callers go through [`crate::MessagingService`].
#[derive(Clone)]
pub struct IdentityStore {
    db: Arc<Database>,
}

impl IdentityStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create an account. The username is stored trimmed; uniqueness is
    /// decided by the database, so two racing registrations cannot both win.
    pub fn register(&self, username: &str, password: &str) -> ApiResult<User> {
        let username = normalize_username(username)?;
        if password.is_empty() {
            return Err(ApiError::Validation("all fields are required".into()));
        }

        let password_hash = hash_password(password)?;
        let created_at = Utc::now();

        if !self
            .db
            .create_user(username, &password_hash, &format_timestamp(created_at))?
        {
            debug!("Registration rejected, '{}' is taken", username);
            return Err(ApiError::AlreadyExists);
        }

        info!("Registered user '{}'", username);
        Ok(User {
            username: username.to_string(),
            created_at,
        })
    }

    /// Returns the user only when the username exists and the password
    /// matches. Unknown users and wrong passwords are indistinguishable.
    pub fn authenticate(&self, username: &str, password: &str) -> ApiResult<Option<User>> {
        let Some(row) = self.db.get_user_by_username(username.trim())? else {
            verify_dummy(password);
            return Ok(None);
        };

        if !verify_password(password, &row.password_hash) {
            return Ok(None);
        }

        let created_at = parse_timestamp(&row.created_at, &format!("user '{}'", row.username));
        Ok(Some(User {
            username: row.username,
            created_at,
        }))
    }

    /// Every registered username except `excluding`, sorted. Naming a user
    /// that does not exist is `NotFound`.
    pub fn list_others(&self, excluding: Option<&str>) -> ApiResult<Vec<String>> {
        if let Some(name) = excluding {
            if !self.exists(name)? {
                return Err(ApiError::NotFound);
            }
        }

        Ok(self.db.list_usernames(excluding)?)
    }

    pub fn exists(&self, username: &str) -> ApiResult<bool> {
        Ok(self.db.user_exists(username)?)
    }
}

fn normalize_username(raw: &str) -> ApiResult<&str> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(ApiError::Validation("all fields are required".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::Validation(format!(
            "username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(ApiError::Validation("username contains invalid characters".into()));
    }
    Ok(username)
}
