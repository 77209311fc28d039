use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use campustalk_db::Database;
use campustalk_types::models::{Message, User};

use crate::conversation::{ConversationStore, validate_body, validate_limit};
use crate::error::{ApiError, ApiResult};
use crate::identity::IdentityStore;
use crate::session::{Session, SessionManager};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Front door of the messaging backend. Owns no records itself: identity and
/// message data live in their stores, and every call that needs one runs on
/// the blocking pool under `store_timeout`.
pub struct MessagingService {
    identity: IdentityStore,
    conversation: ConversationStore,
    sessions: SessionManager,
    store_timeout: Duration,
}

impl MessagingService {
    pub fn new(db: Arc<Database>, sessions: SessionManager) -> Self {
        Self {
            identity: IdentityStore::new(db.clone()),
            conversation: ConversationStore::new(db),
            sessions,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub async fn register(&self, username: &str, password: &str) -> ApiResult<User> {
        let identity = self.identity.clone();
        let (username, password) = (username.to_string(), password.to_string());

        self.run_store("register", move || identity.register(&username, &password))
            .await
    }

    /// Open a session. Any failure other than a storage fault is reported
    /// as `InvalidCredentials`, whichever field was wrong.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<Session> {
        let identity = self.identity.clone();
        let (name, password) = (username.to_string(), password.to_string());

        let user = self
            .run_store("authenticate", move || identity.authenticate(&name, &password))
            .await?;

        let Some(user) = user else {
            warn!("Failed login attempt for '{}'", username.trim());
            return Err(ApiError::InvalidCredentials);
        };

        let session = self.sessions.issue(&user.username)?;
        info!("User '{}' logged in (session {})", user.username, session.id());
        Ok(session)
    }

    pub async fn logout(&self, session: &Session) -> ApiResult<()> {
        self.sessions.check(session).await?;
        self.sessions.revoke(session).await;
        Ok(())
    }

    /// Resolve a bearer token. Used by the auth middleware.
    pub async fn authorize(&self, token: &str) -> ApiResult<Session> {
        self.sessions.validate(token).await
    }

    pub async fn list_users(&self, excluding: Option<&str>) -> ApiResult<Vec<String>> {
        let identity = self.identity.clone();
        let excluding = excluding.map(str::to_string);

        self.run_store("list_users", move || identity.list_others(excluding.as_deref()))
            .await
    }

    /// Send `body` from the session's user to `receiver`. Bad input is
    /// rejected before anything reaches storage.
    pub async fn send(&self, session: &Session, receiver: &str, body: &str) -> ApiResult<Message> {
        self.sessions.check(session).await?;
        validate_body(body)?;
        if receiver.trim().is_empty() {
            return Err(ApiError::InvalidParticipant);
        }

        let conversation = self.conversation.clone();
        let sender = session.username().to_string();
        let (receiver, body) = (receiver.trim().to_string(), body.to_string());

        let message = self
            .run_store("send", move || conversation.append(&sender, &receiver, &body))
            .await?;

        info!("Message {} stored: {} -> {}", message.id, message.sender, message.receiver);
        Ok(message)
    }

    /// The caller's thread with `other`, oldest first.
    pub async fn fetch_thread(
        &self,
        session: &Session,
        other: &str,
        after: Option<Uuid>,
        limit: Option<u32>,
    ) -> ApiResult<Vec<Message>> {
        self.sessions.check(session).await?;
        validate_limit(limit)?;

        let conversation = self.conversation.clone();
        let me = session.username().to_string();
        let other = other.trim().to_string();

        self.run_store("fetch_thread", move || conversation.thread(&me, &other, after, limit))
            .await
    }

    /// Run blocking store work off the async runtime. A panic or a timeout
    /// becomes `TransientStore`. The abandoned task finishes on its own, so
    /// a timed-out write can still commit after the caller gave up.
    async fn run_store<F, T>(&self, op: &'static str, f: F) -> ApiResult<T>
    where
        F: FnOnce() -> ApiResult<T> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(self.store_timeout, tokio::task::spawn_blocking(f)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("spawn_blocking join error in {}: {}", op, e);
                Err(ApiError::TransientStore(anyhow::anyhow!("{} task failed: {}", op, e)))
            }
            Err(_) => {
                warn!("{} timed out after {:?}", op, self.store_timeout);
                Err(ApiError::TransientStore(anyhow::anyhow!(
                    "{} timed out after {:?}",
                    op,
                    self.store_timeout
                )))
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_service() -> MessagingService {
    let db = Arc::new(Database::open_in_memory().expect("in-memory database"));
    let sessions = SessionManager::new("test-secret", chrono::Duration::hours(1));
    MessagingService::new(db, sessions).with_store_timeout(Duration::from_secs(30))
}
