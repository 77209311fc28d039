use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use campustalk_types::api::Claims;

use crate::error::{ApiError, ApiResult};

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Proof that a caller logged in as `username`. Only [`SessionManager`] can
/// mint one; handlers receive it from the auth middleware.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    username: String,
    token: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Bearer token to hand back to the client.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Issues signed session tokens and tracks logouts.
///
/// Tokens are stateless HS256 JWTs; the only server-side state is the set of
/// revoked session ids, each kept until its token would have expired anyway.
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    revoked: RwLock<HashMap<Uuid, DateTime<Utc>>>,
}

impl SessionManager {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            revoked: RwLock::new(HashMap::new()),
        }
    }

    pub fn issue(&self, username: &str) -> ApiResult<Session> {
        let now = Utc::now();
        let exp = (now + self.ttl).timestamp();
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| anyhow::anyhow!("session expiry out of range"))?;

        let claims = Claims {
            sub: username.to_string(),
            jti: Uuid::new_v4(),
            iat: now.timestamp().max(0) as usize,
            exp: exp.max(0) as usize,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("failed to sign session token: {}", e))?;

        Ok(Session {
            id: claims.jti,
            username: claims.sub,
            token,
            expires_at,
        })
    }

    /// Resolve a bearer token into a live session.
    pub async fn validate(&self, token: &str) -> ApiResult<Session> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("Rejected session token: {}", e);
            ApiError::Unauthenticated
        })?;

        let claims = token_data.claims;
        let expires_at =
            DateTime::from_timestamp(claims.exp as i64, 0).ok_or(ApiError::Unauthenticated)?;

        let session = Session {
            id: claims.jti,
            username: claims.sub,
            token: token.to_string(),
            expires_at,
        };
        self.check(&session).await?;
        Ok(session)
    }

    /// Fails with `Unauthenticated` once the session has expired or been
    /// revoked.
    pub async fn check(&self, session: &Session) -> ApiResult<()> {
        if session.expires_at <= Utc::now() {
            return Err(ApiError::Unauthenticated);
        }
        if self.revoked.read().await.contains_key(&session.id) {
            return Err(ApiError::Unauthenticated);
        }
        Ok(())
    }

    pub async fn revoke(&self, session: &Session) {
        let now = Utc::now();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, expires_at| *expires_at > now);
        revoked.insert(session.id, session.expires_at);

        info!("Session {} for '{}' revoked", session.id, session.username);
    }

    #[cfg(test)]
    async fn revoked_count(&self) -> usize {
        self.revoked.read().await.len()
    }
}
