use crate::error::ApiError;
use crate::repositories::user_repo::User;
use crate::repositories::SessionRepository;
use crate::utils::{derive_session_id, generate_session_token};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Keyed hash of the client token; the raw token is never stored.
    #[serde(skip)]
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Expiry is exclusive.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionValidation {
    Valid { session: Session, user: User },
    Invalid,
}

impl SessionValidation {
    pub fn into_parts(self) -> Option<(Session, User)> {
        match self {
            SessionValidation::Valid { session, user } => Some((session, user)),
            SessionValidation::Invalid => None,
        }
    }
}

/// Issues, validates, renews and revokes sessions.
pub struct SessionManager {
    repo: Arc<dyn SessionRepository + Send + Sync>,
    token_secret: String,
    lifetime: Duration,
    renewal_window: Duration,
}

impl SessionManager {
    pub fn new(
        repo: Arc<dyn SessionRepository + Send + Sync>,
        token_secret: String,
        lifetime: Duration,
        renewal_window: Duration,
    ) -> Self {
        Self {
            repo,
            token_secret,
            lifetime,
            renewal_window,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn generate_token(&self) -> String {
        generate_session_token()
    }

    pub fn session_id(&self, token: &str) -> String {
        derive_session_id(&self.token_secret, token)
    }

    pub async fn create_session(&self, token: &str, user_id: Uuid) -> Result<Session, ApiError> {
        self.create_session_at(token, user_id, Utc::now()).await
    }

    pub async fn create_session_at(
        &self,
        token: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Session, ApiError> {
        let session = Session {
            id: self.session_id(token),
            user_id,
            expires_at: now + self.lifetime,
        };
        self.repo.insert_session(&session).await?;

        tracing::debug!(user_id = %user_id, expires_at = %session.expires_at, "session created");
        Ok(session)
    }

    pub async fn validate_session_token(&self, token: &str) -> Result<SessionValidation, ApiError> {
        self.validate_session_token_at(token, Utc::now()).await
    }

    pub async fn validate_session_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionValidation, ApiError> {
        let session_id = self.session_id(token);

        let Some((mut session, user)) = self.repo.find_session_with_user(&session_id).await? else {
            return Ok(SessionValidation::Invalid);
        };

        let Some(user) = user else {
            tracing::warn!(user_id = %session.user_id, "session owner no longer exists, purging session");
            self.repo.delete_session(&session.id).await?;
            return Ok(SessionValidation::Invalid);
        };

        if session.is_expired_at(now) {
            tracing::debug!(user_id = %user.id, "session expired");
            self.repo.delete_session(&session.id).await?;
            return Ok(SessionValidation::Invalid);
        }

        if now >= session.expires_at - self.renewal_window {
            session.expires_at = now + self.lifetime;
            self.repo
                .update_session_expiry(&session.id, session.expires_at)
                .await?;
            tracing::debug!(user_id = %user.id, expires_at = %session.expires_at, "session renewed");
        }

        Ok(SessionValidation::Valid { session, user })
    }

    pub async fn invalidate_session(&self, session_id: &str) -> Result<(), ApiError> {
        self.repo.delete_session(session_id).await
    }

    pub async fn invalidate_user_sessions(&self, user_id: Uuid) -> Result<u64, ApiError> {
        let removed = self.repo.delete_user_sessions(user_id).await?;
        if removed > 0 {
            tracing::info!(user_id = %user_id, removed, "revoked user sessions");
        }
        Ok(removed)
    }

    /// One-shot sweep of expired rows.
    pub async fn purge_expired(&self) -> Result<u64, ApiError> {
        let removed = self.repo.delete_expired_sessions(Utc::now()).await?;
        tracing::info!(removed, "purged expired sessions");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::rbac::Role;
    use crate::repositories::memory::InMemoryStore;
    use crate::repositories::user_repo::{NewUser, UserRepository};

    async fn setup() -> (Arc<InMemoryStore>, SessionManager, User) {
        let store = Arc::new(InMemoryStore::new());
        let user = store
            .create_user(&NewUser {
                email: "a@x.com".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                password_hash: "unused".into(),
                role: Role::Associate,
            })
            .await
            .unwrap();

        let manager = SessionManager::new(
            store.clone(),
            "test-token-secret".into(),
            Duration::days(30),
            Duration::days(15),
        );
        (store, manager, user)
    }

    #[tokio::test]
    async fn test_create_session_sets_full_lifetime() {
        let (_, manager, user) = setup().await;
        let now = Utc::now();
        let token = manager.generate_token();

        let session = manager.create_session_at(&token, user.id, now).await.unwrap();
        assert_eq!(session.expires_at, now + Duration::days(30));
        assert_ne!(session.id, token);
        assert_eq!(session.id, manager.session_id(&token));
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let (_, manager, _) = setup().await;
        let result = manager.validate_session_token("never-issued").await.unwrap();
        assert_eq!(result, SessionValidation::Invalid);
    }

    #[tokio::test]
    async fn test_expired_session_is_purged() {
        let (store, manager, user) = setup().await;
        let now = Utc::now();
        let token = manager.generate_token();
        let session = manager.create_session_at(&token, user.id, now).await.unwrap();

        // Exactly at expiry counts as expired
        let at_expiry = session.expires_at;
        let result = manager.validate_session_token_at(&token, at_expiry).await.unwrap();
        assert_eq!(result, SessionValidation::Invalid);
        assert!(store.find_session_with_user(&session.id).await.unwrap().is_none());

        let again = manager.validate_session_token_at(&token, at_expiry).await.unwrap();
        assert_eq!(again, SessionValidation::Invalid);
    }

    #[tokio::test]
    async fn test_renewal_only_inside_window() {
        let (_, manager, user) = setup().await;
        let issued = Utc::now();
        let token = manager.generate_token();
        let session = manager.create_session_at(&token, user.id, issued).await.unwrap();

        let early = issued + Duration::days(10);
        let (unchanged, _) = manager
            .validate_session_token_at(&token, early)
            .await
            .unwrap()
            .into_parts()
            .unwrap();
        assert_eq!(unchanged.expires_at, session.expires_at);

        let late = issued + Duration::days(20);
        let (renewed, renewed_user) = manager
            .validate_session_token_at(&token, late)
            .await
            .unwrap()
            .into_parts()
            .unwrap();
        assert_eq!(renewed.expires_at, late + Duration::days(30));
        assert!(renewed.expires_at > session.expires_at);
        assert_eq!(renewed_user.id, user.id);

        // The renewal was persisted
        let (stored, _) = manager
            .validate_session_token_at(&token, late)
            .await
            .unwrap()
            .into_parts()
            .unwrap();
        assert_eq!(stored.expires_at, renewed.expires_at);
    }

    #[tokio::test]
    async fn test_session_for_missing_user_is_purged() {
        let (store, manager, _) = setup().await;
        let token = manager.generate_token();
        let orphan = manager.create_session(&token, Uuid::new_v4()).await.unwrap();

        let result = manager.validate_session_token(&token).await.unwrap();
        assert_eq!(result, SessionValidation::Invalid);
        assert!(store.find_session_with_user(&orphan.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let (_, manager, user) = setup().await;
        let token = manager.generate_token();
        let session = manager.create_session(&token, user.id).await.unwrap();

        manager.invalidate_session(&session.id).await.unwrap();
        manager.invalidate_session(&session.id).await.unwrap();
        assert_eq!(
            manager.validate_session_token(&token).await.unwrap(),
            SessionValidation::Invalid
        );
    }

    #[tokio::test]
    async fn test_invalidate_user_sessions() {
        let (_, manager, user) = setup().await;
        let first = manager.generate_token();
        let second = manager.generate_token();
        manager.create_session(&first, user.id).await.unwrap();
        manager.create_session(&second, user.id).await.unwrap();

        assert_eq!(manager.invalidate_user_sessions(user.id).await.unwrap(), 2);
        assert_eq!(
            manager.validate_session_token(&second).await.unwrap(),
            SessionValidation::Invalid
        );
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (_, manager, user) = setup().await;
        let stale = manager.generate_token();
        let fresh = manager.generate_token();
        manager
            .create_session_at(&stale, user.id, Utc::now() - Duration::days(31))
            .await
            .unwrap();
        manager.create_session(&fresh, user.id).await.unwrap();

        assert_eq!(manager.purge_expired().await.unwrap(), 1);
        assert!(matches!(
            manager.validate_session_token(&fresh).await.unwrap(),
            SessionValidation::Valid { .. }
        ));
    }
}
