use crate::auth::rbac::Role;
use crate::auth::session::Session;
use crate::database::DatabasePool;
use crate::error::ApiError;
use crate::repositories::user_repo::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<(), ApiError>;
    /// Looks up a session together with its owning user, if that user still exists.
    async fn find_session_with_user(
        &self,
        session_id: &str,
    ) -> Result<Option<(Session, Option<User>)>, ApiError>;
    async fn update_session_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError>;
    /// Idempotent.
    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError>;
    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, ApiError>;
    /// Deletes every session with `expires_at <= now`.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, ApiError>;
}

pub struct SqlxSessionRepository {
    pool: DatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionUserRow {
    session_id: String,
    session_user_id: Uuid,
    expires_at: DateTime<Utc>,
    id: Option<Uuid>,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    password_hash: Option<String>,
    role: Option<Role>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl SessionUserRow {
    fn into_parts(self) -> (Session, Option<User>) {
        let session = Session {
            id: self.session_id,
            user_id: self.session_user_id,
            expires_at: self.expires_at,
        };

        let user = match (
            self.id,
            self.email,
            self.first_name,
            self.last_name,
            self.password_hash,
            self.role,
            self.created_at,
            self.updated_at,
        ) {
            (
                Some(id),
                Some(email),
                Some(first_name),
                Some(last_name),
                Some(password_hash),
                Some(role),
                Some(created_at),
                Some(updated_at),
            ) => Some(User {
                id,
                email,
                first_name,
                last_name,
                password_hash,
                role,
                created_at,
                updated_at,
            }),
            _ => None,
        };

        (session, user)
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn insert_session(&self, session: &Session) -> Result<(), ApiError> {
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_session_with_user(
        &self,
        session_id: &str,
    ) -> Result<Option<(Session, Option<User>)>, ApiError> {
        let row = sqlx::query_as::<_, SessionUserRow>(
            r#"
            SELECT s.id AS session_id, s.user_id AS session_user_id, s.expires_at,
                   u.id, u.email, u.first_name, u.last_name, u.password_hash, u.role,
                   u.created_at, u.updated_at
            FROM sessions s
            LEFT JOIN users u ON u.id = s.user_id
            WHERE s.id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SessionUserRow::into_parts))
    }

    async fn update_session_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query("UPDATE sessions SET expires_at = $1 WHERE id = $2")
            .bind(expires_at)
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
