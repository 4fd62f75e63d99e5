use crate::auth::rbac::Role;
use crate::database::DatabasePool;
use crate::error::ApiError;
use crate::repositories::{is_foreign_key_violation, is_unique_violation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial user update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError>;
    async fn list_users(&self) -> Result<Vec<User>, ApiError>;
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, ApiError>;
    /// Returns `None` when no user has this id.
    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<Option<User>, ApiError>;
    /// Removes the user with their sessions and comments and clears their
    /// task assignments and claims. Fails with `Conflict` while the user is
    /// the creator of any task and with `NotFound` when the id is unknown.
    async fn delete_user(&self, id: Uuid) -> Result<(), ApiError>;
}

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, password_hash, role, created_at, updated_at";

pub struct SqlxUserRepository {
    pool: DatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn duplicate_email(e: sqlx::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::conflict("A user with this email already exists")
    } else {
        ApiError::Database(e)
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY email"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, first_name, last_name, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(duplicate_email)?;

        Ok(created)
    }

    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<Option<User>, ApiError> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                email = COALESCE($1, email),
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                password_hash = COALESCE($4, password_hash),
                role = COALESCE($5, role),
                updated_at = $6
            WHERE id = $7
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&update.email)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.password_hash)
        .bind(update.role)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(duplicate_email)?;

        Ok(updated)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), ApiError> {
        // Sessions and comments cascade, assignments and claims are set null,
        // authored tasks restrict the delete.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    ApiError::conflict("User has created tasks and cannot be deleted")
                } else {
                    ApiError::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("User not found"));
        }

        Ok(())
    }
}
