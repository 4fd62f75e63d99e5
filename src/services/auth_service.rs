use crate::auth::session::{Session, SessionManager};
use crate::error::ApiError;
use crate::repositories::user_repo::{User, UserRepository};
use crate::utils::{non_blank, verify_password};
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// A freshly issued session. `token` goes to the client and is never stored.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub session: Session,
    pub user: User,
}

pub struct AuthService {
    user_repo: Arc<dyn UserRepository + Send + Sync>,
    sessions: Arc<SessionManager>,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository + Send + Sync>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            user_repo,
            sessions,
        }
    }

    /// Verify credentials and open a session. Unknown emails and wrong
    /// passwords fail identically and leave no session behind.
    pub async fn login(
        &self,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<LoginOutcome, ApiError> {
        let (Some(email), Some(password)) = (non_blank(email), password.filter(|p| !p.is_empty()))
        else {
            return Err(ApiError::validation("Email and password are required"));
        };

        let Some(user) = self.user_repo.find_by_email(&email).await? else {
            tracing::warn!(email = %email, "login failed: unknown email");
            return Err(ApiError::validation(INVALID_CREDENTIALS));
        };

        if !verify_password(&password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "login failed: wrong password");
            return Err(ApiError::validation(INVALID_CREDENTIALS));
        }

        let token = self.sessions.generate_token();
        let session = self.sessions.create_session(&token, user.id).await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user logged in");
        Ok(LoginOutcome {
            token,
            session,
            user,
        })
    }

    pub async fn logout(&self, session: &Session) -> Result<(), ApiError> {
        self.sessions.invalidate_session(&session.id).await?;
        tracing::info!(user_id = %session.user_id, "user logged out");
        Ok(())
    }
}
