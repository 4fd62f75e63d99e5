use crate::auth::session::Session;
use crate::error::ApiError;
use crate::repositories::user_repo::User;

/// Per-request authentication state, resolved once by the session
/// middleware and read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub user: Option<User>,
    pub session: Option<Session>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: User, session: Session) -> Self {
        Self {
            user: Some(user),
            session: Some(session),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn require_user(&self) -> Result<&User, ApiError> {
        self.user
            .as_ref()
            .ok_or_else(|| ApiError::authentication("Authentication required"))
    }
}
