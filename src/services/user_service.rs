use crate::auth::rbac::{Action, Role};
use crate::auth::session::SessionManager;
use crate::error::ApiError;
use crate::models::user::{CreateUserRequest, UpdateUserRequest};
use crate::repositories::user_repo::{NewUser, User, UserRepository, UserUpdate};
use crate::require_permission;
use crate::utils::{hash_password, non_blank, validate_email};
use std::sync::Arc;
use uuid::Uuid;

/// User administration. Anything touching the Administrator role requires
/// [`Action::GrantAdministrator`] on top of [`Action::ManageUsers`].
pub struct UserService {
    user_repo: Arc<dyn UserRepository + Send + Sync>,
    sessions: Arc<SessionManager>,
}

fn parse_role(value: &str) -> Result<Role, ApiError> {
    Role::from_str(value).ok_or_else(|| ApiError::validation(format!("Invalid role '{}'", value)))
}

fn require_admin_grant(actor: &User) -> Result<(), ApiError> {
    require_permission!(
        actor,
        Action::GrantAdministrator,
        "Only administrators can manage administrator accounts"
    );
    Ok(())
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository + Send + Sync>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            user_repo,
            sessions,
        }
    }

    pub async fn list_users(&self, actor: &User) -> Result<Vec<User>, ApiError> {
        require_permission!(actor, Action::ViewUsers, "You do not have permission to view users");
        self.user_repo.list_users().await
    }

    pub async fn create_user(&self, actor: &User, request: CreateUserRequest) -> Result<User, ApiError> {
        require_permission!(actor, Action::ManageUsers, "You do not have permission to manage users");

        let (Some(email), Some(first_name), Some(last_name), Some(password), Some(role)) = (
            non_blank(request.email),
            non_blank(request.first_name),
            non_blank(request.last_name),
            request.password.filter(|p| !p.is_empty()),
            non_blank(request.role),
        ) else {
            return Err(ApiError::validation("Missing required fields"));
        };

        let role = parse_role(&role)?;
        if role == Role::Administrator {
            require_admin_grant(actor)?;
        }
        validate_email(&email)?;

        let user = self
            .user_repo
            .create_user(&NewUser {
                email,
                first_name,
                last_name,
                password_hash: hash_password(&password)?,
                role,
            })
            .await?;

        tracing::info!(user_id = %user.id, role = %user.role, actor_id = %actor.id, "user created");
        Ok(user)
    }

    /// Blank fields are left unchanged. A new password revokes every session
    /// the user holds.
    pub async fn update_user(
        &self,
        actor: &User,
        id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<User, ApiError> {
        require_permission!(actor, Action::ManageUsers, "You do not have permission to manage users");

        let target = self
            .user_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        let role = non_blank(request.role).map(|r| parse_role(&r)).transpose()?;
        if target.role == Role::Administrator || role == Some(Role::Administrator) {
            require_admin_grant(actor)?;
        }

        let email = non_blank(request.email);
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let password_hash = match request.password.filter(|p| !p.is_empty()) {
            Some(password) => Some(hash_password(&password)?),
            None => None,
        };
        let password_changed = password_hash.is_some();

        let update = UserUpdate {
            email,
            first_name: non_blank(request.first_name),
            last_name: non_blank(request.last_name),
            password_hash,
            role,
        };

        let user = self
            .user_repo
            .update_user(id, &update)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        if password_changed {
            self.sessions.invalidate_user_sessions(id).await?;
        }

        tracing::info!(user_id = %id, actor_id = %actor.id, "user updated");
        Ok(user)
    }

    pub async fn delete_user(&self, actor: &User, id: Uuid) -> Result<(), ApiError> {
        require_permission!(actor, Action::ManageUsers, "You do not have permission to manage users");

        if actor.id == id {
            return Err(ApiError::authorization("You cannot delete your own account"));
        }

        let target = self
            .user_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;
        if target.role == Role::Administrator {
            require_admin_grant(actor)?;
        }

        self.user_repo.delete_user(id).await?;
        tracing::info!(user_id = %id, actor_id = %actor.id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::SessionValidation;
    use crate::repositories::memory::InMemoryStore;
    use chrono::Duration;

    struct Fixture {
        sessions: Arc<SessionManager>,
        service: UserService,
        admin: User,
        manager: User,
    }

    async fn seed(store: &InMemoryStore, email: &str, role: Role) -> User {
        store
            .create_user(&NewUser {
                email: email.into(),
                first_name: "First".into(),
                last_name: "Last".into(),
                password_hash: hash_password("pw").unwrap(),
                role,
            })
            .await
            .unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let admin = seed(&store, "admin@x.com", Role::Administrator).await;
        let manager = seed(&store, "manager@x.com", Role::Manager).await;
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            "secret".into(),
            Duration::days(30),
            Duration::days(15),
        ));

        Fixture {
            service: UserService::new(store, sessions.clone()),
            sessions,
            admin,
            manager,
        }
    }

    fn request(email: &str, role: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: Some(email.into()),
            first_name: Some("New".into()),
            last_name: Some("Hire".into()),
            password: Some("hunter22".into()),
            role: Some(role.into()),
        }
    }

    #[tokio::test]
    async fn test_create_requires_every_field() {
        let f = fixture().await;
        let mut incomplete = request("new@x.com", "Associate");
        incomplete.last_name = None;

        let err = f.service.create_user(&f.manager, incomplete).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg == "Missing required fields"));

        let user = f
            .service
            .create_user(&f.manager, request("new@x.com", "Associate"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::Associate);
        assert_ne!(user.password_hash, "hunter22");

        let err = f
            .service
            .create_user(&f.manager, request("new@x.com", "Associate"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_only_admins_touch_admin_accounts() {
        let f = fixture().await;

        let err = f
            .service
            .create_user(&f.manager, request("boss@x.com", "Administrator"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));

        let err = f.service.delete_user(&f.manager, f.admin.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));

        f.service
            .create_user(&f.admin, request("boss@x.com", "Administrator"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cannot_delete_self() {
        let f = fixture().await;
        let err = f.service.delete_user(&f.admin, f.admin.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_password_change_revokes_sessions() {
        let f = fixture().await;
        let target = f
            .service
            .create_user(&f.manager, request("clerk@x.com", "Associate"))
            .await
            .unwrap();
        let token = f.sessions.generate_token();
        f.sessions.create_session(&token, target.id).await.unwrap();

        // Name change keeps the session
        f.service
            .update_user(
                &f.manager,
                target.id,
                UpdateUserRequest { first_name: Some("Renamed".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert!(matches!(
            f.sessions.validate_session_token(&token).await.unwrap(),
            SessionValidation::Valid { .. }
        ));

        f.service
            .update_user(
                &f.manager,
                target.id,
                UpdateUserRequest { password: Some("new-secret".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(
            f.sessions.validate_session_token(&token).await.unwrap(),
            SessionValidation::Invalid
        );
    }
}
