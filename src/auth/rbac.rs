use crate::models::task::TaskUpdate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "user_role")]
pub enum Role {
    Associate,
    Manager,
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Associate => "Associate",
            Role::Manager => "Manager",
            Role::Administrator => "Administrator",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "associate" => Some(Role::Associate),
            "manager" => Some(Role::Manager),
            "administrator" => Some(Role::Administrator),
            _ => None,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Associate
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    // Task tracker
    ViewTasks,
    CreateTask,
    UpdateTask,
    DeleteTask,
    ClaimTask,
    UnclaimAnyTask,
    CommentOnTask,

    // Category settings
    ViewCategories,
    ManageCategories,

    // User management
    ViewUsers,
    ManageUsers,
    GrantAdministrator,
}

const ASSOCIATE_ACTIONS: &[Action] = &[
    Action::ViewTasks,
    Action::ClaimTask,
    Action::CommentOnTask,
    Action::ViewCategories,
];

const MANAGER_ACTIONS: &[Action] = &[
    Action::ViewTasks,
    Action::CreateTask,
    Action::UpdateTask,
    Action::DeleteTask,
    Action::ClaimTask,
    Action::UnclaimAnyTask,
    Action::CommentOnTask,
    Action::ViewCategories,
    Action::ManageCategories,
    Action::ViewUsers,
    Action::ManageUsers,
];

const ADMINISTRATOR_ACTIONS: &[Action] = &[
    Action::ViewTasks,
    Action::CreateTask,
    Action::UpdateTask,
    Action::DeleteTask,
    Action::ClaimTask,
    Action::UnclaimAnyTask,
    Action::CommentOnTask,
    Action::ViewCategories,
    Action::ManageCategories,
    Action::ViewUsers,
    Action::ManageUsers,
    Action::GrantAdministrator,
];

impl Role {
    /// The policy table: every action this role may perform.
    pub fn permissions(&self) -> &'static [Action] {
        match self {
            Role::Associate => ASSOCIATE_ACTIONS,
            Role::Manager => MANAGER_ACTIONS,
            Role::Administrator => ADMINISTRATOR_ACTIONS,
        }
    }

    pub fn has_permission(&self, action: Action) -> bool {
        self.permissions().contains(&action)
    }
}

/// Whether the role may create, update or delete shared resources.
pub fn can_modify(role: Role) -> bool {
    matches!(role, Role::Administrator | Role::Manager)
}

/// Decide what part of a task update a user may apply.
///
/// Returns `None` when the update is forbidden outright. Roles with
/// [`Action::UpdateTask`] get the update unchanged. Anyone else may only
/// touch a task they have claimed, and then only its status: the other
/// fields are dropped rather than rejected.
pub fn permitted_task_update(role: Role, is_claimant: bool, update: TaskUpdate) -> Option<TaskUpdate> {
    if role.has_permission(Action::UpdateTask) {
        Some(update)
    } else if is_claimant {
        Some(update.status_only())
    } else {
        None
    }
}

/// Claimants may always release their own claim.
pub fn can_unclaim(role: Role, is_claimant: bool) -> bool {
    is_claimant || role.has_permission(Action::UnclaimAnyTask)
}

#[macro_export]
macro_rules! require_permission {
    ($user:expr, $action:expr, $msg:expr) => {
        if !$user.role.has_permission($action) {
            tracing::warn!(
                user_id = %$user.id,
                role = %$user.role,
                action = ?$action,
                "permission denied"
            );
            return Err($crate::error::ApiError::Authorization($msg.to_string()));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{TaskPriority, TaskStatus};

    #[test]
    fn test_can_modify_matches_policy_table() {
        assert!(!can_modify(Role::Associate));
        assert!(can_modify(Role::Manager));
        assert!(can_modify(Role::Administrator));

        for role in [Role::Associate, Role::Manager, Role::Administrator] {
            for action in [
                Action::CreateTask,
                Action::UpdateTask,
                Action::DeleteTask,
                Action::ManageCategories,
                Action::ManageUsers,
            ] {
                assert_eq!(role.has_permission(action), can_modify(role), "{role} {action:?}");
            }
        }
    }

    #[test]
    fn test_everyone_can_claim_and_comment() {
        for role in [Role::Associate, Role::Manager, Role::Administrator] {
            assert!(role.has_permission(Action::ViewTasks));
            assert!(role.has_permission(Action::ClaimTask));
            assert!(role.has_permission(Action::CommentOnTask));
            assert!(role.has_permission(Action::ViewCategories));
        }
    }

    #[test]
    fn test_only_administrators_grant_administrator() {
        assert!(Role::Administrator.has_permission(Action::GrantAdministrator));
        assert!(!Role::Manager.has_permission(Action::GrantAdministrator));
        assert!(!Role::Associate.has_permission(Action::GrantAdministrator));
    }

    fn full_update() -> TaskUpdate {
        TaskUpdate {
            title: Some("Restock boosters".into()),
            description: Some("Shelf B".into()),
            status: Some(TaskStatus::Completed),
            priority: Some(TaskPriority::High),
            assigned_to_id: Some(uuid::Uuid::new_v4()),
            due_date: Some(chrono::Utc::now()),
        }
    }

    #[test]
    fn test_associate_claimant_keeps_only_status() {
        let filtered = permitted_task_update(Role::Associate, true, full_update()).unwrap();
        assert_eq!(filtered.status, Some(TaskStatus::Completed));
        assert!(filtered.title.is_none());
        assert!(filtered.description.is_none());
        assert!(filtered.priority.is_none());
        assert!(filtered.assigned_to_id.is_none());
        assert!(filtered.due_date.is_none());
    }

    #[test]
    fn test_associate_non_claimant_is_forbidden() {
        assert!(permitted_task_update(Role::Associate, false, full_update()).is_none());
    }

    #[test]
    fn test_manager_update_is_untouched() {
        let update = full_update();
        let permitted = permitted_task_update(Role::Manager, false, update.clone()).unwrap();
        assert_eq!(permitted, update);
    }

    #[test]
    fn test_unclaim_rules() {
        assert!(can_unclaim(Role::Associate, true));
        assert!(!can_unclaim(Role::Associate, false));
        assert!(can_unclaim(Role::Manager, false));
        assert!(can_unclaim(Role::Administrator, false));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_str("manager"), Some(Role::Manager));
        assert_eq!(Role::from_str(" Administrator "), Some(Role::Administrator));
        assert_eq!(Role::from_str("owner"), None);
        assert_eq!(Role::default(), Role::Associate);
    }
}
