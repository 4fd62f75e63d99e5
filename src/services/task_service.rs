use crate::auth::rbac::{can_unclaim, permitted_task_update, Action};
use crate::error::ApiError;
use crate::models::task::{
    AddCommentRequest, Comment, CommentDetails, CreateTaskRequest, NewTask, Task, TaskDetails,
    TaskPriority, TaskStatus, TaskUpdate, UpdateTaskRequest,
};
use crate::repositories::user_repo::User;
use crate::repositories::{TaskRepository, UserRepository};
use crate::require_permission;
use crate::utils::{non_blank, parse_due_date};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Task tracker operations with the role policy applied before any write.
pub struct TaskService {
    tasks: Arc<dyn TaskRepository + Send + Sync>,
    users: Arc<dyn UserRepository + Send + Sync>,
}

/// Unknown enum values and unparseable dates are treated as not provided.
fn parse_optional<T>(value: Option<String>, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    non_blank(value).and_then(|v| parse(&v))
}

fn parse_optional_date(value: Option<String>) -> Option<chrono::DateTime<chrono::Utc>> {
    parse_optional(value, |v| match parse_due_date(v) {
        Ok(date) => Some(date),
        Err(_) => {
            tracing::debug!(value = %v, "ignoring unparseable due date");
            None
        }
    })
}

impl UpdateTaskRequest {
    fn into_update(self) -> TaskUpdate {
        TaskUpdate {
            title: non_blank(self.title),
            description: non_blank(self.description),
            status: parse_optional(self.status, TaskStatus::parse),
            priority: parse_optional(self.priority, TaskPriority::parse),
            assigned_to_id: self.assigned_to_id,
            due_date: parse_optional_date(self.due_date),
        }
    }
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskRepository + Send + Sync>,
        users: Arc<dyn UserRepository + Send + Sync>,
    ) -> Self {
        Self { tasks, users }
    }

    async fn user_index(&self) -> Result<HashMap<Uuid, User>, ApiError> {
        Ok(self
            .users
            .list_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect())
    }

    fn comment_details(comment: Comment, users: &HashMap<Uuid, User>) -> CommentDetails {
        let user = users.get(&comment.user_id).cloned();
        CommentDetails { comment, user }
    }

    fn task_details(
        task: Task,
        comments: Vec<Comment>,
        users: &HashMap<Uuid, User>,
    ) -> TaskDetails {
        let lookup = |id: Option<Uuid>| id.and_then(|id| users.get(&id).cloned());
        TaskDetails {
            created_by: lookup(Some(task.created_by_id)),
            assigned_to: lookup(task.assigned_to_id),
            claimed_by: lookup(task.claimed_by_id),
            comments: comments
                .into_iter()
                .map(|c| Self::comment_details(c, users))
                .collect(),
            task,
        }
    }

    async fn find_or_404(&self, id: Uuid) -> Result<Task, ApiError> {
        self.tasks
            .find_task(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Task not found"))
    }

    pub async fn list_tasks(&self, user: &User) -> Result<Vec<TaskDetails>, ApiError> {
        require_permission!(user, Action::ViewTasks, "You do not have permission to view tasks");

        let tasks = self.tasks.list_tasks().await?;
        let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
        let mut comments_by_task: HashMap<Uuid, Vec<Comment>> = HashMap::new();
        for comment in self.tasks.list_comments_for_tasks(&ids).await? {
            comments_by_task.entry(comment.task_id).or_default().push(comment);
        }
        let users = self.user_index().await?;

        Ok(tasks
            .into_iter()
            .map(|task| {
                let comments = comments_by_task.remove(&task.id).unwrap_or_default();
                Self::task_details(task, comments, &users)
            })
            .collect())
    }

    pub async fn get_task(&self, user: &User, id: Uuid) -> Result<TaskDetails, ApiError> {
        require_permission!(user, Action::ViewTasks, "You do not have permission to view tasks");

        let task = self.find_or_404(id).await?;
        let comments = self.tasks.list_comments(id).await?;
        let users = self.user_index().await?;
        Ok(Self::task_details(task, comments, &users))
    }

    pub async fn create_task(&self, user: &User, request: CreateTaskRequest) -> Result<Task, ApiError> {
        require_permission!(user, Action::CreateTask, "You do not have permission to create tasks");

        let title = non_blank(request.title).ok_or_else(|| ApiError::validation("Title is required"))?;
        let task = NewTask {
            title,
            description: non_blank(request.description),
            status: TaskStatus::default(),
            priority: parse_optional(request.priority, TaskPriority::parse).unwrap_or_default(),
            assigned_to_id: request.assigned_to_id,
            created_by_id: user.id,
            due_date: parse_optional_date(request.due_date),
        };

        let created = self.tasks.create_task(&task).await?;
        tracing::info!(task_id = %created.id, user_id = %user.id, "task created");
        Ok(created)
    }

    /// Managers may change any field. An associate's update only goes through
    /// on a task they have claimed, and then only the status is applied.
    pub async fn update_task(
        &self,
        user: &User,
        id: Uuid,
        request: UpdateTaskRequest,
    ) -> Result<Task, ApiError> {
        let task = self.find_or_404(id).await?;
        let is_claimant = task.claimed_by_id == Some(user.id);

        let Some(update) = permitted_task_update(user.role, is_claimant, request.into_update()) else {
            tracing::warn!(task_id = %id, user_id = %user.id, role = %user.role, "task update denied");
            return Err(ApiError::authorization(
                "You can only update tasks you have claimed",
            ));
        };

        let expected_claimant = if user.role.has_permission(Action::UpdateTask) {
            None
        } else {
            Some(user.id)
        };

        match self.tasks.update_task(id, &update, expected_claimant).await? {
            Some(updated) => {
                tracing::info!(task_id = %id, user_id = %user.id, "task updated");
                Ok(updated)
            }
            None => match self.tasks.find_task(id).await? {
                Some(_) => Err(ApiError::validation("Task is no longer claimed by you")),
                None => Err(ApiError::not_found("Task not found")),
            },
        }
    }

    pub async fn delete_task(&self, user: &User, id: Uuid) -> Result<(), ApiError> {
        require_permission!(user, Action::DeleteTask, "You do not have permission to delete tasks");

        if !self.tasks.delete_task(id).await? {
            return Err(ApiError::not_found("Task not found"));
        }

        tracing::info!(task_id = %id, user_id = %user.id, "task deleted");
        Ok(())
    }

    pub async fn claim_task(&self, user: &User, id: Uuid) -> Result<Task, ApiError> {
        require_permission!(user, Action::ClaimTask, "You do not have permission to claim tasks");

        self.find_or_404(id).await?;
        match self.tasks.claim_task(id, user.id).await? {
            Some(task) => {
                tracing::info!(task_id = %id, user_id = %user.id, "task claimed");
                Ok(task)
            }
            None => match self.tasks.find_task(id).await? {
                Some(_) => Err(ApiError::validation("Task is already claimed")),
                None => Err(ApiError::not_found("Task not found")),
            },
        }
    }

    pub async fn unclaim_task(&self, user: &User, id: Uuid) -> Result<Task, ApiError> {
        let task = self.find_or_404(id).await?;
        let is_claimant = task.claimed_by_id == Some(user.id);

        if !can_unclaim(user.role, is_claimant) {
            tracing::warn!(task_id = %id, user_id = %user.id, role = %user.role, "task unclaim denied");
            return Err(ApiError::authorization(
                "You can only unclaim tasks you have claimed",
            ));
        }

        let expected_claimant = if user.role.has_permission(Action::UnclaimAnyTask) {
            None
        } else {
            Some(user.id)
        };

        match self.tasks.unclaim_task(id, expected_claimant).await? {
            Some(task) => {
                tracing::info!(task_id = %id, user_id = %user.id, "task unclaimed");
                Ok(task)
            }
            None => match self.tasks.find_task(id).await? {
                Some(_) => Err(ApiError::validation("Task is no longer claimed by you")),
                None => Err(ApiError::not_found("Task not found")),
            },
        }
    }

    /// Empty for tasks that no longer exist.
    pub async fn get_task_comments(&self, user: &User, id: Uuid) -> Result<Vec<CommentDetails>, ApiError> {
        require_permission!(user, Action::ViewTasks, "You do not have permission to view tasks");

        let comments = self.tasks.list_comments(id).await?;
        let users = self.user_index().await?;
        Ok(comments
            .into_iter()
            .map(|c| Self::comment_details(c, &users))
            .collect())
    }

    pub async fn add_comment(
        &self,
        user: &User,
        id: Uuid,
        request: AddCommentRequest,
    ) -> Result<CommentDetails, ApiError> {
        require_permission!(user, Action::CommentOnTask, "You do not have permission to comment");

        let content = non_blank(request.content)
            .ok_or_else(|| ApiError::validation("Comment content is required"))?;
        self.find_or_404(id).await?;

        let comment = self.tasks.add_comment(id, user.id, &content).await?;
        Ok(CommentDetails {
            comment,
            user: Some(user.clone()),
        })
    }
}
