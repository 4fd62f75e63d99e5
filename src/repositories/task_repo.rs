use crate::database::DatabasePool;
use crate::error::ApiError;
use crate::models::task::{Comment, NewTask, Task, TaskUpdate};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError>;
    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, ApiError>;
    async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError>;
    /// Returns `None` when the task does not exist. With `expected_claimant`
    /// set, only applies while that user still holds the claim.
    async fn update_task(
        &self,
        id: Uuid,
        update: &TaskUpdate,
        expected_claimant: Option<Uuid>,
    ) -> Result<Option<Task>, ApiError>;
    /// Deletes the task and its comments atomically; `false` if it did not exist.
    async fn delete_task(&self, id: Uuid) -> Result<bool, ApiError>;
    /// Sets the claimant only if the task is currently unclaimed.
    /// Returns the updated task, or `None` when nothing was changed.
    async fn claim_task(&self, id: Uuid, user_id: Uuid) -> Result<Option<Task>, ApiError>;
    /// Clears the claimant. With `expected_claimant` set, only applies while
    /// that user still holds the claim.
    async fn unclaim_task(
        &self,
        id: Uuid,
        expected_claimant: Option<Uuid>,
    ) -> Result<Option<Task>, ApiError>;

    async fn list_comments(&self, task_id: Uuid) -> Result<Vec<Comment>, ApiError>;
    async fn list_comments_for_tasks(&self, task_ids: &[Uuid]) -> Result<Vec<Comment>, ApiError>;
    async fn add_comment(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> Result<Comment, ApiError>;
}

const TASK_COLUMNS: &str = "id, title, description, status, priority, assigned_to_id, \
     created_by_id, claimed_by_id, due_date, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, task_id, user_id, content, created_at";

pub struct SqlxTaskRepository {
    pool: DatabasePool,
}

impl SqlxTaskRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqlxTaskRepository {
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM todo_task ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(tasks)
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, ApiError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM todo_task WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(task)
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        let created = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO todo_task
                (id, title, description, status, priority, assigned_to_id, created_by_id, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.assigned_to_id)
        .bind(task.created_by_id)
        .bind(task.due_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if super::is_foreign_key_violation(&e) {
                ApiError::validation("Assigned user does not exist")
            } else {
                ApiError::Database(e)
            }
        })?;

        Ok(created)
    }

    async fn update_task(
        &self,
        id: Uuid,
        update: &TaskUpdate,
        expected_claimant: Option<Uuid>,
    ) -> Result<Option<Task>, ApiError> {
        let updated = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE todo_task SET
                title = COALESCE($1, title),
                description = COALESCE($2, description),
                status = COALESCE($3, status),
                priority = COALESCE($4, priority),
                assigned_to_id = COALESCE($5, assigned_to_id),
                due_date = COALESCE($6, due_date),
                updated_at = $7
            WHERE id = $8 AND ($9::uuid IS NULL OR claimed_by_id = $9)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.status)
        .bind(update.priority)
        .bind(update.assigned_to_id)
        .bind(update.due_date)
        .bind(Utc::now())
        .bind(id)
        .bind(expected_claimant)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if super::is_foreign_key_violation(&e) {
                ApiError::validation("Assigned user does not exist")
            } else {
                ApiError::Database(e)
            }
        })?;

        Ok(updated)
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM todo_comment WHERE task_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM todo_task WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn claim_task(&self, id: Uuid, user_id: Uuid) -> Result<Option<Task>, ApiError> {
        let claimed = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE todo_task SET claimed_by_id = $1, updated_at = $2
            WHERE id = $3 AND claimed_by_id IS NULL
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed)
    }

    async fn unclaim_task(
        &self,
        id: Uuid,
        expected_claimant: Option<Uuid>,
    ) -> Result<Option<Task>, ApiError> {
        let released = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE todo_task SET claimed_by_id = NULL, updated_at = $1
            WHERE id = $2 AND ($3::uuid IS NULL OR claimed_by_id = $3)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(Utc::now())
        .bind(id)
        .bind(expected_claimant)
        .fetch_optional(&self.pool)
        .await?;

        Ok(released)
    }

    async fn list_comments(&self, task_id: Uuid) -> Result<Vec<Comment>, ApiError> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM todo_comment WHERE task_id = $1 ORDER BY created_at"
        ))
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn list_comments_for_tasks(&self, task_ids: &[Uuid]) -> Result<Vec<Comment>, ApiError> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }

        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM todo_comment WHERE task_id = ANY($1) ORDER BY created_at"
        ))
        .bind(task_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    async fn add_comment(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> Result<Comment, ApiError> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO todo_comment (id, task_id, user_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(task_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if super::is_foreign_key_violation(&e) {
                ApiError::not_found("Task not found")
            } else {
                ApiError::Database(e)
            }
        })?;

        Ok(comment)
    }
}
