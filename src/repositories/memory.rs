//! In-memory implementation of every repository trait.
//!
//! Used by the test suites and for running the service without PostgreSQL.
//! All tables sit behind one lock, so each operation (including claim and
//! unclaim) is a single critical section with the same outcome as the
//! conditional SQL updates. Delete rules mirror the foreign keys in
//! `migrations/`.

use crate::auth::session::Session;
use crate::error::ApiError;
use crate::models::category::{
    CategoryLevel, CategoryMapping, CategoryMappingUpdate, CategoryNode, NewCategoryMapping,
};
use crate::models::task::{Comment, NewTask, Task, TaskUpdate};
use crate::repositories::user_repo::{NewUser, User, UserUpdate};
use crate::repositories::{CategoryRepository, SessionRepository, TaskRepository, UserRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    tasks: HashMap<Uuid, Task>,
    comments: Vec<Comment>,
    nodes: HashMap<CategoryLevel, Vec<CategoryNode>>,
    mappings: Vec<CategoryMapping>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except)
    }

    fn nodes_mut(&mut self, level: CategoryLevel) -> &mut Vec<CategoryNode> {
        self.nodes.entry(level).or_default()
    }

    fn node_exists(&self, level: CategoryLevel, id: Uuid) -> bool {
        self.nodes
            .get(&level)
            .map(|nodes| nodes.iter().any(|n| n.id == id))
            .unwrap_or(false)
    }

    fn parent_level(level: CategoryLevel) -> Option<CategoryLevel> {
        match level {
            CategoryLevel::Category => None,
            CategoryLevel::Subcategory1 => Some(CategoryLevel::Category),
            CategoryLevel::Subcategory2 => Some(CategoryLevel::Subcategory1),
        }
    }

    fn child_level(level: CategoryLevel) -> Option<CategoryLevel> {
        match level {
            CategoryLevel::Category => Some(CategoryLevel::Subcategory1),
            CategoryLevel::Subcategory1 => Some(CategoryLevel::Subcategory2),
            CategoryLevel::Subcategory2 => None,
        }
    }

    fn check_parent(&self, level: CategoryLevel, parent_id: Option<Uuid>) -> Result<(), ApiError> {
        match (Self::parent_level(level), parent_id) {
            (Some(parent_level), Some(parent_id)) if self.node_exists(parent_level, parent_id) => {
                Ok(())
            }
            (Some(_), _) => Err(ApiError::validation("Parent category does not exist")),
            (None, _) => Ok(()),
        }
    }

    /// Removes the node and, recursively, its children.
    fn remove_node(&mut self, level: CategoryLevel, id: Uuid) -> bool {
        let nodes = self.nodes_mut(level);
        let before = nodes.len();
        nodes.retain(|n| n.id != id);
        let removed = nodes.len() != before;

        if removed {
            if let Some(child) = Self::child_level(level) {
                let children: Vec<Uuid> = self
                    .nodes_mut(child)
                    .iter()
                    .filter(|n| n.parent_id == Some(id))
                    .map(|n| n.id)
                    .collect();
                for child_id in children {
                    self.remove_node(child, child_id);
                }
            }
        }

        removed
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included.
    pub fn session_count(&self) -> usize {
        self.tables.lock().sessions.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let tables = self.tables.lock();
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let mut users: Vec<User> = self.tables.lock().users.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        let mut tables = self.tables.lock();
        if tables.email_taken(&user.email, None) {
            return Err(ApiError::conflict("A user with this email already exists"));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<Option<User>, ApiError> {
        let mut tables = self.tables.lock();
        if let Some(email) = &update.email {
            if tables.email_taken(email, Some(id)) {
                return Err(ApiError::conflict("A user with this email already exists"));
            }
        }

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(first_name) = &update.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(password_hash) = &update.password_hash {
            user.password_hash = password_hash.clone();
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), ApiError> {
        let mut tables = self.tables.lock();
        if !tables.users.contains_key(&id) {
            return Err(ApiError::not_found("User not found"));
        }
        if tables.tasks.values().any(|t| t.created_by_id == id) {
            return Err(ApiError::conflict(
                "User has created tasks and cannot be deleted",
            ));
        }

        tables.users.remove(&id);
        tables.sessions.retain(|_, s| s.user_id != id);
        tables.comments.retain(|c| c.user_id != id);
        for task in tables.tasks.values_mut() {
            if task.assigned_to_id == Some(id) {
                task.assigned_to_id = None;
            }
            if task.claimed_by_id == Some(id) {
                task.claimed_by_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<(), ApiError> {
        let mut tables = self.tables.lock();
        if tables.sessions.contains_key(&session.id) {
            return Err(ApiError::conflict("Session already exists"));
        }
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_session_with_user(
        &self,
        session_id: &str,
    ) -> Result<Option<(Session, Option<User>)>, ApiError> {
        let tables = self.tables.lock();
        Ok(tables.sessions.get(session_id).map(|session| {
            let user = tables.users.get(&session.user_id).cloned();
            (session.clone(), user)
        }))
    }

    async fn update_session_expiry(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        if let Some(session) = self.tables.lock().sessions.get_mut(session_id) {
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        self.tables.lock().sessions.remove(session_id);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, ApiError> {
        let mut tables = self.tables.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, ApiError> {
        let mut tables = self.tables.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let mut tasks: Vec<Task> = self.tables.lock().tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, ApiError> {
        Ok(self.tables.lock().tasks.get(&id).cloned())
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        let mut tables = self.tables.lock();
        if let Some(assignee) = task.assigned_to_id {
            if !tables.users.contains_key(&assignee) {
                return Err(ApiError::validation("Assigned user does not exist"));
            }
        }

        let now = Utc::now();
        let created = Task {
            id: Uuid::new_v4(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            assigned_to_id: task.assigned_to_id,
            created_by_id: task.created_by_id,
            claimed_by_id: None,
            due_date: task.due_date,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_task(
        &self,
        id: Uuid,
        update: &TaskUpdate,
        expected_claimant: Option<Uuid>,
    ) -> Result<Option<Task>, ApiError> {
        let mut tables = self.tables.lock();
        if let Some(assignee) = update.assigned_to_id {
            if !tables.users.contains_key(&assignee) {
                return Err(ApiError::validation("Assigned user does not exist"));
            }
        }

        let Some(task) = tables.tasks.get_mut(&id) else {
            return Ok(None);
        };
        if expected_claimant.is_some() && task.claimed_by_id != expected_claimant {
            return Ok(None);
        }
        if let Some(title) = &update.title {
            task.title = title.clone();
        }
        if let Some(description) = &update.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(assignee) = update.assigned_to_id {
            task.assigned_to_id = Some(assignee);
        }
        if let Some(due_date) = update.due_date {
            task.due_date = Some(due_date);
        }
        task.updated_at = Utc::now();

        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut tables = self.tables.lock();
        tables.comments.retain(|c| c.task_id != id);
        Ok(tables.tasks.remove(&id).is_some())
    }

    async fn claim_task(&self, id: Uuid, user_id: Uuid) -> Result<Option<Task>, ApiError> {
        let mut tables = self.tables.lock();
        match tables.tasks.get_mut(&id) {
            Some(task) if task.claimed_by_id.is_none() => {
                task.claimed_by_id = Some(user_id);
                task.updated_at = Utc::now();
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn unclaim_task(
        &self,
        id: Uuid,
        expected_claimant: Option<Uuid>,
    ) -> Result<Option<Task>, ApiError> {
        let mut tables = self.tables.lock();
        match tables.tasks.get_mut(&id) {
            Some(task) if expected_claimant.is_none() || task.claimed_by_id == expected_claimant => {
                task.claimed_by_id = None;
                task.updated_at = Utc::now();
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_comments(&self, task_id: Uuid) -> Result<Vec<Comment>, ApiError> {
        self.list_comments_for_tasks(&[task_id]).await
    }

    async fn list_comments_for_tasks(&self, task_ids: &[Uuid]) -> Result<Vec<Comment>, ApiError> {
        let tables = self.tables.lock();
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| task_ids.contains(&c.task_id))
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn add_comment(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> Result<Comment, ApiError> {
        let mut tables = self.tables.lock();
        if !tables.tasks.contains_key(&task_id) {
            return Err(ApiError::not_found("Task not found"));
        }

        let comment = Comment {
            id: Uuid::new_v4(),
            task_id,
            user_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl CategoryRepository for InMemoryStore {
    async fn list_nodes(&self, level: CategoryLevel) -> Result<Vec<CategoryNode>, ApiError> {
        let mut nodes = self.tables.lock().nodes_mut(level).clone();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }

    async fn create_node(
        &self,
        level: CategoryLevel,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> Result<CategoryNode, ApiError> {
        let mut tables = self.tables.lock();
        tables.check_parent(level, parent_id)?;

        let now = Utc::now();
        let node = CategoryNode {
            id: Uuid::new_v4(),
            name: name.to_string(),
            parent_id: level.parent_column().and(parent_id),
            created_at: now,
            updated_at: now,
        };
        tables.nodes_mut(level).push(node.clone());
        Ok(node)
    }

    async fn update_node(
        &self,
        level: CategoryLevel,
        id: Uuid,
        name: Option<&str>,
        parent_id: Option<Uuid>,
    ) -> Result<Option<CategoryNode>, ApiError> {
        let mut tables = self.tables.lock();
        let parent_id = level.parent_column().and(parent_id);
        if parent_id.is_some() {
            tables.check_parent(level, parent_id)?;
        }

        let Some(node) = tables.nodes_mut(level).iter_mut().find(|n| n.id == id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            node.name = name.to_string();
        }
        if parent_id.is_some() {
            node.parent_id = parent_id;
        }
        node.updated_at = Utc::now();
        Ok(Some(node.clone()))
    }

    async fn delete_node(&self, level: CategoryLevel, id: Uuid) -> Result<bool, ApiError> {
        Ok(self.tables.lock().remove_node(level, id))
    }

    async fn list_mappings(&self) -> Result<Vec<CategoryMapping>, ApiError> {
        let mut mappings = self.tables.lock().mappings.clone();
        mappings.sort_by(|a, b| a.excel_value.cmp(&b.excel_value));
        Ok(mappings)
    }

    async fn create_mapping(&self, mapping: &NewCategoryMapping) -> Result<CategoryMapping, ApiError> {
        let now = Utc::now();
        let created = CategoryMapping {
            id: Uuid::new_v4(),
            excel_value: mapping.excel_value.clone(),
            mapping_type: mapping.mapping_type,
            mapped_id: mapping.mapped_id,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().mappings.push(created.clone());
        Ok(created)
    }

    async fn update_mapping(
        &self,
        id: Uuid,
        update: &CategoryMappingUpdate,
    ) -> Result<Option<CategoryMapping>, ApiError> {
        let mut tables = self.tables.lock();
        let Some(mapping) = tables.mappings.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        if let Some(excel_value) = &update.excel_value {
            mapping.excel_value = excel_value.clone();
        }
        if let Some(mapping_type) = update.mapping_type {
            mapping.mapping_type = mapping_type;
        }
        if let Some(mapped_id) = update.mapped_id {
            mapping.mapped_id = mapped_id;
        }
        mapping.updated_at = Utc::now();
        Ok(Some(mapping.clone()))
    }

    async fn delete_mapping(&self, id: Uuid) -> Result<bool, ApiError> {
        let mut tables = self.tables.lock();
        let before = tables.mappings.len();
        tables.mappings.retain(|m| m.id != id);
        Ok(tables.mappings.len() != before)
    }

    async fn replace_mapping(&self, mapping: &NewCategoryMapping) -> Result<CategoryMapping, ApiError> {
        let now = Utc::now();
        let created = CategoryMapping {
            id: Uuid::new_v4(),
            excel_value: mapping.excel_value.clone(),
            mapping_type: mapping.mapping_type,
            mapped_id: mapping.mapped_id,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.lock();
        tables.mappings.retain(|m| m.excel_value != mapping.excel_value);
        tables.mappings.push(created.clone());
        Ok(created)
    }
}
