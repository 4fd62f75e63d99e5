pub mod category_repo;
pub mod memory;
pub mod session_repo;
pub mod task_repo;
pub mod user_repo;

pub use category_repo::CategoryRepository;
pub use memory::InMemoryStore;
pub use session_repo::SessionRepository;
pub use task_repo::TaskRepository;
pub use user_repo::UserRepository;

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_foreign_key_violation())
        .unwrap_or(false)
}
