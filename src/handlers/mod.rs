pub mod admin_handlers;
pub mod auth_handlers;
pub mod category_handlers;
pub mod health_handlers;
pub mod task_handlers;

pub use health_handlers::{health_check, health_check_simple};
