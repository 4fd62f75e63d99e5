pub mod auth_service;
pub mod task_service;
pub mod user_service;

pub use auth_service::{AuthService, LoginOutcome};
pub use task_service::TaskService;
pub use user_service::UserService;
