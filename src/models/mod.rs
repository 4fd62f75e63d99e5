pub mod category;
pub mod task;
pub mod user;

pub use category::{CategoryLevel, CategoryMapping, CategoryNode, CategorySettings};
pub use task::{Comment, Task, TaskDetails, TaskPriority, TaskStatus};
pub use user::{CreateUserRequest, LoginRequest, UpdateUserRequest};
