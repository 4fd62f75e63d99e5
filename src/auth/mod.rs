pub mod context;
pub mod cookie;
pub mod rbac;
pub mod session;

pub use context::RequestContext;
pub use rbac::{Action, Role};
pub use session::{Session, SessionManager, SessionValidation};
