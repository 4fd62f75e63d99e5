use crate::{
    auth::{cookie::cookie_key, SessionManager},
    config::Settings,
    database::DatabasePool,
    repositories::{
        category_repo::SqlxCategoryRepository, session_repo::SqlxSessionRepository,
        task_repo::SqlxTaskRepository, user_repo::SqlxUserRepository, CategoryRepository,
        InMemoryStore, SessionRepository, TaskRepository, UserRepository,
    },
    services::{AuthService, TaskService, UserService},
};
use axum::{
    extract::FromRef,
    routing::{get, post, put},
    Router,
};
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

/// Storage backends behind the services.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository + Send + Sync>,
    pub sessions: Arc<dyn SessionRepository + Send + Sync>,
    pub tasks: Arc<dyn TaskRepository + Send + Sync>,
    pub categories: Arc<dyn CategoryRepository + Send + Sync>,
}

impl Repositories {
    pub fn postgres(pool: &DatabasePool) -> Self {
        Self {
            users: Arc::new(SqlxUserRepository::new(pool.clone())),
            sessions: Arc::new(SqlxSessionRepository::new(pool.clone())),
            tasks: Arc::new(SqlxTaskRepository::new(pool.clone())),
            categories: Arc::new(SqlxCategoryRepository::new(pool.clone())),
        }
    }

    /// Every repository backed by the same in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            sessions: store.clone(),
            tasks: store.clone(),
            categories: store,
        }
    }
}

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db_pool: Option<DatabasePool>,
    pub key: Key,
    pub session_manager: Arc<SessionManager>,
    pub auth_service: Arc<AuthService>,
    pub task_service: Arc<TaskService>,
    pub user_service: Arc<UserService>,
    pub user_repository: Arc<dyn UserRepository + Send + Sync>,
    pub category_repository: Arc<dyn CategoryRepository + Send + Sync>,
}

// Lets SignedCookieJar extract its key from AppState
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

impl AppState {
    /// Connect to PostgreSQL, apply migrations and wire the services.
    pub async fn new(config: Settings) -> Result<Self, crate::error::ApiError> {
        let db_pool = crate::database::create_connection_pool(&config.database_url).await?;
        Ok(Self::new_with_pool(config, db_pool))
    }

    /// Create application state with an existing database pool
    pub fn new_with_pool(config: Settings, db_pool: DatabasePool) -> Self {
        let repositories = Repositories::postgres(&db_pool);
        Self::from_repositories(config, Some(db_pool), repositories)
    }

    /// Application state over a fresh in-memory store.
    pub fn in_memory(config: Settings) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::from_repositories(config, None, Repositories::in_memory(store))
    }

    pub fn from_repositories(
        config: Settings,
        db_pool: Option<DatabasePool>,
        repositories: Repositories,
    ) -> Self {
        let key = cookie_key(&config.session_secret);

        let session_manager = Arc::new(SessionManager::new(
            repositories.sessions.clone(),
            config.token_secret.clone(),
            config.session_lifetime(),
            config.renewal_window(),
        ));

        let auth_service = Arc::new(AuthService::new(
            repositories.users.clone(),
            session_manager.clone(),
        ));
        let task_service = Arc::new(TaskService::new(
            repositories.tasks.clone(),
            repositories.users.clone(),
        ));
        let user_service = Arc::new(UserService::new(
            repositories.users.clone(),
            session_manager.clone(),
        ));

        Self {
            config: Arc::new(config),
            db_pool,
            key,
            session_manager,
            auth_service,
            task_service,
            user_service,
            user_repository: repositories.users,
            category_repository: repositories.categories,
        }
    }
}

/// Assemble every route with the session, security, logging and CORS layers.
pub fn build_router(app_state: AppState) -> Router {
    use crate::handlers::{
        admin_handlers, auth_handlers, category_handlers, health_check, health_check_simple,
        task_handlers,
    };

    let cors_layer = middleware::create_cors_layer(
        app_state.config.cors_allow_origins.clone(),
        app_state.config.is_production(),
    );

    let health_routes = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/health/simple", get(health_check_simple));

    let api_routes = Router::new()
        // Auth endpoints
        .route("/api/auth/login", post(auth_handlers::login))
        .route("/api/auth/logout", post(auth_handlers::logout))
        .route("/api/auth/me", get(auth_handlers::get_me))
        // Task endpoints
        .route(
            "/api/tasks",
            get(task_handlers::list_tasks).post(task_handlers::create_task),
        )
        .route(
            "/api/tasks/:id",
            get(task_handlers::get_task)
                .put(task_handlers::update_task)
                .delete(task_handlers::delete_task),
        )
        .route("/api/tasks/:id/claim", post(task_handlers::claim_task))
        .route("/api/tasks/:id/unclaim", post(task_handlers::unclaim_task))
        .route(
            "/api/tasks/:id/comments",
            get(task_handlers::list_comments).post(task_handlers::add_comment),
        )
        // User administration
        .route(
            "/api/users",
            get(admin_handlers::list_users).post(admin_handlers::create_user),
        )
        .route(
            "/api/users/:id",
            put(admin_handlers::update_user).delete(admin_handlers::delete_user),
        )
        // Category settings
        .route(
            "/api/categories",
            get(category_handlers::get_category_settings)
                .post(category_handlers::create_category_item)
                .put(category_handlers::update_category_item)
                .delete(category_handlers::delete_category_item),
        )
        .route(
            "/api/categories/mappings",
            get(category_handlers::get_category_mappings)
                .post(category_handlers::save_category_mapping),
        );

    Router::new()
        .merge(health_routes)
        .merge(api_routes)
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::session_middleware,
        ))
        .with_state(app_state)
        .layer(axum::middleware::from_fn(middleware::security_headers_middleware))
        .layer(axum::middleware::from_fn(middleware::request_logging_middleware))
        .layer(middleware::create_logging_layer())
        .layer(cors_layer)
}
