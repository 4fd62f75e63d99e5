use crate::{database, error::ApiError, AppState};
use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

/// Health check including store connectivity
pub async fn health_check(State(app_state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let store = match &app_state.db_pool {
        Some(pool) => match database::health_check(pool).await {
            Ok(()) => json!({ "backend": "postgres", "healthy": true }),
            Err(e) => {
                tracing::error!("Database health check failed: {}", e);
                return Err(ApiError::internal("Service is unhealthy"));
            }
        },
        None => json!({ "backend": "memory", "healthy": true }),
    };

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
        "environment": app_state.config.environment,
        "checks": { "store": store },
    })))
}

/// Simple health check endpoint for load balancers
pub async fn health_check_simple() -> Result<&'static str, StatusCode> {
    Ok("OK")
}
