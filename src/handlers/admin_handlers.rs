use crate::auth::context::RequestContext;
use crate::models::user::{CreateUserRequest, UpdateUserRequest};
use crate::{error::ApiError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

pub async fn list_users(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> Result<Json<Value>, ApiError> {
    let actor = context.require_user()?;
    let users = state.user_service.list_users(actor).await?;

    Ok(Json(json!({ "success": true, "users": users })))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let actor = context.require_user()?;
    let user = state.user_service.create_user(actor, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": user })),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>, ApiError> {
    let actor = context.require_user()?;
    let user = state.user_service.update_user(actor, user_id, request).await?;

    Ok(Json(json!({ "success": true, "user": user })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let actor = context.require_user()?;
    state.user_service.delete_user(actor, user_id).await?;

    Ok(Json(json!({ "success": true })))
}
