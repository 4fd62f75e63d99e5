use crate::auth::context::RequestContext;
use crate::models::task::{AddCommentRequest, CreateTaskRequest, UpdateTaskRequest};
use crate::{error::ApiError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    let tasks = state.task_service.list_tasks(user).await?;

    Ok(Json(json!({ "success": true, "tasks": tasks })))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = context.require_user()?;
    let task = state.task_service.create_task(user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "task": task })),
    ))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    let task = state.task_service.get_task(user, id).await?;

    Ok(Json(json!({ "success": true, "task": task })))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    let task = state.task_service.update_task(user, id, request).await?;

    Ok(Json(json!({ "success": true, "task": task })))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    state.task_service.delete_task(user, id).await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn claim_task(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    let task = state.task_service.claim_task(user, id).await?;

    Ok(Json(json!({ "success": true, "task": task })))
}

pub async fn unclaim_task(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    let task = state.task_service.unclaim_task(user, id).await?;

    Ok(Json(json!({ "success": true, "task": task })))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    let comments = state.task_service.get_task_comments(user, id).await?;

    Ok(Json(json!({ "success": true, "comments": comments })))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = context.require_user()?;
    let comment = state.task_service.add_comment(user, id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "comment": comment })),
    ))
}
