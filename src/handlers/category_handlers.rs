use crate::auth::context::RequestContext;
use crate::auth::rbac::Action;
use crate::models::category::{
    resolve_mappings, CategoryData, CategoryLevel, CategoryMappingUpdate, CategoryRequest,
    CategoryResource, CategorySettings, NewCategoryMapping, SaveMappingRequest,
};
use crate::repositories::CategoryRepository;
use crate::require_permission;
use crate::utils::non_blank;
use crate::{error::ApiError, AppState};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde_json::{json, Value};
use uuid::Uuid;

async fn load_settings(repo: &dyn CategoryRepository) -> Result<CategorySettings, ApiError> {
    Ok(CategorySettings {
        categories: repo.list_nodes(CategoryLevel::Category).await?,
        subcategories1: repo.list_nodes(CategoryLevel::Subcategory1).await?,
        subcategories2: repo.list_nodes(CategoryLevel::Subcategory2).await?,
        mappings: repo.list_mappings().await?,
    })
}

fn parse_resource(kind: Option<String>) -> Result<CategoryResource, ApiError> {
    non_blank(kind)
        .and_then(|k| CategoryResource::parse(&k))
        .ok_or_else(|| ApiError::validation("Invalid category type"))
}

fn parse_level(kind: Option<String>) -> Result<CategoryLevel, ApiError> {
    non_blank(kind)
        .and_then(|k| CategoryLevel::parse(&k))
        .ok_or_else(|| ApiError::validation("Invalid mapping type"))
}

fn require_id(id: Option<Uuid>) -> Result<Uuid, ApiError> {
    id.ok_or_else(|| ApiError::validation("ID is required"))
}

fn new_mapping(data: CategoryData) -> Result<NewCategoryMapping, ApiError> {
    let (Some(excel_value), Some(mapped_id)) = (non_blank(data.excel_value), data.mapped_id) else {
        return Err(ApiError::validation("Excel value, mapping type and target are required"));
    };

    Ok(NewCategoryMapping {
        excel_value,
        mapping_type: parse_level(data.mapping_type)?,
        mapped_id,
    })
}

pub async fn get_category_settings(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    require_permission!(user, Action::ViewCategories, "You do not have permission to view categories");

    let settings = load_settings(state.category_repository.as_ref()).await?;
    let mut body = serde_json::to_value(settings)
        .map_err(|e| ApiError::internal(format!("Failed to serialize settings: {}", e)))?;
    body["success"] = json!(true);

    Ok(Json(body))
}

pub async fn create_category_item(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = context.require_user()?;
    require_permission!(user, Action::ManageCategories, "You do not have permission to manage categories");

    let repo = state.category_repository.as_ref();
    let item = match parse_resource(request.kind)? {
        CategoryResource::Node(level) => {
            let name = non_blank(request.data.name.clone())
                .ok_or_else(|| ApiError::validation("Name is required"))?;
            let parent_id = request.data.parent_for(level);
            if level.parent_column().is_some() && parent_id.is_none() {
                return Err(ApiError::validation("Parent category is required"));
            }
            json!(repo.create_node(level, &name, parent_id).await?)
        }
        CategoryResource::Mapping => json!(repo.create_mapping(&new_mapping(request.data)?).await?),
    };

    tracing::info!(user_id = %user.id, "category item created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "item": item })),
    ))
}

pub async fn update_category_item(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<CategoryRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    require_permission!(user, Action::ManageCategories, "You do not have permission to manage categories");

    let resource = parse_resource(request.kind)?;
    let id = require_id(request.id)?;
    let repo = state.category_repository.as_ref();
    let data = request.data;

    let item = match resource {
        CategoryResource::Node(level) => {
            let name = non_blank(data.name.clone());
            repo.update_node(level, id, name.as_deref(), data.parent_for(level))
                .await?
                .map(|node| json!(node))
        }
        CategoryResource::Mapping => {
            let update = CategoryMappingUpdate {
                excel_value: non_blank(data.excel_value),
                mapping_type: match non_blank(data.mapping_type) {
                    Some(kind) => Some(parse_level(Some(kind))?),
                    None => None,
                },
                mapped_id: data.mapped_id,
            };
            repo.update_mapping(id, &update).await?.map(|mapping| json!(mapping))
        }
    };

    let item = item.ok_or_else(|| ApiError::not_found("Item not found"))?;
    tracing::info!(user_id = %user.id, item_id = %id, "category item updated");
    Ok(Json(json!({ "success": true, "item": item })))
}

pub async fn delete_category_item(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<CategoryRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    require_permission!(user, Action::ManageCategories, "You do not have permission to manage categories");

    let resource = parse_resource(request.kind)?;
    let id = require_id(request.id)?;
    let repo = state.category_repository.as_ref();

    let deleted = match resource {
        CategoryResource::Node(level) => repo.delete_node(level, id).await?,
        CategoryResource::Mapping => repo.delete_mapping(id).await?,
    };
    if !deleted {
        return Err(ApiError::not_found("Item not found"));
    }

    tracing::info!(user_id = %user.id, item_id = %id, "category item deleted");
    Ok(Json(json!({ "success": true })))
}

/// Mappings keyed by spreadsheet value, with target names resolved.
pub async fn get_category_mappings(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    require_permission!(user, Action::ViewCategories, "You do not have permission to view categories");

    let settings = load_settings(state.category_repository.as_ref()).await?;
    Ok(Json(json!({
        "success": true,
        "mappings": resolve_mappings(&settings),
    })))
}

pub async fn save_category_mapping(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(request): Json<SaveMappingRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;
    require_permission!(user, Action::ManageCategories, "You do not have permission to manage categories");

    let excel_value = non_blank(request.excel_category)
        .ok_or_else(|| ApiError::validation("Excel category is required"))?;
    let target = request
        .mapping
        .ok_or_else(|| ApiError::validation("Mapping is required"))?;
    let mapped_id = require_id(target.id)?;

    let mapping = state
        .category_repository
        .replace_mapping(&NewCategoryMapping {
            excel_value,
            mapping_type: parse_level(target.kind)?,
            mapped_id,
        })
        .await?;

    tracing::info!(user_id = %user.id, excel_value = %mapping.excel_value, "category mapping saved");
    Ok(Json(json!({ "success": true, "mapping": mapping })))
}
