use crate::database::DatabasePool;
use crate::error::ApiError;
use crate::models::category::{
    CategoryLevel, CategoryMapping, CategoryMappingUpdate, CategoryNode, NewCategoryMapping,
};
use crate::repositories::is_foreign_key_violation;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list_nodes(&self, level: CategoryLevel) -> Result<Vec<CategoryNode>, ApiError>;
    /// `parent_id` is required for subcategory levels and ignored for categories.
    async fn create_node(
        &self,
        level: CategoryLevel,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> Result<CategoryNode, ApiError>;
    async fn update_node(
        &self,
        level: CategoryLevel,
        id: Uuid,
        name: Option<&str>,
        parent_id: Option<Uuid>,
    ) -> Result<Option<CategoryNode>, ApiError>;
    /// Children cascade with their parent. `false` if the row did not exist.
    async fn delete_node(&self, level: CategoryLevel, id: Uuid) -> Result<bool, ApiError>;

    async fn list_mappings(&self) -> Result<Vec<CategoryMapping>, ApiError>;
    async fn create_mapping(&self, mapping: &NewCategoryMapping) -> Result<CategoryMapping, ApiError>;
    async fn update_mapping(
        &self,
        id: Uuid,
        update: &CategoryMappingUpdate,
    ) -> Result<Option<CategoryMapping>, ApiError>;
    async fn delete_mapping(&self, id: Uuid) -> Result<bool, ApiError>;
    /// Atomically replaces every mapping for `mapping.excel_value` with this one.
    async fn replace_mapping(&self, mapping: &NewCategoryMapping) -> Result<CategoryMapping, ApiError>;
}

const MAPPING_COLUMNS: &str = "id, excel_value, mapping_type, mapped_id, created_at, updated_at";

fn node_columns(level: CategoryLevel) -> String {
    let parent = level.parent_column().unwrap_or("NULL::uuid");
    format!("id, name, {parent} AS parent_id, created_at, updated_at")
}

fn missing_parent(e: sqlx::Error) -> ApiError {
    if is_foreign_key_violation(&e) {
        ApiError::validation("Parent category does not exist")
    } else {
        ApiError::Database(e)
    }
}

pub struct SqlxCategoryRepository {
    pool: DatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn list_nodes(&self, level: CategoryLevel) -> Result<Vec<CategoryNode>, ApiError> {
        let nodes = sqlx::query_as::<_, CategoryNode>(&format!(
            "SELECT {} FROM {} ORDER BY name",
            node_columns(level),
            level.table()
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(nodes)
    }

    async fn create_node(
        &self,
        level: CategoryLevel,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> Result<CategoryNode, ApiError> {
        let sql = match level.parent_column() {
            Some(parent) => format!(
                "INSERT INTO {} (id, name, {parent}) VALUES ($1, $2, $3) RETURNING {}",
                level.table(),
                node_columns(level)
            ),
            None => format!(
                "INSERT INTO {} (id, name) VALUES ($1, $2) RETURNING {}",
                level.table(),
                node_columns(level)
            ),
        };

        let mut query = sqlx::query_as::<_, CategoryNode>(&sql)
            .bind(Uuid::new_v4())
            .bind(name);
        if level.parent_column().is_some() {
            query = query.bind(parent_id);
        }

        let node = query.fetch_one(&self.pool).await.map_err(missing_parent)?;
        Ok(node)
    }

    async fn update_node(
        &self,
        level: CategoryLevel,
        id: Uuid,
        name: Option<&str>,
        parent_id: Option<Uuid>,
    ) -> Result<Option<CategoryNode>, ApiError> {
        let sql = match level.parent_column() {
            Some(parent) => format!(
                "UPDATE {} SET name = COALESCE($1, name), updated_at = $2, \
                 {parent} = COALESCE($4, {parent}) WHERE id = $3 RETURNING {}",
                level.table(),
                node_columns(level)
            ),
            None => format!(
                "UPDATE {} SET name = COALESCE($1, name), updated_at = $2 \
                 WHERE id = $3 RETURNING {}",
                level.table(),
                node_columns(level)
            ),
        };

        let mut query = sqlx::query_as::<_, CategoryNode>(&sql)
            .bind(name)
            .bind(Utc::now())
            .bind(id);
        if level.parent_column().is_some() {
            query = query.bind(parent_id);
        }

        let node = query
            .fetch_optional(&self.pool)
            .await
            .map_err(missing_parent)?;

        Ok(node)
    }

    async fn delete_node(&self, level: CategoryLevel, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", level.table()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_mappings(&self) -> Result<Vec<CategoryMapping>, ApiError> {
        let mappings = sqlx::query_as::<_, CategoryMapping>(&format!(
            "SELECT {MAPPING_COLUMNS} FROM gw_category_mapping ORDER BY excel_value"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(mappings)
    }

    async fn create_mapping(&self, mapping: &NewCategoryMapping) -> Result<CategoryMapping, ApiError> {
        let created = sqlx::query_as::<_, CategoryMapping>(&format!(
            r#"
            INSERT INTO gw_category_mapping (id, excel_value, mapping_type, mapped_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {MAPPING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&mapping.excel_value)
        .bind(mapping.mapping_type)
        .bind(mapping.mapped_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update_mapping(
        &self,
        id: Uuid,
        update: &CategoryMappingUpdate,
    ) -> Result<Option<CategoryMapping>, ApiError> {
        let updated = sqlx::query_as::<_, CategoryMapping>(&format!(
            r#"
            UPDATE gw_category_mapping SET
                excel_value = COALESCE($1, excel_value),
                mapping_type = COALESCE($2, mapping_type),
                mapped_id = COALESCE($3, mapped_id),
                updated_at = $4
            WHERE id = $5
            RETURNING {MAPPING_COLUMNS}
            "#
        ))
        .bind(&update.excel_value)
        .bind(update.mapping_type)
        .bind(update.mapped_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn delete_mapping(&self, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM gw_category_mapping WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn replace_mapping(&self, mapping: &NewCategoryMapping) -> Result<CategoryMapping, ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM gw_category_mapping WHERE excel_value = $1")
            .bind(&mapping.excel_value)
            .execute(&mut *tx)
            .await?;

        let created = sqlx::query_as::<_, CategoryMapping>(&format!(
            r#"
            INSERT INTO gw_category_mapping (id, excel_value, mapping_type, mapped_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {MAPPING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&mapping.excel_value)
        .bind(mapping.mapping_type)
        .bind(mapping.mapped_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }
}
