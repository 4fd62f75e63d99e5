use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// The three levels of the shop's category tree. Also the target kind of a
/// spreadsheet category mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "category_mapping_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CategoryLevel {
    Category,
    Subcategory1,
    Subcategory2,
}

impl CategoryLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "category" => Some(CategoryLevel::Category),
            "subcategory1" => Some(CategoryLevel::Subcategory1),
            "subcategory2" => Some(CategoryLevel::Subcategory2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryLevel::Category => "category",
            CategoryLevel::Subcategory1 => "subcategory1",
            CategoryLevel::Subcategory2 => "subcategory2",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            CategoryLevel::Category => "gw_category",
            CategoryLevel::Subcategory1 => "gw_subcategory1",
            CategoryLevel::Subcategory2 => "gw_subcategory2",
        }
    }

    /// Column referencing the parent level, if this level has one.
    pub fn parent_column(&self) -> Option<&'static str> {
        match self {
            CategoryLevel::Category => None,
            CategoryLevel::Subcategory1 => Some("category_id"),
            CategoryLevel::Subcategory2 => Some("subcategory_id"),
        }
    }
}

/// One row of `gw_category`, `gw_subcategory1` or `gw_subcategory2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMapping {
    pub id: Uuid,
    pub excel_value: String,
    pub mapping_type: CategoryLevel,
    pub mapped_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategoryMapping {
    pub excel_value: String,
    pub mapping_type: CategoryLevel,
    pub mapped_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryMappingUpdate {
    pub excel_value: Option<String>,
    pub mapping_type: Option<CategoryLevel>,
    pub mapped_id: Option<Uuid>,
}

/// Everything the category settings page needs in one response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySettings {
    pub categories: Vec<CategoryNode>,
    pub subcategories1: Vec<CategoryNode>,
    pub subcategories2: Vec<CategoryNode>,
    pub mappings: Vec<CategoryMapping>,
}

/// A mapping with the target's display name resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMapping {
    #[serde(rename = "type")]
    pub mapping_type: CategoryLevel,
    pub id: Uuid,
    pub name: String,
}

pub type ResolvedMappings = BTreeMap<String, ResolvedMapping>;

/// What a category settings request operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryResource {
    Node(CategoryLevel),
    Mapping,
}

impl CategoryResource {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "mapping" => Some(CategoryResource::Mapping),
            other => CategoryLevel::parse(other).map(CategoryResource::Node),
        }
    }
}

/// Payload fields for any category resource; each kind reads the ones it needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryData {
    pub name: Option<String>,
    pub parent_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub excel_value: Option<String>,
    pub mapping_type: Option<String>,
    pub mapped_id: Option<Uuid>,
}

impl CategoryData {
    /// The parent reference for `level`, accepting the column-style alias.
    pub fn parent_for(&self, level: CategoryLevel) -> Option<Uuid> {
        match level {
            CategoryLevel::Category => None,
            CategoryLevel::Subcategory1 => self.parent_id.or(self.category_id),
            CategoryLevel::Subcategory2 => self.parent_id.or(self.subcategory_id),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub id: Option<Uuid>,
    #[serde(default)]
    pub data: CategoryData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingTarget {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMappingRequest {
    pub excel_category: Option<String>,
    pub mapping: Option<MappingTarget>,
}

/// Resolve mapping targets against the category tree; targets that no longer
/// exist resolve to an empty name.
pub fn resolve_mappings(settings: &CategorySettings) -> ResolvedMappings {
    let name_of = |level: CategoryLevel, id: Uuid| -> String {
        let nodes = match level {
            CategoryLevel::Category => &settings.categories,
            CategoryLevel::Subcategory1 => &settings.subcategories1,
            CategoryLevel::Subcategory2 => &settings.subcategories2,
        };
        nodes
            .iter()
            .find(|node| node.id == id)
            .map(|node| node.name.clone())
            .unwrap_or_default()
    };

    settings
        .mappings
        .iter()
        .map(|mapping| {
            (
                mapping.excel_value.clone(),
                ResolvedMapping {
                    mapping_type: mapping.mapping_type,
                    id: mapping.mapped_id,
                    name: name_of(mapping.mapping_type, mapping.mapped_id),
                },
            )
        })
        .collect()
}
