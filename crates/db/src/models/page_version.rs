//! Page version entity model and DTOs.

use quire_core::page_type::Attributes;
use quire_core::types::{DbId, Timestamp};
use quire_core::versioning::VersionStatus;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `page_versions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PageVersion {
    pub id: DbId,
    pub page_id: DbId,
    pub version_number: i32,
    #[sqlx(try_from = "String")]
    pub status: VersionStatus,
    pub attributes: serde_json::Value,
    pub created_by: DbId,
    pub preview_key: String,
    pub published_at: Option<Timestamp>,
    pub scheduled_publish_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PageVersion {
    /// The stored payload as an attribute map. Non-object payloads read as empty.
    pub fn attribute_map(&self) -> Attributes {
        match &self.attributes {
            serde_json::Value::Object(map) => map.clone(),
            _ => Attributes::new(),
        }
    }
}

/// DTO for inserting a version.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePageVersion {
    pub page_id: DbId,
    pub version_number: i32,
    pub attributes: Attributes,
    pub created_by: DbId,
    pub preview_key: String,
}
