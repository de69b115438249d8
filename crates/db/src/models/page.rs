//! Page entity model and DTOs.

use quire_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `pages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Page {
    pub id: DbId,
    pub page_type: String,
    pub parent_page_id: Option<DbId>,
    pub order_index: i32,
    pub name: String,
    pub is_trashed: bool,
    pub trashed_at: Option<Timestamp>,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a page.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePage {
    pub page_type: String,
    pub parent_page_id: Option<DbId>,
    pub order_index: i32,
    pub created_by: DbId,
}

/// One entry of a bulk re-ordering request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PageOrder {
    pub page_id: DbId,
    pub order_index: i32,
}
