//! URL registry entry model.

use quire_core::types::{DbId, Timestamp};
use quire_core::url::UrlKind;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `urls` table.
///
/// For `Wildcard` entries `target_id` is the id of another `urls` row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct UrlEntry {
    pub id: DbId,
    pub slug: String,
    #[sqlx(try_from = "String")]
    pub target_kind: UrlKind,
    pub target_id: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UrlEntry {
    pub fn is_wildcard(&self) -> bool {
        self.target_kind == UrlKind::Wildcard
    }

    pub fn points_at(&self, kind: UrlKind, id: DbId) -> bool {
        self.target_kind == kind && self.target_id == id
    }
}
