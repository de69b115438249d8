//! History record model. Records are immutable once written (no updated_at).

use quire_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HistoryRecord {
    pub id: DbId,
    pub subject_kind: String,
    pub subject_id: DbId,
    pub actor_id: DbId,
    pub action: String,
    pub payload: String,
    pub created_at: Timestamp,
}

/// DTO for appending a record. `payload` is already encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHistoryRecord {
    pub subject_kind: String,
    pub subject_id: DbId,
    pub actor_id: DbId,
    pub action: String,
    pub payload: String,
}
