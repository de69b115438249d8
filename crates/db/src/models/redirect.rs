//! Redirect entity model.

use quire_core::types::{DbId, Timestamp};
use quire_core::url::RedirectKind;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `redirect_urls` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RedirectUrl {
    pub id: DbId,
    pub destination: String,
    #[sqlx(try_from = "String")]
    pub redirect_kind: RedirectKind,
    pub created_at: Timestamp,
}

/// A redirect joined with the slug that routes to it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RedirectRoute {
    pub id: DbId,
    pub slug: Option<String>,
    pub destination: String,
    #[sqlx(try_from = "String")]
    pub redirect_kind: RedirectKind,
    pub created_at: Timestamp,
}
