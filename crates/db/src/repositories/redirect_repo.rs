//! Repository for the `redirect_urls` table.

use quire_core::types::{DbId, Timestamp};
use quire_core::url::RedirectKind;
use sqlx::PgExecutor;

use crate::models::redirect::{RedirectRoute, RedirectUrl};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, destination, redirect_kind, created_at";

/// Redirect columns plus the routing slug, for the `r`/`u` join.
const ROUTE_SELECT: &str = "\
    SELECT r.id, u.slug, r.destination, r.redirect_kind, r.created_at \
    FROM redirect_urls r \
    LEFT JOIN urls u ON u.target_kind = 'redirecturl' AND u.target_id = r.id";

/// Provides CRUD operations for redirects.
pub struct RedirectRepo;

impl RedirectRepo {
    pub async fn insert<'e, E>(
        executor: E,
        destination: &str,
        kind: RedirectKind,
        now: Timestamp,
    ) -> Result<RedirectUrl, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO redirect_urls (destination, redirect_kind, created_at) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RedirectUrl>(&query)
            .bind(destination)
            .bind(kind.as_str())
            .bind(now)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(
        executor: E,
        id: DbId,
    ) -> Result<Option<RedirectUrl>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM redirect_urls WHERE id = $1");
        sqlx::query_as::<_, RedirectUrl>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_route<'e, E>(
        executor: E,
        id: DbId,
    ) -> Result<Option<RedirectRoute>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("{ROUTE_SELECT} WHERE r.id = $1");
        sqlx::query_as::<_, RedirectRoute>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Redirects with their slugs, newest first, optionally restricted to one kind.
    pub async fn list_routes<'e, E>(
        executor: E,
        kind: Option<RedirectKind>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RedirectRoute>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "{ROUTE_SELECT} \
             WHERE ($1::TEXT IS NULL OR r.redirect_kind = $1) \
             ORDER BY r.created_at DESC, r.id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, RedirectRoute>(&query)
            .bind(kind.map(|k| k.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count<'e, E>(executor: E, kind: Option<RedirectKind>) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM redirect_urls \
             WHERE ($1::TEXT IS NULL OR redirect_kind = $1)",
        )
        .bind(kind.map(|k| k.as_str()))
        .fetch_one(executor)
        .await
    }

    /// Returns `true` if a row was deleted.
    pub async fn delete<'e, E>(executor: E, id: DbId) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM redirect_urls WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
