//! Repository for the `urls` table.

use quire_core::types::{DbId, Timestamp};
use quire_core::url::UrlKind;
use sqlx::PgExecutor;

use crate::models::url::UrlEntry;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, slug, target_kind, target_id, created_at, updated_at";

/// Advisory lock key serialising every registry writer.
pub const REGISTRY_LOCK_KEY: i64 = 0x7175_6972_6575_726c;

/// Provides lookups and writes for URL entries.
pub struct UrlRepo;

impl UrlRepo {
    /// Take the registry-wide advisory lock for the rest of the transaction.
    pub async fn acquire_write_lock<'e, E>(executor: E) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(REGISTRY_LOCK_KEY)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn find_by_id<'e, E>(executor: E, id: DbId) -> Result<Option<UrlEntry>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM urls WHERE id = $1");
        sqlx::query_as::<_, UrlEntry>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_slug<'e, E>(
        executor: E,
        slug: &str,
    ) -> Result<Option<UrlEntry>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM urls WHERE slug = $1");
        sqlx::query_as::<_, UrlEntry>(&query)
            .bind(slug)
            .fetch_optional(executor)
            .await
    }

    /// The longest wildcard entry whose slug is one of `candidates`.
    pub async fn find_longest_wildcard<'e, E>(
        executor: E,
        candidates: &[&str],
    ) -> Result<Option<UrlEntry>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM urls \
             WHERE target_kind = $1 AND slug = ANY($2) \
             ORDER BY length(slug) DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, UrlEntry>(&query)
            .bind(UrlKind::Wildcard.as_str())
            .bind(candidates)
            .fetch_optional(executor)
            .await
    }

    /// The entry that currently points at the given target.
    pub async fn find_for<'e, E>(
        executor: E,
        kind: UrlKind,
        target_id: DbId,
    ) -> Result<Option<UrlEntry>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM urls WHERE target_kind = $1 AND target_id = $2 \
             ORDER BY id ASC LIMIT 1"
        );
        sqlx::query_as::<_, UrlEntry>(&query)
            .bind(kind.as_str())
            .bind(target_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn insert<'e, E>(
        executor: E,
        slug: &str,
        kind: UrlKind,
        target_id: DbId,
        now: Timestamp,
    ) -> Result<UrlEntry, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO urls (slug, target_kind, target_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UrlEntry>(&query)
            .bind(slug)
            .bind(kind.as_str())
            .bind(target_id)
            .bind(now)
            .fetch_one(executor)
            .await
    }

    /// Point an existing entry at a different target.
    pub async fn retarget<'e, E>(
        executor: E,
        id: DbId,
        kind: UrlKind,
        target_id: DbId,
        now: Timestamp,
    ) -> Result<Option<UrlEntry>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE urls SET target_kind = $2, target_id = $3, updated_at = $4 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UrlEntry>(&query)
            .bind(id)
            .bind(kind.as_str())
            .bind(target_id)
            .bind(now)
            .fetch_optional(executor)
            .await
    }

    /// Move every entry below `old_slug` under `new_slug`.
    ///
    /// Entries whose rewritten slug is already taken keep their old slug.
    /// `keep_id` is never rewritten; it is the entry that now owns
    /// `new_slug`, which may itself sit below `old_slug`.
    pub async fn rewrite_descendants<'e, E>(
        executor: E,
        old_slug: &str,
        new_slug: &str,
        keep_id: DbId,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        // substr() is 1-based: position old_len + 1 is the '/' after the prefix.
        let result = sqlx::query(
            "UPDATE urls u \
             SET slug = $2 || substr(u.slug, $3), updated_at = $4 \
             WHERE u.slug LIKE $1 \
               AND u.id <> $5 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM urls o WHERE o.slug = $2 || substr(u.slug, $3) \
               )",
        )
        .bind(quire_core::url::descendant_pattern(old_slug))
        .bind(new_slug)
        .bind(old_slug.chars().count() as i32 + 1)
        .bind(now)
        .bind(keep_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Returns `true` if a row was deleted.
    pub async fn delete_by_id<'e, E>(executor: E, id: DbId) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM urls WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete the entries owned by any of the given targets.
    pub async fn delete_for_targets<'e, E>(
        executor: E,
        kind: UrlKind,
        target_ids: &[DbId],
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM urls WHERE target_kind = $1 AND target_id = ANY($2)")
            .bind(kind.as_str())
            .bind(target_ids)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Entries newest first, optionally restricted to one kind.
    pub async fn list<'e, E>(
        executor: E,
        kind: Option<UrlKind>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UrlEntry>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM urls \
             WHERE ($1::TEXT IS NULL OR target_kind = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, UrlEntry>(&query)
            .bind(kind.map(|k| k.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count<'e, E>(executor: E, kind: Option<UrlKind>) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM urls WHERE ($1::TEXT IS NULL OR target_kind = $1)",
        )
        .bind(kind.map(|k| k.as_str()))
        .fetch_one(executor)
        .await
    }
}
