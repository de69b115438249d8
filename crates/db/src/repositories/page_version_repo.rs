//! Repository for the `page_versions` table.
//!
//! Status-changing updates carry a `WHERE status = ...` guard and return
//! `None` when the guard did not match, so callers can tell a lost race
//! from a successful transition.

use quire_core::page_type::Attributes;
use quire_core::types::{DbId, Timestamp};
use quire_core::versioning::VersionStatus;
use sqlx::types::Json;
use sqlx::PgExecutor;

use crate::models::page_version::{CreatePageVersion, PageVersion};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, page_id, version_number, status, attributes, created_by, preview_key, \
    published_at, scheduled_publish_at, created_at, updated_at";

/// Provides CRUD and state transitions for page versions.
pub struct PageVersionRepo;

impl PageVersionRepo {
    /// Insert a new `draft` version.
    pub async fn insert<'e, E>(
        executor: E,
        input: &CreatePageVersion,
        now: Timestamp,
    ) -> Result<PageVersion, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO page_versions \
                (page_id, version_number, status, attributes, created_by, preview_key, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(input.page_id)
            .bind(input.version_number)
            .bind(VersionStatus::Draft.as_str())
            .bind(Json(&input.attributes))
            .bind(input.created_by)
            .bind(&input.preview_key)
            .bind(now)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: DbId) -> Result<Option<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM page_versions WHERE id = $1");
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a version by page and number.
    pub async fn find<'e, E>(
        executor: E,
        page_id: DbId,
        version_number: i32,
    ) -> Result<Option<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM page_versions WHERE page_id = $1 AND version_number = $2"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(page_id)
            .bind(version_number)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_preview_key<'e, E>(
        executor: E,
        preview_key: &str,
    ) -> Result<Option<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM page_versions WHERE preview_key = $1");
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(preview_key)
            .fetch_optional(executor)
            .await
    }

    /// All versions of a page, newest first.
    pub async fn list_by_page<'e, E>(
        executor: E,
        page_id: DbId,
    ) -> Result<Vec<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM page_versions WHERE page_id = $1 ORDER BY version_number DESC"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(page_id)
            .fetch_all(executor)
            .await
    }

    pub async fn find_published<'e, E>(
        executor: E,
        page_id: DbId,
    ) -> Result<Option<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM page_versions WHERE page_id = $1 AND status = $2"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(page_id)
            .bind(VersionStatus::Published.as_str())
            .fetch_optional(executor)
            .await
    }

    /// The highest-numbered version of a page, whatever its status.
    pub async fn find_latest<'e, E>(
        executor: E,
        page_id: DbId,
    ) -> Result<Option<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM page_versions WHERE page_id = $1 \
             ORDER BY version_number DESC LIMIT 1"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(page_id)
            .fetch_optional(executor)
            .await
    }

    /// Highest version number used so far, 0 when the page has none.
    pub async fn max_version_number<'e, E>(executor: E, page_id: DbId) -> Result<i32, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(version_number), 0) FROM page_versions WHERE page_id = $1",
        )
        .bind(page_id)
        .fetch_one(executor)
        .await
    }

    /// Open drafts a user holds on a page, newest first.
    pub async fn list_drafts_for_user<'e, E>(
        executor: E,
        page_id: DbId,
        user_id: DbId,
    ) -> Result<Vec<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM page_versions \
             WHERE page_id = $1 AND created_by = $2 AND status = $3 \
             ORDER BY version_number DESC"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(page_id)
            .bind(user_id)
            .bind(VersionStatus::Draft.as_str())
            .fetch_all(executor)
            .await
    }

    /// Overwrite a draft's payload.
    pub async fn update_attributes<'e, E>(
        executor: E,
        id: DbId,
        attributes: &Attributes,
        now: Timestamp,
    ) -> Result<Option<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE page_versions SET attributes = $2, updated_at = $3 \
             WHERE id = $1 AND status = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(id)
            .bind(Json(attributes))
            .bind(now)
            .bind(VersionStatus::Draft.as_str())
            .fetch_optional(executor)
            .await
    }

    /// Move a version from `from` to `to`, clearing any schedule.
    pub async fn transition<'e, E>(
        executor: E,
        id: DbId,
        from: VersionStatus,
        to: VersionStatus,
        now: Timestamp,
    ) -> Result<Option<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE page_versions SET status = $3, scheduled_publish_at = NULL, updated_at = $4 \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(now)
            .fetch_optional(executor)
            .await
    }

    /// Set a pending version to `scheduled` for the given time.
    pub async fn schedule<'e, E>(
        executor: E,
        id: DbId,
        publish_at: Timestamp,
        now: Timestamp,
    ) -> Result<Option<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE page_versions SET status = $2, scheduled_publish_at = $3, updated_at = $4 \
             WHERE id = $1 AND status IN ($5, $2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(id)
            .bind(VersionStatus::Scheduled.as_str())
            .bind(publish_at)
            .bind(now)
            .bind(VersionStatus::Draft.as_str())
            .fetch_optional(executor)
            .await
    }

    /// Drop the publish time of a scheduled version without changing its
    /// status, so the sweep no longer picks it up.
    pub async fn clear_schedule<'e, E>(
        executor: E,
        id: DbId,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE page_versions SET scheduled_publish_at = NULL, updated_at = $2 \
             WHERE id = $1 AND status = $3",
        )
        .bind(id)
        .bind(now)
        .bind(VersionStatus::Scheduled.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Archive whatever version of the page is currently published.
    pub async fn archive_published<'e, E>(
        executor: E,
        page_id: DbId,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE page_versions SET status = $2, updated_at = $3 \
             WHERE page_id = $1 AND status = $4",
        )
        .bind(page_id)
        .bind(VersionStatus::Archived.as_str())
        .bind(now)
        .bind(VersionStatus::Published.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark a pending version published, storing the validated payload.
    pub async fn mark_published<'e, E>(
        executor: E,
        id: DbId,
        attributes: &Attributes,
        now: Timestamp,
    ) -> Result<Option<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE page_versions \
             SET status = $2, attributes = $3, published_at = $4, \
                 scheduled_publish_at = NULL, updated_at = $4 \
             WHERE id = $1 AND status IN ($5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(id)
            .bind(VersionStatus::Published.as_str())
            .bind(Json(attributes))
            .bind(now)
            .bind(VersionStatus::Draft.as_str())
            .bind(VersionStatus::Scheduled.as_str())
            .fetch_optional(executor)
            .await
    }

    /// Scheduled versions whose time has come, oldest schedule first.
    pub async fn list_due<'e, E>(
        executor: E,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<PageVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM page_versions \
             WHERE status = $1 AND scheduled_publish_at <= $2 \
             ORDER BY scheduled_publish_at ASC, id ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, PageVersion>(&query)
            .bind(VersionStatus::Scheduled.as_str())
            .bind(now)
            .bind(limit)
            .fetch_all(executor)
            .await
    }
}
