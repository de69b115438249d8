//! Repository for the append-only `history` table.

use quire_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::history::{CreateHistoryRecord, HistoryRecord};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, subject_kind, subject_id, actor_id, action, payload, created_at";

/// Provides insert and query operations for history records. There is no
/// update or delete.
pub struct HistoryRepo;

impl HistoryRepo {
    pub async fn insert<'e, E>(
        executor: E,
        input: &CreateHistoryRecord,
        now: Timestamp,
    ) -> Result<HistoryRecord, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO history (subject_kind, subject_id, actor_id, action, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, HistoryRecord>(&query)
            .bind(&input.subject_kind)
            .bind(input.subject_id)
            .bind(input.actor_id)
            .bind(&input.action)
            .bind(&input.payload)
            .bind(now)
            .fetch_one(executor)
            .await
    }

    /// Records about one subject, newest first. A `None` limit returns all.
    pub async fn list_for_subject<'e, E>(
        executor: E,
        subject_kind: &str,
        subject_id: DbId,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<HistoryRecord>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM history \
             WHERE subject_kind = $1 AND subject_id = $2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, HistoryRecord>(&query)
            .bind(subject_kind)
            .bind(subject_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count_for_subject<'e, E>(
        executor: E,
        subject_kind: &str,
        subject_id: DbId,
    ) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM history WHERE subject_kind = $1 AND subject_id = $2",
        )
        .bind(subject_kind)
        .bind(subject_id)
        .fetch_one(executor)
        .await
    }

    /// Distinct actors that touched a subject, in ascending id order.
    pub async fn distinct_actors<'e, E>(
        executor: E,
        subject_kind: &str,
        subject_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, DbId>(
            "SELECT DISTINCT actor_id FROM history \
             WHERE subject_kind = $1 AND subject_id = $2 \
             ORDER BY actor_id ASC",
        )
        .bind(subject_kind)
        .bind(subject_id)
        .fetch_all(executor)
        .await
    }

    /// Records written by one actor, newest first.
    pub async fn list_for_actor<'e, E>(
        executor: E,
        actor_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoryRecord>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM history WHERE actor_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, HistoryRecord>(&query)
            .bind(actor_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count_for_actor<'e, E>(executor: E, actor_id: DbId) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*)::BIGINT FROM history WHERE actor_id = $1")
            .bind(actor_id)
            .fetch_one(executor)
            .await
    }
}
