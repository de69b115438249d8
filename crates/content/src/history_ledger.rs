//! Append-only audit trail over the `history` table.

use std::sync::Arc;

use quire_core::clock::Clock;
use quire_core::history::encode_payload;
use quire_core::pagination::{Paginated, Pagination};
use quire_core::types::{DbId, Timestamp};
use quire_db::models::history::{CreateHistoryRecord, HistoryRecord};
use quire_db::repositories::HistoryRepo;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};

use crate::error::ContentResult;

#[derive(Clone)]
pub struct HistoryLedger {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl HistoryLedger {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Append one record in its own transaction.
    pub async fn add(
        &self,
        subject_kind: &str,
        subject_id: DbId,
        actor_id: DbId,
        action: &str,
        payload: &Value,
    ) -> ContentResult<HistoryRecord> {
        let mut tx = self.pool.begin().await?;
        let record = Self::append(
            &mut tx,
            subject_kind,
            subject_id,
            actor_id,
            action,
            payload,
            self.clock.now(),
        )
        .await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Append one record on a caller-owned connection, so the record commits
    /// or rolls back together with the write it describes.
    pub(crate) async fn append(
        conn: &mut PgConnection,
        subject_kind: &str,
        subject_id: DbId,
        actor_id: DbId,
        action: &str,
        payload: &Value,
        now: Timestamp,
    ) -> ContentResult<HistoryRecord> {
        let input = CreateHistoryRecord {
            subject_kind: subject_kind.to_string(),
            subject_id,
            actor_id,
            action: action.to_string(),
            payload: encode_payload(payload),
        };
        Ok(HistoryRepo::insert(&mut *conn, &input, now).await?)
    }

    /// Records for a subject, newest first. `None` returns every record.
    pub async fn get(
        &self,
        subject_kind: &str,
        subject_id: DbId,
        limit: Option<i64>,
    ) -> ContentResult<Vec<HistoryRecord>> {
        let limit = limit.map(|l| l.max(0));
        Ok(HistoryRepo::list_for_subject(&self.pool, subject_kind, subject_id, limit, 0).await?)
    }

    pub async fn get_paginated(
        &self,
        subject_kind: &str,
        subject_id: DbId,
        pagination: Pagination,
    ) -> ContentResult<Paginated<HistoryRecord>> {
        let items = HistoryRepo::list_for_subject(
            &self.pool,
            subject_kind,
            subject_id,
            Some(pagination.limit()),
            pagination.offset(),
        )
        .await?;
        let total = HistoryRepo::count_for_subject(&self.pool, subject_kind, subject_id).await?;
        Ok(Paginated::new(items, total, pagination))
    }

    /// Distinct actors that touched a subject.
    pub async fn actors(&self, subject_kind: &str, subject_id: DbId) -> ContentResult<Vec<DbId>> {
        Ok(HistoryRepo::distinct_actors(&self.pool, subject_kind, subject_id).await?)
    }

    /// Everything one actor did, newest first.
    pub async fn for_actor(
        &self,
        actor_id: DbId,
        pagination: Pagination,
    ) -> ContentResult<Paginated<HistoryRecord>> {
        let items = HistoryRepo::list_for_actor(
            &self.pool,
            actor_id,
            pagination.limit(),
            pagination.offset(),
        )
        .await?;
        let total = HistoryRepo::count_for_actor(&self.pool, actor_id).await?;
        Ok(Paginated::new(items, total, pagination))
    }
}
