//! Repository for the `pages` table.

use quire_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::page::{CreatePage, Page};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, page_type, parent_page_id, order_index, name, is_trashed, \
    trashed_at, created_by, created_at, updated_at";

/// Same columns qualified with the `p` alias, for joins.
const P_COLUMNS: &str = "\
    p.id, p.page_type, p.parent_page_id, p.order_index, p.name, p.is_trashed, \
    p.trashed_at, p.created_by, p.created_at, p.updated_at";

/// Ids of page `$1` and every page below it.
const SUBTREE_CTE: &str = "\
    WITH RECURSIVE subtree AS ( \
        SELECT id FROM pages WHERE id = $1 \
        UNION ALL \
        SELECT p.id FROM pages p JOIN subtree s ON p.parent_page_id = s.id \
    )";

/// Guard against runaway recursion on corrupted parent links.
const MAX_DEPTH: i32 = 1000;

/// Provides CRUD and tree operations for pages.
pub struct PageRepo;

impl PageRepo {
    pub async fn insert<'e, E>(
        executor: E,
        input: &CreatePage,
        now: Timestamp,
    ) -> Result<Page, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO pages (page_type, parent_page_id, order_index, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(&input.page_type)
            .bind(input.parent_page_id)
            .bind(input.order_index)
            .bind(input.created_by)
            .bind(now)
            .fetch_one(executor)
            .await
    }

    /// Find a page by id, trashed or not.
    pub async fn find_by_id<'e, E>(executor: E, id: DbId) -> Result<Option<Page>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM pages WHERE id = $1");
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a page and hold its row lock until the transaction ends.
    pub async fn lock<'e, E>(executor: E, id: DbId) -> Result<Option<Page>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM pages WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Non-trashed pages among `ids`, in display order.
    pub async fn find_by_ids<'e, E>(executor: E, ids: &[DbId]) -> Result<Vec<Page>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM pages \
             WHERE id = ANY($1) AND NOT is_trashed \
             ORDER BY order_index ASC, id ASC"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(ids)
            .fetch_all(executor)
            .await
    }

    /// Non-trashed children of `parent_id` (roots when `None`), in display order.
    pub async fn list_children<'e, E>(
        executor: E,
        parent_id: Option<DbId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Page>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM pages \
             WHERE parent_page_id IS NOT DISTINCT FROM $1 AND NOT is_trashed \
             ORDER BY order_index ASC, id ASC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(parent_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count_children<'e, E>(
        executor: E,
        parent_id: Option<DbId>,
    ) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM pages \
             WHERE parent_page_id IS NOT DISTINCT FROM $1 AND NOT is_trashed",
        )
        .bind(parent_id)
        .fetch_one(executor)
        .await
    }

    /// Order index that places a new page last among its siblings.
    pub async fn next_order_index<'e, E>(
        executor: E,
        parent_id: Option<DbId>,
    ) -> Result<i32, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(order_index), 0) + 1 FROM pages \
             WHERE parent_page_id IS NOT DISTINCT FROM $1",
        )
        .bind(parent_id)
        .fetch_one(executor)
        .await
    }

    /// Returns `true` if a row was updated.
    pub async fn set_order_index<'e, E>(
        executor: E,
        id: DbId,
        order_index: i32,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE pages SET order_index = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(order_index)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_name<'e, E>(
        executor: E,
        id: DbId,
        name: &str,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE pages SET name = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(name)
            .bind(now)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flag a page as trashed. Returns `false` if it was missing or already trashed.
    pub async fn trash<'e, E>(executor: E, id: DbId, now: Timestamp) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE pages SET is_trashed = true, trashed_at = $2, updated_at = $2 \
             WHERE id = $1 AND NOT is_trashed",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear a page's own trash flag. Returns `false` if it was not trashed.
    pub async fn untrash<'e, E>(executor: E, id: DbId, now: Timestamp) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE pages SET is_trashed = false, trashed_at = NULL, updated_at = $2 \
             WHERE id = $1 AND is_trashed",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear the trash flag on every trashed page strictly below `id`.
    pub async fn untrash_descendants<'e, E>(
        executor: E,
        id: DbId,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "{SUBTREE_CTE} \
             UPDATE pages SET is_trashed = false, trashed_at = NULL, updated_at = $2 \
             WHERE id IN (SELECT id FROM subtree WHERE id <> $1) AND is_trashed"
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(now)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Pages carrying their own trash flag, most recently trashed first.
    pub async fn list_trashed<'e, E>(
        executor: E,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Page>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM pages WHERE is_trashed \
             ORDER BY trashed_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count_trashed<'e, E>(executor: E) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*)::BIGINT FROM pages WHERE is_trashed")
            .fetch_one(executor)
            .await
    }

    /// Ancestors of `id`, root first. Excludes the page itself.
    pub async fn ancestors<'e, E>(executor: E, id: DbId) -> Result<Vec<Page>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "WITH RECURSIVE chain AS ( \
                 SELECT parent_page_id AS id, 1 AS depth FROM pages WHERE id = $1 \
                 UNION ALL \
                 SELECT p.parent_page_id, c.depth + 1 \
                 FROM pages p JOIN chain c ON p.id = c.id \
                 WHERE c.depth < {MAX_DEPTH} \
             ) \
             SELECT {P_COLUMNS} FROM pages p JOIN chain c ON p.id = c.id \
             ORDER BY c.depth DESC"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_all(executor)
            .await
    }

    /// `Some(true)` when neither the page nor any ancestor is trashed,
    /// `None` when the page does not exist.
    pub async fn is_live<'e, E>(executor: E, id: DbId) -> Result<Option<bool>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "WITH RECURSIVE chain AS ( \
                 SELECT id, parent_page_id, is_trashed, 1 AS depth FROM pages WHERE id = $1 \
                 UNION ALL \
                 SELECT p.id, p.parent_page_id, p.is_trashed, c.depth + 1 \
                 FROM pages p JOIN chain c ON p.id = c.parent_page_id \
                 WHERE c.depth < {MAX_DEPTH} \
             ) \
             SELECT NOT bool_or(is_trashed) FROM chain"
        );
        sqlx::query_scalar::<_, Option<bool>>(&query)
            .bind(id)
            .fetch_one(executor)
            .await
    }

    /// Ids of `id` and all of its descendants.
    pub async fn subtree_ids<'e, E>(executor: E, id: DbId) -> Result<Vec<DbId>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("{SUBTREE_CTE} SELECT id FROM subtree");
        sqlx::query_scalar::<_, DbId>(&query)
            .bind(id)
            .fetch_all(executor)
            .await
    }

    /// Hard-delete pages. Versions go with them through the cascade.
    pub async fn delete_many<'e, E>(executor: E, ids: &[DbId]) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM pages WHERE id = ANY($1)")
            .bind(ids)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
