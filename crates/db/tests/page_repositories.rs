//! Integration tests for the page and page version repositories.
//!
//! Exercises the repository layer against a real database:
//! - Page insert, ordering, and the tree queries (ancestors, subtree, liveness)
//! - Trash flags on a page and its descendants
//! - Version inserts and the guarded status transitions
//! - The partial unique indexes behind "one published" and "one draft per user"

use chrono::{Duration, TimeZone, Utc};
use quire_core::page_type::Attributes;
use quire_core::types::{DbId, Timestamp};
use quire_core::versioning::{new_preview_key, VersionStatus};
use quire_db::models::page::{CreatePage, Page};
use quire_db::models::page_version::{CreatePageVersion, PageVersion};
use quire_db::repositories::{PageRepo, PageVersionRepo};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

async fn insert_page(pool: &PgPool, parent: Option<DbId>) -> Page {
    let order_index = PageRepo::next_order_index(pool, parent).await.unwrap();
    let input = CreatePage {
        page_type: "page".to_string(),
        parent_page_id: parent,
        order_index,
        created_by: 1,
    };
    PageRepo::insert(pool, &input, t0()).await.unwrap()
}

async fn insert_version(pool: &PgPool, page_id: DbId, number: i32, user: DbId) -> PageVersion {
    let mut attributes = Attributes::new();
    attributes.insert("name".to_string(), json!(format!("v{number}")));
    let input = CreatePageVersion {
        page_id,
        version_number: number,
        attributes,
        created_by: user,
        preview_key: new_preview_key(),
    };
    PageVersionRepo::insert(pool, &input, t0()).await.unwrap()
}

// ---------------------------------------------------------------------------
// Test: page tree
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_siblings_are_ordered_by_insertion(pool: PgPool) {
    let first = insert_page(&pool, None).await;
    let second = insert_page(&pool, None).await;
    assert_eq!(first.order_index, 1);
    assert_eq!(second.order_index, 2);

    PageRepo::set_order_index(&pool, first.id, 5, t0()).await.unwrap();
    let roots = PageRepo::list_children(&pool, None, 10, 0).await.unwrap();
    let ids: Vec<DbId> = roots.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(PageRepo::count_children(&pool, None).await.unwrap(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_ancestors_are_root_first(pool: PgPool) {
    let root = insert_page(&pool, None).await;
    let mid = insert_page(&pool, Some(root.id)).await;
    let leaf = insert_page(&pool, Some(mid.id)).await;

    let ancestors = PageRepo::ancestors(&pool, leaf.id).await.unwrap();
    let ids: Vec<DbId> = ancestors.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![root.id, mid.id]);
    assert!(PageRepo::ancestors(&pool, root.id).await.unwrap().is_empty());

    let mut subtree = PageRepo::subtree_ids(&pool, root.id).await.unwrap();
    subtree.sort();
    assert_eq!(subtree, vec![root.id, mid.id, leaf.id]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_liveness_follows_trashed_ancestors(pool: PgPool) {
    let root = insert_page(&pool, None).await;
    let child = insert_page(&pool, Some(root.id)).await;

    assert_eq!(PageRepo::is_live(&pool, child.id).await.unwrap(), Some(true));
    assert!(PageRepo::trash(&pool, root.id, t0()).await.unwrap());
    assert!(!PageRepo::trash(&pool, root.id, t0()).await.unwrap());
    assert_eq!(PageRepo::is_live(&pool, child.id).await.unwrap(), Some(false));
    assert_eq!(PageRepo::is_live(&pool, 9_999).await.unwrap(), None);

    assert_eq!(PageRepo::count_trashed(&pool).await.unwrap(), 1);
    assert!(PageRepo::untrash(&pool, root.id, t0()).await.unwrap());
    assert_eq!(PageRepo::is_live(&pool, child.id).await.unwrap(), Some(true));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_untrash_descendants_skips_the_page_itself(pool: PgPool) {
    let root = insert_page(&pool, None).await;
    let child = insert_page(&pool, Some(root.id)).await;
    let grandchild = insert_page(&pool, Some(child.id)).await;

    PageRepo::trash(&pool, root.id, t0()).await.unwrap();
    PageRepo::trash(&pool, grandchild.id, t0()).await.unwrap();

    let cleared = PageRepo::untrash_descendants(&pool, root.id, t0()).await.unwrap();
    assert_eq!(cleared, 1);
    let root_after = PageRepo::find_by_id(&pool, root.id).await.unwrap().unwrap();
    assert!(root_after.is_trashed);
    let grandchild_after = PageRepo::find_by_id(&pool, grandchild.id).await.unwrap().unwrap();
    assert!(!grandchild_after.is_trashed);
    assert!(grandchild_after.trashed_at.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_many_cascades_to_versions(pool: PgPool) {
    let page = insert_page(&pool, None).await;
    let version = insert_version(&pool, page.id, 1, 1).await;

    assert_eq!(PageRepo::delete_many(&pool, &[page.id]).await.unwrap(), 1);
    assert!(PageVersionRepo::find_by_id(&pool, version.id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test: versions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_version_insert_and_lookup(pool: PgPool) {
    let page = insert_page(&pool, None).await;
    let v1 = insert_version(&pool, page.id, 1, 1).await;

    assert_eq!(v1.status, VersionStatus::Draft);
    assert_eq!(v1.attribute_map()["name"], json!("v1"));
    assert_eq!(v1.preview_key.len(), 32);

    let by_key = PageVersionRepo::find_by_preview_key(&pool, &v1.preview_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_key.id, v1.id);
    assert_eq!(PageVersionRepo::max_version_number(&pool, page.id).await.unwrap(), 1);
    assert_eq!(PageVersionRepo::max_version_number(&pool, 9_999).await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_one_draft_per_user_is_enforced(pool: PgPool) {
    let page = insert_page(&pool, None).await;
    insert_version(&pool, page.id, 1, 7).await;

    let input = CreatePageVersion {
        page_id: page.id,
        version_number: 2,
        attributes: Attributes::new(),
        created_by: 7,
        preview_key: new_preview_key(),
    };
    let err = PageVersionRepo::insert(&pool, &input, t0()).await.unwrap_err();
    assert!(err.as_database_error().is_some_and(|e| e.is_unique_violation()));

    // Another user may hold a draft alongside.
    insert_version(&pool, page.id, 2, 8).await;
    let drafts = PageVersionRepo::list_drafts_for_user(&pool, page.id, 8).await.unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].version_number, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_publish_archives_previous(pool: PgPool) {
    let page = insert_page(&pool, None).await;
    let v1 = insert_version(&pool, page.id, 1, 1).await;
    let v2 = insert_version(&pool, page.id, 2, 2).await;

    let published = PageVersionRepo::mark_published(&pool, v1.id, &v1.attribute_map(), t0())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.status, VersionStatus::Published);
    assert_eq!(published.published_at, Some(t0()));

    let mut tx = pool.begin().await.unwrap();
    let archived = PageVersionRepo::archive_published(&mut *tx, page.id, t0()).await.unwrap();
    assert_eq!(archived, 1);
    PageVersionRepo::mark_published(&mut *tx, v2.id, &v2.attribute_map(), t0())
        .await
        .unwrap()
        .unwrap();
    tx.commit().await.unwrap();

    let current = PageVersionRepo::find_published(&pool, page.id).await.unwrap().unwrap();
    assert_eq!(current.id, v2.id);
    let old = PageVersionRepo::find_by_id(&pool, v1.id).await.unwrap().unwrap();
    assert_eq!(old.status, VersionStatus::Archived);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_second_published_row_is_rejected(pool: PgPool) {
    let page = insert_page(&pool, None).await;
    let v1 = insert_version(&pool, page.id, 1, 1).await;
    let v2 = insert_version(&pool, page.id, 2, 2).await;

    PageVersionRepo::mark_published(&pool, v1.id, &Attributes::new(), t0())
        .await
        .unwrap();
    let err = PageVersionRepo::mark_published(&pool, v2.id, &Attributes::new(), t0())
        .await
        .unwrap_err();
    assert!(err.as_database_error().is_some_and(|e| e.is_unique_violation()));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_transitions_are_guarded_by_status(pool: PgPool) {
    let page = insert_page(&pool, None).await;
    let v1 = insert_version(&pool, page.id, 1, 1).await;

    let discarded = PageVersionRepo::transition(
        &pool,
        v1.id,
        VersionStatus::Draft,
        VersionStatus::Discarded,
        t0(),
    )
    .await
    .unwrap();
    assert_eq!(discarded.unwrap().status, VersionStatus::Discarded);

    let again = PageVersionRepo::transition(
        &pool,
        v1.id,
        VersionStatus::Draft,
        VersionStatus::Discarded,
        t0(),
    )
    .await
    .unwrap();
    assert!(again.is_none());
    assert!(PageVersionRepo::update_attributes(&pool, v1.id, &Attributes::new(), t0())
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_list_due_orders_by_schedule(pool: PgPool) {
    let a = insert_page(&pool, None).await;
    let b = insert_page(&pool, None).await;
    let va = insert_version(&pool, a.id, 1, 1).await;
    let vb = insert_version(&pool, b.id, 1, 1).await;

    PageVersionRepo::schedule(&pool, va.id, t0() + Duration::hours(2), t0())
        .await
        .unwrap()
        .unwrap();
    PageVersionRepo::schedule(&pool, vb.id, t0() + Duration::hours(1), t0())
        .await
        .unwrap()
        .unwrap();

    let none_due = PageVersionRepo::list_due(&pool, t0(), 10).await.unwrap();
    assert!(none_due.is_empty());

    let due = PageVersionRepo::list_due(&pool, t0() + Duration::hours(3), 10)
        .await
        .unwrap();
    let ids: Vec<DbId> = due.iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![vb.id, va.id]);

    let limited = PageVersionRepo::list_due(&pool, t0() + Duration::hours(3), 1)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);

    assert!(PageVersionRepo::clear_schedule(&pool, vb.id, t0()).await.unwrap());
    let due = PageVersionRepo::list_due(&pool, t0() + Duration::hours(3), 10)
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
}
