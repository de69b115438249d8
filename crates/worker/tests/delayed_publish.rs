//! Integration tests for the delayed publish sweep.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use quire_content::PageStore;
use quire_core::clock::{Clock, ManualClock};
use quire_core::history::{ACTION_DELAYED_PUBLISH_FAILED, ACTION_PUBLISHED};
use quire_core::page_type::{Attributes, PageTypeRegistry};
use quire_core::types::{DbId, Timestamp};
use quire_core::versioning::VersionStatus;
use quire_worker::{DelayedPublisher, SweepReport};
use serde_json::json;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

const EDITOR: DbId = 1;

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()
}

fn named(name: &str) -> Attributes {
    match json!({ "name": name }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn setup(pool: PgPool, batch_size: i64) -> (PageStore, DelayedPublisher, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = PageStore::new(
        pool,
        Arc::new(PageTypeRegistry::with_defaults()),
        clock.clone() as Arc<dyn Clock>,
    );
    let publisher = DelayedPublisher::new(store.clone(), batch_size, StdDuration::from_secs(60));
    (store, publisher, clock)
}

/// Create a page whose first version is scheduled at `at`.
async fn scheduled_page(store: &PageStore, name: &str, at: Timestamp) -> DbId {
    let page = store.create("page", EDITOR, None).await.unwrap();
    store
        .save_draft_version(page.id, 1, &named(name), EDITOR)
        .await
        .unwrap();
    store
        .publish_version(page.id, 1, EDITOR, Some(at))
        .await
        .unwrap();
    page.id
}

async fn status_of(store: &PageStore, page_id: DbId) -> VersionStatus {
    store.versions(page_id).await.unwrap()[0].status
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_sweep_publishes_only_due_versions(pool: PgPool) {
    let (store, publisher, clock) = setup(pool, 100);

    let soon = scheduled_page(&store, "Soon", t0() + Duration::hours(1)).await;
    let later = scheduled_page(&store, "Later", t0() + Duration::days(1)).await;

    assert_eq!(publisher.run().await.unwrap(), SweepReport::default());

    clock.advance(Duration::hours(2));
    let report = publisher.run().await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(report.failed, 0);

    assert_eq!(status_of(&store, soon).await, VersionStatus::Published);
    assert_eq!(status_of(&store, later).await, VersionStatus::Scheduled);
    assert!(store.urls().find_by_slug("soon").await.is_ok());
    assert!(store.urls().find_by_slug("later").await.is_err());

    let history = store.history(soon, Some(1)).await.unwrap();
    assert_eq!(history[0].action, ACTION_PUBLISHED);
    assert_eq!(history[0].actor_id, EDITOR);

    // Nothing left to do until tomorrow.
    assert_eq!(publisher.run().await.unwrap(), SweepReport::default());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_failed_version_returns_to_draft_and_sweep_continues(pool: PgPool) {
    let (store, publisher, clock) = setup(pool, 100);

    let blocked = scheduled_page(&store, "Launch", t0() + Duration::hours(1)).await;
    let fine = scheduled_page(&store, "Pricing", t0() + Duration::hours(2)).await;

    // Another page takes the slug before the schedule fires.
    let squatter = store.create("page", EDITOR, None).await.unwrap();
    store
        .save_draft_version(squatter.id, 1, &named("Launch"), EDITOR)
        .await
        .unwrap();
    store
        .publish_version(squatter.id, 1, EDITOR, None)
        .await
        .unwrap();

    clock.advance(Duration::hours(3));
    let report = publisher.run().await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            published: 1,
            skipped: 0,
            failed: 1,
        }
    );

    assert_eq!(status_of(&store, blocked).await, VersionStatus::Draft);
    assert_eq!(status_of(&store, fine).await, VersionStatus::Published);

    let history = store.history(blocked, Some(1)).await.unwrap();
    assert_eq!(history[0].action, ACTION_DELAYED_PUBLISH_FAILED);
    assert!(history[0].payload.contains("\"version\":1"));

    // The failed version is out of the schedule and is not retried.
    assert_eq!(publisher.run().await.unwrap(), SweepReport::default());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_sweep_respects_batch_size(pool: PgPool) {
    let (store, publisher, clock) = setup(pool, 2);

    for (i, name) in ["One", "Two", "Three"].iter().enumerate() {
        scheduled_page(&store, name, t0() + Duration::minutes(10 * (i as i64 + 1))).await;
    }

    clock.advance(Duration::hours(1));
    assert_eq!(publisher.run().await.unwrap().published, 2);
    assert!(store.urls().find_by_slug("three").await.is_err());

    assert_eq!(publisher.run().await.unwrap().published, 1);
    assert!(store.urls().find_by_slug("three").await.is_ok());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_run_loop_stops_on_cancel(pool: PgPool) {
    let (_store, publisher, _clock) = setup(pool, 10);

    let cancel = CancellationToken::new();
    cancel.cancel();
    tokio::time::timeout(StdDuration::from_secs(5), publisher.run_loop(cancel))
        .await
        .expect("run_loop returns once cancelled");
}
