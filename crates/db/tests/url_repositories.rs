//! Integration tests for the URL and redirect repositories.

use chrono::{Duration, TimeZone, Utc};
use quire_core::types::Timestamp;
use quire_core::url::{RedirectKind, UrlKind};
use quire_db::repositories::{RedirectRepo, UrlRepo};
use sqlx::PgPool;

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Test: urls
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_slug_is_unique(pool: PgPool) {
    UrlRepo::insert(&pool, "about", UrlKind::Page, 1, t0()).await.unwrap();
    let err = UrlRepo::insert(&pool, "about", UrlKind::Page, 2, t0())
        .await
        .unwrap_err();
    assert!(err.as_database_error().is_some_and(|e| e.is_unique_violation()));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_live_target_owns_one_slug(pool: PgPool) {
    UrlRepo::insert(&pool, "about", UrlKind::Page, 1, t0()).await.unwrap();
    let err = UrlRepo::insert(&pool, "about-us", UrlKind::Page, 1, t0())
        .await
        .unwrap_err();
    assert!(err.as_database_error().is_some_and(|e| e.is_unique_violation()));

    // Wildcards are exempt: several old slugs may forward to the same entry.
    UrlRepo::insert(&pool, "old-a", UrlKind::Wildcard, 1, t0()).await.unwrap();
    UrlRepo::insert(&pool, "old-b", UrlKind::Wildcard, 1, t0()).await.unwrap();
}

#[sqlx::test(migrations = "./migrations")]
async fn test_longest_wildcard_wins(pool: PgPool) {
    UrlRepo::insert(&pool, "a", UrlKind::Wildcard, 10, t0()).await.unwrap();
    let ab = UrlRepo::insert(&pool, "a/b", UrlKind::Wildcard, 11, t0()).await.unwrap();
    UrlRepo::insert(&pool, "a/b/x", UrlKind::Page, 3, t0()).await.unwrap();

    let hit = UrlRepo::find_longest_wildcard(&pool, &["a/b/c", "a/b", "a"])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.id, ab.id);

    let miss = UrlRepo::find_longest_wildcard(&pool, &["z"]).await.unwrap();
    assert!(miss.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_rewrite_descendants_skips_taken_slugs(pool: PgPool) {
    UrlRepo::insert(&pool, "blog/one", UrlKind::Page, 1, t0()).await.unwrap();
    UrlRepo::insert(&pool, "blog/two", UrlKind::Page, 2, t0()).await.unwrap();
    UrlRepo::insert(&pool, "blog/two/deep", UrlKind::Page, 3, t0()).await.unwrap();
    UrlRepo::insert(&pool, "blogger", UrlKind::Page, 4, t0()).await.unwrap();
    UrlRepo::insert(&pool, "news/two", UrlKind::Page, 5, t0()).await.unwrap();
    let news = UrlRepo::insert(&pool, "news", UrlKind::Page, 6, t0()).await.unwrap();

    let later = t0() + Duration::minutes(5);
    let rewritten = UrlRepo::rewrite_descendants(&pool, "blog", "news", news.id, later)
        .await
        .unwrap();
    assert_eq!(rewritten, 2);

    let one = UrlRepo::find_for(&pool, UrlKind::Page, 1).await.unwrap().unwrap();
    assert_eq!(one.slug, "news/one");
    assert_eq!(one.updated_at, later);
    let deep = UrlRepo::find_for(&pool, UrlKind::Page, 3).await.unwrap().unwrap();
    assert_eq!(deep.slug, "news/two/deep");

    // Collision and non-descendant stay put.
    let two = UrlRepo::find_for(&pool, UrlKind::Page, 2).await.unwrap().unwrap();
    assert_eq!(two.slug, "blog/two");
    let blogger = UrlRepo::find_for(&pool, UrlKind::Page, 4).await.unwrap().unwrap();
    assert_eq!(blogger.slug, "blogger");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_rewrite_descendants_skips_kept_entry(pool: PgPool) {
    UrlRepo::insert(&pool, "a/y", UrlKind::Page, 2, t0()).await.unwrap();
    let kept = UrlRepo::insert(&pool, "a/x", UrlKind::Page, 1, t0()).await.unwrap();

    let rewritten = UrlRepo::rewrite_descendants(&pool, "a", "a/x", kept.id, t0())
        .await
        .unwrap();
    assert_eq!(rewritten, 1);

    let kept = UrlRepo::find_by_id(&pool, kept.id).await.unwrap().unwrap();
    assert_eq!(kept.slug, "a/x");
    let moved = UrlRepo::find_for(&pool, UrlKind::Page, 2).await.unwrap().unwrap();
    assert_eq!(moved.slug, "a/x/y");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_list_filters_by_kind(pool: PgPool) {
    UrlRepo::insert(&pool, "a", UrlKind::Page, 1, t0()).await.unwrap();
    UrlRepo::insert(&pool, "b", UrlKind::RedirectUrl, 1, t0() + Duration::seconds(1))
        .await
        .unwrap();
    UrlRepo::insert(&pool, "c", UrlKind::Page, 2, t0() + Duration::seconds(2))
        .await
        .unwrap();

    let all = UrlRepo::list(&pool, None, 10, 0).await.unwrap();
    let slugs: Vec<&str> = all.iter().map(|u| u.slug.as_str()).collect();
    assert_eq!(slugs, vec!["c", "b", "a"]);

    let pages = UrlRepo::list(&pool, Some(UrlKind::Page), 10, 0).await.unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(UrlRepo::count(&pool, Some(UrlKind::RedirectUrl)).await.unwrap(), 1);
    assert_eq!(UrlRepo::count(&pool, None).await.unwrap(), 3);

    let deleted = UrlRepo::delete_for_targets(&pool, UrlKind::Page, &[1, 2]).await.unwrap();
    assert_eq!(deleted, 2);
}

// ---------------------------------------------------------------------------
// Test: redirects
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_redirect_crud(pool: PgPool) {
    let temp = RedirectRepo::insert(&pool, "https://example.org", RedirectKind::Temporary, t0())
        .await
        .unwrap();
    RedirectRepo::insert(&pool, "/elsewhere", RedirectKind::Permanent, t0())
        .await
        .unwrap();

    let found = RedirectRepo::find_by_id(&pool, temp.id).await.unwrap().unwrap();
    assert_eq!(found.redirect_kind, RedirectKind::Temporary);
    assert_eq!(
        RedirectRepo::count(&pool, Some(RedirectKind::Temporary)).await.unwrap(),
        1
    );
    assert_eq!(RedirectRepo::count(&pool, None).await.unwrap(), 2);

    let routes = RedirectRepo::list_routes(&pool, None, 10, 0).await.unwrap();
    assert_eq!(routes.len(), 2);
    assert!(routes.iter().all(|r| r.slug.is_none()));

    assert!(RedirectRepo::delete(&pool, temp.id).await.unwrap());
    assert!(!RedirectRepo::delete(&pool, temp.id).await.unwrap());
}
