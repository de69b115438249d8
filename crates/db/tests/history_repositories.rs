//! Integration tests for the history repository.

use chrono::{Duration, TimeZone, Utc};
use quire_core::types::Timestamp;
use quire_db::models::history::CreateHistoryRecord;
use quire_db::repositories::HistoryRepo;
use sqlx::PgPool;

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn record(subject_id: i64, actor_id: i64, action: &str) -> CreateHistoryRecord {
    CreateHistoryRecord {
        subject_kind: "pages".to_string(),
        subject_id,
        actor_id,
        action: action.to_string(),
        payload: String::new(),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_history_is_newest_first(pool: PgPool) {
    HistoryRepo::insert(&pool, &record(1, 5, "created"), t0()).await.unwrap();
    HistoryRepo::insert(&pool, &record(1, 6, "saved"), t0() + Duration::minutes(1))
        .await
        .unwrap();
    HistoryRepo::insert(&pool, &record(1, 5, "published"), t0() + Duration::minutes(2))
        .await
        .unwrap();
    HistoryRepo::insert(&pool, &record(2, 9, "created"), t0()).await.unwrap();

    let all = HistoryRepo::list_for_subject(&pool, "pages", 1, None, 0)
        .await
        .unwrap();
    let actions: Vec<&str> = all.iter().map(|r| r.action.as_str()).collect();
    assert_eq!(actions, vec!["published", "saved", "created"]);

    let limited = HistoryRepo::list_for_subject(&pool, "pages", 1, Some(1), 0)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].action, "published");

    let actors = HistoryRepo::distinct_actors(&pool, "pages", 1).await.unwrap();
    assert_eq!(actors, vec![5, 6]);
    assert_eq!(HistoryRepo::count_for_subject(&pool, "pages", 1).await.unwrap(), 3);
    assert_eq!(HistoryRepo::count_for_actor(&pool, 5).await.unwrap(), 2);
    let by_actor = HistoryRepo::list_for_actor(&pool, 9, 10, 0).await.unwrap();
    assert_eq!(by_actor.len(), 1);
}
