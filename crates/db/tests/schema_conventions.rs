use sqlx::PgPool;

/// Every table's `id` column is a bigint.
#[sqlx::test(migrations = "./migrations")]
async fn test_all_pks_are_bigint(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name, data_type
         FROM information_schema.columns
         WHERE column_name = 'id'
           AND table_schema = 'public'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(rows.len(), 5);
    for (table, data_type) in &rows {
        assert_eq!(data_type, "bigint", "Table {table}.id should be bigint");
    }
}

/// Every timestamp column is timestamptz.
#[sqlx::test(migrations = "./migrations")]
async fn test_timestamps_are_timestamptz(pool: PgPool) {
    let rows: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT table_name, column_name, data_type
         FROM information_schema.columns
         WHERE table_schema = 'public'
           AND table_name != '_sqlx_migrations'
           AND (column_name LIKE '%\\_at' ESCAPE '\\')
         ORDER BY table_name, column_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(!rows.is_empty());
    for (table, column, data_type) in &rows {
        assert_eq!(
            data_type, "timestamp with time zone",
            "Table {table}.{column} should be timestamptz, got {data_type}"
        );
    }
}

/// The append-only and mutable tables carry the expected audit columns.
#[sqlx::test(migrations = "./migrations")]
async fn test_mutable_tables_have_updated_at(pool: PgPool) {
    for table in ["pages", "page_versions", "urls"] {
        let found: Option<(String,)> = sqlx::query_as(
            "SELECT column_name FROM information_schema.columns
             WHERE table_schema = 'public' AND table_name = $1 AND column_name = 'updated_at'",
        )
        .bind(table)
        .fetch_optional(&pool)
        .await
        .unwrap();
        assert!(found.is_some(), "Table {table} is missing updated_at");
    }

    let history_updated: Option<(String,)> = sqlx::query_as(
        "SELECT column_name FROM information_schema.columns
         WHERE table_schema = 'public' AND table_name = 'history' AND column_name = 'updated_at'",
    )
    .fetch_optional(&pool)
    .await
    .unwrap();
    assert!(history_updated.is_none(), "history is append-only");
}

/// Connect, migrate, and round-trip the health query.
#[sqlx::test(migrations = "./migrations")]
async fn test_health_check(pool: PgPool) {
    quire_db::health_check(&pool).await.unwrap();
}
