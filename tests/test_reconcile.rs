//! End-to-end reconciliation test against a live PostgreSQL instance.
//!
//! Runs every step sequentially inside one test so the shared `users`/`tasks`
//! tables are never raced: empty database -> reconcile -> assert structure and
//! seeds -> reconcile again -> assert convergence -> probe the validator.
//!
//! Skipped (with a notice) when DATABASE_URL is not set.

use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use taskdb_provision::domain::schema::render;
use taskdb_provision::{catalog, demo_batch, Reconciler};
use uuid::Uuid;

const MANAGED_INDEXES: &[&str] = &[
    "users_email_unique",
    "users_is_active",
    "users_created_at_desc",
    "tasks_owner_status",
    "tasks_due_date",
    "tasks_text_search",
    "tasks_is_deleted",
    "tasks_status_created",
];

async fn reset(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("DROP TABLE IF EXISTS tasks, users, schema_registry CASCADE")
        .execute(pool)
        .await?;
    sqlx::query("DROP FUNCTION IF EXISTS users_doc_check(jsonb) CASCADE")
        .execute(pool)
        .await?;
    sqlx::query("DROP FUNCTION IF EXISTS tasks_doc_check(jsonb) CASCADE")
        .execute(pool)
        .await?;
    Ok(())
}

async fn count(pool: &PgPool, table: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT count(*) FROM {table}"))
        .fetch_one(pool)
        .await
}

async fn registry_fingerprints(pool: &PgPool) -> Result<HashMap<String, String>, sqlx::Error> {
    let rows = sqlx::query("SELECT object_name, fingerprint FROM schema_registry")
        .fetch_all(pool)
        .await?;
    let mut map = HashMap::new();
    for row in rows {
        map.insert(row.try_get("object_name")?, row.try_get("fingerprint")?);
    }
    Ok(map)
}

async fn insert_doc(
    pool: &PgPool,
    table: &str,
    doc: serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!("INSERT INTO {table} (id, doc) VALUES ($1, $2::jsonb)"))
        .bind(Uuid::new_v4())
        .bind(doc)
        .execute(pool)
        .await
        .map(|_| ())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconcile_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping live reconciliation test.");
        return Ok(());
    };

    println!("--- test_reconcile_end_to_end ---");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    reset(&pool).await?;

    let reconciler = Reconciler::with_pool(pool.clone()).await?;
    let specs = catalog::collections();

    // --- First run against an empty database ---
    let seeds = demo_batch();
    let owner_id = seeds.owner_id;
    reconciler.run(&specs, &seeds).await?;

    assert_eq!(count(&pool, "users").await?, 1);
    assert_eq!(count(&pool, "tasks").await?, 2);

    // Every seeded task references the single seeded user.
    let user_id: String = sqlx::query_scalar("SELECT id::text FROM users")
        .fetch_one(&pool)
        .await?;
    assert_eq!(user_id, owner_id.to_string());
    let mismatched: i64 = sqlx::query_scalar("SELECT count(*) FROM tasks WHERE doc->>'ownerId' <> $1")
        .bind(&user_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(mismatched, 0);

    // Both tasks start undeleted.
    let undeleted: i64 =
        sqlx::query_scalar("SELECT count(*) FROM tasks WHERE (doc->>'isDeleted')::bool = false")
            .fetch_one(&pool)
            .await?;
    assert_eq!(undeleted, 2);

    // All declared indexes exist.
    let managed: Vec<String> = MANAGED_INDEXES.iter().map(|s| s.to_string()).collect();
    let indexes: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM pg_indexes WHERE schemaname = 'public' AND indexname = ANY($1)",
    )
    .bind(&managed)
    .fetch_one(&pool)
    .await?;
    assert_eq!(indexes as usize, MANAGED_INDEXES.len());

    // Text search over the weighted tsvector finds a seeded title keyword.
    let text_index = specs[1]
        .indexes
        .iter()
        .find(|i| i.is_text())
        .expect("tasks must declare a text index");
    let vector = render::text_vector_expr(text_index)?;
    let hits: i64 = sqlx::query_scalar(&format!(
        "SELECT count(*) FROM tasks WHERE ({vector}) @@ plainto_tsquery('english', 'onboarding')"
    ))
    .fetch_one(&pool)
    .await?;
    assert!(hits >= 1, "expected the onboarding task to be searchable");

    println!("> First run converged; checking idempotence...");

    // --- Second run: state must not change ---
    let fingerprints_before = registry_fingerprints(&pool).await?;
    reconciler.run(&specs, &demo_batch()).await?;

    assert_eq!(count(&pool, "users").await?, 1, "seed guard must hold");
    assert_eq!(count(&pool, "tasks").await?, 2, "seed guard must hold");
    assert_eq!(registry_fingerprints(&pool).await?, fingerprints_before);

    let indexes_after: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM pg_indexes WHERE schemaname = 'public' AND indexname = ANY($1)",
    )
    .bind(&managed)
    .fetch_one(&pool)
    .await?;
    assert_eq!(indexes_after, indexes);

    println!("> Idempotent; forcing index drift...");

    // --- Index drift: same name, different definition must be rebuilt ---
    let original_def: String = sqlx::query_scalar(
        "SELECT indexdef FROM pg_indexes
         WHERE schemaname = 'public' AND indexname = 'tasks_due_date'",
    )
    .fetch_one(&pool)
    .await?;
    sqlx::query("DROP INDEX tasks_due_date").execute(&pool).await?;
    sqlx::query("CREATE INDEX tasks_due_date ON tasks ((doc->>'dueDate') DESC)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "UPDATE schema_registry SET fingerprint = 'drifted'
         WHERE object_name = 'tasks::index::tasks_due_date'",
    )
    .execute(&pool)
    .await?;

    reconciler.run(&specs, &demo_batch()).await?;

    let rebuilt_def: String = sqlx::query_scalar(
        "SELECT indexdef FROM pg_indexes
         WHERE schemaname = 'public' AND indexname = 'tasks_due_date'",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(
        rebuilt_def, original_def,
        "a drifted index must be rebuilt to the declared definition"
    );
    let restored_fp: String = sqlx::query_scalar(
        "SELECT fingerprint FROM schema_registry
         WHERE object_name = 'tasks::index::tasks_due_date'",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(
        Some(restored_fp.as_str()),
        fingerprints_before
            .get("tasks::index::tasks_due_date")
            .map(|s| s.as_str()),
        "the registry fingerprint must be restored after the rebuild"
    );

    println!("> Drifted index rebuilt; probing the validator...");

    // --- Validator enforcement ---
    let now = chrono::Utc::now().to_rfc3339();

    // Positive control: a conforming task is accepted.
    insert_doc(
        &pool,
        "tasks",
        json!({
            "title": "Conforming probe task",
            "status": "todo",
            "ownerId": user_id,
            "createdAt": now,
            "isDeleted": false
        }),
    )
    .await?;
    sqlx::query("DELETE FROM tasks WHERE doc->>'title' = 'Conforming probe task'")
        .execute(&pool)
        .await?;

    // Status outside the enumeration is rejected.
    assert!(insert_doc(
        &pool,
        "tasks",
        json!({
            "title": "Bad status",
            "status": "blocked",
            "ownerId": user_id,
            "createdAt": now
        }),
    )
    .await
    .is_err());

    // A task without a title is rejected.
    assert!(insert_doc(
        &pool,
        "tasks",
        json!({
            "status": "todo",
            "ownerId": user_id,
            "createdAt": now
        }),
    )
    .await
    .is_err());

    // An email shorter than five characters is rejected.
    assert!(insert_doc(
        &pool,
        "users",
        json!({
            "email": "a@b",
            "passwordHash": "x".repeat(24),
            "createdAt": now
        }),
    )
    .await
    .is_err());

    // An unknown top-level field is rejected.
    assert!(insert_doc(
        &pool,
        "users",
        json!({
            "email": "probe@taskdb.local",
            "passwordHash": "x".repeat(24),
            "createdAt": now,
            "favouriteColour": "green"
        }),
    )
    .await
    .is_err());

    // A duplicate email trips the unique index.
    assert!(insert_doc(
        &pool,
        "users",
        json!({
            "email": "demo@taskdb.local",
            "passwordHash": "y".repeat(24),
            "createdAt": now
        }),
    )
    .await
    .is_err());
    assert_eq!(count(&pool, "users").await?, 1);

    println!("> Validator and uniqueness enforced. Done.");
    Ok(())
}
