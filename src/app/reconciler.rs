//! The Schema Reconciler.
//!
//! This module converges the database onto the declared collection catalog:
//! 1.  Ensuring each collection table exists.
//! 2.  Installing or replacing the document validator (check function +
//!     CHECK constraint), always before that collection's indexes.
//! 3.  Ensuring every declared index exists with the declared definition,
//!     rebuilding on drift.
//! 4.  Seeding demo documents into collections that are empty.
//!
//! Every step re-derives its precondition from the database, so a run that
//! failed partway is safely resumed by simply invoking the reconciler again.

use crate::crypto::hashing::fingerprint;
use crate::domain::schema::{render, CollectionSpec, IndexSpec, ValidationAction, ValidationLevel};
use crate::domain::seed::{SeedBatch, SeedDocument};
use crate::error::{ReconcileError, Result};
use crate::infra::config;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

/// Reconciler-owned bookkeeping: one row per managed validator or index,
/// recording the fingerprint and text of the DDL last applied.
const REGISTRY_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_registry (
    object_name TEXT PRIMARY KEY,
    object_kind TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    definition TEXT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

/// Single-pass, synchronous schema reconciler. Holds no state beyond the
/// connection pool; all checks run against the live database every time.
pub struct Reconciler {
    pool: PgPool,
}

impl Reconciler {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connects using `DATABASE_URL` and bootstraps the registry table.
    pub async fn connect() -> Result<Self> {
        dotenv::dotenv().ok();
        let database_url = config::database_url();

        let pool = PgPoolOptions::new()
            .max_connections(config::max_connections())
            .connect(&database_url)
            .await
            .map_err(ReconcileError::Connect)?;

        Self::with_pool(pool).await
    }

    /// Wraps an existing pool (used by tests) and bootstraps the registry table.
    pub async fn with_pool(pool: PgPool) -> Result<Self> {
        sqlx::query(REGISTRY_TABLE_SQL).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Runs the whole reconciliation: every collection's schema and indexes,
    /// then seeding. Seeding order matters: users before tasks, because the
    /// seeded tasks reference the seeded user's identity.
    pub async fn run(&self, specs: &[CollectionSpec], seeds: &SeedBatch) -> Result<()> {
        for spec in specs {
            self.ensure_collection(spec).await?;
        }
        self.seed_if_empty("users", &seeds.users).await?;
        self.seed_if_empty("tasks", &seeds.tasks).await?;
        Ok(())
    }

    /// Ensures one collection: table, then validator, then indexes.
    ///
    /// The validator is always ensured before any index; a failure between
    /// the two leaves a state the next run completes from, since ensuring an
    /// already-correct validator or index is a no-op.
    pub async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
             )",
        )
        .bind(spec.name)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            info!(collection = spec.name, "collection present");
        } else {
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id  UUID  PRIMARY KEY,
                    doc JSONB NOT NULL
                )",
                spec.name
            ))
            .execute(&self.pool)
            .await?;
            info!(collection = spec.name, "collection created");
        }

        self.ensure_validator(spec).await?;

        for index in &spec.indexes {
            self.ensure_index(spec.name, index).await?;
        }

        Ok(())
    }

    /// Installs or replaces the collection's validator.
    ///
    /// The check function is applied with CREATE OR REPLACE, which changes
    /// future enforcement in place and never touches stored rows. The CHECK
    /// constraint is added NOT VALID for `Moderate` level (rows predating the
    /// validator stay untouched) and additionally validated for `Strict`.
    async fn ensure_validator(&self, spec: &CollectionSpec) -> Result<()> {
        let function_sql = render::render_check_function(spec.name, &spec.validator);
        let material = format!(
            "{function_sql}\n-- level={:?} action={:?}",
            spec.level, spec.action
        );
        let fp = fingerprint(&material);
        let registry_key = format!("{}::validator", spec.name);
        let stored = self.stored_fingerprint(&registry_key).await?;
        let unchanged = stored.as_deref() == Some(fp.as_str());

        sqlx::query(&function_sql).execute(&self.pool).await?;

        let constraint = render::check_constraint_name(spec.name);
        match spec.action {
            ValidationAction::Error => {
                let have_constraint: bool = sqlx::query_scalar(
                    "SELECT EXISTS (
                        SELECT 1 FROM information_schema.table_constraints
                        WHERE table_schema = 'public'
                          AND table_name = $1
                          AND constraint_name = $2
                     )",
                )
                .bind(spec.name)
                .bind(&constraint)
                .fetch_one(&self.pool)
                .await?;

                if !have_constraint {
                    sqlx::query(&format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({}(doc)) NOT VALID",
                        spec.name,
                        constraint,
                        render::check_function_name(spec.name)
                    ))
                    .execute(&self.pool)
                    .await?;
                }

                if spec.level == ValidationLevel::Strict {
                    sqlx::query(&format!(
                        "ALTER TABLE {} VALIDATE CONSTRAINT {}",
                        spec.name, constraint
                    ))
                    .execute(&self.pool)
                    .await?;
                }
            }
            ValidationAction::Warn => {
                // Advisory mode: the check function stays queryable, but no
                // constraint enforces it.
                sqlx::query(&format!(
                    "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
                    spec.name, constraint
                ))
                .execute(&self.pool)
                .await?;
            }
        }

        self.record(&registry_key, "validator", &fp, &function_sql)
            .await?;

        if unchanged {
            info!(collection = spec.name, "validator unchanged");
        } else {
            info!(
                collection = spec.name,
                level = ?spec.level,
                action = ?spec.action,
                "validator applied"
            );
        }
        Ok(())
    }

    /// Ensures one index exists with the declared definition.
    ///
    /// Same-name-different-definition is resolved by drop-and-recreate, never
    /// a silent skip: the registry fingerprint of the rendered DDL decides
    /// whether the existing index still matches.
    async fn ensure_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
        index.check_target(collection)?;

        let create_sql = render::render_index(index)?;
        let fp = fingerprint(&create_sql);
        let registry_key = format!("{}::index::{}", collection, index.name);

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM pg_indexes
                WHERE schemaname = 'public' AND tablename = $1 AND indexname = $2
             )",
        )
        .bind(collection)
        .bind(index.name)
        .fetch_one(&self.pool)
        .await?;

        // Drift detection trusts the registry fingerprint, not
        // pg_indexes.indexdef: the server normalizes indexdef, so it never
        // compares textually against the rendered DDL. An index replaced
        // under the same name by another actor is therefore not detected;
        // the reconciler assumes exclusive access to the database.
        let stored = self.stored_fingerprint(&registry_key).await?;
        if exists && stored.as_deref() == Some(fp.as_str()) {
            info!(collection, index = index.name, "index up to date");
            return Ok(());
        }

        if exists {
            // Definition drifted (or the registry lost track): rebuild.
            sqlx::query(&format!("DROP INDEX IF EXISTS {}", index.name))
                .execute(&self.pool)
                .await?;
            info!(collection, index = index.name, "index dropped for rebuild");
        }

        sqlx::query(&create_sql).execute(&self.pool).await?;
        self.record(&registry_key, "index", &fp, &create_sql).await?;
        info!(collection, index = index.name, "index created");
        Ok(())
    }

    /// Inserts the given documents if and only if the collection is empty.
    ///
    /// The emptiness check and the inserts are not atomic with each other;
    /// in this single-operator provisioning context that race is accepted.
    pub async fn seed_if_empty(&self, collection: &str, docs: &[SeedDocument]) -> Result<()> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM {collection}"))
            .fetch_one(&self.pool)
            .await?;

        if count != 0 {
            info!(collection, count, "collection not empty, seed skipped");
            return Ok(());
        }

        let mut transaction = self.pool.begin().await?;
        for doc in docs {
            sqlx::query(&format!(
                "INSERT INTO {collection} (id, doc) VALUES ($1, $2::jsonb)"
            ))
            .bind(doc.id)
            .bind(&doc.doc)
            .execute(&mut *transaction)
            .await?;
        }
        transaction.commit().await?;

        info!(collection, inserted = docs.len(), "seed documents inserted");
        Ok(())
    }

    async fn stored_fingerprint(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT fingerprint FROM schema_registry WHERE object_name = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get("fingerprint")).transpose()?)
    }

    async fn record(&self, key: &str, kind: &str, fp: &str, definition: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO schema_registry (object_name, object_kind, fingerprint, definition, updated_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (object_name) DO UPDATE SET
                object_kind = EXCLUDED.object_kind,
                fingerprint = EXCLUDED.fingerprint,
                definition = EXCLUDED.definition,
                updated_at = now()",
        )
        .bind(key)
        .bind(kind)
        .bind(fp)
        .bind(definition)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
