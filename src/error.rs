//! Error taxonomy for the reconciliation run.
//!
//! Every failure is fatal: the run stops at the first error and must be re-invoked.
//! Idempotence of the reconciler makes that retry safe.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The connection pool could not be established (network or authentication).
    #[error("failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Any database error during DDL or DML, including a malformed validator
    /// definition rejected by the server. Surfaced as-is.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An index declared a target collection other than the one being ensured.
    /// There is deliberately no fallback: every index names its collection.
    #[error("index '{index}' targets collection '{declared}' but is declared under '{ensuring}'")]
    IndexTargetMismatch {
        index: String,
        declared: String,
        ensuring: String,
    },

    /// An index declared no keys; there is nothing to build. Caught at
    /// render time, before any DDL is executed.
    #[error("index '{index}' declares no keys")]
    EmptyIndexKeys { index: String },

    /// A text index declared an unusable weight table (more than four weighted
    /// fields, a weight for a field missing from the key list, or a text key
    /// with no weight). Caught at render time, before any DDL is executed.
    #[error("text index '{index}': {detail}")]
    TextIndexWeights { index: String, detail: String },
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
