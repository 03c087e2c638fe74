pub mod app;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod infra;

// Convenience re-exports (keeps call-sites clean)
pub use app::reconciler::Reconciler;
pub use crypto::hashing::fingerprint;
pub use domain::schema::{catalog, CollectionSpec, IndexKind, IndexSpec, Validator};
pub use domain::seed::{demo_batch, SeedBatch, SeedDocument};
pub use error::ReconcileError;
