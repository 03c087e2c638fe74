//! Provisioning entrypoint: runs the schema reconciler once and exits.
//!
//! Exit code is non-zero on the first unrecoverable database error; re-running
//! after a partial failure is always safe.

use taskdb_provision::{catalog, demo_batch, Reconciler};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let reconciler = Reconciler::connect().await?;
    let specs = catalog::collections();
    let seeds = demo_batch();
    reconciler.run(&specs, &seeds).await?;

    tracing::info!("reconciliation complete");
    Ok(())
}
