use sqlx::postgres::PgPoolOptions;
use taskdb_provision::catalog;
use taskdb_provision::infra::config;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight\n\
         \n\
         Requires env vars:\n\
           DATABASE_URL\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }

    // Force-read config (nice error messages if missing)
    let database_url = config::database_url();

    println!("> Preflight:");
    println!("  DATABASE_URL is set ({} chars)", database_url.len());

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to the database: {}", e))?;

    let version: String = sqlx::query_scalar("SELECT version()").fetch_one(&pool).await?;
    println!("  Server: {}", version);

    for spec in catalog::collections() {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
             )",
        )
        .bind(spec.name)
        .fetch_one(&pool)
        .await?;

        if exists {
            let count: i64 =
                sqlx::query_scalar(&format!("SELECT count(*) FROM {}", spec.name))
                    .fetch_one(&pool)
                    .await?;
            println!(
                "  Collection '{}': present ({} documents, {} indexes declared)",
                spec.name,
                count,
                spec.indexes.len()
            );
        } else {
            println!(
                "  Collection '{}': absent (will be created by the provision run)",
                spec.name
            );
        }
    }

    match sqlx::query_scalar::<_, i64>("SELECT count(*) FROM schema_registry")
        .fetch_one(&pool)
        .await
    {
        Ok(entries) => println!("  Registry: {} entries recorded", entries),
        Err(_) => println!("  Registry: absent (first run will create it)"),
    }

    println!("> Preflight OK.");
    Ok(())
}
