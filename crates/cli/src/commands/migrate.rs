//! Database migration command.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::info;

/// Run the migrations from the workspace `migrations/` directory.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    info!("Running migrations...");
    sqlx::migrate!("../../migrations").run(&pool).await?;

    info!("Migrations complete");
    Ok(())
}
