//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! nn-cli migrate
//! ```
//!
//! Migrations are embedded from `crates/api/migrations/` at compile time.
//! The server never runs them on startup.

use super::{CommandError, connect};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
