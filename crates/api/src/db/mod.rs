//! Database operations for the shop `PostgreSQL` database.
//!
//! # Schema: `shop`
//!
//! ## Tables
//!
//! - `users` - Accounts with argon2 password hashes
//! - `addresses` - Shipping addresses, denormalized with Thai region names
//! - `provinces`, `districts`, `sub_districts` - Region reference data
//! - `snacks` - Catalog with stock counts and optional images
//! - `reviews` - Snack reviews
//! - `carts` / `items` - Carts and their lines (one pending cart per user)
//! - `orders` - Confirmed carts with a snapshotted total
//! - `payments` - Payment proofs attached to orders
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p nom-naa-cli -- migrate
//! ```
//!
//! # Transactions
//!
//! Repositories borrow the pool. Operations that must run inside a caller's
//! transaction are free functions taking `&mut PgConnection`; see
//! [`crate::services::checkout`].

pub mod addresses;
pub mod carts;
pub mod orders;
pub mod payments;
pub mod regions;
pub mod reviews;
pub mod snacks;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email, referenced row).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique and foreign-key violations to [`RepositoryError::Conflict`].
    ///
    /// `describe` receives the violated constraint name (when Postgres reports
    /// one) and returns the message to surface.
    pub(crate) fn from_constraint(e: sqlx::Error, describe: impl FnOnce(&str) -> String) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
        {
            return Self::Conflict(describe(db_err.constraint().unwrap_or_default()));
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Zero-based page request, validated by the route layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page index.
    pub page: u32,
    /// Rows per page.
    pub page_size: u32,
}

impl PageRequest {
    /// Largest allowed page size.
    pub const MAX_PAGE_SIZE: u32 = 100;
    /// Page size used when the client does not ask for one.
    pub const DEFAULT_PAGE_SIZE: u32 = 10;

    /// SQL `LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_offsets() {
        let page = PageRequest {
            page: 3,
            page_size: 20,
        };
        assert_eq!(page.limit(), 20);
        assert_eq!(page.offset(), 60);
        assert_eq!(PageRequest::default().offset(), 0);
    }
}
