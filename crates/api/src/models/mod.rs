//! Domain models for the shop.
//!
//! These are validated domain objects, separate from the row types in
//! [`crate::db`]. Most derive `Serialize` and are returned from handlers as-is.

pub mod address;
pub mod cart;
pub mod order;
pub mod payment;
pub mod session;
pub mod snack;
pub mod user;

use serde::Serialize;

pub use session::{CurrentUser, keys as session_keys};

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// Zero-based page index.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
    /// Total rows across all pages.
    pub total: i64,
}

/// Binary image stored in the database (snack photos, payment proofs).
#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Raw file bytes.
    pub bytes: Vec<u8>,
    /// MIME type recorded at upload time.
    pub content_type: String,
}
