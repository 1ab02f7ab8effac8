//! Business logic services for the shop API.
//!
//! # Services
//!
//! - `auth` - Registration, login, profiles (argon2 password hashes)
//! - `address` - Region lookups (cached) and address book
//! - `catalog` - Snack listing, admin CRUD, reviews
//! - `cart` - Operations on the caller's pending cart
//! - `checkout` - The cart-to-order transaction
//! - `orders` - Order history, tracking, admin status updates
//! - `payment` - Payment proof uploads
//! - `upload` - Image upload validation shared by catalog and payments
//!
//! Services borrow the pool (or state) per request and translate
//! [`RepositoryError`](crate::db::RepositoryError) into their own error enums.

pub mod address;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod payment;
pub mod upload;
