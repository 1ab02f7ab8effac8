//! Nom Naa Core - Shared domain types.
//!
//! This crate provides the types used across all Nom Naa components:
//! - `api` - The JSON REST backend
//! - `cli` - Command-line tools for migrations, seeding and admin bootstrap
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP. Database encoding is available behind the `postgres`
//! feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, money, quantities, tracking
//!   ids and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
