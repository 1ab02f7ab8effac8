//! Core types for Nom Naa.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod quantity;
pub mod status;
pub mod tracking;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError, order_total};
pub use quantity::{Quantity, QuantityError};
pub use status::*;
pub use tracking::TrackingId;
