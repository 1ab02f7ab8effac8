//! Nom Naa shop API library.
//!
//! The binary in `main.rs` only wires configuration, telemetry and the
//! listener; everything else lives here so the CLI and the integration tests
//! can drive the same services.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
