//! Admin account bootstrap.
//!
//! # Usage
//!
//! ```bash
//! NN_ADMIN_EMAIL=admin@example.com NN_ADMIN_PASSWORD=... nn-cli admin create
//! ```
//!
//! # Environment Variables
//!
//! - `NN_ADMIN_EMAIL` - Admin email address (required)
//! - `NN_ADMIN_PASSWORD` - Admin password, at least 8 characters (required)
//! - `NN_ADMIN_USERNAME` - Admin login name (default: admin)
//!
//! Running it again once an admin exists does nothing.

use secrecy::{ExposeSecret, SecretString};

use nom_naa_api::services::auth::AuthService;

use super::{CommandError, connect, required_env};

/// Create the admin account unless one already exists.
///
/// # Errors
///
/// Returns an error if the variables are missing or invalid, or the email or
/// username already belongs to a regular account.
pub async fn create() -> Result<(), CommandError> {
    let email = required_env("NN_ADMIN_EMAIL")?;
    let password = SecretString::from(required_env("NN_ADMIN_PASSWORD")?);
    let username = required_env("NN_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_owned());

    let pool = connect().await?;
    let created = AuthService::new(&pool)
        .create_admin(&email, &username, password.expose_secret())
        .await?;

    match created {
        Some(user) => {
            tracing::info!("Admin user created successfully!");
            tracing::info!("  ID: {}", user.id);
            tracing::info!("  Email: {}", user.email);
            tracing::info!("  Username: {}", user.username);
        }
        None => tracing::info!("An admin user already exists, nothing to do"),
    }
    Ok(())
}
