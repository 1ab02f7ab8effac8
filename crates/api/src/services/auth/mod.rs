//! Account service.
//!
//! Password registration and login with argon2id hashes, profile reads and
//! updates, and admin provisioning for the CLI.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use sqlx::PgPool;

use nom_naa_core::{Email, UserId, UserRole};

use crate::db::PageRequest;
use crate::db::users::UserRepository;
use crate::models::Page;
use crate::models::user::{NewUser, ProfileUpdate, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Username length bounds (inclusive).
const USERNAME_LENGTH: std::ops::RangeInclusive<usize> = 3..=32;

/// Registration request body.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub confirm_password: String,
}

/// Account service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new account service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a user and open their first cart.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid`, `AuthError::InvalidEmail` or
    /// `AuthError::WeakPassword` when a field fails validation.
    /// Returns `AuthError::EmailTaken` / `AuthError::UsernameTaken` on duplicates.
    pub async fn register(&self, form: &Registration) -> Result<User, AuthError> {
        let username = validate_username(&form.username)?;
        if username.eq_ignore_ascii_case("admin") {
            return Err(AuthError::Invalid("username cannot be admin".to_owned()));
        }
        let email = Email::parse(&form.email)?;
        let phone_number = validate_phone(&form.phone_number)?;
        let first_name = validate_name("first_name", &form.first_name)?;
        let last_name = validate_name("last_name", &form.last_name)?;
        validate_password(&form.password)?;
        if form.password != form.confirm_password {
            return Err(AuthError::Invalid(
                "password and confirm_password do not match".to_owned(),
            ));
        }

        let new = NewUser {
            username,
            first_name,
            last_name,
            email,
            phone_number,
            role: UserRole::User,
            password_hash: hash_password(&form.password)?,
        };

        let user = self
            .users
            .create_with_cart(&new)
            .await
            .map_err(AuthError::from_repository)?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Check an email/password pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the
    /// password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_with_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update a user's profile. Email is not editable here.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` when a field fails validation.
    /// Returns `AuthError::UsernameTaken` if the new username is in use.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, AuthError> {
        let update = ProfileUpdate {
            username: update.username.as_deref().map(validate_username).transpose()?,
            first_name: update
                .first_name
                .as_deref()
                .map(|n| validate_name("first_name", n))
                .transpose()?,
            last_name: update
                .last_name
                .as_deref()
                .map(|n| validate_name("last_name", n))
                .transpose()?,
            phone_number: update.phone_number.as_deref().map(validate_phone).transpose()?,
        };

        self.users
            .update_profile(user_id, &update)
            .await
            .map_err(|e| match e {
                crate::db::RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::from_repository(other),
            })
    }

    /// List all users.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn list_users(&self, page: PageRequest) -> Result<Page<User>, AuthError> {
        let (items, total) = self.users.list(page).await?;
        Ok(Page {
            items,
            page: page.page,
            page_size: page.page_size,
            total,
        })
    }

    /// Create an admin account unless one already exists.
    ///
    /// Returns `None` when an admin is already present.
    ///
    /// # Errors
    ///
    /// Returns validation errors for the inputs, or a conflict if the email or
    /// username belongs to a non-admin account.
    pub async fn create_admin(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AuthError> {
        if self.users.admin_exists().await? {
            return Ok(None);
        }

        let new = NewUser {
            username: validate_username(username)?,
            first_name: "Admin".to_owned(),
            last_name: "Admin".to_owned(),
            email: Email::parse(email)?,
            phone_number: String::new(),
            role: UserRole::Admin,
            password_hash: {
                validate_password(password)?;
                hash_password(password)?
            },
        };

        let user = self
            .users
            .create_with_cart(&new)
            .await
            .map_err(AuthError::from_repository)?;

        tracing::info!(user_id = %user.id, "admin account created");
        Ok(Some(user))
    }
}

/// Validate a username: 3-32 characters of ASCII letters, digits or `_`.
fn validate_username(username: &str) -> Result<String, AuthError> {
    let username = username.trim();
    if !USERNAME_LENGTH.contains(&username.len()) {
        return Err(AuthError::Invalid(format!(
            "username must be {}-{} characters",
            USERNAME_LENGTH.start(),
            USERNAME_LENGTH.end()
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AuthError::Invalid(
            "username may only contain letters, digits and underscores".to_owned(),
        ));
    }
    Ok(username.to_owned())
}

/// Validate a phone number: 9-15 digits, optionally prefixed with `+`.
fn validate_phone(phone: &str) -> Result<String, AuthError> {
    let phone = phone.trim();
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if !(9..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthError::Invalid("phone_number is invalid".to_owned()));
    }
    Ok(phone.to_owned())
}

fn validate_name(field: &str, value: &str) -> Result<String, AuthError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AuthError::Invalid(format!("{field} is required")));
    }
    if value.chars().count() > 100 {
        return Err(AuthError::Invalid(format!("{field} is too long")));
    }
    Ok(value.to_owned())
}

/// Validate password meets requirements.
pub(crate) fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert_eq!(validate_username("  nom_naa1 ").unwrap(), "nom_naa1");
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("ขนม").is_err());
    }

    #[test]
    fn test_phone_rules() {
        assert_eq!(validate_phone("0812345678").unwrap(), "0812345678");
        assert_eq!(validate_phone("+66812345678").unwrap(), "+66812345678");
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("08-1234-5678").is_err());
    }

    #[test]
    fn test_password_length_counts_chars() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
    }

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_conflict_mapping() {
        use crate::db::RepositoryError;

        assert!(matches!(
            AuthError::from_repository(RepositoryError::Conflict("email already exists".into())),
            AuthError::EmailTaken
        ));
        assert!(matches!(
            AuthError::from_repository(RepositoryError::Conflict(
                "username already exists".into()
            )),
            AuthError::UsernameTaken
        ));
        assert!(matches!(
            AuthError::from_repository(RepositoryError::NotFound),
            AuthError::Repository(RepositoryError::NotFound)
        ));
    }
}
