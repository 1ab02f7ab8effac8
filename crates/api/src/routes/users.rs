//! Account route handlers: registration, login, logout and profile.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAdmin, RequireAuth, clear_current_user, set_current_user};
use crate::models::user::{ProfileUpdate, User};
use crate::models::{CurrentUser, Page, session_keys};
use crate::routes::PageQuery;
use crate::routes::extract::{Json, Query};
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Profile update body. Omitted fields are left alone.
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

fn session_error(e: &tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session: {e}"))
}

fn current_user_of(user: &User) -> CurrentUser {
    CurrentUser {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        role: user.role,
    }
}

/// Register a new account.
#[instrument(skip(state, form), fields(username = %form.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<Registration>,
) -> Result<(StatusCode, axum::Json<User>)> {
    let user = AuthService::new(state.pool()).register(&form).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, axum::Json(user)))
}

/// Log in with email and password and start a session.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginRequest>,
) -> Result<axum::Json<User>> {
    let user = AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await?;

    set_current_user(&session, &current_user_of(&user))
        .await
        .map_err(|e| session_error(&e))?;
    set_sentry_user(&user.id, &user.username);

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(axum::Json(user))
}

/// End the session.
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(|e| session_error(&e))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's profile.
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<axum::Json<User>> {
    let user = AuthService::new(state.pool()).get_user(user.id).await?;
    Ok(axum::Json(user))
}

/// Update the caller's profile.
///
/// A changed username is written back to the session.
#[instrument(skip(state, session, current, form), fields(user_id = %current.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Json(form): Json<ProfileRequest>,
) -> Result<axum::Json<User>> {
    let update = ProfileUpdate {
        username: form.username,
        first_name: form.first_name,
        last_name: form.last_name,
        phone_number: form.phone_number,
    };
    let user = AuthService::new(state.pool())
        .update_profile(current.id, update)
        .await?;

    if user.username != current.username {
        session
            .insert(session_keys::CURRENT_USER, current_user_of(&user))
            .await
            .map_err(|e| session_error(&e))?;
    }
    Ok(axum::Json(user))
}

/// List all accounts (admin).
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<axum::Json<Page<User>>> {
    let page = query.into_request()?;
    let users = AuthService::new(state.pool()).list_users(page).await?;
    Ok(axum::Json(users))
}
