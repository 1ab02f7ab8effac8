//! Cart route handlers.
//!
//! Every handler acts on the caller's single pending cart and answers with the
//! refreshed cart, so clients never need a follow-up `GET`.

use axum::extract::State;
use nom_naa_core::{ItemId, SnackId};
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::cart::CartView;
use crate::routes::extract::{Json, Path};
use crate::services::cart::CartService;
use crate::state::AppState;

/// Add-to-cart body.
///
/// `quantity` is wide so an out-of-range value is reported as a validation
/// error instead of a JSON parse failure.
#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub snack_id: SnackId,
    pub quantity: i64,
}

/// Quantity change body.
#[derive(Debug, Deserialize)]
pub struct UpdateCartItem {
    pub item_id: ItemId,
    pub quantity: i64,
}

/// The caller's pending cart.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<axum::Json<CartView>> {
    Ok(axum::Json(CartService::new(state.pool()).view(user.id).await?))
}

/// Add a snack to the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(form): Json<AddToCart>,
) -> Result<axum::Json<CartView>> {
    let cart = CartService::new(state.pool())
        .add(user.id, form.snack_id, form.quantity)
        .await?;
    Ok(axum::Json(cart))
}

/// Change a line's quantity.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(form): Json<UpdateCartItem>,
) -> Result<axum::Json<CartView>> {
    let cart = CartService::new(state.pool())
        .update(user.id, form.item_id, form.quantity)
        .await?;
    Ok(axum::Json(cart))
}

/// Remove a line.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<ItemId>,
) -> Result<axum::Json<CartView>> {
    let cart = CartService::new(state.pool())
        .remove(user.id, item_id)
        .await?;
    Ok(axum::Json(cart))
}
