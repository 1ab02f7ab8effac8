//! Order handlers: confirmation, history, lookup and admin management.

use axum::{extract::State, http::StatusCode};
use nom_naa_core::{OrderId, OrderStatus, TrackingId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::Page;
use crate::models::order::{Order, OrderDetail};
use crate::routes::PageQuery;
use crate::routes::extract::{Json, Path, Query};
use crate::services::checkout::{CheckoutService, ConfirmOrder};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// Admin status change body.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

/// Revenue summary.
#[derive(Debug, Serialize)]
pub struct Revenue {
    pub revenue: Decimal,
}

/// Turn the caller's pending cart into an order.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn confirm(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<ConfirmOrder>,
) -> Result<(StatusCode, axum::Json<OrderDetail>)> {
    let order = CheckoutService::new(state.pool())
        .confirm_order(user.id, request)
        .await?;
    Ok((StatusCode::CREATED, axum::Json(order)))
}

/// The caller's orders, newest first.
pub async fn history(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<axum::Json<Vec<OrderDetail>>> {
    Ok(axum::Json(OrderService::new(state.pool()).history(&user).await?))
}

pub async fn by_tracking(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(tracking_id): Path<TrackingId>,
) -> Result<axum::Json<OrderDetail>> {
    let order = OrderService::new(state.pool())
        .by_tracking(tracking_id, &user)
        .await?;
    Ok(axum::Json(order))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<axum::Json<OrderDetail>> {
    Ok(axum::Json(OrderService::new(state.pool()).get(id, &user).await?))
}

/// All orders, newest first (admin).
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<axum::Json<Page<Order>>> {
    let page = query.into_request()?;
    Ok(axum::Json(OrderService::new(state.pool()).list(page).await?))
}

/// Move an order along its lifecycle (admin).
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(form): Json<StatusUpdate>,
) -> Result<axum::Json<Order>> {
    let order = OrderService::new(state.pool())
        .update_status(form.order_id, form.status)
        .await?;
    tracing::info!(order_id = %order.id, status = %order.status, "order status changed");
    Ok(axum::Json(order))
}

/// Revenue over non-cancelled orders (admin).
pub async fn revenue(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<axum::Json<Revenue>> {
    let revenue = OrderService::new(state.pool()).revenue().await?;
    Ok(axum::Json(Revenue { revenue }))
}
