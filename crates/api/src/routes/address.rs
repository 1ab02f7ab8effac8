//! Region lookups and address book handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode};
use nom_naa_core::AddressId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::address::{Address, AddressInput, District, Province, SubDistrict};
use crate::routes::extract::{Json, Path};
use crate::services::address::AddressBook;
use crate::state::AppState;

// =============================================================================
// Region reference data
// =============================================================================

pub async fn provinces(State(state): State<AppState>) -> Result<axum::Json<Arc<Vec<Province>>>> {
    Ok(axum::Json(state.regions().provinces().await?))
}

pub async fn province(
    State(state): State<AppState>,
    Path(code): Path<i32>,
) -> Result<axum::Json<Province>> {
    Ok(axum::Json(state.regions().province(code).await?))
}

pub async fn districts(
    State(state): State<AppState>,
    Path(province_code): Path<i32>,
) -> Result<axum::Json<Arc<Vec<District>>>> {
    Ok(axum::Json(state.regions().districts(province_code).await?))
}

pub async fn district(
    State(state): State<AppState>,
    Path(code): Path<i32>,
) -> Result<axum::Json<District>> {
    Ok(axum::Json(state.regions().district(code).await?))
}

pub async fn sub_districts(
    State(state): State<AppState>,
    Path(district_code): Path<i32>,
) -> Result<axum::Json<Arc<Vec<SubDistrict>>>> {
    Ok(axum::Json(state.regions().sub_districts(district_code).await?))
}

pub async fn sub_district(
    State(state): State<AppState>,
    Path(code): Path<i32>,
) -> Result<axum::Json<SubDistrict>> {
    Ok(axum::Json(state.regions().sub_district(code).await?))
}

// =============================================================================
// Address book
// =============================================================================

/// Add an address for the caller.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, axum::Json<Address>)> {
    let address = AddressBook::new(state.pool(), state.regions())
        .create(user.id, &input)
        .await?;
    Ok((StatusCode::CREATED, axum::Json(address)))
}

/// The caller's addresses.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<axum::Json<Vec<Address>>> {
    let addresses = AddressBook::new(state.pool(), state.regions())
        .list(user.id)
        .await?;
    Ok(axum::Json(addresses))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<axum::Json<Address>> {
    let address = AddressBook::new(state.pool(), state.regions())
        .get(id, user.id)
        .await?;
    Ok(axum::Json(address))
}

pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
    Json(input): Json<AddressInput>,
) -> Result<axum::Json<Address>> {
    let address = AddressBook::new(state.pool(), state.regions())
        .update(id, user.id, &input)
        .await?;
    Ok(axum::Json(address))
}

/// Delete an address. Addresses used by an order cannot be deleted.
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressBook::new(state.pool(), state.regions())
        .delete(id, user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
