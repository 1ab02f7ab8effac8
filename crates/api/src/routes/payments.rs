//! Payment proof upload and retrieval.

use axum::{
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::Response,
};
use nom_naa_core::{OrderId, PaymentId};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::payment::Payment;
use crate::routes::extract::Path;
use crate::routes::snacks::{image_response, read_image};
use crate::services::payment::PaymentService;
use crate::state::AppState;

/// Upload a payment proof for one of the caller's pending orders.
///
/// Multipart fields: `order_id` and `proof`.
#[instrument(skip(state, user, multipart), fields(user_id = %user.id))]
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, axum::Json<Payment>)> {
    let mut multipart = multipart?;
    let max_bytes = state.config().max_upload_limit();

    let mut order_id = None;
    let mut proof = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "order_id" => {
                let raw = field.text().await?;
                order_id = Some(
                    raw.trim()
                        .parse::<OrderId>()
                        .map_err(|_| AppError::BadRequest("order_id must be a UUID".to_owned()))?,
                );
            }
            "proof" => proof = read_image(field, max_bytes).await?,
            other => {
                return Err(AppError::BadRequest(format!("unexpected field: {other}")));
            }
        }
    }

    let order_id = order_id.ok_or_else(|| AppError::BadRequest("order_id is required".to_owned()))?;
    let proof = proof.ok_or_else(|| AppError::BadRequest("proof image is required".to_owned()))?;

    let payment = PaymentService::new(state.pool())
        .submit(&user, order_id, proof)
        .await?;
    Ok((StatusCode::CREATED, axum::Json(payment)))
}

/// Proof image bytes, for the payer or an admin.
pub async fn proof(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<PaymentId>,
) -> Result<Response> {
    let image = PaymentService::new(state.pool()).proof(id, &user).await?;
    Ok(image_response(image))
}
