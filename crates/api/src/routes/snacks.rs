//! Catalog and review handlers.
//!
//! Snack create/update take `multipart/form-data` so an image can travel with
//! the fields. Everything else is JSON.

use axum::{
    extract::{
        Multipart, State,
        multipart::{Field, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use nom_naa_core::SnackId;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::snack::{Review, Snack, SnackDetail, SnackQuery, SnackSort, SortOrder};
use crate::models::{Page, StoredImage};
use crate::routes::PageQuery;
use crate::routes::extract::{Json, Path, Query};
use crate::services::catalog::{CatalogService, SnackForm};
use crate::services::upload::validate_image;
use crate::state::AppState;

/// Catalog listing query string.
#[derive(Debug, Default, Deserialize)]
pub struct SnackListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort: Option<SnackSort>,
    pub order: Option<SortOrder>,
    #[serde(rename = "type")]
    pub snack_type: Option<String>,
    pub search: Option<String>,
}

impl SnackListQuery {
    fn into_query(self) -> Result<SnackQuery> {
        let page = PageQuery {
            page: self.page,
            page_size: self.page_size,
        }
        .into_request()?;

        Ok(SnackQuery {
            page,
            sort: self.sort.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
            snack_type: self.snack_type.filter(|t| !t.trim().is_empty()),
            search: self.search.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Review request body.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    pub comment: String,
}

/// Serve stored image bytes with their recorded content type.
pub(crate) fn image_response(image: StoredImage) -> Response {
    (
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, "private, max-age=300".to_owned()),
        ],
        image.bytes,
    )
        .into_response()
}

/// Read an uploaded file part, validating it as an image.
///
/// An empty part with no file name counts as "no file".
pub(crate) async fn read_image(field: Field<'_>, max_bytes: u64) -> Result<Option<StoredImage>> {
    let content_type = field.content_type().map(str::to_owned);
    let has_file_name = field.file_name().is_some_and(|n| !n.is_empty());
    let bytes = field.bytes().await?;

    if bytes.is_empty() && !has_file_name {
        return Ok(None);
    }
    Ok(Some(validate_image(
        content_type.as_deref(),
        bytes.to_vec(),
        max_bytes,
    )?))
}

async fn read_snack_form(multipart: &mut Multipart, max_bytes: u64) -> Result<SnackForm> {
    let mut form = SnackForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "image" => form.image = read_image(field, max_bytes).await?,
            "name" => form.name = Some(field.text().await?),
            "price" => form.price = Some(field.text().await?),
            "quantity" => form.quantity = Some(field.text().await?),
            "type" => form.snack_type = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            other => {
                return Err(AppError::BadRequest(format!("unexpected field: {other}")));
            }
        }
    }

    Ok(form)
}

// =============================================================================
// Catalog
// =============================================================================

/// Paginated, sortable, filterable catalog.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SnackListQuery>,
) -> Result<axum::Json<Page<Snack>>> {
    let query = query.into_query()?;
    let page = CatalogService::new(state.pool()).list(&query).await?;
    Ok(axum::Json(page))
}

/// Distinct snack types.
pub async fn types(State(state): State<AppState>) -> Result<axum::Json<Vec<String>>> {
    Ok(axum::Json(CatalogService::new(state.pool()).types().await?))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<SnackId>,
) -> Result<axum::Json<SnackDetail>> {
    Ok(axum::Json(CatalogService::new(state.pool()).detail(id).await?))
}

pub async fn image(State(state): State<AppState>, Path(id): Path<SnackId>) -> Result<Response> {
    let image = CatalogService::new(state.pool()).image(id).await?;
    Ok(image_response(image))
}

/// Create a snack (admin).
#[instrument(skip(state, multipart))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, axum::Json<Snack>)> {
    let mut multipart = multipart?;
    let form = read_snack_form(&mut multipart, state.config().max_upload_limit()).await?;
    let snack = CatalogService::new(state.pool()).create(form).await?;
    tracing::info!(snack_id = %snack.id, "snack created");
    Ok((StatusCode::CREATED, axum::Json(snack)))
}

/// Update a snack (admin). Omitted fields keep their value.
#[instrument(skip(state, multipart))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<SnackId>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<axum::Json<Snack>> {
    let mut multipart = multipart?;
    let form = read_snack_form(&mut multipart, state.config().max_upload_limit()).await?;
    let snack = CatalogService::new(state.pool()).update(id, form).await?;
    Ok(axum::Json(snack))
}

/// Delete a snack (admin). Fails with 409 while carts or reviews reference it.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<SnackId>,
) -> Result<StatusCode> {
    CatalogService::new(state.pool()).delete(id).await?;
    tracing::info!(snack_id = %id, "snack deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Reviews
// =============================================================================

pub async fn add_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<SnackId>,
    Json(form): Json<ReviewRequest>,
) -> Result<(StatusCode, axum::Json<Review>)> {
    let review = CatalogService::new(state.pool())
        .add_review(id, user.id, form.rating, &form.comment)
        .await?;
    Ok((StatusCode::CREATED, axum::Json(review)))
}

pub async fn reviews(
    State(state): State<AppState>,
    Path(id): Path<SnackId>,
    Query(query): Query<PageQuery>,
) -> Result<axum::Json<Page<Review>>> {
    let page = query.into_request()?;
    Ok(axum::Json(
        CatalogService::new(state.pool()).reviews(id, page).await?,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let query = SnackListQuery::default().into_query().unwrap();
        assert_eq!(query.page.page, 0);
        assert_eq!(query.page.page_size, 10);
        assert_eq!(query.sort, SnackSort::Name);
        assert_eq!(query.order, SortOrder::Asc);
        assert!(query.search.is_none());
    }

    #[test]
    fn test_blank_filters_are_dropped() {
        let query = SnackListQuery {
            snack_type: Some("  ".into()),
            search: Some(String::new()),
            ..SnackListQuery::default()
        }
        .into_query()
        .unwrap();
        assert!(query.snack_type.is_none());
        assert!(query.search.is_none());
    }

    #[test]
    fn test_oversized_page_is_rejected() {
        let result = SnackListQuery {
            page_size: Some(101),
            ..SnackListQuery::default()
        }
        .into_query();
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_image_response_sets_content_type() {
        let response = image_response(StoredImage {
            bytes: vec![1, 2, 3],
            content_type: "image/png".into(),
        });
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }
}
