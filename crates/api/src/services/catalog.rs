//! Snack catalog and reviews.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use nom_naa_core::{Price, SnackId, UserId};

use super::upload::UploadError;
use crate::db::reviews::ReviewRepository;
use crate::db::snacks::SnackRepository;
use crate::db::{PageRequest, RepositoryError};
use crate::models::snack::{
    NewReview, NewSnack, Review, Snack, SnackChanges, SnackDetail, SnackQuery,
};
use crate::models::{Page, StoredImage};

/// Reviews embedded in a snack detail response.
const DETAIL_REVIEW_COUNT: u32 = 20;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("snack not found")]
    NotFound,

    /// The snack exists but has no image.
    #[error("snack has no image")]
    NoImage,

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Image(#[from] UploadError),

    /// Deleting a snack that carts or reviews still reference.
    #[error("{0}")]
    InUse(String),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Raw snack fields from a multipart form. Every field is optional here;
/// [`SnackForm::into_new`] enforces what creation requires.
#[derive(Debug, Clone, Default)]
pub struct SnackForm {
    pub name: Option<String>,
    pub price: Option<String>,
    pub quantity: Option<String>,
    pub snack_type: Option<String>,
    pub description: Option<String>,
    pub image: Option<StoredImage>,
}

impl SnackForm {
    /// Validate a creation form.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` naming the first bad or missing field.
    pub fn into_new(self) -> Result<NewSnack, CatalogError> {
        let name = required_text("name", self.name)?;
        let snack_type = required_text("type", self.snack_type)?;
        let price = parse_price(self.price.as_deref().ok_or_else(|| missing("price"))?)?;
        let quantity = parse_stock(self.quantity.as_deref().ok_or_else(|| missing("quantity"))?)?;

        Ok(NewSnack {
            name,
            price,
            quantity,
            snack_type,
            description: self.description.map(|d| d.trim().to_owned()).unwrap_or_default(),
            image: self.image,
        })
    }

    /// Validate an update form. Absent fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` for a bad field or an empty form.
    pub fn into_changes(self) -> Result<SnackChanges, CatalogError> {
        let changes = SnackChanges {
            name: self.name.map(|n| required_text("name", Some(n))).transpose()?,
            price: self.price.as_deref().map(parse_price).transpose()?,
            quantity: self.quantity.as_deref().map(parse_stock).transpose()?,
            snack_type: self
                .snack_type
                .map(|t| required_text("type", Some(t)))
                .transpose()?,
            description: self.description.map(|d| d.trim().to_owned()),
            image: self.image,
        };

        if changes.is_empty() {
            return Err(CatalogError::Invalid("no fields to update".to_owned()));
        }
        Ok(changes)
    }
}

fn missing(field: &str) -> CatalogError {
    CatalogError::Invalid(format!("{field} is required"))
}

fn required_text(field: &str, value: Option<String>) -> Result<String, CatalogError> {
    let value = value.map(|v| v.trim().to_owned()).unwrap_or_default();
    if value.is_empty() {
        return Err(missing(field));
    }
    Ok(value)
}

fn parse_price(raw: &str) -> Result<Price, CatalogError> {
    Price::parse(raw.trim()).map_err(|e| CatalogError::Invalid(format!("price: {e}")))
}

fn parse_stock(raw: &str) -> Result<i32, CatalogError> {
    match raw.trim().parse::<i32>() {
        Ok(n) if n >= 0 => Ok(n),
        _ => Err(CatalogError::Invalid(
            "quantity must be a non-negative integer".to_owned(),
        )),
    }
}

/// Catalog service.
pub struct CatalogService<'a> {
    snacks: SnackRepository<'a>,
    reviews: ReviewRepository<'a>,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            snacks: SnackRepository::new(pool),
            reviews: ReviewRepository::new(pool),
        }
    }

    /// One page of the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the database operation fails.
    pub async fn list(&self, query: &SnackQuery) -> Result<Page<Snack>, CatalogError> {
        let (items, total) = self.snacks.list(query).await?;
        Ok(Page {
            items,
            page: query.page.page,
            page_size: query.page.page_size,
            total,
        })
    }

    /// Distinct snack types.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the database operation fails.
    pub async fn types(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.snacks.types().await?)
    }

    /// A snack with its most recent reviews.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the snack doesn't exist.
    pub async fn detail(&self, id: SnackId) -> Result<SnackDetail, CatalogError> {
        let snack = self.snacks.get(id).await?.ok_or(CatalogError::NotFound)?;
        let (reviews, _) = self
            .reviews
            .list_for_snack(
                id,
                PageRequest {
                    page: 0,
                    page_size: DETAIL_REVIEW_COUNT,
                },
            )
            .await?;
        Ok(SnackDetail { snack, reviews })
    }

    /// A snack's image.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the snack doesn't exist and
    /// `CatalogError::NoImage` if it has no image.
    pub async fn image(&self, id: SnackId) -> Result<StoredImage, CatalogError> {
        self.snacks
            .image(id)
            .await
            .map_err(not_found)?
            .ok_or(CatalogError::NoImage)
    }

    /// Add a snack.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` if the form is incomplete.
    #[instrument(skip(self, form))]
    pub async fn create(&self, form: SnackForm) -> Result<Snack, CatalogError> {
        let new = form.into_new()?;
        let snack = self.snacks.create(&new).await?;
        tracing::info!(snack_id = %snack.id, "snack created");
        Ok(snack)
    }

    /// Update a snack.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the snack doesn't exist.
    #[instrument(skip(self, form), fields(snack_id = %id))]
    pub async fn update(&self, id: SnackId, form: SnackForm) -> Result<Snack, CatalogError> {
        let changes = form.into_changes()?;
        self.snacks.update(id, &changes).await.map_err(not_found)
    }

    /// Delete a snack.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the snack doesn't exist and
    /// `CatalogError::InUse` if it is still referenced.
    #[instrument(skip(self), fields(snack_id = %id))]
    pub async fn delete(&self, id: SnackId) -> Result<(), CatalogError> {
        self.snacks.delete(id).await.map_err(|e| match e {
            RepositoryError::Conflict(msg) => CatalogError::InUse(msg),
            other => not_found(other),
        })
    }

    /// Post a review.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` for a rating outside 1..=5 or an empty
    /// comment, and `CatalogError::NotFound` if the snack doesn't exist.
    pub async fn add_review(
        &self,
        snack_id: SnackId,
        user_id: UserId,
        rating: i16,
        comment: &str,
    ) -> Result<Review, CatalogError> {
        if !(1..=5).contains(&rating) {
            return Err(CatalogError::Invalid(
                "rating must be between 1 and 5".to_owned(),
            ));
        }
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(missing("comment"));
        }

        self.reviews
            .create(&NewReview {
                snack_id,
                user_id,
                rating,
                comment: comment.to_owned(),
            })
            .await
            .map_err(not_found)
    }

    /// Reviews of a snack, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the snack doesn't exist.
    pub async fn reviews(
        &self,
        snack_id: SnackId,
        page: PageRequest,
    ) -> Result<Page<Review>, CatalogError> {
        if self.snacks.get(snack_id).await?.is_none() {
            return Err(CatalogError::NotFound);
        }
        let (items, total) = self.reviews.list_for_snack(snack_id, page).await?;
        Ok(Page {
            items,
            page: page.page,
            page_size: page.page_size,
            total,
        })
    }
}

fn not_found(e: RepositoryError) -> CatalogError {
    match e {
        RepositoryError::NotFound => CatalogError::NotFound,
        other => CatalogError::Repository(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn full_form() -> SnackForm {
        SnackForm {
            name: Some(" Durian Chips ".into()),
            price: Some("45.50".into()),
            quantity: Some("12".into()),
            snack_type: Some("chips".into()),
            description: None,
            image: None,
        }
    }

    #[test]
    fn test_new_snack_from_complete_form() {
        let new = full_form().into_new().unwrap();
        assert_eq!(new.name, "Durian Chips");
        assert_eq!(new.price.amount(), Decimal::new(4550, 2));
        assert_eq!(new.quantity, 12);
        assert_eq!(new.description, "");
    }

    #[test]
    fn test_new_snack_requires_fields() {
        let mut form = full_form();
        form.price = None;
        assert_eq!(form.into_new().unwrap_err().to_string(), "price is required");

        let mut form = full_form();
        form.name = Some("   ".into());
        assert_eq!(form.into_new().unwrap_err().to_string(), "name is required");
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let mut form = full_form();
        form.quantity = Some("-1".into());
        assert!(matches!(form.into_new(), Err(CatalogError::Invalid(_))));

        let mut form = full_form();
        form.price = Some("1.005".into());
        assert!(matches!(form.into_new(), Err(CatalogError::Invalid(_))));
    }

    #[test]
    fn test_changes_keep_absent_fields() {
        let changes = SnackForm {
            quantity: Some("0".into()),
            ..SnackForm::default()
        }
        .into_changes()
        .unwrap();
        assert_eq!(changes.quantity, Some(0));
        assert!(changes.price.is_none());
        assert!(changes.name.is_none());
    }

    #[test]
    fn test_empty_update_is_rejected() {
        assert!(matches!(
            SnackForm::default().into_changes(),
            Err(CatalogError::Invalid(_))
        ));
    }
}
