//! Catalog and review types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nom_naa_core::{Price, ReviewId, SnackId, UserId};

use super::StoredImage;
use crate::db::PageRequest;

/// A catalog entry. Image bytes are served separately.
#[derive(Debug, Clone, Serialize)]
pub struct Snack {
    pub id: SnackId,
    pub name: String,
    pub price: Price,
    /// Units in stock. Never negative.
    pub quantity: i32,
    #[serde(rename = "type")]
    pub snack_type: String,
    pub description: String,
    pub has_image: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A snack together with its reviews, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct SnackDetail {
    #[serde(flatten)]
    pub snack: Snack,
    pub reviews: Vec<Review>,
}

/// Validated input for creating a snack.
#[derive(Debug, Clone)]
pub struct NewSnack {
    pub name: String,
    pub price: Price,
    pub quantity: i32,
    pub snack_type: String,
    pub description: String,
    pub image: Option<StoredImage>,
}

/// Partial snack update. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct SnackChanges {
    pub name: Option<String>,
    pub price: Option<Price>,
    pub quantity: Option<i32>,
    pub snack_type: Option<String>,
    pub description: Option<String>,
    pub image: Option<StoredImage>,
}

impl SnackChanges {
    /// Whether the update would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.quantity.is_none()
            && self.snack_type.is_none()
            && self.description.is_none()
            && self.image.is_none()
    }
}

/// Columns the catalog may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnackSort {
    #[default]
    Name,
    Price,
    Quantity,
    CreatedAt,
}

impl SnackSort {
    /// SQL column for `ORDER BY`. Only these fixed strings reach the query.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::Quantity => "quantity",
            Self::CreatedAt => "created_at",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// SQL keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Catalog listing parameters.
#[derive(Debug, Clone, Default)]
pub struct SnackQuery {
    pub page: PageRequest,
    pub sort: SnackSort,
    pub order: SortOrder,
    /// Exact `type` match.
    pub snack_type: Option<String>,
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
}

/// A review with the reviewer's username.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub snack_id: SnackId,
    pub user_id: UserId,
    pub username: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Validated input for posting a review.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub snack_id: SnackId,
    pub user_id: UserId,
    pub rating: i16,
    pub comment: String,
}
