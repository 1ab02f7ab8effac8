//! Snack review repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use nom_naa_core::{ReviewId, SnackId, UserId};

use super::{PageRequest, RepositoryError};
use crate::models::snack::{NewReview, Review};

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    snack_id: SnackId,
    user_id: UserId,
    username: String,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            snack_id: row.snack_id,
            user_id: row.user_id,
            username: row.username,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the snack doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewReview) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r"
            WITH inserted AS (
                INSERT INTO shop.reviews (snack_id, user_id, rating, comment)
                VALUES ($1, $2, $3, $4)
                RETURNING id, snack_id, user_id, rating, comment, created_at
            )
            SELECT i.id, i.snack_id, i.user_id, u.username, i.rating, i.comment, i.created_at
            FROM inserted i
            JOIN shop.users u ON u.id = i.user_id
            ",
        )
        .bind(new.snack_id)
        .bind(new.user_id)
        .bind(new.rating)
        .bind(&new.comment)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match RepositoryError::from_constraint(e, str::to_owned) {
            RepositoryError::Conflict(_) => RepositoryError::NotFound,
            other => other,
        })?;

        Ok(row.into())
    }

    /// Reviews of a snack, newest first, plus the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_snack(
        &self,
        snack_id: SnackId,
        page: PageRequest,
    ) -> Result<(Vec<Review>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.reviews WHERE snack_id = $1")
            .bind(snack_id)
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT r.id, r.snack_id, r.user_id, u.username, r.rating, r.comment, r.created_at
            FROM shop.reviews r
            JOIN shop.users u ON u.id = r.user_id
            WHERE r.snack_id = $1
            ORDER BY r.created_at DESC, r.id
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(snack_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Review::from).collect(), total))
    }
}
