//! Snack catalog repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use nom_naa_core::{Price, Quantity, SnackId};

use super::RepositoryError;
use crate::models::StoredImage;
use crate::models::snack::{NewSnack, Snack, SnackChanges, SnackQuery};

const SNACK_COLUMNS: &str = "id, name, price, quantity, snack_type, description, \
                             (image IS NOT NULL) AS has_image, created_at, updated_at";

/// Shared filter for listing and counting. `$1` is the type, `$2` the
/// escaped name pattern; either may be NULL.
const SNACK_FILTER: &str = r"($1::text IS NULL OR snack_type = $1)
      AND ($2::text IS NULL OR name ILIKE $2 ESCAPE '\')";

/// Internal row type for snack queries.
#[derive(Debug, sqlx::FromRow)]
struct SnackRow {
    id: SnackId,
    name: String,
    price: Price,
    quantity: i32,
    snack_type: String,
    description: String,
    has_image: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SnackRow> for Snack {
    fn from(row: SnackRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            price: row.price,
            quantity: row.quantity,
            snack_type: row.snack_type,
            description: row.description,
            has_image: row.has_image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    image: Option<Vec<u8>>,
    image_content_type: Option<String>,
}

/// Build an `ILIKE` pattern matching `term` as a literal substring.
///
/// `%`, `_` and `\` in the user's input are escaped so they match themselves.
#[must_use]
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Repository for snack database operations.
pub struct SnackRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SnackRepository<'a> {
    /// Create a new snack repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of the catalog plus the total number of matching snacks.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &SnackQuery) -> Result<(Vec<Snack>, i64), RepositoryError> {
        let pattern = query.search.as_deref().map(contains_pattern);

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM shop.snacks WHERE {SNACK_FILTER}"))
                .bind(query.snack_type.as_deref())
                .bind(pattern.as_deref())
                .fetch_one(self.pool)
                .await?;

        // Sort column and direction come from closed enums, never from input text.
        let rows = sqlx::query_as::<_, SnackRow>(&format!(
            r"
            SELECT {SNACK_COLUMNS}
            FROM shop.snacks
            WHERE {SNACK_FILTER}
            ORDER BY {column} {direction}, id
            LIMIT $3 OFFSET $4
            ",
            column = query.sort.column(),
            direction = query.order.keyword(),
        ))
        .bind(query.snack_type.as_deref())
        .bind(pattern.as_deref())
        .bind(query.page.limit())
        .bind(query.page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Snack::from).collect(), total))
    }

    /// Get a snack by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: SnackId) -> Result<Option<Snack>, RepositoryError> {
        let row = sqlx::query_as::<_, SnackRow>(&format!(
            "SELECT {SNACK_COLUMNS} FROM shop.snacks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Snack::from))
    }

    /// The snack's image, if it has one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the snack doesn't exist.
    pub async fn image(&self, id: SnackId) -> Result<Option<StoredImage>, RepositoryError> {
        let row = sqlx::query_as::<_, ImageRow>(
            "SELECT image, image_content_type FROM shop.snacks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(match (row.image, row.image_content_type) {
            (Some(bytes), Some(content_type)) => Some(StoredImage {
                bytes,
                content_type,
            }),
            _ => None,
        })
    }

    /// Distinct snack types, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn types(&self) -> Result<Vec<String>, RepositoryError> {
        let types: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT snack_type FROM shop.snacks ORDER BY snack_type")
                .fetch_all(self.pool)
                .await?;
        Ok(types)
    }

    /// Insert a snack.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewSnack) -> Result<Snack, RepositoryError> {
        let (image, content_type) = split_image(new.image.as_ref());

        let row = sqlx::query_as::<_, SnackRow>(&format!(
            r"
            INSERT INTO shop.snacks
                (name, price, quantity, snack_type, description, image, image_content_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SNACK_COLUMNS}
            "
        ))
        .bind(&new.name)
        .bind(new.price)
        .bind(new.quantity)
        .bind(&new.snack_type)
        .bind(&new.description)
        .bind(image)
        .bind(content_type)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Apply a partial update. The image is replaced only when one is given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the snack doesn't exist.
    pub async fn update(&self, id: SnackId, changes: &SnackChanges) -> Result<Snack, RepositoryError> {
        let (image, content_type) = split_image(changes.image.as_ref());

        let row = sqlx::query_as::<_, SnackRow>(&format!(
            r"
            UPDATE shop.snacks
            SET name               = COALESCE($2, name),
                price              = COALESCE($3, price),
                quantity           = COALESCE($4, quantity),
                snack_type         = COALESCE($5, snack_type),
                description        = COALESCE($6, description),
                image              = COALESCE($7, image),
                image_content_type = COALESCE($8, image_content_type)
            WHERE id = $1
            RETURNING {SNACK_COLUMNS}
            "
        ))
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.price)
        .bind(changes.quantity)
        .bind(changes.snack_type.as_deref())
        .bind(changes.description.as_deref())
        .bind(image)
        .bind(content_type)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a snack.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the snack doesn't exist.
    /// Returns `RepositoryError::Conflict` if a cart item or review references it.
    pub async fn delete(&self, id: SnackId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.snacks WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                RepositoryError::from_constraint(e, |_| {
                    "snack is referenced by carts or reviews".to_owned()
                })
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

fn split_image(image: Option<&StoredImage>) -> (Option<&[u8]>, Option<&str>) {
    image.map_or((None, None), |img| {
        (Some(img.bytes.as_slice()), Some(img.content_type.as_str()))
    })
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Take `quantity` units out of stock.
///
/// Returns `false` without touching the row when fewer units remain. The
/// caller must already hold the row lock so the check and the write agree.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    id: SnackId,
    quantity: Quantity,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE shop.snacks SET quantity = quantity - $2 WHERE id = $1 AND quantity >= $2",
    )
    .bind(id)
    .bind(quantity)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_plain() {
        assert_eq!(contains_pattern("chip"), "%chip%");
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("50%_off"), r"%50\%\_off%");
        assert_eq!(contains_pattern(r"a\b"), r"%a\\b%");
    }

    #[test]
    fn test_contains_pattern_keeps_thai() {
        assert_eq!(contains_pattern("ขนม"), "%ขนม%");
    }
}
