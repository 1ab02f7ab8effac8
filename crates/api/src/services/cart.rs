//! Operations on the caller's pending cart.
//!
//! Stock is checked when items are added or changed but never reserved; the
//! checkout transaction checks it again under row locks.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use nom_naa_core::{ItemId, Quantity, QuantityError, SnackId, UserId};

use crate::db::RepositoryError;
use crate::db::carts::{self, CartRepository};
use crate::db::snacks::SnackRepository;
use crate::models::cart::CartView;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("snack not found")]
    SnackNotFound,

    /// The item is not in the caller's pending cart.
    #[error("item not found")]
    ItemNotFound,

    #[error(transparent)]
    InvalidQuantity(#[from] QuantityError),

    /// The requested quantity exceeds current stock.
    #[error("stock not enough")]
    StockNotEnough,

    /// The pending cart kept being ordered while an item was added.
    #[error("cart is being checked out, try again")]
    Busy,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CartError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Lookups of the pending cart tried by [`CartService::add`]. A retry is
/// only needed when a checkout orders the cart between lookup and lock.
const ADD_ATTEMPTS: usize = 3;

/// Cart service.
pub struct CartService<'a> {
    pool: &'a PgPool,
    carts: CartRepository<'a>,
    snacks: SnackRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            carts: CartRepository::new(pool),
            snacks: SnackRepository::new(pool),
        }
    }

    /// The caller's pending cart with lines and subtotal.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database operation fails.
    pub async fn view(&self, user_id: UserId) -> Result<CartView, CartError> {
        let cart = self.carts.pending_for_user(user_id).await?;
        let lines = self.carts.lines(cart.id).await?;
        Ok(CartView::new(&cart, lines))
    }

    /// Add units of a snack, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a non-positive quantity,
    /// `CartError::SnackNotFound` for an unknown snack,
    /// `CartError::StockNotEnough` if the merged quantity exceeds stock and
    /// `CartError::Busy` if every pending cart found was ordered before it
    /// could be locked.
    #[instrument(skip(self), fields(user_id = %user_id, snack_id = %snack_id))]
    pub async fn add(
        &self,
        user_id: UserId,
        snack_id: SnackId,
        quantity: i64,
    ) -> Result<CartView, CartError> {
        let quantity = Quantity::try_from(quantity)?;
        let snack = self
            .snacks
            .get(snack_id)
            .await?
            .ok_or(CartError::SnackNotFound)?;

        for attempt in 1..=ADD_ATTEMPTS {
            let found = self.carts.pending_for_user(user_id).await?;

            let mut tx = self.pool.begin().await?;
            let Some(cart) = carts::lock_pending(&mut tx, found.id).await? else {
                tracing::debug!(attempt, cart_id = %found.id, "cart ordered during add, retrying");
                continue;
            };

            let existing = carts::item_quantity(&mut tx, cart.id, snack_id).await?;
            let merged = merged_quantity(existing, quantity, snack.quantity)?;
            tracing::debug!(%merged, stock = snack.quantity, "adding to cart");

            carts::add_item(&mut tx, cart.id, snack_id, quantity)
                .await
                .map_err(|e| match e {
                    RepositoryError::NotFound => CartError::SnackNotFound,
                    other => CartError::Repository(other),
                })?;
            tx.commit().await?;

            let lines = self.carts.lines(cart.id).await?;
            return Ok(CartView::new(&cart, lines));
        }

        Err(CartError::Busy)
    }

    /// Set the quantity of a line in the caller's pending cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the item is not in the caller's
    /// pending cart and `CartError::StockNotEnough` if stock is short.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn update(
        &self,
        user_id: UserId,
        item_id: ItemId,
        quantity: i64,
    ) -> Result<CartView, CartError> {
        let quantity = Quantity::try_from(quantity)?;

        let mut tx = self.pool.begin().await?;
        let item = carts::lock_pending_item(&mut tx, item_id, user_id)
            .await?
            .ok_or(CartError::ItemNotFound)?;

        if !quantity.fits_in(item.stock) {
            return Err(CartError::StockNotEnough);
        }

        carts::set_item_quantity(&mut tx, item.item_id, quantity)
            .await
            .map_err(item_error)?;
        tx.commit().await?;

        self.view(user_id).await
    }

    /// Remove a line from the caller's pending cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the item is not in the caller's
    /// pending cart.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn remove(&self, user_id: UserId, item_id: ItemId) -> Result<CartView, CartError> {
        let mut tx = self.pool.begin().await?;
        let item = carts::lock_pending_item(&mut tx, item_id, user_id)
            .await?
            .ok_or(CartError::ItemNotFound)?;

        carts::remove_item(&mut tx, item.item_id)
            .await
            .map_err(item_error)?;
        tx.commit().await?;

        self.view(user_id).await
    }
}

fn item_error(e: RepositoryError) -> CartError {
    match e {
        RepositoryError::NotFound => CartError::ItemNotFound,
        other => CartError::Repository(other),
    }
}

/// Quantity a line will hold after adding `added`, checked against `stock`.
fn merged_quantity(
    existing: Option<Quantity>,
    added: Quantity,
    stock: i32,
) -> Result<Quantity, CartError> {
    let merged = match existing {
        Some(current) => current
            .checked_add(added)
            .ok_or(CartError::StockNotEnough)?,
        None => added,
    };

    if !merged.fits_in(stock) {
        return Err(CartError::StockNotEnough);
    }
    Ok(merged)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn qty(n: i32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn test_first_add_checks_stock() {
        assert_eq!(merged_quantity(None, qty(3), 3).unwrap(), qty(3));
        assert!(matches!(
            merged_quantity(None, qty(4), 3),
            Err(CartError::StockNotEnough)
        ));
    }

    #[test]
    fn test_merge_counts_existing_units() {
        assert_eq!(merged_quantity(Some(qty(2)), qty(1), 3).unwrap(), qty(3));
        assert!(matches!(
            merged_quantity(Some(qty(2)), qty(2), 3),
            Err(CartError::StockNotEnough)
        ));
    }

    #[test]
    fn test_merge_overflow_is_not_enough_stock() {
        assert!(matches!(
            merged_quantity(Some(qty(i32::MAX)), qty(1), i32::MAX),
            Err(CartError::StockNotEnough)
        ));
    }
}
