//! The cart-to-order transaction.
//!
//! [`CheckoutService::confirm_order`] runs in a single database transaction:
//!
//! 1. lock the cart row and check owner and status
//! 2. check the shipping address belongs to the caller
//! 3. read the lines, locking their snack rows in id order
//! 4. total the lines and take each quantity out of stock with a
//!    conditional `UPDATE ... WHERE quantity >= $n`
//! 5. flip the cart to `ordered`, insert the order, open a new pending cart
//!
//! The returned [`OrderDetail`] is built from rows read inside the
//! transaction, so a committed order is always reported as a success.
//!
//! Any error returns before `commit`, and dropping the transaction rolls
//! every write back. Nothing is retried here.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use nom_naa_core::{
    AddressId, CartId, CartStatus, PaymentMethod, SnackId, TrackingId, UserId, order_total,
};

use crate::db::carts::{self, LockedLine};
use crate::db::orders::{self, NewOrder};
use crate::db::{RepositoryError, addresses, snacks};
use crate::models::order::{OrderDetail, OrderLine};

/// Order confirmation request body.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConfirmOrder {
    pub cart_id: CartId,
    pub address_id: AddressId,
    pub payment_method: PaymentMethod,
}

/// Reasons a cart could not be turned into an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart doesn't exist or belongs to someone else.
    #[error("cart not found")]
    CartNotConfirmable,

    /// The cart exists but is not `pending`.
    #[error("cart is {status}, not pending")]
    CartStatus { status: CartStatus },

    #[error("cart is empty")]
    EmptyCart,

    #[error("address not found")]
    AddressNotFound,

    #[error("stock not enough for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        snack_id: SnackId,
        name: String,
        requested: i32,
        available: i32,
    },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the caller's pending cart into an order.
    ///
    /// On success the order exists with status `pending`, the cart is
    /// `ordered`, stock is reduced by every line and the caller has a fresh
    /// empty cart. On failure nothing changed.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::CartNotConfirmable`, `CartStatus`, `EmptyCart`,
    /// `AddressNotFound` or `InsufficientStock` when a precondition fails, and
    /// `CheckoutError::Repository` for database failures.
    #[instrument(
        skip(self, request),
        fields(user_id = %user_id, cart_id = %request.cart_id)
    )]
    pub async fn confirm_order(
        &self,
        user_id: UserId,
        request: ConfirmOrder,
    ) -> Result<OrderDetail, CheckoutError> {
        let mut tx = self.pool.begin().await?;

        let cart = carts::lock_cart(&mut tx, request.cart_id)
            .await?
            .filter(|cart| cart.user_id == user_id)
            .ok_or(CheckoutError::CartNotConfirmable)?;

        if !cart.status.is_confirmable() {
            return Err(CheckoutError::CartStatus {
                status: cart.status,
            });
        }

        let address = addresses::owned_by(&mut tx, request.address_id, user_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound)?;

        let lines = carts::lock_lines(&mut tx, cart.id).await?;
        let total_price = price_lines(&lines)?;

        for line in &lines {
            carts::set_unit_price(&mut tx, line.item_id, line.price).await?;
            if !snacks::decrement_stock(&mut tx, line.snack_id, line.quantity).await? {
                return Err(insufficient(line));
            }
        }

        if !carts::mark_ordered(&mut tx, cart.id).await? {
            // The row lock makes this unreachable unless the lock was lost.
            return Err(CheckoutError::CartStatus {
                status: cart.status,
            });
        }

        let order = orders::insert(
            &mut tx,
            &NewOrder {
                tracking_id: TrackingId::generate(),
                cart_id: cart.id,
                address_id: request.address_id,
                total_price,
                payment_method: request.payment_method,
            },
        )
        .await?;

        let next_cart = carts::create_pending(&mut tx, user_id).await?;

        // No fallible work after this point.
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            tracking_id = %order.tracking_id,
            %total_price,
            next_cart_id = %next_cart,
            "order confirmed"
        );

        Ok(OrderDetail {
            order,
            items: lines.iter().map(ordered_line).collect(),
            address,
            payment: None,
        })
    }
}

/// Total a locked cart, failing on the first line stock cannot cover.
fn price_lines(lines: &[LockedLine]) -> Result<Decimal, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    if let Some(short) = lines.iter().find(|line| !line.quantity.fits_in(line.stock)) {
        return Err(insufficient(short));
    }

    Ok(order_total(lines.iter().map(|line| (line.price, line.quantity))))
}

fn ordered_line(line: &LockedLine) -> OrderLine {
    OrderLine {
        snack_id: line.snack_id,
        name: line.name.clone(),
        unit_price: line.price.amount(),
        quantity: line.quantity,
        line_total: line.price.line_total(line.quantity),
    }
}

fn insufficient(line: &LockedLine) -> CheckoutError {
    CheckoutError::InsufficientStock {
        snack_id: line.snack_id,
        name: line.name.clone(),
        requested: line.quantity.get(),
        available: line.stock,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nom_naa_core::{ItemId, Price, Quantity};
    use uuid::Uuid;

    use super::*;

    fn line(name: &str, price: &str, quantity: i32, stock: i32) -> LockedLine {
        LockedLine {
            item_id: ItemId::new(Uuid::new_v4()),
            snack_id: SnackId::new(Uuid::new_v4()),
            name: name.to_owned(),
            price: Price::parse(price).unwrap(),
            quantity: Quantity::new(quantity).unwrap(),
            stock,
        }
    }

    #[test]
    fn test_total_is_exact_sum_of_lines() {
        let lines = [line("Tao Kae Noi", "10.00", 2, 5), line("Pocky", "5.50", 1, 3)];
        assert_eq!(price_lines(&lines).unwrap(), Decimal::new(2550, 2));
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        assert!(matches!(price_lines(&[]), Err(CheckoutError::EmptyCart)));
    }

    #[test]
    fn test_short_stock_names_the_snack() {
        let lines = [line("Pocky", "5.50", 1, 3), line("Lays", "20.00", 2, 1)];
        match price_lines(&lines).unwrap_err() {
            CheckoutError::InsufficientStock {
                name,
                requested,
                available,
                ..
            } => {
                assert_eq!(name, "Lays");
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ordered_line_captures_locked_price() {
        let locked = line("Pocky", "5.50", 3, 10);
        let ordered = ordered_line(&locked);
        assert_eq!(ordered.snack_id, locked.snack_id);
        assert_eq!(ordered.unit_price, Decimal::new(550, 2));
        assert_eq!(ordered.quantity.get(), 3);
        assert_eq!(ordered.line_total, Decimal::new(1650, 2));
    }

    #[test]
    fn test_exact_stock_is_enough() {
        let lines = [line("Pocky", "5.50", 3, 3)];
        assert_eq!(price_lines(&lines).unwrap(), Decimal::new(1650, 2));
    }

    #[test]
    fn test_confirm_request_parses_payment_method() {
        let body = serde_json::json!({
            "cart_id": Uuid::nil(),
            "address_id": Uuid::nil(),
            "payment_method": "promptpay",
        });
        let request: ConfirmOrder = serde_json::from_value(body).unwrap();
        assert_eq!(request.payment_method, PaymentMethod::Promptpay);
    }
}
