//! Cart types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use nom_naa_core::{CartId, CartStatus, ItemId, Price, Quantity, SnackId, UserId, order_total};

/// A cart row.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub status: CartStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of a cart joined with its snack.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item_id: ItemId,
    pub snack_id: SnackId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: Quantity,
    /// Current stock of the snack, for the client's quantity picker.
    pub stock: i32,
    pub line_total: Decimal,
}

/// A cart with its lines and subtotal at current prices.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub status: CartStatus,
    pub items: Vec<CartLine>,
    pub subtotal: Decimal,
}

impl CartView {
    /// Build the view, computing the subtotal from the lines.
    #[must_use]
    pub fn new(cart: &Cart, items: Vec<CartLine>) -> Self {
        let subtotal = order_total(items.iter().map(|line| (line.unit_price, line.quantity)));
        Self {
            id: cart.id,
            status: cart.status,
            items,
            subtotal,
        }
    }
}
