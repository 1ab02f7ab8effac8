//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use nom_naa_core::{
    AddressId, CartId, OrderId, OrderStatus, PaymentMethod, Quantity, SnackId, TrackingId,
};

use super::address::Address;
use super::payment::Payment;

/// An order row.
///
/// `total_price` is fixed at confirmation time and never recomputed.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub tracking_id: TrackingId,
    pub cart_id: CartId,
    pub address_id: AddressId,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an ordered cart, priced at the time of ordering.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub snack_id: SnackId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: Quantity,
    pub line_total: Decimal,
}

/// An order with everything a receipt page needs.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
    pub address: Address,
    pub payment: Option<Payment>,
}
