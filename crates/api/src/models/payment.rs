//! Payment types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use nom_naa_core::{OrderId, PaymentId, PaymentMethod};

use super::StoredImage;

/// A payment record. The proof image is fetched separately.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub proof: StoredImage,
}
