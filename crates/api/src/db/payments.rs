//! Payment repository. One payment per order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use nom_naa_core::{OrderId, PaymentId, PaymentMethod, UserId};

use super::RepositoryError;
use crate::models::StoredImage;
use crate::models::payment::{NewPayment, Payment};

const PAYMENT_COLUMNS: &str = "id, order_id, payment_method, amount, created_at";

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: PaymentId,
    order_id: OrderId,
    payment_method: PaymentMethod,
    amount: Decimal,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            payment_method: row.payment_method,
            amount: row.amount,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProofRow {
    proof: Vec<u8>,
    proof_content_type: String,
    owner: UserId,
}

/// Repository for payment database operations.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order already has a payment.
    pub async fn create(&self, new: &NewPayment) -> Result<Payment, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            INSERT INTO shop.payments
                (order_id, payment_method, amount, proof, proof_content_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(new.order_id)
        .bind(new.payment_method)
        .bind(new.amount)
        .bind(new.proof.bytes.as_slice())
        .bind(&new.proof.content_type)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::from_constraint(e, |constraint| match constraint {
                "payments_order_id_key" => "order already has a payment".to_owned(),
                other => format!("payment constraint {other}"),
            })
        })?;

        Ok(row.into())
    }

    /// The payment recorded for an order, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_order(&self, order_id: OrderId) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM shop.payments WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Payment::from))
    }

    /// A payment's proof image and the user who placed the order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment doesn't exist.
    pub async fn proof(&self, id: PaymentId) -> Result<(StoredImage, UserId), RepositoryError> {
        let row = sqlx::query_as::<_, ProofRow>(
            r"
            SELECT p.proof, p.proof_content_type, c.user_id AS owner
            FROM shop.payments p
            JOIN shop.orders o ON o.id = p.order_id
            JOIN shop.carts c ON c.id = o.cart_id
            WHERE p.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok((
            StoredImage {
                bytes: row.proof,
                content_type: row.proof_content_type,
            },
            row.owner,
        ))
    }
}
