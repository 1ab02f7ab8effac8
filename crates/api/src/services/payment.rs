//! Payment proof uploads.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use nom_naa_core::{OrderId, OrderStatus, PaymentId};

use crate::db::RepositoryError;
use crate::db::orders::OrderRepository;
use crate::db::payments::PaymentRepository;
use crate::models::payment::{NewPayment, Payment};
use crate::models::{CurrentUser, StoredImage};

/// Errors from payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No such order, or it belongs to someone else.
    #[error("order not found")]
    OrderNotFound,

    /// Payments are only accepted for pending orders.
    #[error("order is {0}, not pending")]
    OrderNotPending(OrderStatus),

    #[error("order already has a payment")]
    AlreadyPaid,

    #[error("payment not found")]
    NotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Payment service.
pub struct PaymentService<'a> {
    orders: OrderRepository<'a>,
    payments: PaymentRepository<'a>,
}

impl<'a> PaymentService<'a> {
    /// Create a new payment service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            payments: PaymentRepository::new(pool),
        }
    }

    /// Attach a proof of payment to one of the caller's pending orders.
    ///
    /// The amount is the order total and the method is the order's method.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` if the caller did not place the
    /// order, `PaymentError::OrderNotPending` if it has moved on and
    /// `PaymentError::AlreadyPaid` on a second upload.
    #[instrument(skip(self, payer, proof), fields(user_id = %payer.id, order_id = %order_id))]
    pub async fn submit(
        &self,
        payer: &CurrentUser,
        order_id: OrderId,
        proof: StoredImage,
    ) -> Result<Payment, PaymentError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        if self.orders.owner_of(order.id).await? != Some(payer.id) {
            return Err(PaymentError::OrderNotFound);
        }

        if order.status != OrderStatus::Pending {
            return Err(PaymentError::OrderNotPending(order.status));
        }

        let payment = self
            .payments
            .create(&NewPayment {
                order_id: order.id,
                payment_method: order.payment_method,
                amount: order.total_price,
                proof,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => PaymentError::AlreadyPaid,
                other => PaymentError::Repository(other),
            })?;

        tracing::info!(payment_id = %payment.id, "payment proof recorded");
        Ok(payment)
    }

    /// A payment's proof image, for the payer or an admin.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotFound` if the payment doesn't exist or the
    /// viewer may not see it.
    pub async fn proof(
        &self,
        id: PaymentId,
        viewer: &CurrentUser,
    ) -> Result<StoredImage, PaymentError> {
        let (proof, owner) = self.payments.proof(id).await.map_err(|e| match e {
            RepositoryError::NotFound => PaymentError::NotFound,
            other => PaymentError::Repository(other),
        })?;

        if owner != viewer.id && !viewer.role.is_admin() {
            return Err(PaymentError::NotFound);
        }
        Ok(proof)
    }
}
