//! Order repository.
//!
//! Orders are created only inside the checkout transaction (see [`insert`]).
//! Afterwards only `status` changes; `total_price` is guarded by a trigger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use nom_naa_core::{
    AddressId, CartId, OrderId, OrderStatus, PaymentMethod, Quantity, SnackId, TrackingId, UserId,
};

use super::{PageRequest, RepositoryError};
use crate::models::order::{Order, OrderLine};

const ORDER_COLUMNS: &str = "o.id, o.tracking_id, o.cart_id, o.address_id, o.total_price, \
                             o.status, o.payment_method, o.created_at, o.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    tracking_id: TrackingId,
    cart_id: CartId,
    address_id: AddressId,
    total_price: Decimal,
    status: OrderStatus,
    payment_method: PaymentMethod,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            tracking_id: row.tracking_id,
            cart_id: row.cart_id,
            address_id: row.address_id,
            total_price: row.total_price,
            status: row.status,
            payment_method: row.payment_method,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    cart_id: CartId,
    snack_id: SnackId,
    name: String,
    unit_price: Decimal,
    quantity: Quantity,
}

/// Values written when a cart becomes an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub tracking_id: TrackingId,
    pub cart_id: CartId,
    pub address_id: AddressId,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
}

/// Outcome of a status change request.
#[derive(Debug, Clone)]
pub enum StatusChange {
    Updated(Order),
    /// The transition from the current status is not allowed.
    Rejected { current: OrderStatus },
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders o WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Get an order by its public tracking ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_tracking(
        &self,
        tracking_id: TrackingId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders o WHERE o.tracking_id = $1"
        ))
        .bind(tracking_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// The user who placed an order (the owner of its cart).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn owner_of(&self, id: OrderId) -> Result<Option<UserId>, RepositoryError> {
        let owner: Option<UserId> = sqlx::query_scalar(
            r"
            SELECT c.user_id
            FROM shop.orders o
            JOIN shop.carts c ON c.id = o.cart_id
            WHERE o.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(owner)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM shop.orders o
            JOIN shop.carts c ON c.id = o.cart_id
            WHERE c.user_id = $1
            ORDER BY o.created_at DESC, o.id
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Lines of several ordered carts, grouped by cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines_for_carts(
        &self,
        cart_ids: &[CartId],
    ) -> Result<Vec<(CartId, OrderLine)>, RepositoryError> {
        let ids: Vec<uuid::Uuid> = cart_ids.iter().map(CartId::as_uuid).collect();

        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT i.cart_id, i.snack_id, s.name,
                   COALESCE(i.unit_price, s.price) AS unit_price,
                   i.quantity
            FROM shop.items i
            JOIN shop.snacks s ON s.id = i.snack_id
            WHERE i.cart_id = ANY($1)
            ORDER BY i.cart_id, i.created_at, i.id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let line_total = row.unit_price * Decimal::from(row.quantity.get());
                (
                    row.cart_id,
                    OrderLine {
                        snack_id: row.snack_id,
                        name: row.name,
                        unit_price: row.unit_price,
                        quantity: row.quantity,
                        line_total,
                    },
                )
            })
            .collect())
    }

    /// All orders, newest first, plus the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, page: PageRequest) -> Result<(Vec<Order>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.orders")
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM shop.orders o
            ORDER BY o.created_at DESC, o.id
            LIMIT $1 OFFSET $2
            "
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Order::from).collect(), total))
    }

    /// Move an order to `next` if the lifecycle allows it.
    ///
    /// The current status is read under a row lock so concurrent updates are
    /// checked against each other.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<StatusChange, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: OrderStatus =
            sqlx::query_scalar("SELECT status FROM shop.orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        if !current.can_transition_to(next) {
            return Ok(StatusChange::Rejected { current });
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE shop.orders o SET status = $2
            WHERE o.id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(StatusChange::Updated(row.into()))
    }

    /// Sum of `total_price` over orders that were not cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue(&self) -> Result<Decimal, RepositoryError> {
        let total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_price), 0) FROM shop.orders WHERE status <> 'cancelled'",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(total)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Insert a `pending` order.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the cart already has an order.
pub async fn insert(conn: &mut PgConnection, new: &NewOrder) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        INSERT INTO shop.orders AS o
            (tracking_id, cart_id, address_id, total_price, status, payment_method)
        VALUES ($1, $2, $3, $4, 'pending', $5)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(new.tracking_id)
    .bind(new.cart_id)
    .bind(new.address_id)
    .bind(new.total_price)
    .bind(new.payment_method)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        RepositoryError::from_constraint(e, |constraint| match constraint {
            "orders_cart_id_key" => "cart already has an order".to_owned(),
            other => format!("order constraint {other}"),
        })
    })?;

    Ok(row.into())
}
