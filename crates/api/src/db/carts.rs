//! Cart and cart item repository.
//!
//! A user has exactly one `pending` cart at a time (enforced by the
//! `carts_one_pending_per_user` partial index). Items of a pending cart carry
//! no price; `unit_price` is written when the cart is ordered.
//!
//! Item writes go through the transaction-scoped functions below. Each one
//! first takes a `FOR SHARE` lock on the cart while it is still `pending`, so
//! a write either lands before a checkout locks the cart or sees the cart as
//! `ordered` and touches nothing.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use nom_naa_core::{CartId, CartStatus, ItemId, Price, Quantity, SnackId, UserId};

use super::RepositoryError;
use crate::models::cart::{Cart, CartLine};

const CART_COLUMNS: &str = "id, user_id, status, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    status: CartStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    item_id: ItemId,
    snack_id: SnackId,
    name: String,
    unit_price: Price,
    quantity: Quantity,
    stock: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            item_id: row.item_id,
            snack_id: row.snack_id,
            name: row.name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            stock: row.stock,
            line_total: row.unit_price.line_total(row.quantity),
        }
    }
}

/// An item of a user's pending cart, with the snack's current stock.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingItem {
    pub item_id: ItemId,
    pub cart_id: CartId,
    pub snack_id: SnackId,
    pub quantity: Quantity,
    pub stock: i32,
}

/// A cart line read under a row lock on its snack.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedLine {
    pub item_id: ItemId,
    pub snack_id: SnackId,
    pub name: String,
    /// Current catalog price.
    pub price: Price,
    pub quantity: Quantity,
    /// Current stock.
    pub stock: i32,
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's pending cart, created if missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pending_for_user(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.carts (user_id) VALUES ($1)
            ON CONFLICT (user_id) WHERE status = 'pending' DO NOTHING
            ",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM shop.carts WHERE user_id = $1 AND status = 'pending'"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Get a cart by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM shop.carts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Cart::from))
    }

    /// Lines of a cart. Ordered carts use their captured unit price, pending
    /// carts the current catalog price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT i.id AS item_id, i.snack_id, s.name,
                   COALESCE(i.unit_price, s.price) AS unit_price,
                   i.quantity, s.quantity AS stock
            FROM shop.items i
            JOIN shop.snacks s ON s.id = i.snack_id
            WHERE i.cart_id = $1
            ORDER BY i.created_at, i.id
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    /// Number of pending carts a user has. Always 1 for a registered user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_pending(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.carts WHERE user_id = $1 AND status = 'pending'",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Read a cart and hold its row lock until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_cart(
    conn: &mut PgConnection,
    id: CartId,
) -> Result<Option<Cart>, RepositoryError> {
    let row = sqlx::query_as::<_, CartRow>(&format!(
        "SELECT {CART_COLUMNS} FROM shop.carts WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Cart::from))
}

/// Read a cart's lines and lock every referenced snack row.
///
/// Snacks are locked in id order so two checkouts sharing snacks cannot
/// deadlock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_lines(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<Vec<LockedLine>, RepositoryError> {
    let lines = sqlx::query_as::<_, LockedLine>(
        r"
        SELECT i.id AS item_id, i.snack_id, s.name, s.price, i.quantity, s.quantity AS stock
        FROM shop.items i
        JOIN shop.snacks s ON s.id = i.snack_id
        WHERE i.cart_id = $1
        ORDER BY s.id
        FOR UPDATE OF s
        ",
    )
    .bind(cart_id)
    .fetch_all(conn)
    .await?;

    Ok(lines)
}

/// Lock a cart against checkout while it is `pending`.
///
/// Waits for a running checkout of the same cart. Returns `None` if the cart
/// doesn't exist or is no longer pending once the lock is granted.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_pending(
    conn: &mut PgConnection,
    id: CartId,
) -> Result<Option<Cart>, RepositoryError> {
    let row = sqlx::query_as::<_, CartRow>(&format!(
        "SELECT {CART_COLUMNS} FROM shop.carts WHERE id = $1 AND status = 'pending' FOR SHARE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Cart::from))
}

/// An item of `user_id`'s pending cart, holding a share lock on that cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_pending_item(
    conn: &mut PgConnection,
    item_id: ItemId,
    user_id: UserId,
) -> Result<Option<PendingItem>, RepositoryError> {
    let item = sqlx::query_as::<_, PendingItem>(
        r"
        SELECT i.id AS item_id, i.cart_id, i.snack_id, i.quantity, s.quantity AS stock
        FROM shop.items i
        JOIN shop.carts c ON c.id = i.cart_id
        JOIN shop.snacks s ON s.id = i.snack_id
        WHERE i.id = $1 AND c.user_id = $2 AND c.status = 'pending'
        FOR SHARE OF c
        ",
    )
    .bind(item_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(item)
}

/// Quantity of `snack_id` already in the cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn item_quantity(
    conn: &mut PgConnection,
    cart_id: CartId,
    snack_id: SnackId,
) -> Result<Option<Quantity>, RepositoryError> {
    let quantity: Option<Quantity> =
        sqlx::query_scalar("SELECT quantity FROM shop.items WHERE cart_id = $1 AND snack_id = $2")
            .bind(cart_id)
            .bind(snack_id)
            .fetch_optional(conn)
            .await?;

    Ok(quantity)
}

/// Add `quantity` of a snack, merging with an existing line.
///
/// Call with the cart locked by [`lock_pending`].
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the snack doesn't exist.
pub async fn add_item(
    conn: &mut PgConnection,
    cart_id: CartId,
    snack_id: SnackId,
    quantity: Quantity,
) -> Result<ItemId, RepositoryError> {
    let id: ItemId = sqlx::query_scalar(
        r"
        INSERT INTO shop.items (cart_id, snack_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (cart_id, snack_id)
        DO UPDATE SET quantity = shop.items.quantity + EXCLUDED.quantity
        RETURNING id
        ",
    )
    .bind(cart_id)
    .bind(snack_id)
    .bind(quantity)
    .fetch_one(conn)
    .await
    .map_err(|e| match RepositoryError::from_constraint(e, str::to_owned) {
        RepositoryError::Conflict(_) => RepositoryError::NotFound,
        other => other,
    })?;

    Ok(id)
}

/// Set an item's quantity. Call with its cart locked.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the item doesn't exist.
pub async fn set_item_quantity(
    conn: &mut PgConnection,
    item_id: ItemId,
    quantity: Quantity,
) -> Result<(), RepositoryError> {
    let result = sqlx::query("UPDATE shop.items SET quantity = $2 WHERE id = $1")
        .bind(item_id)
        .bind(quantity)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Delete an item. Call with its cart locked.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the item doesn't exist.
pub async fn remove_item(conn: &mut PgConnection, item_id: ItemId) -> Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM shop.items WHERE id = $1")
        .bind(item_id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Capture the price an item was ordered at.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_unit_price(
    conn: &mut PgConnection,
    item_id: ItemId,
    price: Price,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shop.items SET unit_price = $2 WHERE id = $1")
        .bind(item_id)
        .bind(price)
        .execute(conn)
        .await?;
    Ok(())
}

/// Move a pending cart to `ordered`. Returns `false` if it was not pending.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn mark_ordered(conn: &mut PgConnection, id: CartId) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE shop.carts SET status = 'ordered' WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Open a fresh pending cart for `user_id`.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the user still has a pending cart.
pub async fn create_pending(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<CartId, RepositoryError> {
    let id: CartId = sqlx::query_scalar("INSERT INTO shop.carts (user_id) VALUES ($1) RETURNING id")
        .bind(user_id)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            RepositoryError::from_constraint(e, |_| "user already has a pending cart".to_owned())
        })?;

    Ok(id)
}
