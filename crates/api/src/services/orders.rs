//! Order reads and admin status management.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use nom_naa_core::{OrderId, OrderStatus, TrackingId};

use crate::db::addresses::AddressRepository;
use crate::db::orders::{OrderRepository, StatusChange};
use crate::db::payments::PaymentRepository;
use crate::db::{PageRequest, RepositoryError};
use crate::models::order::{Order, OrderDetail, OrderLine};
use crate::models::{CurrentUser, Page};

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No such order, or the caller may not see it.
    #[error("order not found")]
    NotFound,

    #[error("cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Order service.
pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
    addresses: AddressRepository<'a>,
    payments: PaymentRepository<'a>,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            addresses: AddressRepository::new(pool),
            payments: PaymentRepository::new(pool),
        }
    }

    /// Expand an order into its receipt view.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the database operation fails.
    pub async fn detail_of(&self, order: Order) -> Result<OrderDetail, OrderError> {
        let items = self
            .orders
            .lines_for_carts(&[order.cart_id])
            .await?
            .into_iter()
            .map(|(_, line)| line)
            .collect();
        let address = self.addresses.get(order.address_id).await?;
        let payment = self.payments.get_for_order(order.id).await?;

        Ok(OrderDetail {
            order,
            items,
            address,
            payment,
        })
    }

    /// An order, if `viewer` placed it or is an admin.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order doesn't exist or belongs
    /// to someone else.
    pub async fn get(&self, id: OrderId, viewer: &CurrentUser) -> Result<OrderDetail, OrderError> {
        let order = self.orders.get(id).await?.ok_or(OrderError::NotFound)?;
        self.ensure_visible(&order, viewer).await?;
        self.detail_of(order).await
    }

    /// An order by tracking ID, if `viewer` placed it or is an admin.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if no visible order has this tracking ID.
    pub async fn by_tracking(
        &self,
        tracking_id: TrackingId,
        viewer: &CurrentUser,
    ) -> Result<OrderDetail, OrderError> {
        let order = self
            .orders
            .get_by_tracking(tracking_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        self.ensure_visible(&order, viewer).await?;
        self.detail_of(order).await
    }

    async fn ensure_visible(&self, order: &Order, viewer: &CurrentUser) -> Result<(), OrderError> {
        if viewer.role.is_admin() {
            return Ok(());
        }
        match self.orders.owner_of(order.id).await? {
            Some(owner) if owner == viewer.id => Ok(()),
            _ => Err(OrderError::NotFound),
        }
    }

    /// The viewer's orders, newest first, with items and address.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the database operation fails.
    pub async fn history(&self, viewer: &CurrentUser) -> Result<Vec<OrderDetail>, OrderError> {
        let orders = self.orders.history_for_user(viewer.id).await?;
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let cart_ids: Vec<_> = orders.iter().map(|o| o.cart_id).collect();
        let mut lines: HashMap<_, Vec<OrderLine>> = HashMap::new();
        for (cart_id, line) in self.orders.lines_for_carts(&cart_ids).await? {
            lines.entry(cart_id).or_default().push(line);
        }

        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            let address = self.addresses.get(order.address_id).await?;
            let payment = self.payments.get_for_order(order.id).await?;
            details.push(OrderDetail {
                items: lines.remove(&order.cart_id).unwrap_or_default(),
                order,
                address,
                payment,
            });
        }
        Ok(details)
    }

    /// All orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the database operation fails.
    pub async fn list(&self, page: PageRequest) -> Result<Page<Order>, OrderError> {
        let (items, total) = self.orders.list(page).await?;
        Ok(Page {
            items,
            page: page.page,
            page_size: page.page_size,
            total,
        })
    }

    /// Move an order along its lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order doesn't exist and
    /// `OrderError::InvalidTransition` if the lifecycle forbids the change.
    #[instrument(skip(self), fields(order_id = %id, status = %next))]
    pub async fn update_status(&self, id: OrderId, next: OrderStatus) -> Result<Order, OrderError> {
        let change = self.orders.update_status(id, next).await.map_err(|e| match e {
            RepositoryError::NotFound => OrderError::NotFound,
            other => OrderError::Repository(other),
        })?;

        match change {
            StatusChange::Updated(order) => {
                tracing::info!("order status updated");
                Ok(order)
            }
            StatusChange::Rejected { current } => Err(OrderError::InvalidTransition {
                from: current,
                to: next,
            }),
        }
    }

    /// Revenue over all orders that were not cancelled.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the database operation fails.
    pub async fn revenue(&self) -> Result<Decimal, OrderError> {
        Ok(self.orders.revenue().await?)
    }
}
