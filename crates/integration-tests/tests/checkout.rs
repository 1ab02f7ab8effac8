//! Integration tests for order confirmation.
//!
//! These tests require a `PostgreSQL` database in `NN_TEST_DATABASE_URL`;
//! they return early without one.

use std::time::Duration;

use rust_decimal::Decimal;

use nom_naa_api::db::carts::{self, CartRepository};
use nom_naa_api::models::CurrentUser;
use nom_naa_api::models::user::User;
use nom_naa_api::services::cart::{CartError, CartService};
use nom_naa_api::services::catalog::{CatalogService, SnackForm};
use nom_naa_api::services::checkout::{CheckoutError, CheckoutService, ConfirmOrder};
use nom_naa_api::services::orders::OrderService;
use nom_naa_core::{AddressId, CartId, CartStatus, OrderStatus, PaymentMethod};
use nom_naa_integration_tests::TestContext;

fn confirm(cart_id: CartId, address_id: AddressId) -> ConfirmOrder {
    ConfirmOrder {
        cart_id,
        address_id,
        payment_method: PaymentMethod::BankTransfer,
    }
}

fn viewer(user: &User) -> CurrentUser {
    CurrentUser {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        role: user.role,
    }
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_confirm_order_snapshots_total_and_moves_stock() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;
    let address = ctx.address(user.id).await;
    let chips = ctx.snack("10.00", 5).await;
    let pocky = ctx.snack("5.50", 3).await;

    let carts = CartService::new(&ctx.pool);
    carts.add(user.id, chips.id, 2).await.unwrap();
    carts.add(user.id, pocky.id, 1).await.unwrap();
    let cart = ctx.pending_cart(user.id).await;

    let order = CheckoutService::new(&ctx.pool)
        .confirm_order(user.id, confirm(cart.id, address.id))
        .await
        .unwrap();

    assert_eq!(order.order.total_price, Decimal::new(2550, 2));
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.order.cart_id, cart.id);
    assert_eq!(order.order.payment_method, PaymentMethod::BankTransfer);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.address.id, address.id);
    assert!(order.payment.is_none());

    assert_eq!(ctx.stock_of(chips.id).await, 3);
    assert_eq!(ctx.stock_of(pocky.id).await, 2);

    let old_cart = CartRepository::new(&ctx.pool)
        .get(cart.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old_cart.status, CartStatus::Ordered);

    let next_cart = ctx.pending_cart(user.id).await;
    assert_ne!(next_cart.id, cart.id);
    assert_eq!(ctx.pending_cart_count(user.id).await, 1);
    assert!(
        CartService::new(&ctx.pool)
            .view(user.id)
            .await
            .unwrap()
            .items
            .is_empty()
    );
}

#[tokio::test]
async fn test_total_ignores_later_price_changes() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;
    let address = ctx.address(user.id).await;
    let snack = ctx.snack("12.25", 10).await;

    CartService::new(&ctx.pool)
        .add(user.id, snack.id, 4)
        .await
        .unwrap();
    let cart = ctx.pending_cart(user.id).await;

    let order = CheckoutService::new(&ctx.pool)
        .confirm_order(user.id, confirm(cart.id, address.id))
        .await
        .unwrap();
    assert_eq!(order.order.total_price, Decimal::new(4900, 2));

    CatalogService::new(&ctx.pool)
        .update(
            snack.id,
            SnackForm {
                price: Some("99.00".to_owned()),
                ..SnackForm::default()
            },
        )
        .await
        .unwrap();
    let reloaded = OrderService::new(&ctx.pool)
        .get(order.order.id, &viewer(&user))
        .await
        .unwrap();
    assert_eq!(reloaded.order.total_price, Decimal::new(4900, 2));
    assert_eq!(reloaded.items[0].unit_price, Decimal::new(1225, 2));
}

// =============================================================================
// Failure leaves no trace
// =============================================================================

#[tokio::test]
async fn test_insufficient_stock_rolls_back_everything() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;
    let address = ctx.address(user.id).await;
    let plenty = ctx.snack("8.00", 10).await;
    let scarce = ctx.snack("20.00", 5).await;

    let carts = CartService::new(&ctx.pool);
    carts.add(user.id, plenty.id, 2).await.unwrap();
    carts.add(user.id, scarce.id, 3).await.unwrap();
    let cart = ctx.pending_cart(user.id).await;

    // Stock drops after the items were added.
    ctx.set_stock(scarce.id, 2).await;

    let err = CheckoutService::new(&ctx.pool)
        .confirm_order(user.id, confirm(cart.id, address.id))
        .await
        .unwrap_err();
    match err {
        CheckoutError::InsufficientStock {
            snack_id,
            requested,
            available,
            ..
        } => {
            assert_eq!(snack_id, scarce.id);
            assert_eq!(requested, 3);
            assert_eq!(available, 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(ctx.stock_of(plenty.id).await, 10);
    assert_eq!(ctx.stock_of(scarce.id).await, 2);
    assert_eq!(ctx.pending_cart(user.id).await.id, cart.id);
    assert_eq!(ctx.pending_cart_count(user.id).await, 1);
    assert!(
        OrderService::new(&ctx.pool)
            .history(&viewer(&user))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;
    let address = ctx.address(user.id).await;
    let cart = ctx.pending_cart(user.id).await;

    let err = CheckoutService::new(&ctx.pool)
        .confirm_order(user.id, confirm(cart.id, address.id))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));
    assert_eq!(ctx.pending_cart(user.id).await.id, cart.id);
}

#[tokio::test]
async fn test_second_confirm_of_same_cart_fails() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;
    let address = ctx.address(user.id).await;
    let snack = ctx.snack("3.00", 4).await;

    CartService::new(&ctx.pool)
        .add(user.id, snack.id, 2)
        .await
        .unwrap();
    let cart = ctx.pending_cart(user.id).await;
    let checkout = CheckoutService::new(&ctx.pool);

    checkout
        .confirm_order(user.id, confirm(cart.id, address.id))
        .await
        .unwrap();
    let err = checkout
        .confirm_order(user.id, confirm(cart.id, address.id))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::CartStatus {
            status: CartStatus::Ordered
        }
    ));
    assert_eq!(ctx.stock_of(snack.id).await, 2);
}

#[tokio::test]
async fn test_foreign_cart_and_address_are_not_found() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let owner = ctx.user().await;
    let other = ctx.user().await;
    let owner_address = ctx.address(owner.id).await;
    let other_address = ctx.address(other.id).await;
    let snack = ctx.snack("1.00", 5).await;

    CartService::new(&ctx.pool)
        .add(owner.id, snack.id, 1)
        .await
        .unwrap();
    let owner_cart = ctx.pending_cart(owner.id).await;
    let checkout = CheckoutService::new(&ctx.pool);

    let err = checkout
        .confirm_order(other.id, confirm(owner_cart.id, other_address.id))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::CartNotConfirmable));

    let err = checkout
        .confirm_order(owner.id, confirm(owner_cart.id, other_address.id))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::AddressNotFound));

    // Neither attempt touched anything.
    assert_eq!(ctx.stock_of(snack.id).await, 5);
    checkout
        .confirm_order(owner.id, confirm(owner_cart.id, owner_address.id))
        .await
        .unwrap();
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirms_never_oversell() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let snack = ctx.snack("15.00", 1).await;

    let mut buyers = Vec::new();
    for _ in 0..4 {
        let user = ctx.user().await;
        let address = ctx.address(user.id).await;
        CartService::new(&ctx.pool)
            .add(user.id, snack.id, 1)
            .await
            .unwrap();
        let cart = ctx.pending_cart(user.id).await;
        buyers.push((user.id, confirm(cart.id, address.id)));
    }

    let handles: Vec<_> = buyers
        .into_iter()
        .map(|(user_id, request)| {
            let pool = ctx.pool.clone();
            tokio::spawn(async move {
                CheckoutService::new(&pool)
                    .confirm_order(user_id, request)
                    .await
            })
        })
        .collect();

    let mut confirmed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => confirmed += 1,
            Err(CheckoutError::InsufficientStock { available, .. }) => assert_eq!(available, 0),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(confirmed, 1);
    assert_eq!(ctx.stock_of(snack.id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_double_submit_creates_one_order() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;
    let address = ctx.address(user.id).await;
    let snack = ctx.snack("2.00", 10).await;

    CartService::new(&ctx.pool)
        .add(user.id, snack.id, 3)
        .await
        .unwrap();
    let cart = ctx.pending_cart(user.id).await;
    let request = confirm(cart.id, address.id);

    let first_service = CheckoutService::new(&ctx.pool);
    let second_service = CheckoutService::new(&ctx.pool);
    let (first, second) = tokio::join!(
        first_service.confirm_order(user.id, request),
        second_service.confirm_order(user.id, request),
    );

    assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
    assert_eq!(ctx.stock_of(snack.id).await, 7);
    assert_eq!(ctx.pending_cart_count(user.id).await, 1);
    assert_eq!(
        OrderService::new(&ctx.pool)
            .history(&viewer(&user))
            .await
            .unwrap()
            .len(),
        1
    );
}

/// Sum of line quantities in a cart.
async fn units_in(ctx: &TestContext, cart_id: CartId) -> i32 {
    CartRepository::new(&ctx.pool)
        .lines(cart_id)
        .await
        .unwrap()
        .iter()
        .map(|line| line.quantity.get())
        .sum()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_add_waiting_on_checkout_lands_in_next_cart() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;
    let chips = ctx.snack("10.00", 5).await;
    let pocky = ctx.snack("5.50", 5).await;

    CartService::new(&ctx.pool)
        .add(user.id, chips.id, 1)
        .await
        .unwrap();
    let cart = ctx.pending_cart(user.id).await;

    // Order the cart the way checkout does while an add is queued behind it.
    let mut tx = ctx.pool.begin().await.unwrap();
    carts::lock_cart(&mut tx, cart.id).await.unwrap().unwrap();

    let pool = ctx.pool.clone();
    let user_id = user.id;
    let pocky_id = pocky.id;
    let add = tokio::spawn(async move { CartService::new(&pool).add(user_id, pocky_id, 2).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(carts::mark_ordered(&mut tx, cart.id).await.unwrap());
    let next_cart = carts::create_pending(&mut tx, user.id).await.unwrap();
    tx.commit().await.unwrap();

    let view = add.await.unwrap().unwrap();
    assert_eq!(view.id, next_cart);
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].snack_id, pocky.id);

    let ordered = CartRepository::new(&ctx.pool).lines(cart.id).await.unwrap();
    assert_eq!(ordered.len(), 1);
    assert_eq!(ordered[0].snack_id, chips.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_waiting_on_checkout_leaves_ordered_cart_alone() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;
    let snack = ctx.snack("3.00", 10).await;

    let view = CartService::new(&ctx.pool)
        .add(user.id, snack.id, 2)
        .await
        .unwrap();
    let item_id = view.items[0].item_id;

    let mut tx = ctx.pool.begin().await.unwrap();
    carts::lock_cart(&mut tx, view.id).await.unwrap().unwrap();

    let pool = ctx.pool.clone();
    let user_id = user.id;
    let update = tokio::spawn(async move {
        let service = CartService::new(&pool);
        (
            service.update(user_id, item_id, 7).await,
            service.remove(user_id, item_id).await,
        )
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(carts::mark_ordered(&mut tx, view.id).await.unwrap());
    carts::create_pending(&mut tx, user.id).await.unwrap();
    tx.commit().await.unwrap();

    let (updated, removed) = update.await.unwrap();
    assert!(matches!(updated, Err(CartError::ItemNotFound)));
    assert!(matches!(removed, Err(CartError::ItemNotFound)));
    assert_eq!(units_in(&ctx, view.id).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cart_edits_racing_confirm_keep_order_consistent() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };

    for _ in 0..5 {
        let user = ctx.user().await;
        let address = ctx.address(user.id).await;
        let chips = ctx.snack("10.00", 20).await;
        let pocky = ctx.snack("5.50", 20).await;

        let view = CartService::new(&ctx.pool)
            .add(user.id, chips.id, 2)
            .await
            .unwrap();
        let item_id = view.items[0].item_id;

        let checkout = CheckoutService::new(&ctx.pool);
        let cart_service = CartService::new(&ctx.pool);
        let (order, _, _) = tokio::join!(
            checkout.confirm_order(user.id, confirm(view.id, address.id)),
            cart_service.add(user.id, pocky.id, 3),
            cart_service.update(user.id, item_id, 4),
        );
        let order = order.unwrap();

        // The order, its cart and the stock all describe the same lines.
        let ordered_units: i32 = order.items.iter().map(|line| line.quantity.get()).sum();
        assert_eq!(units_in(&ctx, view.id).await, ordered_units);
        let taken = (20 - ctx.stock_of(chips.id).await) + (20 - ctx.stock_of(pocky.id).await);
        assert_eq!(taken, ordered_units);

        let total: Decimal = order.items.iter().map(|line| line.line_total).sum();
        assert_eq!(order.order.total_price, total);
        let reloaded = OrderService::new(&ctx.pool)
            .get(order.order.id, &viewer(&user))
            .await
            .unwrap();
        assert_eq!(reloaded.items.len(), order.items.len());
        assert_eq!(ctx.pending_cart_count(user.id).await, 1);
    }
}
