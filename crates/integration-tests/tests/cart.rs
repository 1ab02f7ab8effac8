//! Integration tests for the cart lifecycle.
//!
//! These tests require `NN_TEST_DATABASE_URL`; they return early without it.

use nom_naa_api::db::RepositoryError;
use nom_naa_api::db::carts::{self, CartRepository};
use nom_naa_api::services::cart::{CartError, CartService};
use nom_naa_core::{ItemId, SnackId};
use nom_naa_integration_tests::TestContext;
use uuid::Uuid;

#[tokio::test]
async fn test_adding_twice_merges_lines() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;
    let snack = ctx.snack("7.00", 5).await;
    let service = CartService::new(&ctx.pool);

    service.add(user.id, snack.id, 2).await.unwrap();
    let cart = service.add(user.id, snack.id, 3).await.unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity.get(), 5);
    assert_eq!(cart.subtotal, rust_decimal::Decimal::new(3500, 2));

    let err = service.add(user.id, snack.id, 1).await.unwrap_err();
    assert!(matches!(err, CartError::StockNotEnough));
}

#[tokio::test]
async fn test_update_and_remove_lines() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;
    let snack = ctx.snack("2.00", 4).await;
    let service = CartService::new(&ctx.pool);

    let cart = service.add(user.id, snack.id, 1).await.unwrap();
    let item_id = cart.items[0].item_id;

    let cart = service.update(user.id, item_id, 4).await.unwrap();
    assert_eq!(cart.items[0].quantity.get(), 4);

    assert!(matches!(
        service.update(user.id, item_id, 5).await,
        Err(CartError::StockNotEnough)
    ));
    assert!(matches!(
        service.update(user.id, item_id, 0).await,
        Err(CartError::InvalidQuantity(_))
    ));

    let cart = service.remove(user.id, item_id).await.unwrap();
    assert!(cart.items.is_empty());
    assert!(matches!(
        service.remove(user.id, item_id).await,
        Err(CartError::ItemNotFound)
    ));
}

#[tokio::test]
async fn test_lines_of_other_users_are_invisible() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let owner = ctx.user().await;
    let other = ctx.user().await;
    let snack = ctx.snack("2.00", 4).await;
    let service = CartService::new(&ctx.pool);

    let cart = service.add(owner.id, snack.id, 1).await.unwrap();
    let item_id = cart.items[0].item_id;

    assert!(matches!(
        service.update(other.id, item_id, 2).await,
        Err(CartError::ItemNotFound)
    ));
    assert!(matches!(
        service.remove(other.id, item_id).await,
        Err(CartError::ItemNotFound)
    ));
    assert!(matches!(
        service
            .remove(owner.id, ItemId::new(Uuid::new_v4()))
            .await,
        Err(CartError::ItemNotFound)
    ));
}

#[tokio::test]
async fn test_unknown_snack_is_rejected() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;

    let err = CartService::new(&ctx.pool)
        .add(user.id, SnackId::new(Uuid::new_v4()), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::SnackNotFound));
}

#[tokio::test]
async fn test_one_pending_cart_per_user() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let user = ctx.user().await;
    let repo = CartRepository::new(&ctx.pool);

    let (a, b) = tokio::join!(repo.pending_for_user(user.id), repo.pending_for_user(user.id));
    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(ctx.pending_cart_count(user.id).await, 1);

    let mut conn = ctx.pool.acquire().await.unwrap();
    let err = carts::create_pending(&mut conn, user.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
}
