//! End-to-end HTTP tests: register, log in, fill a cart and place an order.
//!
//! The application is served in-process on an ephemeral port. These tests
//! require `NN_TEST_DATABASE_URL`; they return early without it.

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use nom_naa_integration_tests::{TEST_PASSWORD, TEST_SUB_DISTRICT, TestContext};

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Register and log in a fresh user through the API.
async fn logged_in(client: &Client, base_url: &str) -> Value {
    let form = TestContext::registration();
    let resp = client
        .post(format!("{base_url}/api/v1/users/register"))
        .json(&json!({
            "username": form.username,
            "first_name": form.first_name,
            "last_name": form.last_name,
            "email": form.email,
            "phone_number": form.phone_number,
            "password": form.password,
            "confirm_password": form.confirm_password,
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .post(format!("{base_url}/api/v1/users/login"))
        .json(&json!({ "email": form.email, "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Login body is JSON")
}

#[tokio::test]
async fn test_checkout_over_http() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let base_url = ctx.spawn_server().await;
    let client = client();
    let snack = ctx.snack("10.00", 5).await;

    let user = logged_in(&client, &base_url).await;

    let resp = client
        .get(format!("{base_url}/api/v1/users/profile"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let profile: Value = resp.json().await.unwrap();
    assert_eq!(profile["id"], user["id"]);

    let input = TestContext::address_input();
    let resp = client
        .post(format!("{base_url}/api/v1/address"))
        .json(&json!({
            "province_code": input.province_code,
            "district_code": input.district_code,
            "sub_district_code": input.sub_district_code,
            "address_detail": input.address_detail,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let address: Value = resp.json().await.unwrap();
    assert_eq!(address["sub_district_code"], TEST_SUB_DISTRICT);
    assert_eq!(address["postal_code"], "99999");

    let resp = client
        .post(format!("{base_url}/api/v1/cart"))
        .json(&json!({ "snack_id": snack.id, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cart: Value = resp.json().await.unwrap();
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));

    let resp = client
        .post(format!("{base_url}/api/v1/orders/confirm"))
        .json(&json!({
            "cart_id": cart["id"],
            "address_id": address["id"],
            "payment_method": "promptpay",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["status"], "pending");
    assert_eq!(order["items"].as_array().map(Vec::len), Some(1));

    let tracking_id = order["tracking_id"].as_str().unwrap();
    let resp = client
        .get(format!("{base_url}/api/v1/orders/tracking/{tracking_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base_url}/api/v1/orders/history"))
        .send()
        .await
        .unwrap();
    let history: Value = resp.json().await.unwrap();
    assert_eq!(history.as_array().map(Vec::len), Some(1));

    // The cart endpoint now serves the fresh, empty cart.
    let resp = client
        .get(format!("{base_url}/api/v1/cart"))
        .send()
        .await
        .unwrap();
    let next_cart: Value = resp.json().await.unwrap();
    assert_ne!(next_cart["id"], cart["id"]);
    assert_eq!(next_cart["items"].as_array().map(Vec::len), Some(0));

    assert_eq!(ctx.stock_of(snack.id).await, 3);
}

#[tokio::test]
async fn test_cart_rejects_more_than_stock() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let base_url = ctx.spawn_server().await;
    let client = client();
    let snack = ctx.snack("4.00", 2).await;
    logged_in(&client, &base_url).await;

    let resp = client
        .post(format!("{base_url}/api/v1/cart"))
        .json(&json!({ "snack_id": snack.id, "quantity": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "stock not enough");
}

#[tokio::test]
async fn test_orders_are_private() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let base_url = ctx.spawn_server().await;

    let owner = ctx.user().await;
    let address = ctx.address(owner.id).await;
    let snack = ctx.snack("1.50", 3).await;
    nom_naa_api::services::cart::CartService::new(&ctx.pool)
        .add(owner.id, snack.id, 1)
        .await
        .unwrap();
    let cart = ctx.pending_cart(owner.id).await;
    let order = nom_naa_api::services::checkout::CheckoutService::new(&ctx.pool)
        .confirm_order(
            owner.id,
            nom_naa_api::services::checkout::ConfirmOrder {
                cart_id: cart.id,
                address_id: address.id,
                payment_method: nom_naa_core::PaymentMethod::CashOnDelivery,
            },
        )
        .await
        .unwrap();

    let stranger = client();
    let resp = stranger
        .get(format!("{base_url}/api/v1/orders/{}", order.order.id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    logged_in(&stranger, &base_url).await;
    let resp = stranger
        .get(format!("{base_url}/api/v1/orders/{}", order.order.id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoints() {
    let Some(ctx) = TestContext::connect().await else {
        return;
    };
    let base_url = ctx.spawn_server().await;
    let client = client();

    for path in ["/health", "/health/ready"] {
        let resp = client.get(format!("{base_url}{path}")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
    }
}
