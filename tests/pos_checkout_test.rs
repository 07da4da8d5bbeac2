mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{body_json, TestApp};

fn dec(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal serialized as string")
        .parse()
        .expect("parse decimal")
}

async fn seed_product(app: &TestApp, admin_token: &str, unit_price: &str, stock: i32) -> Uuid {
    let product = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Paracetamol 500mg",
                "unit_price": unit_price,
                "reorder_level": 10
            })),
            Some(admin_token),
        )
        .await;
    assert_eq!(product.status(), StatusCode::CREATED);
    let product_id: Uuid = body_json(product).await["data"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/v1/batches",
            Some(json!({
                "product_id": product_id,
                "batch_number": "LOT-POS",
                "quantity": stock,
                "expiry_date": (Utc::now().date_naive() + Duration::days(180)).to_string()
            })),
            Some(admin_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    product_id
}

#[tokio::test]
async fn regular_sale_totals_are_vat_inclusive() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_pharm, pharm_token) = app.seed_user("rx_head", "pharmacist").await;

    // 8 x 14.00 = 112.00 gross
    let product_id = seed_product(&app, &admin_token, "14.00", 100).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/pos/checkout",
            Some(json!({
                "discount": "none",
                "items": [{ "product_id": product_id, "quantity": 8 }],
                "payment": { "method": "cash", "tendered": "150.00" }
            })),
            Some(&pharm_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let data = &body["data"];

    assert_eq!(dec(&data["subtotal"]), Decimal::new(11200, 2));
    // 112.00 / 1.12 = 100.00 net, so 12.00 of the price is VAT.
    assert_eq!(dec(&data["vat_amount"]), Decimal::new(1200, 2));
    assert_eq!(dec(&data["discount_amount"]), Decimal::ZERO);
    assert_eq!(dec(&data["total_amount"]), Decimal::new(11200, 2));
    assert_eq!(dec(&data["payment"]["change"]), Decimal::new(3800, 2));
    assert!(data["receipt_number"].as_str().unwrap().starts_with("WI-"));
}

#[tokio::test]
async fn senior_discount_strips_vat_then_takes_twenty_percent() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_pharm, pharm_token) = app.seed_user("rx_head", "pharmacist").await;

    let product_id = seed_product(&app, &admin_token, "112.00", 100).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/pos/checkout",
            Some(json!({
                "customer_name": "L. Reyes",
                "discount": "senior",
                "items": [{ "product_id": product_id, "quantity": 1 }],
                "payment": { "method": "cash", "tendered": "100.00" }
            })),
            Some(&pharm_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let data = &body["data"];

    // 112.00 gross -> 100.00 VAT-exempt base -> 20.00 discount -> 80.00 due.
    assert_eq!(dec(&data["subtotal"]), Decimal::new(11200, 2));
    assert_eq!(dec(&data["vat_amount"]), Decimal::ZERO);
    assert_eq!(dec(&data["discount_amount"]), Decimal::new(2000, 2));
    assert_eq!(dec(&data["total_amount"]), Decimal::new(8000, 2));
    assert_eq!(data["discount"], "senior");
}

#[tokio::test]
async fn checkout_rejects_short_tender() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_pharm, pharm_token) = app.seed_user("rx_head", "pharmacist").await;

    let product_id = seed_product(&app, &admin_token, "50.00", 100).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/pos/checkout",
            Some(json!({
                "discount": "none",
                "items": [{ "product_id": product_id, "quantity": 2 }],
                "payment": { "method": "cash", "tendered": "99.00" }
            })),
            Some(&pharm_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn checkout_fails_without_stock_and_leaves_no_records() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_pharm, pharm_token) = app.seed_user("rx_head", "pharmacist").await;

    let product_id = seed_product(&app, &admin_token, "10.00", 3).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/pos/checkout",
            Some(json!({
                "discount": "none",
                "items": [{ "product_id": product_id, "quantity": 5 }],
                "payment": { "method": "cash", "tendered": "100.00" }
            })),
            Some(&pharm_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let listing = app
        .request(
            Method::GET,
            "/api/v1/pos/transactions",
            None,
            Some(&pharm_token),
        )
        .await;
    assert_eq!(body_json(listing).await["data"]["total"], 0);
}

#[tokio::test]
async fn checkout_rejects_unknown_payment_method() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_pharm, pharm_token) = app.seed_user("rx_head", "pharmacist").await;

    let product_id = seed_product(&app, &admin_token, "10.00", 50).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/pos/checkout",
            Some(json!({
                "discount": "none",
                "items": [{ "product_id": product_id, "quantity": 1 }],
                "payment": { "method": "barter", "tendered": "10.00" }
            })),
            Some(&pharm_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn completed_order_takes_a_single_payment() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_pharm, pharm_token) = app.seed_user("rx_head", "pharmacist").await;
    let (_nurse, nurse_token) = app.seed_user("ward_nurse", "nurse").await;

    let product_id = seed_product(&app, &admin_token, "25.00", 50).await;

    let created = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "items": [{ "product_id": product_id, "quantity": 4 }] })),
            Some(&nurse_token),
        )
        .await;
    let order_id = body_json(created).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Payment before completion is refused.
    let early = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/payment"),
            Some(json!({ "amount": "100.00", "method": "cash", "tendered": "100.00" })),
            Some(&pharm_token),
        )
        .await;
    assert_eq!(early.status(), StatusCode::CONFLICT);

    app.request(
        Method::POST,
        &format!("/api/v1/orders/{order_id}/approve"),
        None,
        Some(&pharm_token),
    )
    .await;
    app.request(
        Method::POST,
        &format!("/api/v1/orders/{order_id}/dispense"),
        None,
        Some(&pharm_token),
    )
    .await;

    let paid = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/payment"),
            Some(json!({ "amount": "100.00", "method": "cash", "tendered": "120.00" })),
            Some(&pharm_token),
        )
        .await;
    assert_eq!(paid.status(), StatusCode::CREATED);
    let body = body_json(paid).await;
    assert_eq!(dec(&body["data"]["change"]), Decimal::new(2000, 2));

    let duplicate = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/payment"),
            Some(json!({ "amount": "100.00", "method": "cash", "tendered": "100.00" })),
            Some(&pharm_token),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}
