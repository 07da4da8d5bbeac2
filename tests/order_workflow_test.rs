mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};
use uuid::Uuid;

use botica_api::entities::{order_request, user};
use common::{body_json, TestApp};

async fn seed_product_with_batches(app: &TestApp, admin_token: &str) -> Uuid {
    let product = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Amoxicillin 500mg",
                "generic_name": "amoxicillin",
                "unit_price": "12.50",
                "reorder_level": 20
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

    let today = Utc::now().date_naive();
    // Two batches: the earlier expiry must be drained first.
    for (batch_number, qty, days) in [("LOT-A", 30, 60), ("LOT-B", 50, 365)] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/batches",
                Some(json!({
                    "product_id": product_id,
                    "batch_number": batch_number,
                    "quantity": qty,
                    "expiry_date": (today + Duration::days(days)).to_string()
                })),
                Some(admin_token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    product_id
}

fn batch_by_number<'a>(batches: &'a [Value], number: &str) -> &'a Value {
    batches
        .iter()
        .find(|b| b["batch_number"] == number)
        .expect("batch present")
}

#[tokio::test]
async fn full_order_lifecycle_deducts_stock_earliest_expiry_first() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_pharm, pharm_token) = app.seed_user("rx_head", "pharmacist").await;
    let (nurse, nurse_token) = app.seed_user("ward_nurse", "nurse").await;

    let product_id = seed_product_with_batches(&app, &admin_token).await;

    // Nurse files the request.
    let created = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "notes": "Ward 3 floor stock",
                "items": [{ "product_id": product_id, "quantity": 40 }]
            })),
            Some(&nurse_token),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let order = body_json(created).await;
    assert_eq!(order["data"]["status"], "pending");
    assert_eq!(order["data"]["requester_id"], json!(nurse.id));
    let order_id = order["data"]["id"].as_str().unwrap().to_string();

    // Pharmacist approves, then dispenses.
    let approved = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/approve"),
            None,
            Some(&pharm_token),
        )
        .await;
    assert_eq!(approved.status(), StatusCode::OK);
    assert_eq!(body_json(approved).await["data"]["status"], "approved");

    let dispensed = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/dispense"),
            None,
            Some(&pharm_token),
        )
        .await;
    assert_eq!(dispensed.status(), StatusCode::OK);
    let body = body_json(dispensed).await;
    assert_eq!(body["data"]["status"], "completed");
    assert!(body["data"]["dispensed_at"].as_str().is_some());
    assert_eq!(body["data"]["items"][0]["quantity_dispensed"], 40);

    // LOT-A (expires first, 30 on hand) is drained before LOT-B is touched.
    let batches = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{product_id}/batches"),
            None,
            Some(&pharm_token),
        )
        .await;
    let batches = body_json(batches).await;
    let batches = batches["data"].as_array().unwrap().clone();
    assert_eq!(batch_by_number(&batches, "LOT-A")["quantity"], 0);
    assert_eq!(batch_by_number(&batches, "LOT-B")["quantity"], 40);
}

#[tokio::test]
async fn dispense_fails_when_stock_is_short() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_pharm, pharm_token) = app.seed_user("rx_head", "pharmacist").await;
    let (_nurse, nurse_token) = app.seed_user("ward_nurse", "nurse").await;

    let product_id = seed_product_with_batches(&app, &admin_token).await;

    let created = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "items": [{ "product_id": product_id, "quantity": 200 }]
            })),
            Some(&nurse_token),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let order_id = body_json(created).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    app.request(
        Method::POST,
        &format!("/api/v1/orders/{order_id}/approve"),
        None,
        Some(&pharm_token),
    )
    .await;

    let dispensed = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/dispense"),
            None,
            Some(&pharm_token),
        )
        .await;
    assert_eq!(dispensed.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Nothing was deducted.
    let batches = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{product_id}/batches"),
            None,
            Some(&pharm_token),
        )
        .await;
    let batches = body_json(batches).await;
    let total: i64 = batches["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["quantity"].as_i64().unwrap())
        .sum();
    assert_eq!(total, 80);
}

#[tokio::test]
async fn rejection_requires_a_reason_and_parks_the_order() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_pharm, pharm_token) = app.seed_user("rx_head", "pharmacist").await;
    let (_nurse, nurse_token) = app.seed_user("ward_nurse", "nurse").await;

    let product_id = seed_product_with_batches(&app, &admin_token).await;
    let created = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "items": [{ "product_id": product_id, "quantity": 5 }] })),
            Some(&nurse_token),
        )
        .await;
    let order_id = body_json(created).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let missing_reason = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/reject"),
            Some(json!({ "reason": "" })),
            Some(&pharm_token),
        )
        .await;
    assert_eq!(missing_reason.status(), StatusCode::BAD_REQUEST);

    let rejected = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/reject"),
            Some(json!({ "reason": "Duplicate of yesterday's request" })),
            Some(&pharm_token),
        )
        .await;
    assert_eq!(rejected.status(), StatusCode::OK);
    let body = body_json(rejected).await;
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(
        body["data"]["rejection_reason"],
        "Duplicate of yesterday's request"
    );

    // A parked order cannot be dispensed.
    let dispensed = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/dispense"),
            None,
            Some(&pharm_token),
        )
        .await;
    assert_eq!(dispensed.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn only_the_requester_or_admin_may_cancel_a_pending_order() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_nurse, nurse_token) = app.seed_user("ward_nurse", "nurse").await;
    let (_other, other_token) = app.seed_user("lab_tech", "medtech").await;

    let product_id = seed_product_with_batches(&app, &admin_token).await;
    let created = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "items": [{ "product_id": product_id, "quantity": 3 }] })),
            Some(&nurse_token),
        )
        .await;
    let order_id = body_json(created).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let foreign_cancel = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            None,
            Some(&other_token),
        )
        .await;
    assert_eq!(foreign_cancel.status(), StatusCode::FORBIDDEN);

    let own_cancel = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            None,
            Some(&nurse_token),
        )
        .await;
    assert_eq!(own_cancel.status(), StatusCode::OK);
    assert_eq!(body_json(own_cancel).await["data"]["status"], "cancelled");
}

#[tokio::test]
async fn order_with_unknown_patient_is_rejected() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_nurse, nurse_token) = app.seed_user("ward_nurse", "nurse").await;

    let product_id = seed_product_with_batches(&app, &admin_token).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "patient_id": Uuid::new_v4(),
                "items": [{ "product_id": product_id, "quantity": 1 }]
            })),
            Some(&nurse_token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn orders_join_back_to_their_requester() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (nurse, nurse_token) = app.seed_user("ward_nurse", "nurse").await;

    let product_id = seed_product_with_batches(&app, &admin_token).await;
    let created = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "items": [{ "product_id": product_id, "quantity": 2 }] })),
            Some(&nurse_token),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    // The user/order relation must be navigable in both directions.
    let rows = user::Entity::find()
        .filter(user::Column::Id.eq(nurse.id))
        .find_with_related(order_request::Entity)
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1.len(), 1);
    assert_eq!(rows[0].1[0].requester_id, nurse.id);
}

#[tokio::test]
async fn mine_filter_limits_the_listing_to_own_orders() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_nurse, nurse_token) = app.seed_user("ward_nurse", "nurse").await;
    let (_tech, tech_token) = app.seed_user("lab_tech", "medtech").await;

    let product_id = seed_product_with_batches(&app, &admin_token).await;
    for token in [&nurse_token, &tech_token] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/orders",
                Some(json!({ "items": [{ "product_id": product_id, "quantity": 1 }] })),
                Some(token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let mine = app
        .request(
            Method::GET,
            "/api/v1/orders?mine=true",
            None,
            Some(&nurse_token),
        )
        .await;
    let body = body_json(mine).await;
    assert_eq!(body["data"]["total"], 1);

    let all = app
        .request(Method::GET, "/api/v1/orders", None, Some(&admin_token))
        .await;
    assert_eq!(body_json(all).await["data"]["total"], 2);
}
