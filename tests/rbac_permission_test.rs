mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{body_json, TestApp};

#[tokio::test]
async fn nurse_cannot_touch_the_catalog() {
    let app = TestApp::new().await;
    let (_nurse, nurse_token) = app.seed_user("ward_nurse", "nurse").await;

    let create = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Ibuprofen", "unit_price": "5.00", "reorder_level": 5 })),
            Some(&nurse_token),
        )
        .await;
    assert_eq!(create.status(), StatusCode::FORBIDDEN);

    // Reading the catalog is still allowed.
    let list = app
        .request(Method::GET, "/api/v1/products", None, Some(&nurse_token))
        .await;
    assert_eq!(list.status(), StatusCode::OK);
}

#[tokio::test]
async fn nurse_cannot_review_or_dispense() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (_nurse, nurse_token) = app.seed_user("ward_nurse", "nurse").await;

    let product = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Ibuprofen", "unit_price": "5.00", "reorder_level": 5 })),
            Some(&admin_token),
        )
        .await;
    let product_id = body_json(product).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let created = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "items": [{ "product_id": product_id, "quantity": 1 }] })),
            Some(&nurse_token),
        )
        .await;
    let order_id = body_json(created).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    for action in ["approve", "reject", "dispense"] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/orders/{order_id}/{action}"),
                Some(json!({ "reason": "nope" })),
                Some(&nurse_token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "action {action}");
    }
}

#[tokio::test]
async fn pharmacist_cannot_manage_users_or_read_audit_logs() {
    let app = TestApp::new().await;
    let (_pharm, pharm_token) = app.seed_user("rx_head", "pharmacist").await;

    let create_user = app
        .request(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "username": "newbie",
                "email": "newbie@example.com",
                "password": "Sup3rSecret",
                "full_name": "New Staff",
                "role": "nurse"
            })),
            Some(&pharm_token),
        )
        .await;
    assert_eq!(create_user.status(), StatusCode::FORBIDDEN);

    let audit = app
        .request(Method::GET, "/api/v1/audit-logs", None, Some(&pharm_token))
        .await;
    assert_eq!(audit.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_bypasses_permission_checks() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;

    let create_user = app
        .request(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "username": "newbie",
                "email": "newbie@example.com",
                "password": "Sup3rSecret",
                "full_name": "New Staff",
                "role": "medtech"
            })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(create_user.status(), StatusCode::CREATED);

    let audit = app
        .request(Method::GET, "/api/v1/audit-logs", None, Some(&admin_token))
        .await;
    assert_eq!(audit.status(), StatusCode::OK);

    // The user creation above left an audit trail.
    let body = body_json(audit).await;
    let entries = body["data"]["entries"].as_array().unwrap();
    assert!(entries.iter().any(|e| e["action"] == "user.create"));
}

#[tokio::test]
async fn medtech_cannot_use_the_register() {
    let app = TestApp::new().await;
    let (_tech, tech_token) = app.seed_user("lab_tech", "medtech").await;

    let checkout = app
        .request(
            Method::POST,
            "/api/v1/pos/checkout",
            Some(json!({
                "discount": "none",
                "items": [{ "product_id": uuid::Uuid::new_v4(), "quantity": 1 }],
                "payment": { "method": "cash", "tendered": "10.00" }
            })),
            Some(&tech_token),
        )
        .await;
    assert_eq!(checkout.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deactivated_account_is_locked_out_of_login() {
    let app = TestApp::new().await;
    let (_admin, admin_token) = app.seed_user("admin", "admin").await;
    let (nurse, _nurse_token) = app.seed_user("ward_nurse", "nurse").await;

    let deactivate = app
        .request(
            Method::POST,
            &format!("/api/v1/users/{}/deactivate", nurse.id),
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(deactivate.status(), StatusCode::OK);

    let login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "identifier": "ward_nurse", "password": "Sup3rSecret" })),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_token_is_rejected() {
    let app = TestApp::new().await;

    let garbage = app
        .request(
            Method::GET,
            "/api/v1/products",
            None,
            Some("not.a.real.token"),
        )
        .await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}
