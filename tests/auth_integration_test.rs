mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{body_json, TestApp};

#[tokio::test]
async fn login_returns_token_pair_for_valid_credentials() {
    let app = TestApp::new().await;
    let (_user, _token) = app.seed_user("rx_head", "pharmacist").await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "identifier": "rx_head", "password": "Sup3rSecret" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
    assert_eq!(body["token_type"], "Bearer");
}

#[tokio::test]
async fn login_accepts_email_as_identifier() {
    let app = TestApp::new().await;
    app.seed_user("ward_nurse", "nurse").await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "identifier": "ward_nurse@example.com", "password": "Sup3rSecret" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = TestApp::new().await;
    app.seed_user("rx_head", "pharmacist").await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "identifier": "rx_head", "password": "not-the-password" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_route_requires_token() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("rx_head", "pharmacist").await;

    let unauthenticated = app
        .request(Method::GET, "/api/v1/users/me", None, None)
        .await;
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    let authenticated = app
        .request(Method::GET, "/api/v1/users/me", None, Some(&token))
        .await;
    assert_eq!(authenticated.status(), StatusCode::OK);

    let body = body_json(authenticated).await;
    assert_eq!(body["data"]["username"], "rx_head");
    assert_eq!(body["data"]["role"], "pharmacist");
}

#[tokio::test]
async fn refresh_rotates_the_token_pair() {
    let app = TestApp::new().await;
    app.seed_user("rx_head", "pharmacist").await;

    let login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "identifier": "rx_head", "password": "Sup3rSecret" })),
            None,
        )
        .await;
    let tokens = body_json(login).await;
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();

    let refreshed = app
        .request(
            Method::POST,
            "/auth/refresh",
            Some(json!({ "refresh_token": refresh_token })),
            None,
        )
        .await;
    assert_eq!(refreshed.status(), StatusCode::OK);

    let new_tokens = body_json(refreshed).await;
    assert!(new_tokens["access_token"].as_str().is_some());

    // The old refresh token was retired on use.
    let replay = app
        .request(
            Method::POST,
            "/auth/refresh",
            Some(json!({ "refresh_token": tokens["refresh_token"] })),
            None,
        )
        .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_access_token() {
    let app = TestApp::new().await;
    let (_user, token) = app.seed_user("rx_head", "pharmacist").await;

    let logout = app
        .request(Method::POST, "/auth/logout", None, Some(&token))
        .await;
    assert_eq!(logout.status(), StatusCode::OK);

    let after = app
        .request(Method::GET, "/api/v1/users/me", None, Some(&token))
        .await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_flow_with_one_time_code() {
    let app = TestApp::new().await;
    app.seed_user("rx_head", "pharmacist").await;

    // Outside production the issued code is echoed in the response.
    let forgot = app
        .request(
            Method::POST,
            "/auth/forgot-password",
            Some(json!({ "email": "rx_head@example.com" })),
            None,
        )
        .await;
    assert_eq!(forgot.status(), StatusCode::OK);
    let body = body_json(forgot).await;
    let code = body["code"].as_str().expect("code echoed in test env").to_string();

    let reset = app
        .request(
            Method::POST,
            "/auth/reset-password",
            Some(json!({
                "email": "rx_head@example.com",
                "code": code,
                "new_password": "N3wSecret9"
            })),
            None,
        )
        .await;
    assert_eq!(reset.status(), StatusCode::OK);

    // Old password no longer works, new one does.
    let old_login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "identifier": "rx_head", "password": "Sup3rSecret" })),
            None,
        )
        .await;
    assert_eq!(old_login.status(), StatusCode::UNAUTHORIZED);

    let new_login = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "identifier": "rx_head", "password": "N3wSecret9" })),
            None,
        )
        .await;
    assert_eq!(new_login.status(), StatusCode::OK);
}

#[tokio::test]
async fn reset_rejects_a_weak_replacement_password() {
    let app = TestApp::new().await;
    app.seed_user("rx_head", "pharmacist").await;

    let forgot = app
        .request(
            Method::POST,
            "/auth/forgot-password",
            Some(json!({ "email": "rx_head@example.com" })),
            None,
        )
        .await;
    let code = body_json(forgot).await["code"]
        .as_str()
        .expect("code echoed in test env")
        .to_string();

    let weak = app
        .request(
            Method::POST,
            "/auth/reset-password",
            Some(json!({
                "email": "rx_head@example.com",
                "code": code.clone(),
                "new_password": "short"
            })),
            None,
        )
        .await;
    assert_eq!(weak.status(), StatusCode::BAD_REQUEST);

    // The rejected attempt must not consume the code.
    let reset = app
        .request(
            Method::POST,
            "/auth/reset-password",
            Some(json!({
                "email": "rx_head@example.com",
                "code": code,
                "new_password": "N3wSecret9"
            })),
            None,
        )
        .await;
    assert_eq!(reset.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_forgot_password_does_not_leak_accounts() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/auth/forgot-password",
            Some(json!({ "email": "nobody@example.com" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["code"].is_null());
}
