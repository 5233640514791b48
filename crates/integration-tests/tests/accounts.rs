//! Sign-up, activation, login, logout and CSRF over real HTTP.

#![allow(clippy::unwrap_used)]

use paperback_core::{TokenPlaintext, UserId};
use paperback_integration_tests::{PASSWORD, TestApp, body};
use paperback_server::services::LogNotifier;
use reqwest::{Method, StatusCode};
use serde_json::json;
use url::Url;

#[tokio::test]
async fn test_signup_activation_flow() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let response = client
        .send(
            Method::POST,
            "/user/signup",
            json!({ "name": "Alice", "email": "alice@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body(response).await;
    assert_eq!(created["user"]["activated"], false);
    assert!(created["user"].get("password_hash").is_none());

    let token = app.outbox.token_for("alice@example.com").await;
    let response = client
        .send(Method::PUT, "/user/activated", json!({ "token": token }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let activated = body(response).await;
    assert_eq!(activated["user"]["activated"], true);
    assert_eq!(activated["user"]["version"], 2);

    // Activation consumes every activation token of the account
    let response = client
        .send(Method::PUT, "/user/activated", json!({ "token": token }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(response).await,
        json!({ "error": { "token": "invalid or expired activation token" } })
    );
}

#[tokio::test]
async fn test_duplicate_email_is_field_error() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    app.signed_in_user(&mut client, "dup@example.com").await;

    let response = client
        .send(
            Method::POST,
            "/user/signup",
            json!({ "name": "Other", "email": "dup@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(response).await["error"]["email"],
        "a user with this email address already exists"
    );
}

#[tokio::test]
async fn test_signup_reports_every_invalid_field() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let response = client
        .send(
            Method::POST,
            "/user/signup",
            json!({ "name": "", "email": "not-an-email", "password": "short" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let errors = body(response).await;
    for field in ["name", "email", "password"] {
        assert!(errors["error"][field].is_string(), "missing {field}");
    }
}

#[tokio::test]
async fn test_bad_credentials_are_indistinguishable() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    app.signed_in_user(&mut client, "bob@example.com").await;

    let mut other = app.client();
    let wrong_password = other.login("bob@example.com", "not-the-password").await;
    let unknown_email = other.login("nobody@example.com", PASSWORD).await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(wrong_password).await, body(unknown_email).await);
}

#[tokio::test]
async fn test_reissue_activation_token() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    app.signed_in_user(&mut client, "carol@example.com").await;
    let first = app.outbox.token_for("carol@example.com").await;

    let response = client
        .send(
            Method::POST,
            "/user/activation-token",
            json!({ "email": "carol@example.com" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let second = app.outbox.nth_token_for("carol@example.com", 2).await;
    assert_ne!(first, second);

    let response = client
        .send(Method::PUT, "/user/activated", json!({ "token": second }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .send(
            Method::POST,
            "/user/activation-token",
            json!({ "email": "carol@example.com" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(response).await["error"]["email"],
        "user has already been activated"
    );
}

#[tokio::test]
async fn test_reissue_for_unknown_email() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let response = client
        .send(
            Method::POST,
            "/user/activation-token",
            json!({ "email": "ghost@example.com" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(response).await["error"]["email"],
        "no matching email address found"
    );
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    app.signed_in_user(&mut client, "dave@example.com").await;

    let response = client.get("/user/me").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["user"]["email"], "dave@example.com");

    let response = client.logout().await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.get("/user/me").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/user/login");
}

#[tokio::test]
async fn test_deleted_account_becomes_anonymous() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    let user_id = app.signed_in_user(&mut client, "erin@example.com").await;

    app.store.remove_user(UserId::new(user_id)).unwrap();

    let response = client.get("/user/me").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_profile_edit_is_version_guarded() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    app.signed_in_user(&mut client, "fay@example.com").await;

    let response = client
        .send(Method::PATCH, "/user/me", json!({ "version": 1, "name": "Fay" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["user"]["version"], 2);

    let response = client
        .send(Method::PATCH, "/user/me", json!({ "version": 1, "name": "Stale" }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_state_changing_request_without_csrf_is_rejected() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    client.csrf_token().await;

    let response = client
        .send_without_csrf(
            Method::POST,
            "/user/signup",
            json!({ "name": "Mallory", "email": "mallory@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.outbox.count_for("mallory@example.com"), 0);
}

#[tokio::test]
async fn test_login_form_hands_out_csrf_token() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let response = client.get("/user/login").await;
    assert_eq!(response.status(), StatusCode::OK);
    let form_token = body(response).await["csrf_token"]
        .as_str()
        .unwrap()
        .to_owned();
    assert_eq!(form_token, client.csrf_token().await);
}

#[tokio::test]
async fn test_activation_link_opens_the_activation_page() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    app.signed_in_user(&mut client, "link@example.com").await;
    let token = app.outbox.token_for("link@example.com").await;

    let notifier = LogNotifier::new(Url::parse(&client.url("/")).unwrap());
    let link = notifier
        .activation_link(&TokenPlaintext::parse(&token).unwrap())
        .unwrap();

    let response = client
        .get(&format!("{}?{}", link.path(), link.query().unwrap()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body(response).await;
    assert_eq!(page["token"], token.as_str());
    assert_eq!(page["csrf_token"], client.csrf_token().await.as_str());

    let response = client
        .send(Method::PUT, "/user/activated", json!({ "token": page["token"] }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_email_ignores_case() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    app.signed_in_user(&mut client, "casey@example.com").await;
    client.logout().await;

    let response = client.login("Casey@Example.COM", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["user"]["email"], "casey@example.com");
}
