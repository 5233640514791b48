//! Resource CRUD with optimistic concurrency and owner scoping.

#![allow(clippy::unwrap_used)]

use paperback_core::PermissionCode;
use paperback_integration_tests::{TestApp, TestClient, body};
use reqwest::{Method, StatusCode};
use serde_json::json;

async fn writer(app: &TestApp, email: &str) -> TestClient {
    let mut client = app.client();
    let user_id = app.activated_user(&mut client, email).await;
    app.grant(
        user_id,
        &[
            PermissionCode::PRODUCTS_WRITE,
            PermissionCode::INVOICES_READ,
            PermissionCode::INVOICES_WRITE,
        ],
    )
    .await;
    client
}

#[tokio::test]
async fn test_product_update_detects_stale_version() {
    let app = TestApp::spawn().await;
    let mut client = writer(&app, "lee@example.com").await;

    let response = client
        .send(
            Method::POST,
            "/products",
            json!({ "title": "Emma", "description": "A novel", "price": 899 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()["location"].to_str().unwrap().to_owned();
    let created = body(response).await;
    assert_eq!(created["product"]["version"], 1);
    let id = created["product"]["id"].as_i64().unwrap();
    assert_eq!(location, format!("/products/{id}"));

    let path = format!("/products/{id}");
    let response = client
        .send(Method::PATCH, &path, json!({ "version": 1, "price": 999 }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body(response).await;
    assert_eq!(updated["product"]["version"], 2);
    assert_eq!(updated["product"]["price"], 999);
    assert_eq!(updated["product"]["title"], "Emma");

    // A second writer still holding version 1 loses
    let response = client
        .send(Method::PATCH, &path, json!({ "version": 1, "price": 1 }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client.get(&path).await;
    assert_eq!(body(response).await["product"]["price"], 999);
}

#[tokio::test]
async fn test_product_list_filters_and_paginates() {
    let app = TestApp::spawn().await;
    let mut client = writer(&app, "max@example.com").await;

    for title in ["Moby Dick", "Dune", "Dune Messiah"] {
        let response = client
            .send(
                Method::POST,
                "/products",
                json!({ "title": title, "description": "", "price": 100 }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = client.get("/products?title=dune&page_size=1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body(response).await;
    assert_eq!(listing["products"].as_array().unwrap().len(), 1);
    assert_eq!(listing["metadata"]["total_records"], 2);
    assert_eq!(listing["metadata"]["last_page"], 2);

    let response = client.get("/products?page=0&sort=colour").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let errors = body(response).await;
    assert!(errors["error"]["page"].is_string());
    assert!(errors["error"]["sort"].is_string());
}

#[tokio::test]
async fn test_product_delete_then_show_is_404() {
    let app = TestApp::spawn().await;
    let mut client = writer(&app, "ned@example.com").await;

    let response = client
        .send(
            Method::POST,
            "/products",
            json!({ "title": "Ulysses", "description": "Dublin", "price": 1500 }),
        )
        .await;
    let id = body(response).await["product"]["id"].as_i64().unwrap();
    let path = format!("/products/{id}");

    let response = client.send_empty(Method::DELETE, &path).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.get(&path).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = client.send_empty(Method::DELETE, &path).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_positive_id_is_404() {
    let app = TestApp::spawn().await;
    let client = writer(&app, "oli@example.com").await;

    for path in ["/products/0", "/products/-3", "/products/abc"] {
        let response = client.get(path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn test_orders_are_scoped_to_their_owner() {
    let app = TestApp::spawn().await;
    let mut owner = writer(&app, "pam@example.com").await;
    let mut stranger = writer(&app, "quin@example.com").await;

    let response = owner
        .send(Method::POST, "/orders", json!({ "total_price": 2500 }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = body(response).await;
    assert_eq!(order["order"]["status"], "new");
    let id = order["order"]["id"].as_i64().unwrap();
    let path = format!("/orders/{id}");

    let response = stranger.get(&path).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = stranger
        .send(Method::PATCH, &path, json!({ "version": 1, "status": "cancelled" }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let listing = body(stranger.get("/orders").await).await;
    assert!(listing["orders"].as_array().unwrap().is_empty());

    let response = owner
        .send(Method::PATCH, &path, json!({ "version": 1, "status": "in-progress" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["order"]["status"], "in-progress");
}

#[tokio::test]
async fn test_order_status_must_be_known() {
    let app = TestApp::spawn().await;
    let mut client = writer(&app, "rae@example.com").await;

    let response = client
        .send(
            Method::POST,
            "/orders",
            json!({ "total_price": 100, "status": "shipped" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(response).await["error"]["status"],
        "must be one of: new, in-progress, delivered, cancelled"
    );
}

#[tokio::test]
async fn test_invoice_lifecycle() {
    let app = TestApp::spawn().await;
    let mut client = writer(&app, "sam@example.com").await;

    let response = client
        .send(Method::POST, "/invoices", json!({ "order_id": 999 }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["error"]["order_id"], "does not exist");

    let order = body(
        client
            .send(Method::POST, "/orders", json!({ "total_price": 4200 }))
            .await,
    )
    .await;
    let order_id = order["order"]["id"].as_i64().unwrap();

    let response = client
        .send(Method::POST, "/invoices", json!({ "order_id": order_id }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let invoice = body(response).await;
    assert_eq!(invoice["invoice"]["status"], "unpaid");
    let path = format!("/invoices/{}", invoice["invoice"]["id"]);

    let response = client
        .send(Method::PATCH, &path, json!({ "version": 1, "status": "paid" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let listing = body(
        client
            .get(&format!("/invoices?order_id={order_id}&status=paid"))
            .await,
    )
    .await;
    assert_eq!(listing["invoices"].as_array().unwrap().len(), 1);

    // Deleting the order takes its invoices with it
    let response = client
        .send_empty(Method::DELETE, &format!("/orders/{order_id}"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = client.get(&path).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = TestApp::spawn().await;
    let mut client = writer(&app, "tia@example.com").await;

    let response = client
        .send_raw(Method::POST, "/products", "{\"title\": ")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body(response).await["error"].is_string());
}
