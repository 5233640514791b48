//! Integration tests for Paperback.
//!
//! Each test spawns the full router on an ephemeral port, backed by the
//! in-memory store and an in-memory session store, and drives it over real
//! HTTP with a cookie-keeping client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p paperback-integration-tests
//! ```

#![allow(clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode, redirect::Policy};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_sessions::MemoryStore;

use paperback_core::{PermissionCode, TokenPlaintext, User, UserId};
use paperback_server::config::{PasswordConfig, ServerConfig};
use paperback_server::db::{InMemoryStore, PermissionRepository, Repositories};
use paperback_server::server::{self, ServeError};
use paperback_server::services::{ActivationNotifier, NotifyError};
use paperback_server::tasks::BackgroundTasks;
use paperback_server::{AppState, build_app};

/// Password every helper-created account uses.
pub const PASSWORD: &str = "pa55word-long";

/// Activation tokens captured instead of being delivered.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    /// The most recent token sent to `email`, waiting briefly for the
    /// background delivery task to run.
    pub async fn token_for(&self, email: &str) -> String {
        for _ in 0..100 {
            if let Some(token) = self.latest(email) {
                return token;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no activation token sent to {email}");
    }

    /// Wait until `count` tokens have gone to `email`, then return the last.
    pub async fn nth_token_for(&self, email: &str, count: usize) -> String {
        for _ in 0..100 {
            if self.count_for(email) >= count {
                if let Some(token) = self.latest(email) {
                    return token;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("fewer than {count} activation tokens sent to {email}");
    }

    /// How many tokens have been sent to `email` so far.
    pub fn count_for(&self, email: &str) -> usize {
        self.sent
            .lock()
            .expect("outbox lock")
            .iter()
            .filter(|(to, _)| to == email)
            .count()
    }

    fn latest(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .expect("outbox lock")
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl ActivationNotifier for RecordingNotifier {
    async fn send_activation(
        &self,
        user: &User,
        token: &TokenPlaintext,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|_| NotifyError("outbox lock poisoned".to_string()))?
            .push((user.email.as_str().to_owned(), token.as_str().to_owned()));
        Ok(())
    }
}

/// A running server plus handles on its store and outbox.
pub struct TestApp {
    pub addr: SocketAddr,
    pub store: Arc<InMemoryStore>,
    pub outbox: Arc<RecordingNotifier>,
    pub tasks: BackgroundTasks,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<Result<(), ServeError>>>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let mut config = ServerConfig::local("postgres://unused");
        config.password = PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };

        let store = Arc::new(InMemoryStore::new());
        let outbox = Arc::new(RecordingNotifier::default());
        let tasks = BackgroundTasks::new();
        let state = AppState::new(
            config,
            Repositories::in_memory(store.clone()),
            outbox.clone(),
            tasks.clone(),
        )
        .expect("valid password parameters");
        let app = build_app(state, MemoryStore::default());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("listener address");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(server::serve(
            listener,
            app,
            tasks.clone(),
            Duration::from_secs(5),
            async move {
                let _ = shutdown_rx.await;
            },
        ));

        Self {
            addr,
            store,
            outbox,
            tasks,
            shutdown: Some(shutdown_tx),
            server: Some(server),
        }
    }

    /// A fresh client with its own cookie jar.
    pub fn client(&self) -> TestClient {
        TestClient::new(self.addr)
    }

    /// Grant permission codes directly in the store.
    pub async fn grant(&self, user_id: i64, codes: &[PermissionCode]) {
        PermissionRepository::add_for_user(self.store.as_ref(), UserId::new(user_id), codes)
            .await
            .expect("grant permissions");
    }

    /// Sign up, activate and log in a new account on `client`.
    ///
    /// Returns the user id.
    pub async fn activated_user(&self, client: &mut TestClient, email: &str) -> i64 {
        let user_id = self.signed_in_user(client, email).await;
        let token = self.outbox.token_for(email).await;
        let response = client
            .send(Method::PUT, "/user/activated", json!({ "token": token }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        user_id
    }

    /// Sign up and log in a new, unactivated account on `client`.
    ///
    /// Returns the user id.
    pub async fn signed_in_user(&self, client: &mut TestClient, email: &str) -> i64 {
        let response = client
            .send(
                Method::POST,
                "/user/signup",
                json!({ "name": "Test User", "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("signup body");
        let user_id = body["user"]["id"].as_i64().expect("user id");

        let response = client.login(email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);
        user_id
    }

    /// Signal shutdown and wait for the drain to finish.
    pub async fn shutdown(mut self) -> Result<(), ServeError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.server.take() {
            Some(handle) => handle.await.expect("server task"),
            None => Ok(()),
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(handle) = self.server.take() {
            handle.abort();
        }
    }
}

/// HTTP client holding a session cookie and the matching CSRF token.
pub struct TestClient {
    http: reqwest::Client,
    base_url: String,
    csrf: Option<String>,
}

impl TestClient {
    fn new(addr: SocketAddr) -> Self {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            base_url: format!("http://{addr}"),
            csrf: None,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.http
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET")
    }

    /// The session's CSRF token, fetched once.
    pub async fn csrf_token(&mut self) -> String {
        if let Some(token) = &self.csrf {
            return token.clone();
        }
        let body: Value = self
            .get("/user/csrf")
            .await
            .json()
            .await
            .expect("csrf body");
        let token = body["csrf_token"]
            .as_str()
            .expect("csrf token")
            .to_owned();
        self.csrf = Some(token.clone());
        token
    }

    /// A state-changing request with a JSON body and the CSRF header.
    pub async fn send(&mut self, method: Method, path: &str, body: Value) -> Response {
        let token = self.csrf_token().await;
        self.http
            .request(method, self.url(path))
            .header("x-csrf-token", token)
            .json(&body)
            .send()
            .await
            .expect("Failed to send request")
    }

    /// A state-changing request without a body.
    pub async fn send_empty(&mut self, method: Method, path: &str) -> Response {
        let token = self.csrf_token().await;
        self.http
            .request(method, self.url(path))
            .header("x-csrf-token", token)
            .send()
            .await
            .expect("Failed to send request")
    }

    /// A state-changing request with a raw JSON body, valid or not.
    pub async fn send_raw(&mut self, method: Method, path: &str, raw: &'static str) -> Response {
        let token = self.csrf_token().await;
        self.http
            .request(method, self.url(path))
            .header("x-csrf-token", token)
            .header("content-type", "application/json")
            .body(raw)
            .send()
            .await
            .expect("Failed to send request")
    }

    /// A state-changing request that omits the CSRF header.
    pub async fn send_without_csrf(&self, method: Method, path: &str, body: Value) -> Response {
        self.http
            .request(method, self.url(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Response {
        self.send(
            Method::POST,
            "/user/login",
            json!({ "email": email, "password": password }),
        )
        .await
    }

    pub async fn logout(&mut self) -> Response {
        self.send_empty(Method::POST, "/user/logout").await
    }
}

/// Parse a response body as JSON.
pub async fn body(response: Response) -> Value {
    response.json().await.expect("JSON body")
}
