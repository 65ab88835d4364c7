//! API integration tests
//!
//! Each test serves the full router on an ephemeral port, backed by a fresh
//! SQLite database, and talks to it over HTTP.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use arquix_server::{
    api,
    config::AppConfig,
    repository::{self, Repository},
    services::Services,
    AppState,
};

struct TestServer {
    base_url: String,
    client: Client,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", dir.path().join("api.db").display());
        config.database.busy_timeout_secs = 10;
        config.catalog.seed_on_empty = true;

        let pool = repository::connect(&config.database)
            .await
            .expect("Failed to connect to database");
        repository::migrate(&pool)
            .await
            .expect("Failed to run migrations");

        let services = Services::new(Repository::new(pool), &config);
        services
            .catalog
            .seed_if_empty()
            .await
            .expect("Failed to seed catalog");

        let state = AppState {
            config: Arc::new(config),
            services: Arc::new(services),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("No local address");
        tokio::spawn(async move {
            axum::serve(listener, api::router(state))
                .await
                .expect("Server failed");
        });

        Self {
            base_url: format!("http://{}", addr),
            client: Client::new(),
            _dir: dir,
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to send request");
        let status = response.status();
        let body = response.json().await.expect("Failed to parse response");
        (status, body)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Failed to send request");
        let status = response.status();
        let body = response.json().await.expect("Failed to parse response");
        (status, body)
    }

    /// Register an account and return its id
    async fn register(&self, name: &str, email: &str) -> i64 {
        let (status, body) = self
            .post(
                "/register",
                json!({"name": name, "email": email, "password": "secret1"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().expect("No user ID")
    }

    /// Id of the first seeded book
    async fn first_book(&self) -> i64 {
        let (_, body) = self.get("/books").await;
        body["items"][0]["id"].as_i64().expect("No book ID")
    }
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await;

    let (status, body) = server.get("/health").await;
    assert!(status.is_success());
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_seeded_catalog() {
    let server = TestServer::start().await;

    let (status, body) = server.get("/books").await;
    assert!(status.is_success());
    let items = body["items"].as_array().expect("items is not an array");
    assert_eq!(items.len(), 6);
    assert!(items.iter().all(|b| b["isAvailable"] == true));

    let (_, body) = server.get("/books?category=adventure").await;
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_register_and_login() {
    let server = TestServer::start().await;
    server.register("Ada", "ada@example.com").await;

    let (status, body) = server
        .post(
            "/login",
            json!({"email": "ADA@example.com", "password": "secret1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ada@example.com");

    let (status, _) = server
        .post(
            "/login",
            json!({"email": "ada@example.com", "password": "wrong-password"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_registration() {
    let server = TestServer::start().await;
    server.register("Ada", "ada@example.com").await;

    let (status, _) = server
        .post(
            "/register",
            json!({"name": "Eve", "email": "ada@example.com", "password": "another1"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // First account still logs in with its own password
    let (status, body) = server
        .post(
            "/login",
            json!({"email": "ada@example.com", "password": "secret1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada");
}

#[tokio::test]
async fn test_loan_lifecycle() {
    let server = TestServer::start().await;
    let ada = server.register("Ada", "ada@example.com").await;
    let bob = server.register("Bob", "bob@example.com").await;
    let book = server.first_book().await;

    let (status, body) = server
        .post("/loans", json!({"userId": ada, "bookId": book}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["loanDate"].is_string());

    let (status, _) = server
        .post("/loans", json!({"userId": bob, "bookId": book}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = server
        .post("/returns", json!({"userId": bob, "bookId": book}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = server.get(&format!("/loans?userId={}", ada)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = server
        .post("/returns", json!({"userId": ada, "bookId": book}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server.get(&format!("/loans?userId={}", ada)).await;
    assert!(body.as_array().unwrap().is_empty());

    let (_, body) = server.get("/books").await;
    assert_eq!(body["items"][0]["isAvailable"], true);
    assert!(body["items"][0]["borrowerName"].is_null());
}

#[tokio::test]
async fn test_concurrent_borrows() {
    let server = Arc::new(TestServer::start().await);
    let book = server.first_book().await;

    let mut users = Vec::new();
    for i in 0..6 {
        users.push(server.register("Reader", &format!("reader{}@example.com", i)).await);
    }

    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let server = server.clone();
            tokio::spawn(async move {
                server
                    .post("/loans", json!({"userId": user, "bookId": book}))
                    .await
                    .0
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.expect("Task panicked"));
    }

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(),
        statuses.len() - 1
    );
}

#[tokio::test]
async fn test_admin_add_book_and_history() {
    let server = TestServer::start().await;
    let ada = server.register("Ada", "ada@example.com").await;

    let (status, book) = server
        .post(
            "/admin/books",
            json!({"title": "Dune", "author": "Frank Herbert", "category": "Science Fiction", "coverUrl": ""}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let book_id = book["id"].as_i64().expect("No book ID");

    server
        .post("/loans", json!({"userId": ada, "bookId": book_id}))
        .await;

    let (status, body) = server.get("/admin/loans").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["title"], "Dune");
    assert_eq!(body[0]["userName"], "Ada");
}
