//! End-to-end API tests against a running server.
//!
//! The server must have been started with a bootstrap administrator
//! (`LIBRIS__ADMIN__EMAIL` / `LIBRIS__ADMIN__PASSWORD`).

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:3000/api/v1";

fn admin_credentials() -> (String, String) {
    (
        std::env::var("LIBRIS__ADMIN__EMAIL").unwrap_or_else(|_| "admin@example.org".to_string()),
        std::env::var("LIBRIS__ADMIN__PASSWORD").unwrap_or_else(|_| "change-me".to_string()),
    )
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.org", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn login(client: &Client, email: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn admin_token(client: &Client) -> String {
    let (email, password) = admin_credentials();
    login(client, &email, &password).await
}

/// Sign up, approve and log in a fresh member
async fn approved_member(client: &Client, admin: &str) -> (i64, String) {
    let email = unique_email("reader");

    let response = client
        .post(format!("{}/auth/signup", BASE_URL))
        .json(&json!({ "name": "Test Reader", "email": email, "password": "secret" }))
        .send()
        .await
        .expect("Failed to send signup request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse signup response");
    assert_eq!(body["role"], "pending");
    let id = body["id"].as_i64().expect("No user ID");

    let response = client
        .put(format!("{}/users/{}/approve", BASE_URL, id))
        .bearer_auth(admin)
        .send()
        .await
        .expect("Failed to send approve request");
    assert_eq!(response.status(), StatusCode::OK);

    (id, login(client, &email, "secret").await)
}

async fn create_book(client: &Client, admin: &str, title: &str, copies: i32) -> i64 {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(admin)
        .json(&json!({
            "title": title,
            "author": "Test Author",
            "publication_year": 2001,
            "total_copies": copies
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available_copies"], copies);
    body["id"].as_i64().expect("No book ID")
}

async fn borrow(client: &Client, token: &str, book_id: i64) -> reqwest::Response {
    client
        .post(format!("{}/borrows", BASE_URL))
        .bearer_auth(token)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send borrow request")
}

async fn return_borrow(client: &Client, admin: &str, borrow_id: i64) -> reqwest::Response {
    client
        .post(format!("{}/borrows/{}/return", BASE_URL, borrow_id))
        .bearer_auth(admin)
        .send()
        .await
        .expect("Failed to send return request")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();
    let (email, _) = admin_credentials();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_signup_conflicts() {
    let client = Client::new();
    let email = unique_email("dup");
    let payload = json!({ "name": "Dup", "email": email, "password": "secret" });

    let first = client
        .post(format!("{}/auth/signup", BASE_URL))
        .json(&payload)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client
        .post(format!("{}/auth/signup", BASE_URL))
        .json(&json!({ "name": "Dup", "email": email.to_uppercase(), "password": "secret" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_borrow_cap_and_return() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, member) = approved_member(&client, &admin).await;

    let mut borrow_ids = Vec::new();
    for n in 0..3 {
        let book_id = create_book(&client, &admin, &format!("Cap Book {}", n), 1).await;
        let response = borrow(&client, &member, book_id).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("Failed to parse response");
        borrow_ids.push(body["id"].as_i64().expect("No borrow ID"));
    }

    let fourth = create_book(&client, &admin, "Cap Book 4", 1).await;
    let response = borrow(&client, &member, fourth).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "MaxBorrowsReached");

    let response = return_borrow(&client, &admin, borrow_ids[0]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["borrow_id"], borrow_ids[0]);
    assert_eq!(body["late_days"], 0);
    assert_eq!(body["fine"], 0);

    let response = borrow(&client, &member, fourth).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
#[ignore]
async fn test_double_return_conflicts() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, member) = approved_member(&client, &admin).await;
    let book_id = create_book(&client, &admin, "Double Return", 2).await;

    let response = borrow(&client, &member, book_id).await;
    let body: Value = response.json().await.expect("Failed to parse response");
    let borrow_id = body["id"].as_i64().expect("No borrow ID");

    assert_eq!(return_borrow(&client, &admin, borrow_id).await.status(), StatusCode::OK);
    assert_eq!(
        return_borrow(&client, &admin, borrow_id).await.status(),
        StatusCode::CONFLICT
    );

    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available_copies"], 2);
}

#[tokio::test]
#[ignore]
async fn test_last_copy_goes_to_one_member() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let (_, first) = approved_member(&client, &admin).await;
    let (_, second) = approved_member(&client, &admin).await;
    let book_id = create_book(&client, &admin, "Last Copy", 1).await;

    let (a, b) = tokio::join!(
        borrow(&client, &first, book_id),
        borrow(&client, &second, book_id)
    );

    let statuses = [a.status(), b.status()];
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), 1);
}

#[tokio::test]
#[ignore]
async fn test_short_search_returns_nothing() {
    let client = Client::new();
    let admin = admin_token(&client).await;

    let response = client
        .get(format!("{}/books/search?q=a", BASE_URL))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
#[ignore]
async fn test_shrinking_below_lent_copies_conflicts() {
    let client = Client::new();
    let admin = admin_token(&client).await;
    let book_id = create_book(&client, &admin, "Shrinking Shelf", 3).await;

    for _ in 0..2 {
        let (_, member) = approved_member(&client, &admin).await;
        assert_eq!(borrow(&client, &member, book_id).await.status(), StatusCode::CREATED);
    }

    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&admin)
        .json(&json!({ "total_copies": 1 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&admin)
        .json(&json!({ "total_copies": 2 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available_copies"], 0);
}

#[tokio::test]
#[ignore]
async fn test_get_stats() {
    let client = Client::new();
    let admin = admin_token(&client).await;

    let response = client
        .get(format!("{}/stats", BASE_URL))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["books"].is_number());
    assert!(body["members"].is_number());
    assert!(body["active_borrows"].is_number());
    assert!(body["overdue_borrows"].is_number());
}
