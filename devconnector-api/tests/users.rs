mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::{Value, json};

fn registration(email: &str) -> Value {
    json!({
        "name": "Ada",
        "email": email,
        "password": "secret123",
        "password2": "secret123",
        "avatar": "ada.png",
    })
}

#[tokio::test]
async fn register_login_and_act() {
    let app = TestApp::new();

    let (status, user) = app
        .json(
            Method::POST,
            "/api/users/register",
            None,
            Some(registration(" Ada@Example.com ")),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{user}");
    assert_eq!(user["name"], "Ada");
    assert_eq!(user["email"], "ada@example.com");
    assert!(user.get("password").is_none());
    assert!(user.get("password_hash").is_none());

    let (status, login) = app
        .json(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "ADA@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{login}");
    assert_eq!(login["success"], true);
    let token = login["token"].as_str().unwrap();
    assert!(token.starts_with("Bearer "));

    let (status, current) = app
        .json(Method::GET, "/api/users/current", Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current, user);

    let (status, post) = app
        .json(
            Method::POST,
            "/api/posts",
            Some(token),
            Some(json!({ "text": "first", "name": "Ada", "avatar": "ada.png" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["user"], user["id"]);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new();

    let (status, _) = app
        .json(
            Method::POST,
            "/api/users/register",
            None,
            Some(registration("ada@example.com")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/users/register",
            None,
            Some(registration("ADA@example.com")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "email": "Email already exists" }));
}

#[tokio::test]
async fn invalid_registration_lists_fields() {
    let app = TestApp::new();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/users/register",
            None,
            Some(json!({
                "name": "A",
                "email": "not-an-email",
                "password": "short",
                "password2": "other",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    for field in ["name", "email", "password", "password2"] {
        assert!(body[field].is_string(), "{field}: {body}");
    }
}

#[tokio::test]
async fn login_failures() {
    let app = TestApp::new();
    app.json(
        Method::POST,
        "/api/users/register",
        None,
        Some(registration("ada@example.com")),
    )
    .await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "bob@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "email": "User not found" }));

    let (status, body) = app
        .json(
            Method::POST,
            "/api/users/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "password": "Password incorrect" }));
}

#[tokio::test]
async fn current_requires_auth() {
    let app = TestApp::new();

    let (status, _) = app
        .json(Method::GET, "/api/users/current", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.json(Method::GET, "/api/users/test", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "msg": "Users Works" }));
}
