use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use inkpress::config::Config;
use inkpress::services::ResetTokens;
use serde_json::json;
use tower::ServiceExt;

/// Must match the secret `spawn_app` configures so tests can mint their own
/// reset tokens.
const TEST_SECRET: &str = "integration-test-secret";

async fn spawn_app() -> Router {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // In-memory SQLite is per-connection; keep the pool at one
    config.general.max_db_connections = 1;
    config.general.uploads_path = std::env::temp_dir()
        .join(format!("inkpress-test-uploads-{}", uuid::Uuid::new_v4()))
        .display()
        .to_string();
    config.security.secret_key = TEST_SECRET.to_string();
    config.mail.enabled = false;

    let state = inkpress::api::create_app_state(config, None)
        .await
        .expect("Failed to create app state");
    inkpress::api::router(state)
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    let request = if let Some(body) = body {
        builder
            .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
            .body(Body::from(body.to_string()))
            .unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    };

    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn session_cookie(response: &Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn register_user(app: &Router, username: &str, email: &str, password: &str) {
    let response = request(
        app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": username,
            "email": email,
            "password": password,
            "confirm_password": password,
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

async fn login_user(app: &Router, email: &str, password: &str) -> String {
    let response = request(
        app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response)
}

async fn create_post(app: &Router, cookie: &str, title: &str, content: &str) -> i64 {
    let response = request(
        app,
        "POST",
        "/post/new",
        Some(cookie),
        Some(json!({ "title": title, "content": content })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["data"]["id"].as_i64().expect("post id")
}

#[tokio::test]
async fn test_registration_and_login_flow() {
    let app = spawn_app().await;

    register_user(&app, "corey_schafer", "corey@example.com", "hunter2hunter2").await;
    let cookie = login_user(&app, "corey@example.com", "hunter2hunter2").await;

    let response = request(&app, "GET", "/account", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["username"], "corey_schafer");
    assert_eq!(body["data"]["email"], "corey@example.com");
    assert_eq!(body["data"]["image_url"], "/uploads/default.jpg");

    // Anonymous requests to guarded routes are rejected
    let response = request(&app, "GET", "/account", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation() {
    let app = spawn_app().await;

    // Username too short
    let response = request(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "ab",
            "email": "ab@example.com",
            "password": "longenough",
            "confirm_password": "longenough",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Confirmation mismatch
    let response = request(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "valid_name",
            "email": "valid@example.com",
            "password": "longenough",
            "confirm_password": "different",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Bad email shape
    let response = request(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "valid_name",
            "email": "not-an-email",
            "password": "longenough",
            "confirm_password": "longenough",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_username_and_email_rejected() {
    let app = spawn_app().await;

    register_user(&app, "first_user", "first@example.com", "password-one").await;

    // Same email, different username
    let response = request(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "other_user",
            "email": "first@example.com",
            "password": "password-two",
            "confirm_password": "password-two",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Same username, different email
    let response = request(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({
            "username": "first_user",
            "email": "second@example.com",
            "password": "password-two",
            "confirm_password": "password-two",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = spawn_app().await;

    register_user(&app, "login_user", "login@example.com", "correct-horse").await;

    let response = request(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": "login@example.com", "password": "wrong-horse" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = request(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_post_crud_and_ownership() {
    let app = spawn_app().await;

    register_user(&app, "alice_writes", "alice@example.com", "alice-password").await;
    register_user(&app, "bob_reads", "bob@example.com", "bob-password1").await;

    let alice = login_user(&app, "alice@example.com", "alice-password").await;
    let bob = login_user(&app, "bob@example.com", "bob-password1").await;

    // Creating a post requires a session
    let response = request(
        &app,
        "POST",
        "/post/new",
        None,
        Some(json!({ "title": "t", "content": "c" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let post_id = create_post(&app, &alice, "First post", "Hello from Alice").await;

    // Anyone can read it
    let response = request(&app, "GET", &format!("/post/{post_id}"), None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["title"], "First post");
    assert_eq!(body["data"]["author"]["username"], "alice_writes");

    // Only the author can mutate it
    let response = request(
        &app,
        "POST",
        &format!("/post/{post_id}/update"),
        Some(&bob),
        Some(json!({ "title": "Hijacked", "content": "by bob" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = request(
        &app,
        "POST",
        &format!("/post/{post_id}/delete"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The author can
    let response = request(
        &app,
        "POST",
        &format!("/post/{post_id}/update"),
        Some(&alice),
        Some(json!({ "title": "First post (edited)", "content": "Hello again" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = request(&app, "GET", &format!("/post/{post_id}"), None, None).await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["title"], "First post (edited)");

    let response = request(
        &app,
        "POST",
        &format!("/post/{post_id}/delete"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = request(&app, "GET", &format!("/post/{post_id}"), None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_home_pagination_newest_first() {
    let app = spawn_app().await;

    register_user(&app, "prolific_poster", "posts@example.com", "some-password").await;
    let cookie = login_user(&app, "posts@example.com", "some-password").await;

    for i in 1..=5 {
        create_post(&app, &cookie, &format!("Post {i}"), "body").await;
    }

    // Default page size is 4
    let response = request(&app, "GET", "/?page=1", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let posts = body["data"]["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 4);
    assert_eq!(posts[0]["title"], "Post 5");
    assert_eq!(posts[3]["title"], "Post 2");
    assert_eq!(body["data"]["total_pages"], 2);

    let response = request(&app, "GET", "/home?page=2", None, None).await;
    let body = body_json(response).await;
    let posts = body["data"]["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "Post 1");

    // Pages start at 1
    let response = request(&app, "GET", "/?page=0", None, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_posts_listing() {
    let app = spawn_app().await;

    register_user(&app, "page_owner", "owner@example.com", "some-password").await;
    register_user(&app, "other_guy", "other@example.com", "some-password").await;

    let owner = login_user(&app, "owner@example.com", "some-password").await;
    let other = login_user(&app, "other@example.com", "some-password").await;

    create_post(&app, &owner, "Mine", "content").await;
    create_post(&app, &other, "Not mine", "content").await;

    let response = request(&app, "GET", "/user/page_owner", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["data"]["user"]["username"], "page_owner");
    let posts = body["data"]["posts"]["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], "Mine");

    let response = request(&app, "GET", "/user/nobody_here", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_forget_password() {
    let app = spawn_app().await;

    register_user(&app, "forgetful", "forget@example.com", "old-password1").await;

    // Unknown address is surfaced as a validation failure
    let response = request(
        &app,
        "POST",
        "/forget_password",
        None,
        Some(json!({ "email": "stranger@example.com" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Known address succeeds (mail is disabled, the link is logged)
    let response = request(
        &app,
        "POST",
        "/forget_password",
        None,
        Some(json!({ "email": "forget@example.com" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_reset_password_flow() {
    let app = spawn_app().await;

    register_user(&app, "resetting", "reset@example.com", "old-password1").await;

    // First account in a fresh database gets id 1; mint the token the email
    // would have carried.
    let tokens = ResetTokens::new(TEST_SECRET, std::time::Duration::from_secs(600));
    let token = tokens.issue(1).expect("issue token");

    let response = request(&app, "GET", &format!("/reset_password/{token}"), None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = request(
        &app,
        "POST",
        &format!("/reset_password/{token}"),
        None,
        Some(json!({ "password": "new-password1", "confirm_password": "new-password1" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Old password no longer works, the new one does
    let response = request(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": "reset@example.com", "password": "old-password1" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    login_user(&app, "reset@example.com", "new-password1").await;
}

#[tokio::test]
async fn test_reset_password_rejects_bad_tokens() {
    let app = spawn_app().await;

    register_user(&app, "resetting", "reset@example.com", "old-password1").await;

    let response = request(&app, "GET", "/reset_password/garbage-token", None, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A token signed with a different secret is just as invalid
    let tokens = ResetTokens::new("some-other-secret", std::time::Duration::from_secs(600));
    let forged = tokens.issue(1).expect("issue token");

    let response = request(
        &app,
        "POST",
        &format!("/reset_password/{forged}"),
        None,
        Some(json!({ "password": "new-password1", "confirm_password": "new-password1" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_flushes_session() {
    let app = spawn_app().await;

    register_user(&app, "leaving_now", "leave@example.com", "some-password").await;
    let cookie = login_user(&app, "leave@example.com", "some-password").await;

    let response = request(&app, "GET", "/logout", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = request(&app, "GET", "/account", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_info_without_picture() {
    let app = spawn_app().await;

    register_user(&app, "old_handle", "old@example.com", "some-password").await;
    let cookie = login_user(&app, "old@example.com", "some-password").await;

    let boundary = "X-INKPRESS-TEST-BOUNDARY";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"username\"\r\n\r\n\
         new_handle\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"email\"\r\n\r\n\
         new@example.com\r\n\
         --{boundary}--\r\n"
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/update_info")
                .header(header::COOKIE, &cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let response = request(&app, "GET", "/account", Some(&cookie), None).await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["username"], "new_handle");
    assert_eq!(body["data"]["email"], "new@example.com");
}

#[tokio::test]
async fn test_session_status_routes() {
    let app = spawn_app().await;

    let response = request(&app, "GET", "/about", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "inkpress");

    let response = request(&app, "GET", "/login", None, None).await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["authenticated"], false);

    register_user(&app, "status_user", "status@example.com", "some-password").await;
    let cookie = login_user(&app, "status@example.com", "some-password").await;

    let response = request(&app, "GET", "/register", Some(&cookie), None).await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["authenticated"], true);
    assert_eq!(body["data"]["username"], "status_user");
}

#[tokio::test]
async fn test_metrics_requires_auth() {
    let app = spawn_app().await;

    let response = request(&app, "GET", "/metrics", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    register_user(&app, "ops_person", "ops@example.com", "some-password").await;
    let cookie = login_user(&app, "ops@example.com", "some-password").await;

    let response = request(&app, "GET", "/metrics", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
