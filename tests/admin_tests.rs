use axum::http::{Method, StatusCode};
use inventory_backend::auth::Role;
use serde_json::json;

mod common;
use common::{body_json, create_test_app, PASSWORD};

fn new_user_body(email: &str, role: &str) -> serde_json::Value {
    json!({
        "email": email,
        "firstName": "New",
        "lastName": "Person",
        "password": "s3cret-pass",
        "role": role,
    })
}

#[tokio::test]
async fn test_associate_cannot_view_users() {
    let app = create_test_app();
    app.seed_user("ana@example.com", Role::Associate).await;
    let cookie = app.login_cookie("ana@example.com").await;

    let response = app.request(Method::GET, "/api/users", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "AUTHORIZATION_ERROR");
}

#[tokio::test]
async fn test_manager_lists_users_by_email() {
    let app = create_test_app();
    app.seed_user("zed@example.com", Role::Associate).await;
    app.seed_user("mia@example.com", Role::Manager).await;
    app.seed_user("abe@example.com", Role::Associate).await;
    let cookie = app.login_cookie("mia@example.com").await;

    let response = app.request(Method::GET, "/api/users", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let emails: Vec<&str> = json["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    assert_eq!(emails, vec!["abe@example.com", "mia@example.com", "zed@example.com"]);
    assert!(json["users"][0].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_manager_creates_user_who_can_log_in() {
    let app = create_test_app();
    app.seed_user("mia@example.com", Role::Manager).await;
    let cookie = app.login_cookie("mia@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/users",
            Some(&cookie),
            Some(new_user_body("new@example.com", "associate")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["user"]["role"], "Associate");

    let response = app.login("new@example.com", "s3cret-pass").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_user_validation() {
    let app = create_test_app();
    app.seed_user("mia@example.com", Role::Manager).await;
    let cookie = app.login_cookie("mia@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/users",
            Some(&cookie),
            Some(json!({ "email": "half@example.com", "firstName": "Half" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing required fields");

    let response = app
        .request(
            Method::POST,
            "/api/users",
            Some(&cookie),
            Some(new_user_body("mia@example.com", "Associate")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_only_administrators_grant_administrator() {
    let app = create_test_app();
    app.seed_user("mia@example.com", Role::Manager).await;
    app.seed_user("root@example.com", Role::Administrator).await;
    let manager_cookie = app.login_cookie("mia@example.com").await;
    let admin_cookie = app.login_cookie("root@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/users",
            Some(&manager_cookie),
            Some(new_user_body("boss@example.com", "Administrator")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::POST,
            "/api/users",
            Some(&admin_cookie),
            Some(new_user_body("boss@example.com", "Administrator")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let boss_id = body_json(response).await["user"]["id"].as_str().unwrap().to_string();

    // Managers cannot touch administrator accounts either
    let response = app
        .request(
            Method::PUT,
            &format!("/api/users/{boss_id}"),
            Some(&manager_cookie),
            Some(json!({ "firstName": "Demoted" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(Method::DELETE, &format!("/api/users/{boss_id}"), Some(&manager_cookie), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_password_change_revokes_sessions() {
    let app = create_test_app();
    app.seed_user("mia@example.com", Role::Manager).await;
    let ana = app.seed_user("ana@example.com", Role::Associate).await;
    let manager_cookie = app.login_cookie("mia@example.com").await;
    let ana_cookie = app.login_cookie("ana@example.com").await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/users/{}", ana.id),
            Some(&manager_cookie),
            Some(json!({ "password": "brand-new-pass", "lastName": "", "firstName": "Ana" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user"]["firstName"], "Ana");
    assert_eq!(json["user"]["lastName"], "Associate");

    let response = app.request(Method::GET, "/api/auth/me", Some(&ana_cookie), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(app.login("ana@example.com", PASSWORD).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.login("ana@example.com", "brand-new-pass").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_missing_user() {
    let app = create_test_app();
    app.seed_user("mia@example.com", Role::Manager).await;
    let cookie = app.login_cookie("mia@example.com").await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/users/{}", uuid::Uuid::new_v4()),
            Some(&cookie),
            Some(json!({ "firstName": "Ghost" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_user_rules() {
    let app = create_test_app();
    let manager = app.seed_user("mia@example.com", Role::Manager).await;
    let ana = app.seed_user("ana@example.com", Role::Associate).await;
    let cookie = app.login_cookie("mia@example.com").await;
    let ana_cookie = app.login_cookie("ana@example.com").await;

    let response = app
        .request(Method::DELETE, &format!("/api/users/{}", manager.id), Some(&cookie), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "You cannot delete your own account");

    // The manager created a task, so another manager cannot remove them
    let response = app
        .request(Method::POST, "/api/tasks", Some(&cookie), Some(json!({ "title": "Keep me" })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    app.seed_user("max@example.com", Role::Manager).await;
    let other_cookie = app.login_cookie("max@example.com").await;
    let response = app
        .request(Method::DELETE, &format!("/api/users/{}", manager.id), Some(&other_cookie), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Deleting ana also ends her session
    let response = app
        .request(Method::DELETE, &format!("/api/users/{}", ana.id), Some(&cookie), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.request(Method::GET, "/api/auth/me", Some(&ana_cookie), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::DELETE, &format!("/api/users/{}", ana.id), Some(&cookie), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
