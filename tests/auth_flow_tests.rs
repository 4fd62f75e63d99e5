use axum::{
    http::{Method, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use chrono::{Duration, Utc};
use inventory_backend::auth::cookie::session_cookie;
use inventory_backend::auth::{Role, SessionValidation};

mod common;
use common::{body_json, create_test_app, max_age, session_cookie_pair, session_set_cookies, PASSWORD};

const THIRTY_DAYS: i64 = 30 * 24 * 60 * 60;

fn assert_close(actual: i64, expected: i64) {
    assert!(
        (actual - expected).abs() <= 5,
        "expected about {expected}, got {actual}"
    );
}

#[tokio::test]
async fn test_login_issues_session_cookie() {
    let app = create_test_app();
    app.seed_user("ana@example.com", Role::Associate).await;

    let response = app.login("ana@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookies = session_set_cookies(&response);
    assert_eq!(set_cookies.len(), 1);
    let cookie = &set_cookies[0];
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Expires="));
    assert!(!cookie.contains("Secure"));
    assert_close(max_age(cookie).unwrap(), THIRTY_DAYS);

    let json = body_json(response).await;
    assert_eq!(json["type"], "success");
}

#[tokio::test]
async fn test_login_email_is_case_insensitive() {
    let app = create_test_app();
    app.seed_user("mixed@example.com", Role::Manager).await;

    let response = app.login("MIXED@Example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie_pair(&response).is_some());
}

#[tokio::test]
async fn test_wrong_password_sets_no_cookie() {
    let app = create_test_app();
    app.seed_user("ana@example.com", Role::Associate).await;

    let response = app.login("ana@example.com", "not the password").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(session_set_cookies(&response).is_empty());
    assert_eq!(app.store.session_count(), 0);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Invalid email or password");
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(json["error_id"].is_string());
}

#[tokio::test]
async fn test_unknown_email_matches_wrong_password() {
    let app = create_test_app();

    let response = app.login("nobody@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(session_set_cookies(&response).is_empty());
    assert_eq!(app.store.session_count(), 0);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_login_requires_both_fields() {
    let app = create_test_app();

    let response = app.login("   ", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Email and password are required");
}

#[tokio::test]
async fn test_me_requires_session() {
    let app = create_test_app();

    let response = app.request(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_me_returns_public_user() {
    let app = create_test_app();
    app.seed_user("mia@example.com", Role::Manager).await;
    let cookie = app.login_cookie("mia@example.com").await;

    let response = app.request(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["user"]["email"], "mia@example.com");
    assert_eq!(json["user"]["role"], "Manager");
    assert!(json["user"].get("passwordHash").is_none());
    assert!(json["session"]["expiresAt"].is_string());
}

#[tokio::test]
async fn test_logout_invalidates_token() {
    let app = create_test_app();
    app.seed_user("ana@example.com", Role::Associate).await;
    let cookie = app.login_cookie("ana@example.com").await;

    let response = app.request(Method::POST, "/api/auth/logout", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = session_set_cookies(&response);
    assert_eq!(cleared.len(), 1);
    assert!(cleared[0].starts_with("auth-session=;"));
    assert_eq!(max_age(&cleared[0]), Some(0));

    // The old cookie no longer authenticates and gets cleared again
    let response = app.request(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie_pair(&response).is_none());
    assert_eq!(session_set_cookies(&response).len(), 1);
}

#[tokio::test]
async fn test_logout_without_session() {
    let app = create_test_app();

    let response = app.request(Method::POST, "/api/auth/logout", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Not logged in");
}

#[tokio::test]
async fn test_tampered_cookie_is_cleared() {
    let app = create_test_app();
    app.seed_user("ana@example.com", Role::Associate).await;
    let cookie = app.login_cookie("ana@example.com").await;

    let mut tampered = cookie.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    let response = app.request(Method::GET, "/api/auth/me", Some(&tampered), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cleared = session_set_cookies(&response);
    assert_eq!(cleared.len(), 1);
    assert_eq!(max_age(&cleared[0]), Some(0));
}

#[tokio::test]
async fn test_cookie_signed_with_old_secret_is_cleared() {
    let app = create_test_app();
    let user = app.seed_user("ana@example.com", Role::Associate).await;
    let (token, _) = app.session_cookie_at(&user, Utc::now()).await;

    // Same token, signed before the secret was rotated
    let old_key = Key::from(&[7u8; 64]);
    let jar = SignedCookieJar::new(old_key).add(session_cookie(token, Utc::now() + Duration::days(30), false));
    let stale = session_cookie_pair(&(jar, ()).into_response()).unwrap();

    let response = app.request(Method::GET, "/api/auth/me", Some(&stale), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cleared = session_set_cookies(&response);
    assert_eq!(cleared.len(), 1);
    assert!(cleared[0].starts_with("auth-session=;"));
    assert_eq!(max_age(&cleared[0]), Some(0));
}

#[tokio::test]
async fn test_probe_path_short_circuits() {
    let app = create_test_app();

    let response = app
        .request(
            Method::GET,
            "/.well-known/appspecific/com.chrome.devtools.json",
            Some("auth-session=garbage"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_renewed_inside_window() {
    let app = create_test_app();
    let user = app.seed_user("ana@example.com", Role::Associate).await;

    // 20 days old: 10 days left, inside the 15-day window
    let (token, cookie) = app
        .session_cookie_at(&user, Utc::now() - Duration::days(20))
        .await;

    let response = app.request(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reissued = session_set_cookies(&response);
    assert_eq!(reissued.len(), 1);
    assert_close(max_age(&reissued[0]).unwrap(), THIRTY_DAYS);

    match app.state.session_manager.validate_session_token(&token).await.unwrap() {
        SessionValidation::Valid { session, .. } => {
            assert!(session.expires_at > Utc::now() + Duration::days(29));
        }
        SessionValidation::Invalid => panic!("renewed session should stay valid"),
    }
}

#[tokio::test]
async fn test_session_not_renewed_outside_window() {
    let app = create_test_app();
    let user = app.seed_user("ana@example.com", Role::Associate).await;

    let (_, cookie) = app
        .session_cookie_at(&user, Utc::now() - Duration::days(1))
        .await;

    let response = app.request(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reissued = session_set_cookies(&response);
    assert_eq!(reissued.len(), 1);
    assert_close(max_age(&reissued[0]).unwrap(), THIRTY_DAYS - 24 * 60 * 60);
}

#[tokio::test]
async fn test_expired_session_is_rejected() {
    let app = create_test_app();
    let user = app.seed_user("ana@example.com", Role::Associate).await;

    let (token, cookie) = app
        .session_cookie_at(&user, Utc::now() - Duration::days(31))
        .await;

    let response = app.request(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie_pair(&response).is_none());

    let validation = app.state.session_manager.validate_session_token(&token).await.unwrap();
    assert!(matches!(validation, SessionValidation::Invalid));
}

#[tokio::test]
async fn test_security_headers_applied() {
    let app = create_test_app();

    let response = app.request(Method::GET, "/api/health/simple", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["cache-control"], "no-store");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_health_reports_memory_backend() {
    let app = create_test_app();

    let response = app.request(Method::GET, "/api/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["store"]["backend"], "memory");
}
