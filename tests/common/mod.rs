#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use axum_extra::extract::cookie::SignedCookieJar;
use chrono::{DateTime, Utc};
use inventory_backend::{
    auth::{cookie::session_cookie, Role},
    build_router,
    config::Settings,
    repositories::{
        user_repo::{NewUser, User},
        InMemoryStore, UserRepository,
    },
    utils::hash_password,
    AppState, Repositories,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery";

/// A router over a fresh in-memory store, with handles for direct setup.
#[derive(Clone)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
}

pub fn test_settings() -> Settings {
    Settings {
        environment: "test".to_string(),
        log_level: "error".to_string(),
        ..Settings::default()
    }
}

pub fn create_test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let state = AppState::from_repositories(
        test_settings(),
        None,
        Repositories::in_memory(store.clone()),
    );

    TestApp {
        router: build_router(state.clone()),
        state,
        store,
    }
}

impl TestApp {
    pub async fn seed_user(&self, email: &str, role: Role) -> User {
        self.store
            .create_user(&NewUser {
                email: email.to_string(),
                first_name: "Test".to_string(),
                last_name: role.as_str().to_string(),
                password_hash: hash_password(PASSWORD).unwrap(),
                role,
            })
            .await
            .unwrap()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Log in and return the `name=value` pair of the issued session cookie.
    pub async fn login_cookie(&self, email: &str) -> String {
        let response = self.login(email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie_pair(&response).expect("login should set the session cookie")
    }

    /// Open a session directly, as if logged in at `now`, and sign its cookie.
    pub async fn session_cookie_at(&self, user: &User, now: DateTime<Utc>) -> (String, String) {
        let manager = &self.state.session_manager;
        let token = manager.generate_token();
        let session = manager.create_session_at(&token, user.id, now).await.unwrap();

        let jar = SignedCookieJar::new(self.state.key.clone())
            .add(session_cookie(token.clone(), session.expires_at, false));
        let response = (jar, ()).into_response();
        let cookie = session_cookie_pair(&response).unwrap();
        (token, cookie)
    }
}

/// All Set-Cookie values for the session cookie.
pub fn session_set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter(|value| value.starts_with("auth-session="))
        .map(str::to_string)
        .collect()
}

pub fn session_cookie_pair(response: &Response) -> Option<String> {
    session_set_cookies(response)
        .into_iter()
        .next()
        .and_then(|value| value.split(';').next().map(str::to_string))
        .filter(|pair| pair != "auth-session=")
}

/// Read the `Max-Age` attribute of a Set-Cookie value.
pub fn max_age(set_cookie: &str) -> Option<i64> {
    set_cookie
        .split(';')
        .map(str::trim)
        .find_map(|attr| attr.strip_prefix("Max-Age="))
        .and_then(|v| v.parse().ok())
}

/// Helper to extract response body as bytes
pub async fn extract_body(response: Response) -> Vec<u8> {
    use axum::body::to_bytes;
    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    body.to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&extract_body(response).await).unwrap()
}
