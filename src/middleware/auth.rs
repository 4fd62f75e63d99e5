use crate::auth::context::RequestContext;
use crate::auth::cookie::{removal_cookie, session_cookie, SESSION_COOKIE_NAME};
use crate::auth::session::SessionValidation;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{CookieJar, SignedCookieJar};

/// Tooling probes answered before any session lookup.
pub const PROBE_PATHS: &[&str] = &["/.well-known/appspecific/com.chrome.devtools.json"];

/// Cookie changes applied to the response after the handler runs.
enum CookieUpdate {
    Refresh(SignedCookieJar),
    Clear(CookieJar),
}

fn sets_session_cookie(response: &Response) -> bool {
    let prefix = format!("{SESSION_COOKIE_NAME}=");
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&prefix))
}

/// Resolve the session cookie into a [`RequestContext`] extension.
///
/// Valid sessions get their cookie re-issued with the current expiry after
/// the handler runs; invalid or tampered cookies are cleared. A handler that
/// sets the cookie itself (login, logout) wins. Store failures degrade to an
/// anonymous request.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if PROBE_PATHS.contains(&request.uri().path()) {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    }

    let jar = SignedCookieJar::from_headers(request.headers(), state.key.clone());
    // The signed jar drops cookies that fail verification, so removals go
    // through the plain jar, which still knows the cookie was sent.
    let plain = CookieJar::from_headers(request.headers());
    let cookie_sent = plain.get(SESSION_COOKIE_NAME).is_some();

    let (context, update) = match jar.get(SESSION_COOKIE_NAME) {
        None if cookie_sent => {
            tracing::warn!("session cookie failed signature check");
            (
                RequestContext::anonymous(),
                Some(CookieUpdate::Clear(plain.remove(removal_cookie()))),
            )
        }
        None => (RequestContext::anonymous(), None),
        Some(cookie) => {
            let token = cookie.value().to_string();
            match state.session_manager.validate_session_token(&token).await {
                Ok(SessionValidation::Valid { session, user }) => {
                    let refreshed =
                        session_cookie(token, session.expires_at, state.config.is_production());
                    (
                        RequestContext::authenticated(user, session),
                        Some(CookieUpdate::Refresh(jar.add(refreshed))),
                    )
                }
                Ok(SessionValidation::Invalid) => (
                    RequestContext::anonymous(),
                    Some(CookieUpdate::Clear(plain.remove(removal_cookie()))),
                ),
                Err(e) => {
                    tracing::error!(error = %e, "session validation failed, continuing anonymously");
                    (RequestContext::anonymous(), None)
                }
            }
        }
    };

    request.extensions_mut().insert(context);
    let response = next.run(request).await;

    if sets_session_cookie(&response) {
        return response;
    }
    match update {
        Some(CookieUpdate::Refresh(jar)) => (jar, response).into_response(),
        Some(CookieUpdate::Clear(jar)) => (jar, response).into_response(),
        None => response,
    }
}
