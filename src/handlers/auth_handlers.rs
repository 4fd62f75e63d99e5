use crate::auth::context::RequestContext;
use crate::auth::cookie::{removal_cookie, session_cookie};
use crate::models::user::LoginRequest;
use crate::{error::ApiError, AppState};
use axum::{extract::State, Extension, Json};
use axum_extra::extract::cookie::SignedCookieJar;
use serde_json::{json, Value};

pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(params): Json<LoginRequest>,
) -> Result<(SignedCookieJar, Json<Value>), ApiError> {
    let outcome = state.auth_service.login(params.email, params.password).await?;

    let cookie = session_cookie(
        outcome.token,
        outcome.session.expires_at,
        state.config.is_production(),
    );

    Ok((jar.add(cookie), Json(json!({ "type": "success" }))))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Json<Value>), ApiError> {
    let session = context
        .session
        .as_ref()
        .ok_or_else(|| ApiError::authentication("Not logged in"))?;

    state.auth_service.logout(session).await?;

    Ok((jar.remove(removal_cookie()), Json(json!({ "success": true }))))
}

pub async fn get_me(
    Extension(context): Extension<RequestContext>,
) -> Result<Json<Value>, ApiError> {
    let user = context.require_user()?;

    Ok(Json(json!({
        "success": true,
        "user": user,
        "session": context.session,
    })))
}
