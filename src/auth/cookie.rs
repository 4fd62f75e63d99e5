use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha512};
use time::OffsetDateTime;

pub const SESSION_COOKIE_NAME: &str = "auth-session";

/// Derive the cookie signing key from the session secret. `Key` needs 64
/// bytes of material, so the secret is stretched through SHA-512.
pub fn cookie_key(session_secret: &str) -> Key {
    let digest = Sha512::digest(session_secret.as_bytes());
    Key::from(digest.as_slice())
}

pub fn session_cookie(token: String, expires_at: DateTime<Utc>, secure: bool) -> Cookie<'static> {
    session_cookie_at(token, expires_at, secure, Utc::now())
}

/// Build the session cookie with `Expires` and `Max-Age` both pinned to the
/// session's expiry.
pub fn session_cookie_at(
    token: String,
    expires_at: DateTime<Utc>,
    secure: bool,
    now: DateTime<Utc>,
) -> Cookie<'static> {
    let max_age = (expires_at - now).num_seconds().max(0);

    let mut builder = Cookie::build((SESSION_COOKIE_NAME, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .max_age(time::Duration::seconds(max_age));

    if let Ok(expires) = OffsetDateTime::from_unix_timestamp(expires_at.timestamp()) {
        builder = builder.expires(expires);
    }

    builder.build()
}

/// Template handed to the cookie jar when clearing the session cookie.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, "")).path("/").build()
}
