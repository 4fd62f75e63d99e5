use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// CORS for the browser frontend. Credentials are always allowed since the
/// session travels in a cookie, so a wildcard becomes origin mirroring.
/// Production never mirrors: only explicitly listed origins are allowed.
pub fn create_cors_layer(allowed_origins: Vec<String>, production: bool) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("x-requested-with")])
        .allow_credentials(true);

    let wildcard = allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*");
    if wildcard && !production {
        tracing::warn!("CORS: mirroring request origin");
        return base.allow_origin(AllowOrigin::mirror_request());
    }
    if wildcard {
        tracing::warn!("CORS: wildcard origin ignored in production");
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| match origin.parse() {
            Ok(parsed) => {
                tracing::debug!("CORS: Allowing origin: {}", origin);
                Some(parsed)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if !origins.is_empty() {
        base.allow_origin(origins)
    } else if production {
        tracing::warn!("CORS: No valid origins configured, refusing cross-origin requests");
        base
    } else {
        tracing::warn!("CORS: No valid origins configured, mirroring request origin");
        base.allow_origin(AllowOrigin::mirror_request())
    }
}
