use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::{debug, instrument};

use crate::{
    authguard::{
        client::client_id,
        rejection::{self, RateLimited},
        state::GuardState,
    },
    limiter::ActionKind,
};

/// Headers reverse proxies use to pass the original request path to an auth sub-request.
const ORIGINAL_URI_HEADERS: [&str; 3] = ["x-forwarded-uri", "x-original-uri", "x-original-url"];

fn original_path(headers: &HeaderMap) -> Option<&str> {
    ORIGINAL_URI_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    })
}

#[utoipa::path(
    get,
    path= "/v1/forward-auth",
    responses (
        (status = 204, description = "Request may proceed"),
        (status = 429, description = "Too many attempts", body = RateLimited, content_type = "application/json"),
    ),
    params(
        ("X-Forwarded-Uri" = Option<String>, Header, description = "Original request path"),
        ("X-Forwarded-For" = Option<String>, Header, description = "Original client address"),
    ),
    tag= "rate-limit"
)]
// axum handler for reverse proxy auth sub-requests (nginx auth_request, traefik ForwardAuth)
#[instrument(skip(guard, headers))]
pub async fn forward_auth(
    guard: Extension<GuardState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let Some(action) = original_path(&headers).and_then(ActionKind::from_path) else {
        debug!("not a guarded path, letting it through");
        return StatusCode::NO_CONTENT.into_response();
    };

    let client = client_id(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        guard.client_source(),
    );

    let decision = guard.limiter().check(action, &client).await;

    rejection::respond(&decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn original_path_checks_known_headers_in_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-original-uri", HeaderValue::from_static("/api/auth/register"));
        assert_eq!(original_path(&headers), Some("/api/auth/register"));

        headers.insert("x-forwarded-uri", HeaderValue::from_static("/api/auth/login"));
        assert_eq!(original_path(&headers), Some("/api/auth/login"));
    }

    #[test]
    fn original_path_missing() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-uri", HeaderValue::from_static(" "));
        assert_eq!(original_path(&headers), None);
    }
}
