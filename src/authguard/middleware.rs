//! In-process guard for axum routers that serve the auth endpoints themselves.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/api/auth/login", post(login))
//!     .layer(axum::middleware::from_fn_with_state(guard_state, middleware::guard));
//! ```

use axum::{
    extract::{ConnectInfo, OriginalUri, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use super::{client::client_id, rejection, state::GuardState};
use crate::limiter::ActionKind;

/// Consult the limiter before guarded handlers run.
///
/// The path is classified before any `Router::nest` prefix stripping. Unguarded paths pass
/// straight through. Refused attempts never reach the handler; admitted ones get
/// `X-RateLimit-*` headers on the handler's response.
pub async fn guard(State(state): State<GuardState>, request: Request, next: Next) -> Response {
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().path(), |OriginalUri(uri)| uri.path());
    let Some(action) = ActionKind::from_path(path) else {
        return next.run(request).await;
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_id(request.headers(), peer, state.client_source());

    let decision = state.limiter().check(action, &client).await;
    if !decision.is_allowed() {
        return rejection::reject(&decision);
    }

    let mut response = next.run(request).await;
    if let Some(quota) = decision.quota() {
        response.headers_mut().extend(rejection::quota_headers(quota));
    }
    response
}
