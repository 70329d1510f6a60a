use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::{
    authguard::{
        rejection::{self, RateLimited},
        state::GuardState,
    },
    limiter::ActionKind,
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CheckRequest {
    /// One of `login`, `password-reset` or `registration`.
    action: String,
    /// Stable caller identity, usually the client IP address.
    client_id: String,
}

#[utoipa::path(
    post,
    path= "/v1/check",
    request_body = CheckRequest,
    responses (
        (status = 204, description = "Attempt admitted and recorded"),
        (status = 400, description = "Missing payload, unknown action or empty client id"),
        (status = 429, description = "Too many attempts", body = RateLimited, content_type = "application/json"),
    ),
    tag= "rate-limit"
)]
// axum handler for explicit checks from other services
#[instrument(skip(guard))]
pub async fn check(
    guard: Extension<GuardState>,
    payload: Option<Json<CheckRequest>>,
) -> impl IntoResponse {
    let request: CheckRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let Ok(action) = request.action.parse::<ActionKind>() else {
        debug!("unknown action: {}", request.action);
        return (StatusCode::BAD_REQUEST, "Unknown action".to_string()).into_response();
    };

    let client_id = request.client_id.trim();
    if client_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing client_id".to_string()).into_response();
    }

    let decision = guard.limiter().check(action, client_id).await;

    rejection::respond(&decision)
}
