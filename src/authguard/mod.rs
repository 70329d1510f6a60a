pub mod client;
pub mod handlers;
pub mod middleware;
pub mod rejection;
pub mod state;

pub use state::GuardState;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    response::Json,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer,
    set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;

use crate::{
    cli::actions::server::Args,
    limiter::{sweeper, AttemptStore, Limiter, MemoryStore, PostgresStore, StoreKind},
};

const DB_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Response headers applied to everything this service returns.
const SECURITY_HEADERS: [(&str, &str); 6] = [
    ("x-dns-prefetch-control", "on"),
    (
        "strict-transport-security",
        "max-age=31536000; includeSubDomains",
    ),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "origin-when-cross-origin"),
    ("permissions-policy", "camera=(), microphone=(), geolocation=()"),
];

#[derive(OpenApi)]
#[openapi(
    paths(handlers::health::health, handlers::check::check, handlers::forward_auth::forward_auth),
    components(schemas(
        handlers::health::Health,
        handlers::check::CheckRequest,
        rejection::RateLimited
    )),
    tags(
        (name = "authguard", description = "Rate limiting for authentication endpoints"),
    )
)]
pub struct ApiDoc;

/// Build the application router around an already constructed limiter and store.
#[must_use]
pub fn router(guard: GuardState, store: Arc<dyn AttemptStore>) -> Router {
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/check", post(handlers::check))
        .route("/v1/forward-auth", get(handlers::forward_auth))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(guard))
                .layer(Extension(store)),
        );

    SECURITY_HEADERS
        .into_iter()
        .fold(app, |app, (name, value)| {
            app.layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            ))
        })
}

/// Start the server
/// # Errors
/// Return error if the attempt store cannot be prepared or the listener fails
pub async fn new(args: Args) -> Result<()> {
    let store: Arc<dyn AttemptStore> = match args.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Postgres => {
            let dsn = args
                .dsn
                .as_ref()
                .context("missing required argument: --dsn")?;

            let store = PostgresStore::connect(dsn.expose_secret(), DB_CONNECT_TIMEOUT)
                .await
                .context("Failed to connect to database")?;

            store
                .ensure_schema()
                .await
                .context("Failed to create rate limit schema")?;

            Arc::new(store)
        }
    };

    let limiter = Arc::new(
        Limiter::new(args.rules.clone(), store.clone())
            .with_failure_policy(args.failure_policy)
            .with_store_timeout(args.store_timeout)
            .with_fail_closed_retry_after(args.fail_closed_retry_after),
    );

    info!(
        "Rate limiting with {} store, failing {}",
        store.kind(),
        limiter.failure_policy()
    );

    let sweeper = sweeper::spawn(limiter.clone(), args.sweep_interval, args.sweep_grace);

    let guard = GuardState::new(limiter).with_client_source(args.client_source);
    let app = router(guard, store);

    let addr = SocketAddr::new(args.listen, args.port);
    let listener = TcpListener::bind(addr).await?;

    info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Gracefully shutdown");
    })
    .await?;

    sweeper.abort();

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
