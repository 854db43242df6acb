//! # Publ HTTP Server
//!
//! Resolves request paths through the alias table and reports the
//! disposition: redirects are sent as redirects, renders are described as
//! JSON for a downstream renderer.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /_token` - Verify a bearer token
//! - `POST /_token` - Redeem an auth ticket (`grant_type=ticket`)
//! - `POST /_admin/reload` - Re-read the user list (admin only)
//! - `GET /*path` - Resolve a path
//!
//! ## Configuration
//!
//! Environment variables:
//! - `PORT` - HTTP server port (default: 8080)
//! - `RUST_LOG` - Log level (default: info)
//! - `PUBL_DATABASE_URL` - PostgreSQL store (default: in-memory)
//! - `PUBL_USER_LIST` - User list file (default: users.cfg)
//! - `PUBL_ADMIN_GROUP` - Group that may see every entry
//! - `PUBL_SECRET_KEY` - Token signing secret; tokens are disabled without it
//! - `PUBL_CACHE_TTL` / `PUBL_CACHE_CAPACITY` - Memoization settings
//! - `PUBL_PATH_RULES` - JSON array of regex redirect rules

use anyhow::Context;
use axum::{
    extract::{Form, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    serve, Router,
};
use publ::alias::{AliasResolver, Disposition, RegexPathMatcher};
use publ::auth::Authorizer;
use publ::cache::SystemClock;
use publ::groups::{GroupDirectory, GroupSource};
use publ::store::{InMemoryStore, Store, SCHEMA_VERSION};
use publ::tokens::TokenSigner;
use publ::{PublConfig, PublError, User};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shared application state
#[derive(Clone)]
struct AppState {
    resolver: Arc<AliasResolver>,
    signer: Option<Arc<TokenSigner>>,
    token_lifetime: Duration,
    start_time: std::time::Instant,
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Application error type
#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        if status == StatusCode::UNAUTHORIZED {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer error=\"invalid_token\"")],
                body,
            )
                .into_response();
        }
        (status, body).into_response()
    }
}

impl From<PublError> for AppError {
    fn from(err: PublError) -> Self {
        match err {
            PublError::Token(e) => AppError::Unauthorized(e.to_string()),
            PublError::InvalidInput(msg) => AppError::BadRequest(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Denied access to a gated entry
#[derive(Debug, Serialize)]
struct ForbiddenResponse {
    error: &'static str,
    entry: publ::EntryId,
    category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// Token verification response
#[derive(Debug, Serialize)]
struct TokenInfo {
    me: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

/// Token endpoint form
#[derive(Debug, Deserialize)]
struct TokenRequest {
    grant_type: Option<String>,
    ticket: Option<String>,
}

/// Identity from the `Authorization: Bearer` header, if any
fn request_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, AppError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AppError::BadRequest("Invalid Authorization header".to_string()))?;
    let Some((scheme, token)) = value.split_once(' ') else {
        return Err(AppError::BadRequest("Invalid Authorization header".to_string()));
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Ok(None);
    }

    let signer = state
        .signer
        .as_ref()
        .ok_or_else(|| AppError::Unauthorized("Tokens are not enabled".to_string()))?;
    let claims = signer.parse_token(token)?;
    Ok(Some(User::new(claims.me)))
}

/// GET /*path - Resolve a request path
async fn resolve_path(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    let user = request_user(&state, &headers)?;
    let disposition = state.resolver.get_alias(uri.path(), user.as_ref()).await?;

    let response = match disposition {
        Some(Disposition::Response(redirect)) => {
            let status = StatusCode::from_u16(redirect.status.code())
                .map_err(|e| AppError::Internal(e.to_string()))?;
            (status, [(header::LOCATION, redirect.location)]).into_response()
        }
        Some(Disposition::AuthFailed { user, entry, category }) => {
            let body = Json(ForbiddenResponse {
                error: "forbidden",
                entry: entry.id,
                category,
                user: user.as_ref().map(|u| u.name().to_string()),
            });
            if user.is_none() {
                // logging in might help
                (
                    StatusCode::FORBIDDEN,
                    [(header::WWW_AUTHENTICATE, "Bearer")],
                    body,
                )
                    .into_response()
            } else {
                (StatusCode::FORBIDDEN, body).into_response()
            }
        }
        Some(render) => Json(render).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "not_found".to_string(),
                message: format!("No content at {}", uri.path()),
            }),
        )
            .into_response(),
    };

    Ok(response)
}

/// GET /_token - Verify a bearer token
async fn verify_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenInfo>, AppError> {
    let signer = state
        .signer
        .as_ref()
        .ok_or_else(|| AppError::Unauthorized("Tokens are not enabled".to_string()))?;

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = signer.parse_token(token)?;
    Ok(Json(TokenInfo {
        me: claims.me,
        scope: claims.scope,
    }))
}

/// POST /_token - Redeem a ticket for an access token
async fn redeem_ticket(
    State(state): State<AppState>,
    Form(req): Form<TokenRequest>,
) -> Result<Response, AppError> {
    let signer = state
        .signer
        .as_ref()
        .ok_or_else(|| AppError::Unauthorized("Tokens are not enabled".to_string()))?;

    match req.grant_type.as_deref() {
        Some("ticket") => {
            let ticket = req
                .ticket
                .ok_or_else(|| AppError::BadRequest("Missing ticket".to_string()))?;
            let grant = signer.redeem_ticket(&ticket, state.token_lifetime)?;
            Ok(Json(grant).into_response())
        }
        Some(_) => Err(AppError::BadRequest("Unknown grant type".to_string())),
        None => Err(AppError::BadRequest("Missing grant_type".to_string())),
    }
}

/// POST /_admin/reload - Re-read the user list
async fn reload_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let user = request_user(&state, &headers)?;
    let authorizer = state.resolver.authorizer();

    if !authorizer.is_admin(user.as_ref()) {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    authorizer.directory().reload()?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: publ::VERSION.to_string(),
    })
}

/// Create the HTTP router with all endpoints
fn create_router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_check))
        .route("/_token", get(verify_token).post(redeem_ticket))
        .route("/_admin/reload", post(reload_users))
        .route("/", get(resolve_path))
        .route("/*path", get(resolve_path))
        .layer(ServiceBuilder::new().layer(trace))
        .with_state(state)
}

/// Open the configured store
async fn open_store(config: &PublConfig) -> anyhow::Result<Arc<dyn Store>> {
    match &config.database_url {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let store = publ::store::PostgresStore::new(url)
                .await
                .context("Failed to connect to database")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => anyhow::bail!("PUBL_DATABASE_URL is set but the postgres feature is disabled"),
        None => {
            warn!("No database configured; using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

/// Build the resolver and its collaborators
async fn build_state(config: &PublConfig) -> anyhow::Result<AppState> {
    let store = open_store(config).await?;
    let status = store
        .prepare_schema(SCHEMA_VERSION)
        .await
        .context("Failed to prepare schema")?;
    info!("Schema status: {:?}", status);

    let clock = Arc::new(SystemClock);
    let directory = GroupDirectory::load(
        GroupSource::File(config.user_list.clone()),
        config.cache_config(),
        clock.clone(),
    )
    .context("Failed to load user list")?;
    let authorizer = Arc::new(Authorizer::new(
        Arc::new(directory),
        config.admin_group.clone(),
    ));

    let matcher = RegexPathMatcher::from_specs(&config.path_rules).context("Invalid path rules")?;
    info!("Loaded {} path rules", matcher.len());

    let resolver = AliasResolver::new(store, authorizer)
        .with_cache_config(config.cache_config())
        .with_clock(clock)
        .with_path_matcher(Arc::new(matcher));

    let signer = match &config.secret_key {
        Some(secret) => Some(Arc::new(TokenSigner::new(secret))),
        None => {
            warn!("PUBL_SECRET_KEY not set; bearer tokens are disabled");
            None
        }
    };

    Ok(AppState {
        resolver: Arc::new(resolver),
        signer,
        token_lifetime: Duration::from_secs(config.token_lifetime),
        start_time: std::time::Instant::now(),
    })
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

/// Main server entrypoint
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Publ server v{}", publ::VERSION);

    let config = PublConfig::from_env().context("Invalid configuration")?;
    info!("Configuration:");
    info!("  Port: {}", config.port);
    info!("  User list: {}", config.user_list.display());
    info!("  Admin group: {:?}", config.admin_group);
    info!("  Cache TTL: {}s", config.cache_ttl);

    let state = build_state(&config).await?;
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server shut down gracefully");
    Ok(())
}
