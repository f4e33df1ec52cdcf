//! HTTP gateway: thin axum routing over the trust core.
//!
//! Every protected handler starts with one explicit `Gate::authorize` call
//! and short-circuits on `Denied` — the decorator pattern flattened into a
//! guard function. The gateway owns no policy: status codes and karma
//! effects all fall out of the core's `Decision`.
//!
//! Routes:
//! - `POST /register`, `POST /login`, `GET /health` — unauthenticated
//! - `POST /chat` — admin + moderator, the karma-rewarding query path
//! - `GET /admin` — admin only
//! - `GET /mod` — admin + moderator
//! - `GET /user` — all three tiers

use crate::auth::{Decision, DenyReason, Gate, Role, User};
use crate::config::Config;
use crate::error::Error;
use crate::query::{LlmTranslator, QueryExecutor, QueryTranslator, SqliteExecutor};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum accepted request body (bytes).
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Per-request time budget.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Roles allowed through the query-execution path.
const QUERY_PATH_ROLES: [Role; 2] = [Role::Admin, Role::Moderator];

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<Gate>,
    pub translator: Arc<dyn QueryTranslator>,
    pub executor: Arc<dyn QueryExecutor>,
}

type ApiResponse = (StatusCode, Json<serde_json::Value>);

/// Run the HTTP gateway until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    use crate::auth::{TokenConfig, TokenService, UserStore};
    use crate::query::translator::TranslatorConfig;

    let store = Arc::new(UserStore::open(&config.database.path)?);
    let tokens = TokenService::new(TokenConfig {
        secret: config.auth.token_secret.clone(),
        ttl_secs: config.auth.token_ttl_secs,
    });
    let gate = Arc::new(Gate::new(Arc::clone(&store), tokens));

    let mut translator_config = TranslatorConfig::default();
    if let Some(url) = config.translator.api_url.clone() {
        translator_config.api_url = url;
    }
    if let Some(model) = config.translator.model.clone() {
        translator_config.model = model;
    }
    translator_config.api_key = config.translator.api_key.clone();

    let state = AppState {
        gate,
        translator: Arc::new(LlmTranslator::new(translator_config)),
        executor: Arc::new(SqliteExecutor::open(&config.database.path)?),
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("querywarden listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

/// Build the route table. Separated from `run` so tests can drive the
/// router directly.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/register", post(handle_register))
        .route("/login", post(handle_login))
        .route("/chat", post(handle_chat))
        .route("/admin", get(handle_admin))
        .route("/mod", get(handle_mod))
        .route("/user", get(handle_user))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// ── Guard helpers ────────────────────────────────────────────────

/// Extract bearer token from Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Run the gate for a protected handler; short-circuit on any denial.
fn require_authorized(
    state: &AppState,
    headers: &HeaderMap,
    allowed: &[Role],
    is_query_path: bool,
) -> Result<User, ApiResponse> {
    let token = extract_bearer_token(headers).unwrap_or_default();

    match state.gate.authorize(token, allowed, is_query_path) {
        Ok(Decision::Allowed(user)) => Ok(user),
        Ok(Decision::Denied(DenyReason::Unauthenticated)) => Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"message": "Missing, invalid, or expired token"})),
        )),
        Ok(Decision::Denied(DenyReason::UserVanished)) => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"message": "User not found"})),
        )),
        Ok(Decision::Denied(DenyReason::InsufficientRole)) => Err((
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "message": "You do not have permission to access this resource. Your karma was reduced"
            })),
        )),
        Err(e) => {
            tracing::error!("authorization failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"message": "Internal error"})),
            ))
        }
    }
}

fn bad_request(message: impl std::fmt::Display) -> ApiResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"message": message.to_string()})),
    )
}

fn profile_response(message: &str, user: &User) -> ApiResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": message,
            "username": user.username,
            "name": user.name,
            "role": u8::from(user.role),
            "karma": user.karma,
        })),
    )
}

// ── Handlers ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RegisterBody {
    username: String,
    password: String,
    name: Option<String>,
    role: Option<u8>,
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct ChatBody {
    query: String,
}

async fn handle_health(State(state): State<AppState>) -> ApiResponse {
    let users = state.gate.store().user_count().unwrap_or(0);
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "ok", "users": users})),
    )
}

/// POST /register — create a new user account.
async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> ApiResponse {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return bad_request(format!("Invalid request: {e}")),
    };

    let role = match body.role.map(Role::try_from).transpose() {
        Ok(role) => role,
        Err(e) => return bad_request(e),
    };

    match state
        .gate
        .register(&body.username, &body.password, body.name.as_deref(), role)
    {
        Ok(user) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "User created successfully",
                "id": user.id,
                "username": user.username,
            })),
        ),
        Err(e @ Error::DuplicateUsername(_)) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"message": e.to_string()})),
        ),
        Err(e @ Error::Invalid(_)) => bad_request(e),
        Err(e) => {
            tracing::error!("registration failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"message": "Error creating user"})),
            )
        }
    }
}

/// POST /login — verify credentials and issue a session token.
async fn handle_login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> ApiResponse {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return bad_request(format!("Invalid request: {e}")),
    };

    match state.gate.authenticate(&body.username, &body.password) {
        Ok((user, token)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Logged in!",
                "username": user.username,
                "name": user.name,
                "role": u8::from(user.role),
                "karma": user.karma,
                "access_token": token,
            })),
        ),
        Err(Error::InvalidCredentials) => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"message": "Invalid credentials"})),
        ),
        Err(e) => {
            tracing::error!("login failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"message": "Internal error"})),
            )
        }
    }
}

/// POST /chat — the karma-rewarding query-execution path.
async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> ApiResponse {
    let user = match require_authorized(&state, &headers, &QUERY_PATH_ROLES, true) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return bad_request(format!("Invalid request: {e}")),
    };
    if body.query.trim().is_empty() {
        return bad_request("Missing query");
    }

    // Translator output is opaque to the core: passed straight to the
    // executor, and any failure surfaces unmodified with no karma effect.
    let sql = match state.translator.translate(&body.query).await {
        Ok(sql) => sql,
        Err(e) => {
            tracing::warn!(username = %user.username, "translation failed: {e}");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"message": e.to_string()})),
            );
        }
    };

    match state.executor.execute(&sql) {
        Ok(rows) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "current_user": user.name.as_deref().unwrap_or(&user.username),
                "sql_query": sql,
                "response": rows,
            })),
        ),
        Err(e) => {
            tracing::warn!(username = %user.username, sql = %sql, "execution failed: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"message": e.to_string()})),
            )
        }
    }
}

/// GET /admin — most-privileged resource, admin only.
async fn handle_admin(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    match require_authorized(&state, &headers, &[Role::Admin], false) {
        Ok(user) => profile_response("Welcome to Admin page!", &user),
        Err(response) => response,
    }
}

/// GET /mod — admin + moderator resource.
async fn handle_mod(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    match require_authorized(&state, &headers, &[Role::Admin, Role::Moderator], false) {
        Ok(user) => profile_response("Welcome to Moderator page!", &user),
        Err(response) => response,
    }
}

/// GET /user — least-privileged resource, open to all three tiers.
async fn handle_user(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    match require_authorized(&state, &headers, &Role::ALL, false) {
        Ok(user) => profile_response("Welcome to User page!", &user),
        Err(response) => response,
    }
}
