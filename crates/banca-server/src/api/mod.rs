//! HTTP API and router.

mod auth;
mod contacts;
mod conversations;
mod users;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{FromRequest, State},
    http::Method,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use banca_shared::types::ConnectionId;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::registry::ConnectionRegistry;
use crate::store::Store;
use crate::ws::ws_handler;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub registry: ConnectionRegistry,
    pub rate_limiter: RateLimiter<IpAddr>,
    pub frame_limiter: RateLimiter<ConnectionId>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Store, config: ServerConfig) -> Self {
        Self {
            store,
            registry: ConnectionRegistry::new(),
            rate_limiter: RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst),
            frame_limiter: RateLimiter::new(config.frame_rate_per_sec, config.frame_rate_burst),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/request-code", post(auth::request_code))
        .route("/api/auth/verify", post(auth::verify))
        .route("/api/auth/complete-profile", post(auth::complete_profile))
        .route(
            "/api/users/:id",
            get(users::get_user).patch(users::update_user),
        )
        .route("/api/contacts", post(contacts::add_contact))
        .route("/api/contacts/sync", post(contacts::sync_contacts))
        .route("/api/contacts/:user_id", get(contacts::list_contacts))
        .route(
            "/api/contacts/:user_id/:contact_id",
            delete(contacts::delete_contact),
        )
        .route(
            "/api/conversations",
            post(conversations::create_conversation),
        )
        .route(
            "/api/conversations/:user_id",
            get(conversations::list_conversations),
        )
        .route(
            "/api/messages/:conversation_id",
            get(conversations::list_messages),
        )
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    online: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        online: state.registry.online_count().await,
    })
}

/// `Json` whose rejections go through [`ServerError`], so a malformed body
/// gets the same `{message}` body as every other error.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ServerError))]
pub(crate) struct JsonBody<T>(pub T);

/// Path ids arrive as strings so a non-numeric id gets our own 400 body
/// instead of the extractor's plain-text rejection.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<i64, ServerError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ServerError::BadRequest(format!("Invalid {what} ID")))
}

/// Treats an empty or whitespace-only string like a missing field.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use banca_store::Database;

    use super::*;

    pub fn test_state() -> AppState {
        let config = ServerConfig {
            expose_verification_codes: true,
            ..ServerConfig::default()
        };
        AppState::new(Store::new(Database::open_in_memory().unwrap()), config)
    }

    pub async fn send(
        state: &AppState,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = build_router(state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Register a user through the API and return its id.
    pub async fn register(state: &AppState, email: &str, username: &str) -> i64 {
        let (status, body) = send(
            state,
            "POST",
            "/api/auth/register",
            Some(serde_json::json!({
                "email": email,
                "password": "password123",
                "username": username,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["user"]["id"].as_i64().unwrap()
    }
}
