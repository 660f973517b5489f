//! WebSocket transport for the gRPC bridge integration
//!
//! Serves the bridge command endpoint, the switch services and two small
//! status routes. Each socket is handed to [`websocket::handle_socket`], which
//! feeds text frames through the integration's gateway in arrival order.

pub mod websocket;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bridge_core::consts::{NAME, VERSION};
use bridge_core::BridgeError;
use grpc_bridge::GrpcBridge;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Default path of the bridge WebSocket endpoint
pub const DEFAULT_WEBSOCKET_PATH: &str = "/api/websocket";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<GrpcBridge>,
}

impl AppState {
    pub fn new(bridge: Arc<GrpcBridge>) -> Self {
        Self { bridge }
    }
}

/// API status response
#[derive(Debug, Serialize)]
pub struct ApiStatus {
    pub message: String,
    pub version: &'static str,
    pub loaded: bool,
    pub entities: usize,
}

/// Service call request body
#[derive(Debug, Deserialize)]
pub struct ServiceCallRequest {
    pub entity_id: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Create the API router
pub fn create_router(state: AppState, websocket_path: &str) -> Router {
    Router::new()
        .route(websocket_path, get(websocket::ws_handler))
        .route("/api/", get(api_status))
        .route("/api/services/:domain/:service", post(call_service))
        .route("/api/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the API server
pub async fn start_server(state: AppState, addr: &str, websocket_path: &str) -> std::io::Result<()> {
    let router = create_router(state, websocket_path);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}, bridge endpoint {}", addr, websocket_path);
    axum::serve(listener, router).await
}

/// GET /api/ - Returns integration status
async fn api_status(State(state): State<AppState>) -> Json<ApiStatus> {
    let entities = state
        .bridge
        .data()
        .map(|data| data.entities.len())
        .unwrap_or_default();
    Json(ApiStatus {
        message: format!("{NAME} running."),
        version: VERSION,
        loaded: state.bridge.is_loaded(),
        entities,
    })
}

/// POST /api/services/:domain/:service - Run a switch command
async fn call_service(
    State(state): State<AppState>,
    Path((domain, service)): Path<(String, String)>,
    Json(request): Json<ServiceCallRequest>,
) -> Result<Json<Vec<serde_json::Value>>, (StatusCode, Json<ErrorResponse>)> {
    match state
        .bridge
        .call_service(&domain, &service, &request.entity_id)
        .await
    {
        // The new state arrives later from the remote side
        Ok(()) => Ok(Json(vec![])),
        Err(e) => {
            let status = match e {
                BridgeError::EntityNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            Err((
                status,
                Json(ErrorResponse {
                    message: format!("Service call failed: {}", e),
                }),
            ))
        }
    }
}

/// GET /api/health - Health check
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use bridge_core::consts::DOMAIN;
    use bridge_core::message::TYPE_ADD;
    use bridge_host::{ConfigEntry, Hass};
    use grpc_bridge::ActiveConnection;
    use serde_json::json;
    use tower::ServiceExt;

    fn state() -> AppState {
        let hass = Hass::new();
        let entry = hass.config_entries.add(ConfigEntry::new(DOMAIN, NAME));
        let bridge = GrpcBridge::new(hass, entry).unwrap();
        bridge.setup_entry();
        AppState::new(Arc::new(bridge))
    }

    #[tokio::test]
    async fn test_health_check() {
        let router = create_router(state(), DEFAULT_WEBSOCKET_PATH);
        let response = router
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_api_status() {
        let router = create_router(state(), DEFAULT_WEBSOCKET_PATH);
        let response = router
            .oneshot(Request::get("/api/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["loaded"], true);
        assert_eq!(status["entities"], 0);
        assert_eq!(status["version"], VERSION);
    }

    fn service_call(path: &str, entity_id: &str) -> Request<Body> {
        Request::post(path)
            .header("content-type", "application/json")
            .body(Body::from(json!({"entity_id": entity_id}).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_switch_service_reaches_connection() {
        let state = state();
        let (conn, mut rx) = ActiveConnection::channel();
        let frame = json!({
            "id": 4,
            "type": TYPE_ADD,
            "service_slug": "svc",
            "device_slug": "dev",
            "entity_slug": "relay",
            "platform": "switch",
            "device_info": null,
            "config": {"name": "Relay"},
        });
        state
            .bridge
            .handle_text(&conn, &frame.to_string())
            .await
            .unwrap();
        rx.try_recv().unwrap();

        let router = create_router(state, DEFAULT_WEBSOCKET_PATH);
        let response = router
            .oneshot(service_call("/api/services/switch/turn_off", "switch.relay"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let command = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(
            command,
            json!({"id": 4, "type": "event", "event": {"type": "state_changed", "state": false}})
        );
    }

    #[tokio::test]
    async fn test_service_for_unknown_entity() {
        let router = create_router(state(), DEFAULT_WEBSOCKET_PATH);
        let response = router
            .oneshot(service_call("/api/services/switch/turn_on", "switch.nowhere"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let router = create_router(state(), DEFAULT_WEBSOCKET_PATH);
        let response = router
            .oneshot(service_call("/api/services/light/turn_on", "light.lamp"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_websocket_route_requires_upgrade() {
        let router = create_router(state(), "/bridge");
        let response = router
            .oneshot(Request::get("/bridge").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // A plain GET is not a WebSocket handshake
        assert!(response.status().is_client_error());
    }
}
