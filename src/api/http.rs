//! HTTP API Server
//!
//! Read-only REST API for health, coordination status, worker readiness
//! and the host table.

use std::collections::BTreeMap;
use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::coordinator::{readiness, ClusterStatus, Coordinator, CycleReport, EvalContext, HaPhase};
use crate::error::{Error, Result};
use crate::service::{LeadershipOracle, WorkerPayload};
use crate::state::StateSnapshot;

/// Shared application state
pub struct AppState {
    /// Local NameNode name
    pub node_name: String,
    /// Coordinator whose state is served
    pub coordinator: Arc<Coordinator>,
    /// Leadership token
    pub leadership: Arc<dyn LeadershipOracle>,
}

/// HTTP API server
pub struct HttpServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ApiConfig, coordinator: Arc<Coordinator>, leadership: Arc<dyn LeadershipOracle>) -> Self {
        let state = Arc::new(AppState {
            node_name: coordinator.settings().node_name.clone(),
            coordinator,
            leadership,
        });

        Self { config, state }
    }

    /// Create the router
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(handle_health))
            .route("/status", get(handle_status))
            .route("/readiness", get(handle_readiness))
            .route("/hosts", get(handle_hosts))
            .with_state(Arc::clone(&self.state))
            .layer(TraceLayer::new_for_http());

        if self.config.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Start the HTTP server
    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("HTTP API disabled");
            return Ok(());
        }

        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!("HTTP API listening on {}", self.config.bind_address);

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Network(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}

// ============ Response Types ============

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub node_name: String,
    pub is_leader: bool,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub node_name: String,
    pub is_leader: bool,
    pub status: ClusterStatus,
    pub phase: HaPhase,
    pub flags: Vec<String>,
    pub workers: Vec<String>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_cycle: Option<serde_json::Value>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn error_response(status: StatusCode, error: &Error) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: status.as_u16().to_string(),
        }),
    )
        .into_response()
}

async fn load_state(state: &AppState) -> std::result::Result<StateSnapshot, Response> {
    StateSnapshot::load(state.coordinator.store())
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, &e))
}

// ============ Handlers ============

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        node_name: state.node_name.clone(),
        is_leader: state.leadership.is_leader().await.unwrap_or(false),
    })
}

async fn handle_status(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = match load_state(&state).await {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };
    let is_leader = state.leadership.is_leader().await.unwrap_or(false);
    let report: Option<CycleReport> = state.coordinator.last_report().await;
    let settings = state.coordinator.settings();

    // Peer presence is only known from the last observed cycle
    let status = match &report {
        Some(report) => report.status.clone(),
        None => ClusterStatus::derive(&snapshot, false, settings.min_journal_quorum),
    };

    Json(StatusResponse {
        node_name: state.node_name.clone(),
        is_leader,
        status,
        phase: HaPhase::derive(&snapshot, is_leader, false),
        flags: snapshot.flags.iter().map(|f| f.name().to_string()).collect(),
        workers: snapshot.slaves.iter().cloned().collect(),
        last_cycle_at: report.as_ref().map(|r| r.completed_at),
        last_cycle: report.and_then(|r| serde_json::to_value(r).ok()),
    })
    .into_response()
}

async fn handle_readiness(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = match load_state(&state).await {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };

    if readiness::is_ready(&snapshot) {
        let ctx = EvalContext {
            settings: state.coordinator.settings(),
            is_leader: state.leadership.is_leader().await.unwrap_or(false),
            consensus: None,
        };
        Json(WorkerPayload::ready(readiness::worker_config(&ctx, &snapshot))).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(WorkerPayload::not_ready())).into_response()
    }
}

async fn handle_hosts(State(state): State<Arc<AppState>>) -> Response {
    match load_state(&state).await {
        Ok(snapshot) => Json::<BTreeMap<String, String>>(snapshot.hosts.to_map()).into_response(),
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::observe::Observations;
    use crate::testing::{journal, peer, Harness};

    fn server(h: &Harness) -> HttpServer {
        HttpServer::new(ApiConfig::default(), h.coordinator.clone(), h.leadership.clone())
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let h = Harness::new("nn-0", true);
        let (status, body) = get_json(server(&h).router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["node_name"], "nn-0");
        assert_eq!(body["is_leader"], true);
    }

    #[tokio::test]
    async fn test_readiness_unavailable_before_bring_up() {
        let h = Harness::new("nn-0", true);
        let (status, body) = get_json(server(&h).router(), "/readiness").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, serde_json::json!({ "ready": false }));
    }

    #[tokio::test]
    async fn test_status_and_readiness_after_bring_up() {
        let h = Harness::new("nn-0", true);
        let obs: Observations = serde_json::from_value(serde_json::json!({
            "workers": {"joined_nodes": [{"name": "w1", "address": "10.0.1.1"}]}
        }))
        .unwrap();
        let obs = Observations {
            peer: Some(peer("nn-1", "10.0.0.11")),
            journal: Some(journal(3)),
            ..obs
        };
        h.coordinator.dispatch(&obs).await.unwrap();

        let router = server(&h).router();
        let (status, body) = get_json(router.clone(), "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["level"], "active");
        assert_eq!(body["phase"]["phase"], "ha-ready");
        assert_eq!(body["workers"], serde_json::json!(["w1"]));
        assert!(body["flags"].as_array().unwrap().contains(&serde_json::json!("namenode.ready")));

        let (status, body) = get_json(router.clone(), "/readiness").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);
        assert_eq!(body["hosts_table"]["10.0.0.10"], "nn-0");

        let (_, body) = get_json(router, "/hosts").await;
        assert_eq!(body["10.0.1.1"], "w1");
        assert_eq!(body["10.0.0.11"], "nn-1");
    }
}
