use anyhow::{Context, Result};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use magi_engine::{DecisionParser, Orchestrator};
use magi_services::{AlertSink, SecurityGate, WeightStore};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::{handler, middleware};

/// Everything a request handler can reach
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub parser: DecisionParser,
    pub weights: WeightStore,
    pub gate: Arc<SecurityGate>,
    pub alerts: Arc<dyn AlertSink>,
    pub config: ServerConfig,
}

impl AppState {
    /// Weights are required for every analyst unit
    pub fn new(orchestrator: Orchestrator, alerts: Arc<dyn AlertSink>, config: ServerConfig) -> Self {
        let required = orchestrator
            .analyst_slots()
            .map(|slot| slot.unit.clone())
            .collect();

        Self {
            parser: DecisionParser::default(),
            weights: WeightStore::new(required),
            gate: Arc::new(SecurityGate::new(config.security.clone())),
            orchestrator,
            alerts,
            config,
        }
    }
}

pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(handler::health))
            .route("/status", get(handler::status))
            .route("/api/consensus", post(handler::consensus))
            .route("/api/analyze", post(handler::analyze))
            .route("/api/providers/health", get(handler::providers_health))
            .route("/api/weights", get(handler::get_weights))
            .route("/admin/weights", put(handler::put_weights))
            .route("/admin/security/status", get(handler::security_status))
            // Unmatched paths still pass through the gate
            .fallback(handler::not_found)
            // The gate wraps CORS so preflights are counted too
            .layer(cors)
            .layer(from_fn_with_state(self.state.clone(), middleware::security_gate))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        tracing::info!("✅ MAGI API listening on http://{}", addr);

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
