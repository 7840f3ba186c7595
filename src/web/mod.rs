//! Web server module.

mod handlers;

pub use handlers::*;

use crate::monitor::Monitor;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
}

/// JSON API over a running [`Monitor`].
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self {
            state: AppState { monitor },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/api/status", get(handlers::handle_status))
            .route("/api/snapshot", get(handlers::handle_snapshot))
            .route("/api/refresh", post(handlers::handle_refresh))
            // History
            .route("/api/history", get(handlers::handle_list_series))
            .route("/api/history/{series}", get(handlers::handle_history))
            // Alerts
            .route("/api/alerts", get(handlers::handle_alerts))
            .route("/api/alerts/trend", get(handlers::handle_alert_trend))
            // Processes
            .route("/api/processes", get(handlers::handle_processes))
            .route(
                "/api/processes/analyze-high-risk",
                post(handlers::handle_analyze_high_risk),
            )
            .route(
                "/api/processes/{pid}/analyze",
                post(handlers::handle_analyze_process),
            )
            // AI
            .route(
                "/api/insights",
                get(handlers::handle_get_insight).delete(handlers::handle_clear_insight),
            )
            .route("/api/insights/analyze", post(handlers::handle_analyze_system))
            .route("/api/predictions", get(handlers::handle_predictions))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.monitor.config().http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
