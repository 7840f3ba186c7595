//! HTTP request handlers.

use super::AppState;
use crate::alerts::{AlertFilter, FeedFilter};
use crate::history::SeriesKey;
use crate::insight::AnalysisError;
use crate::processes::ProcessQuery;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

// ============================================================================
// Errors
// ============================================================================

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn analysis_error(e: AnalysisError) -> Response {
    let status = match &e {
        AnalysisError::AlreadyAnalyzing(_) | AnalysisError::SystemBusy => StatusCode::CONFLICT,
        AnalysisError::UnknownProcess(_) => StatusCode::NOT_FOUND,
        AnalysisError::Disabled | AnalysisError::NoSnapshot => StatusCode::SERVICE_UNAVAILABLE,
        AnalysisError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AnalysisError::Service(_) => StatusCode::BAD_GATEWAY,
    };
    error_json(status, e.to_string())
}

// ============================================================================
// Status & snapshot
// ============================================================================

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.status())
}

pub async fn handle_snapshot(State(state): State<AppState>) -> Response {
    match state.monitor.snapshot() {
        Some(snapshot) => Json(snapshot.as_ref().clone()).into_response(),
        None => error_json(StatusCode::SERVICE_UNAVAILABLE, "no metrics snapshot received yet"),
    }
}

pub async fn handle_refresh(State(state): State<AppState>) -> impl IntoResponse {
    let triggered = state.monitor.refresh();
    Json(json!({ "triggered": triggered }))
}

// ============================================================================
// History
// ============================================================================

pub async fn handle_list_series(State(state): State<AppState>) -> impl IntoResponse {
    let series: Vec<String> = state
        .monitor
        .series()
        .iter()
        .map(ToString::to_string)
        .collect();
    Json(series)
}

pub async fn handle_history(
    State(state): State<AppState>,
    Path(series): Path<String>,
) -> Response {
    match series.parse::<SeriesKey>() {
        Ok(key) => Json(state.monitor.history(key)).into_response(),
        Err(e) => error_json(StatusCode::NOT_FOUND, e),
    }
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub feed: Option<String>,
}

pub async fn handle_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Response {
    let filter = match query.filter.as_deref().map(str::parse::<AlertFilter>) {
        None => AlertFilter::All,
        Some(Ok(f)) => f,
        Some(Err(e)) => return error_json(StatusCode::BAD_REQUEST, e),
    };
    let feed_filter = match query.feed.as_deref().map(str::parse::<FeedFilter>) {
        None => FeedFilter::All,
        Some(Ok(f)) => f,
        Some(Err(e)) => return error_json(StatusCode::BAD_REQUEST, e),
    };

    Json(state.monitor.alerts(filter, feed_filter)).into_response()
}

pub async fn handle_alert_trend(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.alert_trend(Utc::now()))
}

// ============================================================================
// Processes
// ============================================================================

pub async fn handle_processes(
    State(state): State<AppState>,
    Query(query): Query<ProcessQuery>,
) -> impl IntoResponse {
    Json(state.monitor.processes(&query))
}

pub async fn handle_analyze_process(
    State(state): State<AppState>,
    Path(pid): Path<u32>,
) -> Response {
    match state.monitor.analyze_process(pid).await {
        Ok(predictions) => Json(predictions).into_response(),
        Err(e) => analysis_error(e),
    }
}

pub async fn handle_analyze_high_risk(State(state): State<AppState>) -> Response {
    match state.monitor.analyze_high_risk().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => analysis_error(e),
    }
}

// ============================================================================
// Insights
// ============================================================================

pub async fn handle_get_insight(State(state): State<AppState>) -> Response {
    match state.monitor.insight() {
        Some(record) => Json(record).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn handle_clear_insight(State(state): State<AppState>) -> impl IntoResponse {
    state.monitor.clear_insight();
    StatusCode::NO_CONTENT
}

pub async fn handle_analyze_system(State(state): State<AppState>) -> Response {
    match state.monitor.analyze_system().await {
        Ok(record) => Json(record).into_response(),
        Err(e) => analysis_error(e),
    }
}

pub async fn handle_predictions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.predictions())
}

#[cfg(test)]
mod tests {
    use crate::config::MonitorConfig;
    use crate::model::{ProcessSample, Snapshot};
    use crate::monitor::Monitor;
    use crate::source::{SampleSource, SourceError};
    use crate::web::Server;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct EmptySource;

    #[async_trait]
    impl SampleSource for EmptySource {
        async fn fetch(&self) -> Result<Snapshot, SourceError> {
            Err(SourceError::Http(500))
        }
    }

    fn server() -> (Arc<Monitor>, axum::Router) {
        let monitor = Monitor::new(MonitorConfig::default(), Arc::new(EmptySource), None);
        let router = Server::new(monitor.clone()).routes();
        (monitor, router)
    }

    async fn send(router: axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_status_before_first_poll() {
        let (_, router) = server();
        let (status, body) = send(router, "GET", "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], false);
        assert_eq!(body["lastUpdateText"], "Never updated");
        assert_eq!(body["aiEnabled"], false);
    }

    #[tokio::test]
    async fn test_snapshot_unavailable_then_served() {
        let (monitor, router) = server();
        let (status, _) = send(router.clone(), "GET", "/api/snapshot").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let mut s = Snapshot::default();
        s.dashboard.cpu_usage = 12.5;
        monitor.ingest(Arc::new(s));
        let (status, body) = send(router, "GET", "/api/snapshot").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dashboard"]["cpuUsage"], 12.5);
    }

    #[tokio::test]
    async fn test_history_routes() {
        let (monitor, router) = server();
        monitor.ingest(Arc::new(Snapshot::default()));

        let (status, body) = send(router.clone(), "GET", "/api/history/cpu").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["capacity"], 20);
        assert_eq!(body["samples"].as_array().unwrap().len(), 1);

        let (status, _) = send(router, "GET", "/api/history/gpu").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_alert_filter_validation() {
        let (_, router) = server();
        let (status, _) = send(router.clone(), "GET", "/api/alerts?filter=warning").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(router.clone(), "GET", "/api/alerts?filter=&feed=").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(router, "GET", "/api/alerts?filter=loud").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_processes_and_analysis_errors() {
        let (monitor, router) = server();
        let mut s = Snapshot::default();
        s.processes.push(ProcessSample {
            pid: 42,
            name: "java".to_string(),
            cpu_usage: 80.0,
            state: "RUNNING".to_string(),
            ..Default::default()
        });
        monitor.ingest(Arc::new(s));

        let (status, body) = send(router.clone(), "GET", "/api/processes?search=jav&sort=pid").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["pid"], 42);
        assert_eq!(body[0]["riskScore"], 60);

        let (status, _) = send(router.clone(), "POST", "/api/processes/7/analyze").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(router.clone(), "POST", "/api/processes/42/analyze").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = send(router.clone(), "POST", "/api/insights/analyze").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], false);

        let (status, _) = send(router.clone(), "DELETE", "/api/insights").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(router, "GET", "/api/insights").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_refresh_when_stopped() {
        let (_, router) = server();
        let (status, body) = send(router, "POST", "/api/refresh").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["triggered"], false);
    }
}
