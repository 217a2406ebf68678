use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::services::monitor::MonitorStatus;
use crate::services::registry;
use crate::state::AppState;

async fn snapshot(state: &AppState) -> MonitorStatus {
    let active = match registry::list_active(&state.db).await {
        Ok(locations) => locations,
        Err(err) => {
            tracing::warn!(error = %err, "failed to list monitored locations");
            Vec::new()
        }
    };
    state.monitor.status(&active)
}

#[utoipa::path(
    get,
    path = "/api/monitoring/status",
    tag = "monitoring",
    responses((status = 200, description = "Monitoring loop status", body = MonitorStatus))
)]
pub(crate) async fn monitoring_status(State(state): State<AppState>) -> Json<MonitorStatus> {
    Json(snapshot(&state).await)
}

#[utoipa::path(
    post,
    path = "/api/monitoring/start",
    tag = "monitoring",
    responses((status = 200, description = "Status after the start request", body = MonitorStatus))
)]
pub(crate) async fn start_monitoring(State(state): State<AppState>) -> Json<MonitorStatus> {
    state.monitor.start(&state.shutdown);
    Json(snapshot(&state).await)
}

#[utoipa::path(
    post,
    path = "/api/monitoring/stop",
    tag = "monitoring",
    responses((status = 200, description = "Status after the stop request", body = MonitorStatus))
)]
pub(crate) async fn stop_monitoring(State(state): State<AppState>) -> Json<MonitorStatus> {
    state.monitor.stop();
    Json(snapshot(&state).await)
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/monitoring/status", get(monitoring_status))
        .route("/monitoring/start", post(start_monitoring))
        .route("/monitoring/stop", post(stop_monitoring))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::routes;
    use crate::test_support;

    #[tokio::test]
    async fn status_reports_idle_before_start() {
        let app = routes::router(test_support::test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/monitoring/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["running"], serde_json::json!(false));
        assert_eq!(status["in_flight_checks"], serde_json::json!(0));
        assert!(status["locations"].as_array().is_some());
        assert!(status["last_sweep_error"].is_null());
    }

    #[tokio::test]
    async fn start_then_stop_round_trips_running_flag() {
        let state = test_support::test_state();

        let response = routes::router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/monitoring/start")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["running"], serde_json::json!(true));

        let response = routes::router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/monitoring/stop")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["running"], serde_json::json!(false));
    }
}
