use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::error::map_db_error;
use crate::services::alert_engine::{self, AlertRecord};
use crate::state::AppState;

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct AlertResponse {
    pub id: String,
    pub location_id: String,
    pub owner_id: String,
    pub analysis_id: String,
    pub tier: String,
    pub message: String,
    pub triggered_at: String,
    pub acknowledged: bool,
    pub created_at: String,
}

impl From<AlertRecord> for AlertResponse {
    fn from(alert: AlertRecord) -> Self {
        Self {
            id: alert.id.to_string(),
            location_id: alert.location_id.to_string(),
            owner_id: alert.owner_id.to_string(),
            analysis_id: alert.analysis_id.to_string(),
            tier: alert.tier,
            message: alert.message,
            triggered_at: alert.triggered_at.to_rfc3339(),
            acknowledged: alert.acknowledged,
            created_at: alert.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct AlertsListResponse {
    alerts: Vec<AlertResponse>,
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::IntoParams)]
pub(crate) struct AlertsQuery {
    owner_id: Uuid,
    include_acknowledged: Option<bool>,
    #[param(minimum = 1, maximum = 250)]
    limit: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/api/alerts",
    tag = "alerts",
    params(AlertsQuery),
    responses((status = 200, description = "Alerts for an owner, newest first", body = AlertsListResponse))
)]
pub(crate) async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<AlertsListResponse>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(100).clamp(1, 250) as i64;
    let alerts = alert_engine::list_for_owner(
        &state.db,
        query.owner_id,
        query.include_acknowledged.unwrap_or(false),
        limit,
    )
    .await
    .map_err(map_db_error)?;
    Ok(Json(AlertsListResponse {
        alerts: alerts.into_iter().map(AlertResponse::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/alerts/{alert_id}/acknowledge",
    tag = "alerts",
    params(("alert_id" = Uuid, Path, description = "Alert id")),
    responses(
        (status = 200, description = "Acknowledged alert", body = AlertResponse),
        (status = 404, description = "Alert not found")
    )
)]
pub(crate) async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<AlertResponse>, (StatusCode, String)> {
    let acknowledged = alert_engine::acknowledge(&state.db, alert_id)
        .await
        .map_err(map_db_error)?;
    if !acknowledged {
        return Err((StatusCode::NOT_FOUND, "Alert not found".to_string()));
    }
    let alert = alert_engine::get(&state.db, alert_id)
        .await
        .map_err(map_db_error)?
        .ok_or((StatusCode::NOT_FOUND, "Alert not found".to_string()))?;
    Ok(Json(AlertResponse::from(alert)))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/{alert_id}/acknowledge", post(acknowledge_alert))
}
