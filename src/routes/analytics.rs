use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::map_db_error;
use crate::services::history::{self, AnalysisRecord, OwnerSummary, TrendPoint};
use crate::services::registry;
use crate::state::AppState;

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct AnalysisResponse {
    pub id: String,
    pub location_id: String,
    pub analyzed_at: String,
    pub storms_detected: i32,
    pub avg_confidence: f64,
    pub detector_risk_points: f64,
    pub oracle_score: f64,
    pub oracle_tier: String,
    pub combined_score: f64,
    pub combined_tier: String,
    #[schema(value_type = Object)]
    pub payload: JsonValue,
    pub image_ref: Option<String>,
}

impl From<AnalysisRecord> for AnalysisResponse {
    fn from(record: AnalysisRecord) -> Self {
        Self {
            id: record.id.to_string(),
            location_id: record.location_id.to_string(),
            analyzed_at: record.analyzed_at.to_rfc3339(),
            storms_detected: record.storms_detected,
            avg_confidence: record.avg_confidence,
            detector_risk_points: record.detector_risk_points,
            oracle_score: record.oracle_score,
            oracle_tier: record.oracle_tier,
            combined_score: record.combined_score,
            combined_tier: record.combined_tier,
            payload: record.payload,
            image_ref: record.image_ref,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct AnalysesListResponse {
    analyses: Vec<AnalysisResponse>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct TrendPointResponse {
    day: String,
    avg_score: f64,
    max_score: f64,
    sample_count: i64,
}

impl From<TrendPoint> for TrendPointResponse {
    fn from(point: TrendPoint) -> Self {
        Self {
            day: point.day.to_string(),
            avg_score: point.avg_score,
            max_score: point.max_score,
            sample_count: point.sample_count,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct TrendResponse {
    points: Vec<TrendPointResponse>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct TierCounts {
    extreme: i64,
    high: i64,
    moderate: i64,
    low: i64,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct SummaryResponse {
    location_count: i64,
    analysis_count: i64,
    alert_count: i64,
    open_alert_count: i64,
    avg_combined_score: f64,
    max_combined_score: f64,
    tier_counts: TierCounts,
}

impl From<OwnerSummary> for SummaryResponse {
    fn from(summary: OwnerSummary) -> Self {
        Self {
            location_count: summary.location_count,
            analysis_count: summary.analysis_count,
            alert_count: summary.alert_count,
            open_alert_count: summary.open_alert_count,
            avg_combined_score: summary.avg_combined_score,
            max_combined_score: summary.max_combined_score,
            tier_counts: TierCounts {
                extreme: summary.extreme_count,
                high: summary.high_count,
                moderate: summary.moderate_count,
                low: summary.low_count,
            },
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::IntoParams)]
pub(crate) struct AnalysesQuery {
    #[param(minimum = 1, maximum = 250)]
    limit: Option<u32>,
    /// RFC3339 lower bound on analyzed_at.
    since: Option<String>,
    /// RFC3339 upper bound on analyzed_at.
    until: Option<String>,
}

fn parse_rfc3339_optional(
    raw: Option<&str>,
    field: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, (StatusCode, String)> {
    let Some(raw) = raw else { return Ok(None) };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = chrono::DateTime::parse_from_rfc3339(trimmed)
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("{field} must be RFC3339")))?;
    Ok(Some(parsed.with_timezone(&chrono::Utc)))
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::IntoParams)]
pub(crate) struct TrendQuery {
    #[param(minimum = 1, maximum = 365)]
    days: Option<u32>,
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::IntoParams)]
pub(crate) struct SummaryQuery {
    owner_id: Uuid,
    #[param(minimum = 1, maximum = 365)]
    days: Option<u32>,
}

async fn require_location(
    db: &sqlx::PgPool,
    location_id: Uuid,
) -> Result<(), (StatusCode, String)> {
    registry::get(db, location_id)
        .await
        .map_err(map_db_error)?
        .map(|_| ())
        .ok_or((StatusCode::NOT_FOUND, "Location not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/locations/{location_id}/analyses",
    tag = "analytics",
    params(("location_id" = Uuid, Path, description = "Location id"), AnalysesQuery),
    responses(
        (status = 200, description = "Newest-first analysis history", body = AnalysesListResponse),
        (status = 404, description = "Location not found")
    )
)]
pub(crate) async fn list_analyses(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
    Query(query): Query<AnalysesQuery>,
) -> Result<Json<AnalysesListResponse>, (StatusCode, String)> {
    require_location(&state.db, location_id).await?;
    let since = parse_rfc3339_optional(query.since.as_deref(), "since")?;
    let until = parse_rfc3339_optional(query.until.as_deref(), "until")?;
    let limit = query.limit.unwrap_or(50).clamp(1, 250) as i64;
    let records = history::recent(&state.db, location_id, since, until, limit)
        .await
        .map_err(map_db_error)?;
    Ok(Json(AnalysesListResponse {
        analyses: records.into_iter().map(AnalysisResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/locations/{location_id}/trend",
    tag = "analytics",
    params(("location_id" = Uuid, Path, description = "Location id"), TrendQuery),
    responses(
        (status = 200, description = "Per-day score aggregates", body = TrendResponse),
        (status = 404, description = "Location not found")
    )
)]
pub(crate) async fn location_trend(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<TrendResponse>, (StatusCode, String)> {
    require_location(&state.db, location_id).await?;
    let days = query.days.unwrap_or(7).clamp(1, 365) as i64;
    let points = history::trend(&state.db, location_id, days)
        .await
        .map_err(map_db_error)?;
    Ok(Json(TrendResponse {
        points: points.into_iter().map(TrendPointResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/analytics/summary",
    tag = "analytics",
    params(SummaryQuery),
    responses((status = 200, description = "Owner-wide rollup", body = SummaryResponse))
)]
pub(crate) async fn owner_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, (StatusCode, String)> {
    let days = query.days.unwrap_or(7).clamp(1, 365) as i64;
    let summary = history::owner_summary(&state.db, query.owner_id, days)
        .await
        .map_err(map_db_error)?;
    Ok(Json(SummaryResponse::from(summary)))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/locations/{location_id}/analyses", get(list_analyses))
        .route("/locations/{location_id}/trend", get(location_trend))
        .route("/analytics/summary", get(owner_summary))
}
