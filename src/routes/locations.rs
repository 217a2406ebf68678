use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::error::{map_check_error, map_db_error};
use crate::services::fusion::RiskTier;
use crate::services::registry::{self, Location, LocationUpdate, NewLocation};
use crate::state::AppState;

#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub(crate) struct LocationCreateRequest {
    pub owner_id: Uuid,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub monitoring_enabled: Option<bool>,
    /// LOW, MODERATE, HIGH or EXTREME; defaults to MODERATE.
    pub alert_threshold: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub(crate) struct LocationUpdateRequest {
    pub name: Option<String>,
    pub monitoring_enabled: Option<bool>,
    pub alert_threshold: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::IntoParams)]
pub(crate) struct LocationsQuery {
    owner_id: Uuid,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct LocationResponse {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub monitoring_enabled: bool,
    pub alert_threshold: String,
    pub created_at: String,
    pub last_checked_at: Option<String>,
}

impl From<Location> for LocationResponse {
    fn from(location: Location) -> Self {
        Self {
            id: location.id.to_string(),
            owner_id: location.owner_id.to_string(),
            name: location.name,
            latitude: location.latitude,
            longitude: location.longitude,
            monitoring_enabled: location.monitoring_enabled,
            alert_threshold: location.alert_threshold,
            created_at: location.created_at.to_rfc3339(),
            last_checked_at: location.last_checked_at.map(|ts| ts.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct LocationsListResponse {
    locations: Vec<LocationResponse>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct CheckResponse {
    pub analysis: crate::routes::analytics::AnalysisResponse,
    pub alert: Option<crate::routes::alerts::AlertResponse>,
}

fn parse_threshold(raw: Option<&str>) -> Result<Option<RiskTier>, (StatusCode, String)> {
    let Some(raw) = raw else { return Ok(None) };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    RiskTier::parse(trimmed)
        .map(Some)
        .ok_or((
            StatusCode::BAD_REQUEST,
            "alert_threshold must be LOW, MODERATE, HIGH or EXTREME".to_string(),
        ))
}

#[utoipa::path(
    post,
    path = "/api/locations",
    tag = "locations",
    request_body = LocationCreateRequest,
    responses(
        (status = 200, description = "Registered location", body = LocationResponse),
        (status = 400, description = "Invalid request")
    )
)]
pub(crate) async fn create_location(
    State(state): State<AppState>,
    Json(payload): Json<LocationCreateRequest>,
) -> Result<Json<LocationResponse>, (StatusCode, String)> {
    let threshold = parse_threshold(payload.alert_threshold.as_deref())?;
    let location = registry::register(
        &state.db,
        NewLocation {
            owner_id: payload.owner_id,
            name: payload.name,
            latitude: payload.latitude,
            longitude: payload.longitude,
            monitoring_enabled: payload.monitoring_enabled.unwrap_or(true),
            alert_threshold: threshold.unwrap_or(RiskTier::Moderate),
        },
    )
    .await
    .map_err(map_check_error)?;
    Ok(Json(LocationResponse::from(location)))
}

#[utoipa::path(
    get,
    path = "/api/locations",
    tag = "locations",
    params(LocationsQuery),
    responses((status = 200, description = "Locations for an owner", body = LocationsListResponse))
)]
pub(crate) async fn list_locations(
    State(state): State<AppState>,
    Query(query): Query<LocationsQuery>,
) -> Result<Json<LocationsListResponse>, (StatusCode, String)> {
    let locations = registry::list_for_owner(&state.db, query.owner_id)
        .await
        .map_err(map_db_error)?;
    Ok(Json(LocationsListResponse {
        locations: locations.into_iter().map(LocationResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/locations/{location_id}",
    tag = "locations",
    params(("location_id" = Uuid, Path, description = "Location id")),
    responses(
        (status = 200, description = "Location", body = LocationResponse),
        (status = 404, description = "Location not found")
    )
)]
pub(crate) async fn get_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> Result<Json<LocationResponse>, (StatusCode, String)> {
    let location = registry::get(&state.db, location_id)
        .await
        .map_err(map_db_error)?
        .ok_or((StatusCode::NOT_FOUND, "Location not found".to_string()))?;
    Ok(Json(LocationResponse::from(location)))
}

#[utoipa::path(
    patch,
    path = "/api/locations/{location_id}",
    tag = "locations",
    params(("location_id" = Uuid, Path, description = "Location id")),
    request_body = LocationUpdateRequest,
    responses(
        (status = 200, description = "Updated location", body = LocationResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Location not found")
    )
)]
pub(crate) async fn update_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
    Json(payload): Json<LocationUpdateRequest>,
) -> Result<Json<LocationResponse>, (StatusCode, String)> {
    let threshold = parse_threshold(payload.alert_threshold.as_deref())?;
    let location = registry::update(
        &state.db,
        location_id,
        LocationUpdate {
            name: payload.name,
            monitoring_enabled: payload.monitoring_enabled,
            alert_threshold: threshold,
        },
    )
    .await
    .map_err(map_check_error)?
    .ok_or((StatusCode::NOT_FOUND, "Location not found".to_string()))?;
    Ok(Json(LocationResponse::from(location)))
}

#[utoipa::path(
    post,
    path = "/api/locations/{location_id}/check",
    tag = "locations",
    params(("location_id" = Uuid, Path, description = "Location id")),
    responses(
        (status = 200, description = "Completed check", body = CheckResponse),
        (status = 404, description = "Location not found"),
        (status = 409, description = "Check already in progress")
    )
)]
pub(crate) async fn check_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> Result<Json<CheckResponse>, (StatusCode, String)> {
    let outcome = state
        .monitor
        .trigger_manual(location_id)
        .await
        .map_err(map_check_error)?;
    Ok(Json(CheckResponse {
        analysis: outcome.analysis.into(),
        alert: outcome.alert.map(Into::into),
    }))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/locations", get(list_locations).post(create_location))
        .route(
            "/locations/{location_id}",
            get(get_location).patch(update_location),
        )
        .route("/locations/{location_id}/check", post(check_location))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::routes;
    use crate::test_support;

    async fn post_json(path: &str, body: serde_json::Value) -> axum::response::Response {
        let app = routes::router(test_support::test_state());
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn out_of_range_latitude_is_rejected_before_persistence() {
        let response = post_json(
            "/api/locations",
            serde_json::json!({
                "owner_id": uuid::Uuid::new_v4(),
                "name": "Test Coast",
                "latitude": 91.0,
                "longitude": 80.0,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_threshold_is_rejected() {
        let response = post_json(
            "/api/locations",
            serde_json::json!({
                "owner_id": uuid::Uuid::new_v4(),
                "name": "Test Coast",
                "latitude": 13.0,
                "longitude": 80.0,
                "alert_threshold": "CATASTROPHIC",
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let response = post_json(
            "/api/locations",
            serde_json::json!({
                "owner_id": uuid::Uuid::new_v4(),
                "name": "   ",
                "latitude": 13.0,
                "longitude": 80.0,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
