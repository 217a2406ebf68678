use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health,
        crate::routes::locations::create_location,
        crate::routes::locations::list_locations,
        crate::routes::locations::get_location,
        crate::routes::locations::update_location,
        crate::routes::locations::check_location,
        crate::routes::analytics::list_analyses,
        crate::routes::analytics::location_trend,
        crate::routes::analytics::owner_summary,
        crate::routes::alerts::list_alerts,
        crate::routes::alerts::acknowledge_alert,
        crate::routes::monitoring::monitoring_status,
        crate::routes::monitoring::start_monitoring,
        crate::routes::monitoring::stop_monitoring,
    ),
    components(schemas(
        crate::routes::health::HealthResponse,
        crate::routes::locations::LocationCreateRequest,
        crate::routes::locations::LocationUpdateRequest,
        crate::routes::locations::LocationResponse,
        crate::routes::locations::LocationsListResponse,
        crate::routes::locations::CheckResponse,
        crate::routes::analytics::AnalysisResponse,
        crate::routes::analytics::AnalysesListResponse,
        crate::routes::analytics::TrendPointResponse,
        crate::routes::analytics::TrendResponse,
        crate::routes::analytics::SummaryResponse,
        crate::routes::analytics::TierCounts,
        crate::routes::alerts::AlertResponse,
        crate::routes::alerts::AlertsListResponse,
        crate::services::monitor::MonitorStatus,
        crate::services::monitor::LocationCheckStatus,
        crate::services::fusion::RiskTier,
        crate::services::fusion::DetectionQuality,
        crate::services::fusion::DetectionSummary,
        crate::services::fusion::RiskFactor,
        crate::services::fusion::RiskContribution,
        crate::services::fusion::WeatherSignal,
        crate::services::fusion::ConfidenceQualifier,
        crate::services::fusion::CombinedAssessment,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "locations", description = "Monitored location registry"),
        (name = "analytics", description = "Analysis history and rollups"),
        (name = "alerts", description = "Raised alerts"),
        (name = "monitoring", description = "Periodic monitoring loop")
    )
)]
pub struct ApiDoc;

pub fn openapi_json() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = openapi_json();
        for path in [
            "/health",
            "/api/locations",
            "/api/locations/{location_id}",
            "/api/locations/{location_id}/check",
            "/api/locations/{location_id}/analyses",
            "/api/locations/{location_id}/trend",
            "/api/analytics/summary",
            "/api/alerts",
            "/api/alerts/{alert_id}/acknowledge",
            "/api/monitoring/status",
            "/api/monitoring/start",
            "/api/monitoring/stop",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
