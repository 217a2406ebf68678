pub mod alerts;
pub mod analytics;
pub mod health;
pub mod locations;
pub mod monitoring;

use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(crate::openapi::openapi_json())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            Router::new()
                .merge(locations::router())
                .merge(analytics::router())
                .merge(alerts::router())
                .merge(monitoring::router())
                .route("/openapi.json", get(openapi_json)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
