use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::CoreConfig;
use crate::services::monitor::MonitorService;

#[derive(Clone)]
pub struct AppState {
    pub config: CoreConfig,
    pub db: PgPool,
    pub monitor: Arc<MonitorService>,
    /// Root shutdown token; monitoring started over HTTP parents off it.
    pub shutdown: CancellationToken,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.db.clone()
    }
}
