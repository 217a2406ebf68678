use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::CoreConfig;
use crate::db;
use crate::error::AdapterError;
use crate::services::detection::{DetectorOutput, StormDetector};
use crate::services::fusion::{DetectionSummary, RiskContribution};
use crate::services::monitor::MonitorService;
use crate::services::notify::LogNotifier;
use crate::services::oracle::RiskOracle;
use crate::state::AppState;

pub fn test_config() -> CoreConfig {
    CoreConfig {
        database_url: "postgresql://postgres@localhost/postgres".to_string(),
        detector_base_url: "http://127.0.0.1:8501".to_string(),
        oracle_base_url: "http://127.0.0.1:8502".to_string(),
        imagery_source: "latest".to_string(),
        check_interval_minutes: 30,
        adapter_timeout_seconds: 5,
        detection_confidence_threshold: 0.05,
        monitoring_autostart: false,
    }
}

/// Detector stub returning a fixed set of confidences.
pub struct StaticDetector {
    pub scores: Vec<f64>,
}

#[async_trait]
impl StormDetector for StaticDetector {
    async fn detect(
        &self,
        _latitude: f64,
        _longitude: f64,
        _imagery_source: &str,
    ) -> Result<DetectorOutput, AdapterError> {
        Ok(DetectorOutput {
            summary: DetectionSummary::from_scores(self.scores.clone()),
            image_ref: None,
        })
    }
}

/// Oracle stub returning a fixed score.
pub struct StaticOracle {
    pub score: f64,
}

#[async_trait]
impl RiskOracle for StaticOracle {
    async fn assess(
        &self,
        _latitude: f64,
        _longitude: f64,
        _at: DateTime<Utc>,
    ) -> Result<RiskContribution, AdapterError> {
        Ok(RiskContribution::new(self.score, Vec::new()))
    }
}

/// Detector stub that never answers; used to exercise timeout paths.
pub struct HangingDetector;

#[async_trait]
impl StormDetector for HangingDetector {
    async fn detect(
        &self,
        _latitude: f64,
        _longitude: f64,
        _imagery_source: &str,
    ) -> Result<DetectorOutput, AdapterError> {
        std::future::pending().await
    }
}

/// Detector stub that fails immediately.
pub struct FailingDetector;

#[async_trait]
impl StormDetector for FailingDetector {
    async fn detect(
        &self,
        _latitude: f64,
        _longitude: f64,
        _imagery_source: &str,
    ) -> Result<DetectorOutput, AdapterError> {
        Err(AdapterError::new("storm-detector", "connection refused"))
    }
}

/// Oracle stub that fails immediately.
pub struct FailingOracle;

#[async_trait]
impl RiskOracle for FailingOracle {
    async fn assess(
        &self,
        _latitude: f64,
        _longitude: f64,
        _at: DateTime<Utc>,
    ) -> Result<RiskContribution, AdapterError> {
        Err(AdapterError::new("risk-oracle", "connection refused"))
    }
}

pub fn test_monitor_with(
    detector: Arc<dyn StormDetector>,
    oracle: Arc<dyn RiskOracle>,
) -> MonitorService {
    let config = test_config();
    let pool = db::connect_lazy(&config.database_url).expect("connect_lazy");
    MonitorService::new(pool, config, detector, oracle, Arc::new(LogNotifier))
}

pub fn test_monitor() -> MonitorService {
    test_monitor_with(
        Arc::new(StaticDetector {
            scores: vec![0.9, 0.9, 0.9],
        }),
        Arc::new(StaticOracle { score: 60.0 }),
    )
}

pub fn test_state() -> AppState {
    let config = test_config();
    let pool = db::connect_lazy(&config.database_url).expect("connect_lazy");
    let monitor = Arc::new(MonitorService::new(
        pool.clone(),
        config.clone(),
        Arc::new(StaticDetector {
            scores: vec![0.9, 0.9, 0.9],
        }),
        Arc::new(StaticOracle { score: 60.0 }),
        Arc::new(LogNotifier),
    ));
    AppState {
        config,
        db: pool,
        monitor,
        shutdown: tokio_util::sync::CancellationToken::new(),
    }
}
