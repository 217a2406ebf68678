//! Oracle adapter: fetches the heuristic risk score for a location and
//! timestamp from the external oracle service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::AdapterError;
use crate::services::fusion::{RiskContribution, RiskFactor};

pub const ORACLE_SOURCE: &str = "risk-oracle";

#[async_trait]
pub trait RiskOracle: Send + Sync {
    async fn assess(
        &self,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> Result<RiskContribution, AdapterError>;
}

#[derive(Debug, Clone)]
pub struct HttpRiskOracle {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct AssessResponse {
    score: f64,
    #[serde(default)]
    factors: Vec<AssessFactor>,
}

#[derive(Debug, Deserialize)]
struct AssessFactor {
    label: String,
    #[serde(default)]
    magnitude: f64,
}

impl HttpRiskOracle {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RiskOracle for HttpRiskOracle {
    async fn assess(
        &self,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> Result<RiskContribution, AdapterError> {
        let url = format!("{}/assess", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "latitude": latitude,
                "longitude": longitude,
                "timestamp": at.to_rfc3339(),
            }))
            .send()
            .await
            .map_err(|err| AdapterError::new(ORACLE_SOURCE, err.to_string()))?;

        if !response.status().is_success() {
            return Err(AdapterError::new(
                ORACLE_SOURCE,
                format!("unexpected status {}", response.status()),
            ));
        }

        let body: AssessResponse = response
            .json()
            .await
            .map_err(|err| AdapterError::new(ORACLE_SOURCE, format!("invalid body: {err}")))?;

        let factors = body
            .factors
            .into_iter()
            .map(|f| RiskFactor {
                label: f.label,
                magnitude: f.magnitude,
            })
            .collect();

        Ok(RiskContribution::new(body.score, factors))
    }
}
