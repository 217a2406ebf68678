//! Detector adapter: turns satellite imagery analysis from the external
//! detection service into a normalized [`DetectionSummary`].

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AdapterError;
use crate::services::fusion::DetectionSummary;

pub const DETECTOR_SOURCE: &str = "storm-detector";

/// What one detector call yields besides the summary itself.
#[derive(Debug, Clone)]
pub struct DetectorOutput {
    pub summary: DetectionSummary,
    /// Reference to the imagery frame the detector analyzed, if it reports one.
    pub image_ref: Option<String>,
}

#[async_trait]
pub trait StormDetector: Send + Sync {
    async fn detect(
        &self,
        latitude: f64,
        longitude: f64,
        imagery_source: &str,
    ) -> Result<DetectorOutput, AdapterError>;
}

#[derive(Debug, Clone)]
pub struct HttpStormDetector {
    http: reqwest::Client,
    base_url: String,
    confidence_threshold: f64,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<DetectionBox>,
    #[serde(default)]
    image_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetectionBox {
    confidence: f64,
}

impl HttpStormDetector {
    pub fn new(http: reqwest::Client, base_url: String, confidence_threshold: f64) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            confidence_threshold,
        }
    }
}

#[async_trait]
impl StormDetector for HttpStormDetector {
    async fn detect(
        &self,
        latitude: f64,
        longitude: f64,
        imagery_source: &str,
    ) -> Result<DetectorOutput, AdapterError> {
        let url = format!("{}/detect", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "latitude": latitude,
                "longitude": longitude,
                "source": imagery_source,
                "confidence_threshold": self.confidence_threshold,
            }))
            .send()
            .await
            .map_err(|err| AdapterError::new(DETECTOR_SOURCE, err.to_string()))?;

        if !response.status().is_success() {
            return Err(AdapterError::new(
                DETECTOR_SOURCE,
                format!("unexpected status {}", response.status()),
            ));
        }

        let body: DetectResponse = response
            .json()
            .await
            .map_err(|err| AdapterError::new(DETECTOR_SOURCE, format!("invalid body: {err}")))?;

        let scores: Vec<f64> = body
            .detections
            .into_iter()
            .map(|b| b.confidence)
            .filter(|c| *c >= self.confidence_threshold)
            .collect();

        Ok(DetectorOutput {
            summary: DetectionSummary::from_scores(scores),
            image_ref: body.image_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let detector =
            HttpStormDetector::new(reqwest::Client::new(), "http://detector:8501/".to_string(), 0.05);
        assert_eq!(detector.base_url, "http://detector:8501");
    }
}
