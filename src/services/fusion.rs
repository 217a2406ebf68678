//! Deterministic risk fusion: combines the detector and oracle signals
//! (plus an optional meteorological signal) into one bounded assessment.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Ordered risk classification shared by the oracle, the fusion output,
/// and per-location alert thresholds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
    Extreme,
}

impl RiskTier {
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Moderate => 2,
            Self::High => 3,
            Self::Extreme => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
            Self::Extreme => "EXTREME",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MODERATE" => Some(Self::Moderate),
            "HIGH" => Some(Self::High),
            "EXTREME" => Some(Self::Extreme),
            _ => None,
        }
    }

    /// Inclusive lower bounds on the 0-100 combined score.
    pub fn for_score(score: f64) -> Self {
        if score >= 70.0 {
            Self::Extreme
        } else if score >= 50.0 {
            Self::High
        } else if score >= 30.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detector signal quality, discretized so that a handful of noisy boxes
/// cannot skew the composite score. Ordering is by point value; the
/// classification grid is monotonic in both count and average confidence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionQuality {
    NoDetection,
    Poor,
    WeakMany,
    WeakMultiple,
    Fair,
    Moderate,
    Good,
    Excellent,
}

impl DetectionQuality {
    pub fn risk_points(self) -> f64 {
        match self {
            Self::NoDetection => 0.0,
            Self::Poor => 5.0,
            Self::WeakMany => 10.0,
            Self::WeakMultiple => 15.0,
            Self::Fair => 22.0,
            Self::Moderate => 30.0,
            Self::Good => 40.0,
            Self::Excellent => 50.0,
        }
    }

    pub fn classify(total_count: u32, avg_confidence: f64) -> Self {
        if total_count == 0 {
            return Self::NoDetection;
        }
        let count_band = if total_count >= 6 {
            2
        } else if total_count >= 3 {
            1
        } else {
            0
        };
        let confidence_band = if avg_confidence >= 0.8 {
            3
        } else if avg_confidence >= 0.5 {
            2
        } else if avg_confidence >= 0.2 {
            1
        } else {
            0
        };
        match (confidence_band, count_band) {
            (0, 0) => Self::Poor,
            (0, 1) => Self::WeakMany,
            (0, _) => Self::WeakMultiple,
            (1, 0) => Self::WeakMultiple,
            (1, 1) => Self::Fair,
            (1, _) => Self::Moderate,
            (2, 0) => Self::Moderate,
            (2, _) => Self::Good,
            (3, 0) => Self::Good,
            _ => Self::Excellent,
        }
    }
}

/// Normalized result of one detector invocation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DetectionSummary {
    pub total_count: u32,
    pub confidence_scores: Vec<f64>,
    pub avg_confidence: f64,
    pub max_confidence: f64,
    pub quality: DetectionQuality,
}

impl DetectionSummary {
    /// Builds a summary from raw per-box confidences, clamping each to [0, 1].
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let confidence_scores: Vec<f64> = scores
            .into_iter()
            .map(|score| if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 })
            .collect();
        let total_count = confidence_scores.len() as u32;
        let (avg_confidence, max_confidence) = if confidence_scores.is_empty() {
            (0.0, 0.0)
        } else {
            let sum: f64 = confidence_scores.iter().sum();
            let max = confidence_scores.iter().cloned().fold(0.0, f64::max);
            (sum / confidence_scores.len() as f64, max)
        };
        let quality = DetectionQuality::classify(total_count, avg_confidence);
        Self {
            total_count,
            confidence_scores,
            avg_confidence,
            max_confidence,
            quality,
        }
    }

    pub fn empty() -> Self {
        Self::from_scores(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RiskFactor {
    pub label: String,
    pub magnitude: f64,
}

/// Normalized result of one oracle invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RiskContribution {
    pub score: f64,
    pub tier: RiskTier,
    pub factors: Vec<RiskFactor>,
}

impl RiskContribution {
    pub fn new(score: f64, factors: Vec<RiskFactor>) -> Self {
        let score = if score.is_finite() { score.clamp(0.0, 100.0) } else { 0.0 };
        Self {
            score,
            tier: RiskTier::for_score(score),
            factors,
        }
    }
}

/// Optional third fusion source carrying structural weather indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherSignal {
    pub score: f64,
    pub indicators: Vec<String>,
}

impl WeatherSignal {
    pub fn new(score: f64, indicators: Vec<String>) -> Self {
        let score = if score.is_finite() { score.clamp(0.0, 100.0) } else { 0.0 };
        Self { score, indicators }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ConfidenceQualifier {
    High,
    Medium,
    Low,
}

impl ConfidenceQualifier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// Fusion output: a pure function of its inputs, no hidden state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CombinedAssessment {
    pub score: f64,
    pub tier: RiskTier,
    pub confidence: ConfidenceQualifier,
    pub action_required: String,
    pub recommendations: Vec<String>,
    pub detector_risk_points: f64,
    pub oracle_score: f64,
    pub weather_score: Option<f64>,
}

// Two-source baseline weights; the three-source set applies when a
// weather signal is present and is renormalized over present sources.
const WEIGHT_DETECTOR_BASE: f64 = 0.5;
const WEIGHT_ORACLE_BASE: f64 = 0.5;
const WEIGHT_DETECTOR_EXT: f64 = 0.35;
const WEIGHT_WEATHER_EXT: f64 = 0.40;
const WEIGHT_ORACLE_EXT: f64 = 0.25;

/// Combines the available signals into one bounded assessment.
///
/// `None` means the corresponding adapter failed; a missing signal
/// degrades the result (score contribution 0, confidence downgraded)
/// but never produces an error.
pub fn fuse(
    detection: Option<&DetectionSummary>,
    oracle: Option<&RiskContribution>,
    weather: Option<&WeatherSignal>,
) -> CombinedAssessment {
    let detector_risk_points = detection.map(|d| d.quality.risk_points()).unwrap_or(0.0);
    let oracle_score = oracle.map(|o| o.score).unwrap_or(0.0);

    let score = match weather {
        None => detector_risk_points * WEIGHT_DETECTOR_BASE + oracle_score * WEIGHT_ORACLE_BASE,
        Some(weather) => {
            let mut weighted = weather.score * WEIGHT_WEATHER_EXT;
            let mut total = WEIGHT_WEATHER_EXT;
            if detection.is_some() {
                weighted += detector_risk_points * WEIGHT_DETECTOR_EXT;
                total += WEIGHT_DETECTOR_EXT;
            }
            if oracle.is_some() {
                weighted += oracle_score * WEIGHT_ORACLE_EXT;
                total += WEIGHT_ORACLE_EXT;
            }
            weighted / total
        }
    };
    let score = score.min(100.0).max(0.0);
    let tier = RiskTier::for_score(score);

    let confidence = if detection.map(|d| d.total_count >= 1).unwrap_or(false) {
        ConfidenceQualifier::High
    } else if oracle.is_some() {
        ConfidenceQualifier::Medium
    } else {
        ConfidenceQualifier::Low
    };

    CombinedAssessment {
        score,
        tier,
        confidence,
        action_required: action_for(tier).to_string(),
        recommendations: recommendations_for(tier)
            .iter()
            .map(|r| r.to_string())
            .collect(),
        detector_risk_points,
        oracle_score,
        weather_score: weather.map(|w| w.score),
    }
}

pub fn action_for(tier: RiskTier) -> &'static str {
    match tier {
        RiskTier::Extreme => "Immediate evacuation and emergency response required",
        RiskTier::High => "High alert - prepare for severe weather conditions",
        RiskTier::Moderate => "Moderate risk - maintain preparedness and monitor conditions",
        RiskTier::Low => "Low risk - standard monitoring recommended",
    }
}

pub fn recommendations_for(tier: RiskTier) -> &'static [&'static str] {
    match tier {
        RiskTier::Extreme => &[
            "Immediate evacuation of coastal areas",
            "Activate emergency response protocols",
            "Issue highest level weather warnings",
            "Prepare emergency medical facilities",
            "Deploy rescue and relief teams",
        ],
        RiskTier::High => &[
            "Issue high-level weather alerts",
            "Prepare evacuation plans",
            "Activate emergency communication systems",
            "Pre-position emergency response teams",
            "Alert medical facilities",
        ],
        RiskTier::Moderate => &[
            "Issue weather advisories",
            "Review evacuation procedures",
            "Monitor weather conditions closely",
            "Prepare emergency response teams",
            "Keep public informed of developments",
        ],
        RiskTier::Low => &[
            "Continue standard weather monitoring",
            "Maintain public awareness programs",
            "Regular preparedness reviews",
            "Monitor satellite imagery",
            "Document conditions for future reference",
        ],
    }
}
