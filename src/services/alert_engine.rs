//! Alert engine: compares each finished analysis against the location's
//! threshold and raises at most one alert per analysis.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::services::fusion::{CombinedAssessment, RiskTier};
use crate::services::history::AnalysisRecord;
use crate::services::registry::Location;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlertRecord {
    pub id: Uuid,
    pub location_id: Uuid,
    pub owner_id: Uuid,
    pub analysis_id: Uuid,
    pub tier: String,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

/// An alert fires when the assessed tier reaches the location threshold.
pub fn should_raise(threshold: RiskTier, assessed: RiskTier) -> bool {
    assessed.rank() >= threshold.rank()
}

/// One evaluator pass raises iff the tier reaches the threshold and no
/// alert already references the analysis.
pub fn raise_decision(threshold: RiskTier, assessed: RiskTier, already_raised: bool) -> bool {
    !already_raised && should_raise(threshold, assessed)
}

pub fn render_message(location_name: &str, assessment: &CombinedAssessment) -> String {
    format!(
        "{} risk at {}: combined score {:.1} ({} confidence). {}",
        assessment.tier.as_str(),
        location_name,
        assessment.score,
        assessment.confidence.as_str(),
        assessment.action_required,
    )
}

/// Raises an alert for the analysis if warranted. Returns `None` both when
/// the tier is below threshold and when an alert for this analysis already
/// exists, so a retried check cycle never double-fires.
pub async fn evaluate(
    pool: &PgPool,
    location: &Location,
    analysis: &AnalysisRecord,
    assessment: &CombinedAssessment,
) -> Result<Option<AlertRecord>, sqlx::Error> {
    if !should_raise(location.threshold_tier(), assessment.tier) {
        return Ok(None);
    }

    let mut tx = pool.begin().await?;

    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM alerts WHERE analysis_id = $1 LIMIT 1")
            .bind(analysis.id)
            .fetch_optional(&mut *tx)
            .await?;
    if !raise_decision(
        location.threshold_tier(),
        assessment.tier,
        existing.is_some(),
    ) {
        tx.commit().await?;
        return Ok(None);
    }

    let alert: AlertRecord = sqlx::query_as(
        r#"
        INSERT INTO alerts (id, location_id, owner_id, analysis_id, tier, message, triggered_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, location_id, owner_id, analysis_id, tier, message, triggered_at, acknowledged, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(location.id)
    .bind(location.owner_id)
    .bind(analysis.id)
    .bind(assessment.tier.as_str())
    .bind(render_message(&location.name, assessment))
    .bind(analysis.analyzed_at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(alert))
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<AlertRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, location_id, owner_id, analysis_id, tier, message, triggered_at, acknowledged, created_at
        FROM alerts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_for_owner(
    pool: &PgPool,
    owner_id: Uuid,
    include_acknowledged: bool,
    limit: i64,
) -> Result<Vec<AlertRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, location_id, owner_id, analysis_id, tier, message, triggered_at, acknowledged, created_at
        FROM alerts
        WHERE owner_id = $1
          AND ($2 OR NOT acknowledged)
        ORDER BY triggered_at DESC
        LIMIT $3
        "#,
    )
    .bind(owner_id)
    .bind(include_acknowledged)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Acknowledgement is monotonic; re-acknowledging is a no-op that still
/// reports success. Returns false only when the alert does not exist.
pub async fn acknowledge(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE alerts SET acknowledged = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fusion::{fuse, DetectionSummary, RiskContribution};

    #[test]
    fn alert_fires_at_or_above_threshold_only() {
        use RiskTier::*;
        assert!(!should_raise(High, Moderate));
        assert!(should_raise(High, High));
        assert!(should_raise(High, Extreme));
        assert!(should_raise(Moderate, Moderate));
        assert!(!should_raise(Moderate, Low));
        assert!(should_raise(Low, Low));
        assert!(!should_raise(Extreme, High));
    }

    #[test]
    fn evaluator_pass_never_fires_twice_for_one_analysis() {
        use RiskTier::*;
        // First pass raises; once an alert references the analysis, every
        // later pass over the same analysis is a no-op.
        assert!(raise_decision(Moderate, High, false));
        assert!(!raise_decision(Moderate, High, true));
        assert!(!raise_decision(Low, Extreme, true));
        // Below threshold never raises regardless of history.
        assert!(!raise_decision(High, Moderate, false));
        assert!(!raise_decision(High, Moderate, true));
    }

    #[test]
    fn message_carries_tier_score_and_action() {
        let detection = DetectionSummary::from_scores(vec![0.9, 0.9, 0.9]);
        let oracle = RiskContribution::new(80.0, Vec::new());
        let assessment = fuse(Some(&detection), Some(&oracle), None);
        let message = render_message("Bay of Bengal East", &assessment);
        assert!(message.contains("HIGH"));
        assert!(message.contains("Bay of Bengal East"));
        assert!(message.contains("65.0"));
        assert!(message.contains(&assessment.action_required));
    }
}
