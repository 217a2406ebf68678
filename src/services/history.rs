//! Analysis history: append-only record of every check cycle plus the
//! aggregate queries built on top of it.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub location_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub storms_detected: i32,
    pub avg_confidence: f64,
    pub detector_risk_points: f64,
    pub oracle_score: f64,
    pub oracle_tier: String,
    pub combined_score: f64,
    pub combined_tier: String,
    pub payload: JsonValue,
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub location_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub storms_detected: i32,
    pub avg_confidence: f64,
    pub detector_risk_points: f64,
    pub oracle_score: f64,
    pub oracle_tier: String,
    pub combined_score: f64,
    pub combined_tier: String,
    pub payload: JsonValue,
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrendPoint {
    pub day: NaiveDate,
    pub avg_score: f64,
    pub max_score: f64,
    pub sample_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OwnerSummary {
    pub location_count: i64,
    pub analysis_count: i64,
    pub alert_count: i64,
    pub open_alert_count: i64,
    pub avg_combined_score: f64,
    pub max_combined_score: f64,
    pub extreme_count: i64,
    pub high_count: i64,
    pub moderate_count: i64,
    pub low_count: i64,
}

pub async fn append(pool: &PgPool, new: NewAnalysis) -> Result<AnalysisRecord, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO analyses (
            id, location_id, analyzed_at, storms_detected, avg_confidence,
            detector_risk_points, oracle_score, oracle_tier,
            combined_score, combined_tier, payload, image_ref
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id, location_id, analyzed_at, storms_detected, avg_confidence,
                  detector_risk_points, oracle_score, oracle_tier,
                  combined_score, combined_tier, payload, image_ref, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.location_id)
    .bind(new.analyzed_at)
    .bind(new.storms_detected)
    .bind(new.avg_confidence)
    .bind(new.detector_risk_points)
    .bind(new.oracle_score)
    .bind(new.oracle_tier)
    .bind(new.combined_score)
    .bind(new.combined_tier)
    .bind(new.payload)
    .bind(new.image_ref)
    .fetch_one(pool)
    .await
}

/// Newest-first history for one location, optionally bounded in time.
pub async fn recent(
    pool: &PgPool,
    location_id: Uuid,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<AnalysisRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, location_id, analyzed_at, storms_detected, avg_confidence,
               detector_risk_points, oracle_score, oracle_tier,
               combined_score, combined_tier, payload, image_ref, created_at
        FROM analyses
        WHERE location_id = $1
          AND ($2::timestamptz IS NULL OR analyzed_at >= $2)
          AND ($3::timestamptz IS NULL OR analyzed_at <= $3)
        ORDER BY analyzed_at DESC
        LIMIT $4
        "#,
    )
    .bind(location_id)
    .bind(since)
    .bind(until)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Per-day aggregates over the trailing window, oldest day first.
pub async fn trend(
    pool: &PgPool,
    location_id: Uuid,
    days: i64,
) -> Result<Vec<TrendPoint>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT
            date_trunc('day', analyzed_at)::date AS day,
            AVG(combined_score) AS avg_score,
            MAX(combined_score) AS max_score,
            COUNT(*) AS sample_count
        FROM analyses
        WHERE location_id = $1
          AND analyzed_at >= NOW() - ($2 || ' days')::interval
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(location_id)
    .bind(days.to_string())
    .fetch_all(pool)
    .await
}

/// Cross-location rollup for one owner over the trailing window, including
/// the tier distribution of analyses in that window.
pub async fn owner_summary(
    pool: &PgPool,
    owner_id: Uuid,
    days: i64,
) -> Result<OwnerSummary, sqlx::Error> {
    sqlx::query_as(
        r#"
        WITH windowed AS (
            SELECT a.combined_score, a.combined_tier
            FROM analyses a
            JOIN locations l ON l.id = a.location_id
            WHERE l.owner_id = $1
              AND a.analyzed_at >= NOW() - ($2 || ' days')::interval
        )
        SELECT
            (SELECT COUNT(*) FROM locations l WHERE l.owner_id = $1) AS location_count,
            (SELECT COUNT(*) FROM windowed) AS analysis_count,
            (SELECT COUNT(*)
             FROM alerts al
             WHERE al.owner_id = $1
               AND al.triggered_at >= NOW() - ($2 || ' days')::interval) AS alert_count,
            (SELECT COUNT(*)
             FROM alerts al
             WHERE al.owner_id = $1
               AND NOT al.acknowledged) AS open_alert_count,
            COALESCE((SELECT AVG(combined_score) FROM windowed), 0) AS avg_combined_score,
            COALESCE((SELECT MAX(combined_score) FROM windowed), 0) AS max_combined_score,
            (SELECT COUNT(*) FROM windowed WHERE combined_tier = 'EXTREME') AS extreme_count,
            (SELECT COUNT(*) FROM windowed WHERE combined_tier = 'HIGH') AS high_count,
            (SELECT COUNT(*) FROM windowed WHERE combined_tier = 'MODERATE') AS moderate_count,
            (SELECT COUNT(*) FROM windowed WHERE combined_tier = 'LOW') AS low_count
        "#,
    )
    .bind(owner_id)
    .bind(days.to_string())
    .fetch_one(pool)
    .await
}
