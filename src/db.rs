use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub fn connect_lazy(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(8))
        .connect_lazy(database_url)
        .with_context(|| format!("Failed to create lazy database pool for {database_url}"))
}

/// Idempotent schema bootstrap. Analyses and alerts are append-mostly;
/// nothing here ever drops or rewrites existing data.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            id UUID PRIMARY KEY,
            owner_id UUID NOT NULL,
            name TEXT NOT NULL,
            latitude DOUBLE PRECISION NOT NULL,
            longitude DOUBLE PRECISION NOT NULL,
            monitoring_enabled BOOLEAN NOT NULL DEFAULT TRUE,
            alert_threshold TEXT NOT NULL DEFAULT 'MODERATE',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            last_checked_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            id UUID PRIMARY KEY,
            location_id UUID NOT NULL REFERENCES locations (id),
            analyzed_at TIMESTAMPTZ NOT NULL,
            storms_detected INTEGER NOT NULL DEFAULT 0,
            avg_confidence DOUBLE PRECISION NOT NULL DEFAULT 0,
            detector_risk_points DOUBLE PRECISION NOT NULL DEFAULT 0,
            oracle_score DOUBLE PRECISION NOT NULL DEFAULT 0,
            oracle_tier TEXT NOT NULL DEFAULT 'LOW',
            combined_score DOUBLE PRECISION NOT NULL DEFAULT 0,
            combined_tier TEXT NOT NULL DEFAULT 'LOW',
            payload JSONB NOT NULL,
            image_ref TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS analyses_location_time_idx
        ON analyses (location_id, analyzed_at DESC)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id UUID PRIMARY KEY,
            location_id UUID NOT NULL REFERENCES locations (id),
            owner_id UUID NOT NULL,
            analysis_id UUID NOT NULL REFERENCES analyses (id),
            tier TEXT NOT NULL,
            message TEXT NOT NULL,
            triggered_at TIMESTAMPTZ NOT NULL,
            acknowledged BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id UUID PRIMARY KEY,
            owner_id UUID NOT NULL,
            alert_id UUID NOT NULL REFERENCES alerts (id),
            channel TEXT NOT NULL,
            recipient TEXT NOT NULL,
            subject TEXT,
            content TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            sent_at TIMESTAMPTZ,
            error_message TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
