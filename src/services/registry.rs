//! Location registry: the set of monitored coordinates and their
//! per-location alert thresholds.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::CheckError;
use crate::services::fusion::RiskTier;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Location {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub monitoring_enabled: bool,
    pub alert_threshold: String,
    pub created_at: DateTime<Utc>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Location {
    /// Threshold tier, falling back to MODERATE on unrecognized stored values.
    pub fn threshold_tier(&self) -> RiskTier {
        RiskTier::parse(&self.alert_threshold).unwrap_or(RiskTier::Moderate)
    }
}

#[derive(Debug, Clone)]
pub struct NewLocation {
    pub owner_id: Uuid,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub monitoring_enabled: bool,
    pub alert_threshold: RiskTier,
}

#[derive(Debug, Clone, Default)]
pub struct LocationUpdate {
    pub name: Option<String>,
    pub monitoring_enabled: Option<bool>,
    pub alert_threshold: Option<RiskTier>,
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), CheckError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(CheckError::Validation(
            "latitude must be between -90 and 90".to_string(),
        ));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(CheckError::Validation(
            "longitude must be between -180 and 180".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), CheckError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CheckError::Validation("name cannot be blank".to_string()));
    }
    if trimmed.len() > 200 {
        return Err(CheckError::Validation(
            "name must be at most 200 characters".to_string(),
        ));
    }
    Ok(())
}

pub async fn register(pool: &PgPool, new: NewLocation) -> Result<Location, CheckError> {
    validate_name(&new.name)?;
    validate_coordinates(new.latitude, new.longitude)?;

    let location: Location = sqlx::query_as(
        r#"
        INSERT INTO locations (id, owner_id, name, latitude, longitude, monitoring_enabled, alert_threshold)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, owner_id, name, latitude, longitude, monitoring_enabled, alert_threshold, created_at, last_checked_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.owner_id)
    .bind(new.name.trim())
    .bind(new.latitude)
    .bind(new.longitude)
    .bind(new.monitoring_enabled)
    .bind(new.alert_threshold.as_str())
    .fetch_one(pool)
    .await?;

    Ok(location)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Location>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, owner_id, name, latitude, longitude, monitoring_enabled, alert_threshold, created_at, last_checked_at
        FROM locations
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Location>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, owner_id, name, latitude, longitude, monitoring_enabled, alert_threshold, created_at, last_checked_at
        FROM locations
        WHERE owner_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

/// Locations eligible for the periodic sweep.
pub async fn list_active(pool: &PgPool) -> Result<Vec<Location>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT id, owner_id, name, latitude, longitude, monitoring_enabled, alert_threshold, created_at, last_checked_at
        FROM locations
        WHERE monitoring_enabled
        ORDER BY created_at
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    changes: LocationUpdate,
) -> Result<Option<Location>, CheckError> {
    if let Some(name) = changes.name.as_deref() {
        validate_name(name)?;
    }

    let location: Option<Location> = sqlx::query_as(
        r#"
        UPDATE locations
        SET name = COALESCE($2, name),
            monitoring_enabled = COALESCE($3, monitoring_enabled),
            alert_threshold = COALESCE($4, alert_threshold)
        WHERE id = $1
        RETURNING id, owner_id, name, latitude, longitude, monitoring_enabled, alert_threshold, created_at, last_checked_at
        "#,
    )
    .bind(id)
    .bind(changes.name.as_deref().map(str::trim))
    .bind(changes.monitoring_enabled)
    .bind(changes.alert_threshold.map(|t| t.as_str()))
    .fetch_optional(pool)
    .await?;

    Ok(location)
}

/// Stamps the last check time. Idempotent; never fails on a missing row.
pub async fn mark_checked(
    pool: &PgPool,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE locations SET last_checked_at = $2 WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_bounds_are_inclusive() {
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
        assert!(validate_coordinates(0.0, 0.0).is_ok());
        assert!(validate_coordinates(90.1, 0.0).is_err());
        assert!(validate_coordinates(-90.1, 0.0).is_err());
        assert!(validate_coordinates(0.0, 180.1).is_err());
        assert!(validate_coordinates(0.0, -180.1).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn blank_and_oversized_names_are_rejected() {
        assert!(validate_name("Chennai Coast").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(201)).is_err());
        assert!(validate_name(&"x".repeat(200)).is_ok());
    }

    #[test]
    fn unknown_stored_threshold_falls_back_to_moderate() {
        let location = Location {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "test".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            monitoring_enabled: true,
            alert_threshold: "SOMETHING_ELSE".to_string(),
            created_at: Utc::now(),
            last_checked_at: None,
        };
        assert_eq!(location.threshold_tier(), RiskTier::Moderate);
    }
}
