//! Monitoring service: periodic sweeps over active locations plus
//! on-demand checks, with one check in flight per location.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::error::{AdapterError, CheckError};
use crate::services::alert_engine::{self, AlertRecord};
use crate::services::detection::{DetectorOutput, StormDetector, DETECTOR_SOURCE};
use crate::services::fusion::{fuse, CombinedAssessment, RiskContribution};
use crate::services::history::{self, AnalysisRecord, NewAnalysis};
use crate::services::notify::{self, NotificationSink};
use crate::services::oracle::{RiskOracle, ORACLE_SOURCE};
use crate::services::registry::{self, Location};

pub struct MonitorService {
    pool: PgPool,
    config: CoreConfig,
    detector: Arc<dyn StormDetector>,
    oracle: Arc<dyn RiskOracle>,
    sink: Arc<dyn NotificationSink>,
    running: AtomicBool,
    /// Bumped on every start; a sweep task may only clear `running` if its
    /// generation is still current, so a stale task cannot clobber a restart.
    sweep_generation: AtomicU64,
    sweep_cancel: Mutex<Option<CancellationToken>>,
    in_flight: Mutex<HashSet<Uuid>>,
    last_sweep_at: Mutex<Option<DateTime<Utc>>>,
    last_sweep_error: Mutex<Option<String>>,
    last_errors: Mutex<HashMap<Uuid, String>>,
}

/// Everything one finished check produced.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub location_id: Uuid,
    pub analysis: AnalysisRecord,
    pub assessment: CombinedAssessment,
    pub alert: Option<AlertRecord>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LocationCheckStatus {
    pub id: Uuid,
    pub name: String,
    pub alert_threshold: String,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Error text from the most recent sweep, if that check failed.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonitorStatus {
    pub running: bool,
    pub check_interval_minutes: u64,
    pub monitored_locations: i64,
    pub in_flight_checks: usize,
    pub last_sweep_at: Option<DateTime<Utc>>,
    pub last_sweep_error: Option<String>,
    pub locations: Vec<LocationCheckStatus>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the per-location slot when the check finishes, however it ends.
struct InFlightPermit<'a> {
    service: &'a MonitorService,
    location_id: Uuid,
}

impl Drop for InFlightPermit<'_> {
    fn drop(&mut self) {
        lock(&self.service.in_flight).remove(&self.location_id);
    }
}

fn build_analysis(
    location_id: Uuid,
    analyzed_at: DateTime<Utc>,
    detector_output: Option<&DetectorOutput>,
    oracle_output: Option<&RiskContribution>,
    assessment: &CombinedAssessment,
) -> NewAnalysis {
    let detection = detector_output.map(|output| &output.summary);
    NewAnalysis {
        location_id,
        analyzed_at,
        storms_detected: detection.map(|d| d.total_count as i32).unwrap_or(0),
        avg_confidence: detection.map(|d| d.avg_confidence).unwrap_or(0.0),
        detector_risk_points: assessment.detector_risk_points,
        oracle_score: assessment.oracle_score,
        oracle_tier: oracle_output
            .map(|o| o.tier.as_str())
            .unwrap_or("LOW")
            .to_string(),
        combined_score: assessment.score,
        combined_tier: assessment.tier.as_str().to_string(),
        payload: serde_json::json!({
            "assessment": assessment,
            "detection": detection,
            "oracle": oracle_output,
        }),
        image_ref: detector_output.and_then(|o| o.image_ref.clone()),
    }
}

impl MonitorService {
    pub fn new(
        pool: PgPool,
        config: CoreConfig,
        detector: Arc<dyn StormDetector>,
        oracle: Arc<dyn RiskOracle>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            pool,
            config,
            detector,
            oracle,
            sink,
            running: AtomicBool::new(false),
            sweep_generation: AtomicU64::new(0),
            sweep_cancel: Mutex::new(None),
            in_flight: Mutex::new(HashSet::new()),
            last_sweep_at: Mutex::new(None),
            last_sweep_error: Mutex::new(None),
            last_errors: Mutex::new(HashMap::new()),
        }
    }

    /// Starts the periodic sweep loop. A second start while running is a
    /// logged no-op; returns whether this call actually started the loop.
    pub fn start(self: &Arc<Self>, cancel: &CancellationToken) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("monitoring already running; start ignored");
            return false;
        }

        let generation = self.sweep_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let child = cancel.child_token();
        *lock(&self.sweep_cancel) = Some(child.clone());

        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(
                service.config.check_interval_minutes.max(1) * 60,
            ));
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => service.sweep().await,
                }
            }
            // Stale tasks from a previous start must not clear the flag.
            if service.sweep_generation.load(Ordering::SeqCst) == generation {
                service.running.store(false, Ordering::SeqCst);
            }
        });
        true
    }

    /// Stops the sweep loop; in-flight checks run to completion.
    pub fn stop(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            tracing::warn!("monitoring not running; stop ignored");
            return false;
        }
        if let Some(cancel) = lock(&self.sweep_cancel).take() {
            cancel.cancel();
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// In-memory snapshot joined with the caller-supplied active location
    /// list, so status stays usable when the database is unreachable.
    pub fn status(&self, active: &[Location]) -> MonitorStatus {
        let errors = lock(&self.last_errors);
        let locations = active
            .iter()
            .map(|location| LocationCheckStatus {
                id: location.id,
                name: location.name.clone(),
                alert_threshold: location.alert_threshold.clone(),
                last_checked_at: location.last_checked_at,
                last_error: errors.get(&location.id).cloned(),
            })
            .collect();
        MonitorStatus {
            running: self.is_running(),
            check_interval_minutes: self.config.check_interval_minutes,
            monitored_locations: active.len() as i64,
            in_flight_checks: lock(&self.in_flight).len(),
            last_sweep_at: *lock(&self.last_sweep_at),
            last_sweep_error: lock(&self.last_sweep_error).clone(),
            locations,
        }
    }

    /// One pass over all active locations. Per-location failures are
    /// isolated; the sweep always runs to the end of the list.
    pub async fn sweep(&self) {
        let locations = match registry::list_active(&self.pool).await {
            Ok(locations) => {
                *lock(&self.last_sweep_error) = None;
                locations
            }
            Err(err) => {
                tracing::warn!(error = %err, "monitor sweep failed to list locations");
                *lock(&self.last_sweep_error) = Some(err.to_string());
                *lock(&self.last_sweep_at) = Some(Utc::now());
                return;
            }
        };

        let checks = locations.into_iter().map(|location| async move {
            let id = location.id;
            let name = location.name.clone();
            let result = self.run_check(location).await;
            (id, name, result)
        });
        let results = futures::future::join_all(checks).await;

        let mut errors = HashMap::new();
        for (id, name, result) in results {
            if let Err(err) = result {
                tracing::warn!(error = %err, location = %name, "location check failed");
                errors.insert(id, err.to_string());
            }
        }
        *lock(&self.last_errors) = errors;
        *lock(&self.last_sweep_at) = Some(Utc::now());
    }

    /// Runs the standard check cycle for one location on demand.
    pub async fn trigger_manual(&self, location_id: Uuid) -> Result<CheckOutcome, CheckError> {
        let location = registry::get(&self.pool, location_id)
            .await?
            .filter(|location| location.monitoring_enabled)
            .ok_or(CheckError::LocationUnavailable)?;
        self.run_check(location).await
    }

    fn begin_check(&self, location_id: Uuid) -> Result<InFlightPermit<'_>, CheckError> {
        let mut in_flight = lock(&self.in_flight);
        if !in_flight.insert(location_id) {
            return Err(CheckError::CheckInProgress(location_id));
        }
        Ok(InFlightPermit {
            service: self,
            location_id,
        })
    }

    /// Issues both adapter calls concurrently, each under its own timeout,
    /// so a hung adapter cannot discard the other's completed result.
    async fn collect_signals(
        &self,
        location: &Location,
        analyzed_at: DateTime<Utc>,
    ) -> (Option<DetectorOutput>, Option<RiskContribution>) {
        let timeout_seconds = self.config.adapter_timeout_seconds;
        let per_call = Duration::from_secs(timeout_seconds);

        let detect = tokio::time::timeout(
            per_call,
            self.detector.detect(
                location.latitude,
                location.longitude,
                &self.config.imagery_source,
            ),
        );
        let assess = tokio::time::timeout(
            per_call,
            self.oracle
                .assess(location.latitude, location.longitude, analyzed_at),
        );
        let (detect_result, assess_result) = tokio::join!(detect, assess);

        let detector_output = match detect_result
            .unwrap_or_else(|_| Err(AdapterError::timed_out(DETECTOR_SOURCE, timeout_seconds)))
        {
            Ok(output) => Some(output),
            Err(err) => {
                tracing::warn!(error = %err, location = %location.name, "detector unavailable");
                None
            }
        };
        let oracle_output = match assess_result
            .unwrap_or_else(|_| Err(AdapterError::timed_out(ORACLE_SOURCE, timeout_seconds)))
        {
            Ok(output) => Some(output),
            Err(err) => {
                tracing::warn!(error = %err, location = %location.name, "oracle unavailable");
                None
            }
        };

        (detector_output, oracle_output)
    }

    /// Full check cycle: collect signals, fuse, persist, then alert.
    /// Adapter failures degrade the assessment instead of failing the cycle.
    pub async fn run_check(&self, location: Location) -> Result<CheckOutcome, CheckError> {
        let _permit = self.begin_check(location.id)?;
        let analyzed_at = Utc::now();

        let (detector_output, oracle_output) = self.collect_signals(&location, analyzed_at).await;

        let detection = detector_output.as_ref().map(|output| &output.summary);
        let assessment = fuse(detection, oracle_output.as_ref(), None);

        let analysis = history::append(
            &self.pool,
            build_analysis(
                location.id,
                analyzed_at,
                detector_output.as_ref(),
                oracle_output.as_ref(),
                &assessment,
            ),
        )
        .await?;

        registry::mark_checked(&self.pool, location.id, analyzed_at).await?;

        let alert = alert_engine::evaluate(&self.pool, &location, &analysis, &assessment).await?;
        if let Some(alert) = &alert {
            if let Err(err) =
                notify::dispatch(&self.pool, self.sink.as_ref(), alert, &location).await
            {
                tracing::warn!(error = %err, alert_id = %alert.id, "failed to record notification");
            }
        }

        Ok(CheckOutcome {
            location_id: location.id,
            analysis,
            assessment,
            alert,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fusion::{ConfidenceQualifier, RiskTier};
    use crate::test_support;

    fn sample_location() -> Location {
        Location {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Chennai Coast".to_string(),
            latitude: 13.08,
            longitude: 80.27,
            monitoring_enabled: true,
            alert_threshold: "MODERATE".to_string(),
            created_at: Utc::now(),
            last_checked_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn second_check_for_same_location_is_rejected() {
        let service = test_support::test_monitor();
        let location_id = Uuid::new_v4();

        let first = service.begin_check(location_id);
        assert!(first.is_ok());

        match service.begin_check(location_id) {
            Ok(_) => panic!("expected a held permit to reject the second check"),
            Err(CheckError::CheckInProgress(id)) => assert_eq!(id, location_id),
            Err(other) => panic!("expected CheckInProgress, got {other}"),
        }

        // Different location is unaffected by the held permit.
        assert!(service.begin_check(Uuid::new_v4()).is_ok());

        drop(first);
        assert!(service.begin_check(location_id).is_ok());
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let service = Arc::new(test_support::test_monitor());
        let cancel = CancellationToken::new();

        assert!(service.start(&cancel));
        assert!(service.is_running());
        assert!(!service.start(&cancel));

        assert!(service.stop());
        assert!(!service.is_running());
        assert!(!service.stop());

        cancel.cancel();
    }

    #[tokio::test]
    async fn restart_after_stop_keeps_the_new_loop_running() {
        let service = Arc::new(test_support::test_monitor());
        let cancel = CancellationToken::new();

        assert!(service.start(&cancel));
        assert!(service.stop());
        assert!(service.start(&cancel));

        // Give the cancelled first task time to observe its token and exit.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(service.is_running());

        assert!(service.stop());
        cancel.cancel();
    }

    #[tokio::test]
    async fn fresh_service_reports_idle_status() {
        let service = test_support::test_monitor();
        let status = service.status(&[]);
        assert!(!status.running);
        assert_eq!(status.monitored_locations, 0);
        assert_eq!(status.in_flight_checks, 0);
        assert!(status.last_sweep_at.is_none());
        assert!(status.last_sweep_error.is_none());
        assert!(status.locations.is_empty());
    }

    #[tokio::test]
    async fn status_carries_per_location_check_state() {
        let service = test_support::test_monitor();
        let location = sample_location();
        lock(&service.last_errors)
            .insert(location.id, "risk-oracle: connection refused".to_string());

        let status = service.status(std::slice::from_ref(&location));
        assert_eq!(status.monitored_locations, 1);
        let entry = &status.locations[0];
        assert_eq!(entry.id, location.id);
        assert_eq!(entry.name, location.name);
        assert_eq!(entry.alert_threshold, "MODERATE");
        assert_eq!(entry.last_checked_at, location.last_checked_at);
        assert_eq!(
            entry.last_error.as_deref(),
            Some("risk-oracle: connection refused")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_detector_does_not_discard_oracle_signal() {
        let service = test_support::test_monitor_with(
            Arc::new(test_support::HangingDetector),
            Arc::new(test_support::StaticOracle { score: 65.0 }),
        );
        let location = sample_location();

        let (detector_output, oracle_output) =
            service.collect_signals(&location, Utc::now()).await;
        assert!(detector_output.is_none());
        let oracle = oracle_output.expect("oracle result survives detector timeout");
        assert_eq!(oracle.score, 65.0);

        let assessment = fuse(None, Some(&oracle), None);
        assert_eq!(assessment.score, 32.5);
        assert_eq!(assessment.tier, RiskTier::Moderate);
        assert_eq!(assessment.confidence, ConfidenceQualifier::Medium);
    }

    #[tokio::test]
    async fn failed_adapters_still_yield_an_analysis_row() {
        let service = test_support::test_monitor_with(
            Arc::new(test_support::FailingDetector),
            Arc::new(test_support::FailingOracle),
        );
        let location = sample_location();
        let analyzed_at = Utc::now();

        let (detector_output, oracle_output) =
            service.collect_signals(&location, analyzed_at).await;
        assert!(detector_output.is_none());
        assert!(oracle_output.is_none());

        let assessment = fuse(None, None, None);
        let analysis = build_analysis(location.id, analyzed_at, None, None, &assessment);
        assert_eq!(analysis.storms_detected, 0);
        assert_eq!(analysis.avg_confidence, 0.0);
        assert_eq!(analysis.combined_score, 0.0);
        assert_eq!(analysis.combined_tier, "LOW");
        assert_eq!(analysis.oracle_tier, "LOW");

        // A degraded LOW assessment only fires on a LOW threshold.
        assert!(alert_engine::raise_decision(
            RiskTier::Low,
            assessment.tier,
            false
        ));
        assert!(!alert_engine::raise_decision(
            RiskTier::Moderate,
            assessment.tier,
            false
        ));
    }
}
