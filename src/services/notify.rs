//! Notification dispatch. Every delivery attempt is recorded in the
//! notifications table; a failing sink never fails the check cycle.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AdapterError;
use crate::services::alert_engine::AlertRecord;
use crate::services::registry::Location;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn channel(&self) -> &'static str;

    async fn deliver(&self, alert: &AlertRecord, location: &Location) -> Result<(), AdapterError>;
}

/// Default sink: emits the alert to the structured log stream.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    fn channel(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, alert: &AlertRecord, location: &Location) -> Result<(), AdapterError> {
        tracing::info!(
            alert_id = %alert.id,
            location_id = %location.id,
            tier = %alert.tier,
            message = %alert.message,
            "storm alert raised"
        );
        Ok(())
    }
}

/// Records the attempt as PENDING, runs the sink, then settles the row to
/// SENT or FAILED.
pub async fn dispatch(
    pool: &PgPool,
    sink: &dyn NotificationSink,
    alert: &AlertRecord,
    location: &Location,
) -> Result<(), sqlx::Error> {
    let notification_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO notifications (id, owner_id, alert_id, channel, recipient, subject, content, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING')
        "#,
    )
    .bind(notification_id)
    .bind(alert.owner_id)
    .bind(alert.id)
    .bind(sink.channel())
    .bind(alert.owner_id.to_string())
    .bind(format!("Storm alert: {}", location.name))
    .bind(&alert.message)
    .execute(pool)
    .await?;

    match sink.deliver(alert, location).await {
        Ok(()) => {
            sqlx::query("UPDATE notifications SET status = 'SENT', sent_at = $2 WHERE id = $1")
                .bind(notification_id)
                .bind(Utc::now())
                .execute(pool)
                .await?;
        }
        Err(err) => {
            tracing::warn!(error = %err, alert_id = %alert.id, "notification delivery failed");
            sqlx::query(
                "UPDATE notifications SET status = 'FAILED', error_message = $2 WHERE id = $1",
            )
            .bind(notification_id)
            .bind(err.to_string())
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}
