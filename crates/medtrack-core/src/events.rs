use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Every observable outcome of a scan produces an Event.
/// The CLI prints them; the persisted scan report replays them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Dry-run only: the step is finished and a live scan would notify.
    WouldNotify {
        step_id: i64,
        step_name: String,
        recipient: String,
        at: DateTime<Utc>,
    },
    NotificationSent {
        step_id: i64,
        step_name: String,
        recipient: String,
        at: DateTime<Utc>,
    },
    /// Send or post-send persistence failed; the step stays eligible.
    NotificationFailed {
        step_id: i64,
        step_name: String,
        recipient: String,
        reason: String,
        at: DateTime<Utc>,
    },
    /// Sends disabled in configuration; the step was left untouched.
    NotificationSkipped {
        step_id: i64,
        step_name: String,
        at: DateTime<Utc>,
    },
    StepCompleted {
        step_id: i64,
        step_name: String,
        at: DateTime<Utc>,
    },
    /// Auto-progress could not complete the step after its notification.
    AdvanceFailed {
        step_id: i64,
        step_name: String,
        reason: String,
        at: DateTime<Utc>,
    },
    StepActivated {
        step_id: i64,
        step_name: String,
        start_date: NaiveDate,
        at: DateTime<Utc>,
    },
    /// A completed step had no successor.
    TreatmentCompleted {
        treatment_id: i64,
        at: DateTime<Utc>,
    },
    /// More than one active step in a treatment.
    IntegrityWarning {
        treatment_id: i64,
        active_count: u32,
        at: DateTime<Utc>,
    },
}
