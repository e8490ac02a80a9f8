//! Treatment domain model and progression logic.

use serde::{Deserialize, Serialize};

mod engine;
mod scan;
mod step;

pub use engine::{AdvanceOutcome, ProgressionEngine};
pub use scan::{ScanOptions, ScanReport};
pub use step::{Step, StepStatus};

/// Recipient of treatment notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    /// Display name used in the message salutation.
    pub name: String,
    pub email: String,
}

/// One treatment plan. Belongs to exactly one patient and owns an ordered
/// sequence of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Treatment {
    pub id: i64,
    pub patient_id: i64,
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::Step;
    use crate::error::NotifyError;
    use crate::notify::Notifier;
    use crate::storage::Database;

    /// In-memory notifier recording every delivery; optionally fails for
    /// chosen recipients.
    pub(crate) struct RecordingNotifier {
        sent: Mutex<Vec<(String, String, String)>>,
        fail_for: Vec<String>,
    }

    impl RecordingNotifier {
        pub(crate) fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_for: Vec::new(),
            }
        }

        pub(crate) fn failing_for(recipient: &str) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_for: vec![recipient.to_string()],
            }
        }

        pub(crate) fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub(crate) fn last_sent(&self) -> (String, String, String) {
            self.sent.lock().unwrap().last().cloned().expect("no message sent")
        }

        pub(crate) fn recipients(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(to, _, _)| to.clone()).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
            if self.fail_for.iter().any(|r| r == to) {
                return Err(NotifyError::SendFailed {
                    recipient: to.to_string(),
                    message: "transport down".to_string(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    /// Seed one patient with one treatment and the given `(name, duration)`
    /// steps, all starting 2026-01-01. The first step comes back active.
    pub(crate) fn seed_treatment(
        db: &Database,
        name: &str,
        email: &str,
        steps: &[(&str, u32)],
    ) -> (i64, Vec<Step>) {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let patient = db.add_patient(name, email).unwrap();
        let treatment = db.create_treatment(patient.id).unwrap();
        let steps = steps
            .iter()
            .map(|(step_name, duration)| {
                db.add_step(treatment.id, step_name, "", *duration, start, None)
                    .unwrap()
            })
            .collect();
        (treatment.id, steps)
    }
}
