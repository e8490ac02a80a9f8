//! Batch scan driver.
//!
//! The periodic entry point (cron, or `medtrack-cli notify run`): walk every
//! eligible step, notify the finished ones, and -- when the auto-progress
//! policy is on -- complete each notified step and activate its successor.
//! Per-step failures are collected in the report; none of them aborts the
//! scan.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IntegrityError, Result};
use crate::events::Event;

use super::engine::{AdvanceOutcome, ProgressionEngine};

/// Policy knobs for one scan run.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Report what would happen without sending or mutating anything.
    pub dry_run: bool,
    /// Complete each step and activate its successor right after a
    /// successful notification.
    pub auto_progress: bool,
    /// Master switch from configuration; when off, sends are skipped and
    /// counted instead of attempted.
    pub sends_enabled: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            auto_progress: false,
            sends_enabled: true,
        }
    }
}

/// Aggregate outcome of one scan run, with per-step event detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub auto_progress: bool,
    /// Eligible steps considered (active, uncompleted, unnotified).
    pub checked: usize,
    /// Messages sent -- or, in a dry run, that would have been sent.
    pub notified: usize,
    /// Steps completed with a successor activated.
    pub progressed: usize,
    /// Steps whose send was skipped by the master switch.
    pub skipped: usize,
    /// Steps that errored (send, lookup, or persistence).
    pub failed: usize,
    pub events: Vec<Event>,
    pub started_at: chrono::DateTime<Utc>,
    pub finished_at: chrono::DateTime<Utc>,
}

impl ProgressionEngine<'_> {
    /// Scan all eligible steps and apply the notification (and, optionally,
    /// progression) transitions.
    pub fn scan(&self, opts: &ScanOptions) -> Result<ScanReport> {
        let today = self.clock().today();
        let started_at = Utc::now();
        let mut events = Vec::new();

        // Integrity first: a treatment with two active steps would notify
        // twice per scan. Never silently resolved, always reported.
        for (treatment_id, active_count) in self.database().integrity_violations()? {
            let violation = IntegrityError::MultipleActiveSteps {
                treatment_id,
                count: active_count,
            };
            log::warn!("{violation}");
            events.push(Event::IntegrityWarning {
                treatment_id,
                active_count,
                at: Utc::now(),
            });
        }

        let eligible = self.database().eligible_steps()?;
        let checked = eligible.len();
        log::debug!("checking {checked} active treatment steps");

        let mut notified = 0;
        let mut progressed = 0;
        let mut skipped = 0;
        let mut failed = 0;

        for mut step in eligible {
            if !step.is_finished(today) {
                continue;
            }

            let recipient = match self.database().patient_for_treatment(step.treatment_id) {
                Ok(patient) => patient.email,
                Err(e) => {
                    log::warn!("skipping step {}: {e}", step.id);
                    failed += 1;
                    events.push(Event::NotificationFailed {
                        step_id: step.id,
                        step_name: step.name.clone(),
                        recipient: String::new(),
                        reason: e.to_string(),
                        at: Utc::now(),
                    });
                    continue;
                }
            };

            if opts.dry_run {
                notified += 1;
                events.push(Event::WouldNotify {
                    step_id: step.id,
                    step_name: step.name.clone(),
                    recipient,
                    at: Utc::now(),
                });
                continue;
            }

            if !opts.sends_enabled {
                skipped += 1;
                events.push(Event::NotificationSkipped {
                    step_id: step.id,
                    step_name: step.name.clone(),
                    at: Utc::now(),
                });
                continue;
            }

            match self.notify_if_finished(&mut step) {
                Ok(true) => {
                    notified += 1;
                    events.push(Event::NotificationSent {
                        step_id: step.id,
                        step_name: step.name.clone(),
                        recipient,
                        at: Utc::now(),
                    });
                    if opts.auto_progress {
                        match self.complete_and_advance(&mut step) {
                            Ok(AdvanceOutcome::Activated(next)) => {
                                progressed += 1;
                                events.push(Event::StepCompleted {
                                    step_id: step.id,
                                    step_name: step.name.clone(),
                                    at: Utc::now(),
                                });
                                events.push(Event::StepActivated {
                                    step_id: next.id,
                                    step_name: next.name.clone(),
                                    start_date: next.start_date,
                                    at: Utc::now(),
                                });
                            }
                            Ok(AdvanceOutcome::NoNextStep) => {
                                events.push(Event::StepCompleted {
                                    step_id: step.id,
                                    step_name: step.name.clone(),
                                    at: Utc::now(),
                                });
                                events.push(Event::TreatmentCompleted {
                                    treatment_id: step.treatment_id,
                                    at: Utc::now(),
                                });
                            }
                            Ok(AdvanceOutcome::StepInactive) => {
                                log::warn!(
                                    "step {} went inactive before auto-progress",
                                    step.id
                                );
                            }
                            Err(e) => {
                                failed += 1;
                                log::warn!("auto-progress for step {} failed: {e}", step.id);
                                events.push(Event::AdvanceFailed {
                                    step_id: step.id,
                                    step_name: step.name.clone(),
                                    reason: e.to_string(),
                                    at: Utc::now(),
                                });
                            }
                        }
                    }
                }
                // Lost the CAS race to an overlapping run; nothing sent here.
                Ok(false) => {
                    log::debug!("step {} no longer needs a notification", step.id);
                }
                Err(e) => {
                    failed += 1;
                    log::warn!("notification for step {} failed: {e}", step.id);
                    events.push(Event::NotificationFailed {
                        step_id: step.id,
                        step_name: step.name.clone(),
                        recipient,
                        reason: e.to_string(),
                        at: Utc::now(),
                    });
                }
            }
        }

        Ok(ScanReport {
            run_id: Uuid::new_v4(),
            dry_run: opts.dry_run,
            auto_progress: opts.auto_progress,
            checked,
            notified,
            progressed,
            skipped,
            failed,
            events,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
