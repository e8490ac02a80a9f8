//! Progression engine implementation.
//!
//! The engine is a date-driven state machine over treatment steps. It holds
//! no state of its own -- steps live in the repository, the current date
//! comes from the injected clock, and outbound mail goes through the
//! injected notifier.
//!
//! ## State Transitions
//!
//! ```text
//! Pending -> InProgress -> Finished -> Notified
//!     (any active) -> Completed + successor Pending -> InProgress
//! ```
//!
//! Finishing happens by itself as the calendar advances. Notification and
//! completion are explicit commands, deliberately decoupled: the batch scan
//! chains them when the auto-progress policy is on, and admin tooling may
//! force a completion at any time.

use crate::clock::Clock;
use crate::error::Result;
use crate::notify::{message, Notifier};
use crate::storage::Database;

use super::Step;

/// Result of a complete-and-advance command.
#[derive(Debug, Clone)]
pub enum AdvanceOutcome {
    /// The successor step, now active with today as its start date.
    Activated(Step),
    /// The completed step was the last one; the treatment is done.
    NoNextStep,
    /// The step had already lost its active flag (completed earlier or
    /// raced by an overlapping run); nothing was changed.
    StepInactive,
}

/// Core progression engine.
///
/// Borrows its collaborators; construct one per batch run or command.
pub struct ProgressionEngine<'a> {
    db: &'a Database,
    clock: &'a dyn Clock,
    notifier: &'a dyn Notifier,
}

impl<'a> ProgressionEngine<'a> {
    pub fn new(db: &'a Database, clock: &'a dyn Clock, notifier: &'a dyn Notifier) -> Self {
        Self {
            db,
            clock,
            notifier,
        }
    }

    /// Notify the patient that their active step has finished, at most once.
    ///
    /// A step that is inactive, completed, already notified, or simply not
    /// finished yet is a no-op returning `Ok(false)` -- not an error.
    ///
    /// The message is sent first and the `notification_sent` marker is
    /// persisted after, compare-and-set. Losing the CAS (an overlapping run
    /// got there first) is treated as already-notified. A persistence
    /// failure after a successful send is surfaced as an error and logged:
    /// the send cannot be undone, so the next scan may deliver a duplicate.
    pub fn notify_if_finished(&self, step: &mut Step) -> Result<bool> {
        let today = self.clock.today();
        if !step.needs_notification(today) {
            return Ok(false);
        }

        let patient = self.db.patient_for_treatment(step.treatment_id)?;
        let next = self.db.next_step(step.treatment_id, step.order)?;
        let (subject, body) = message::step_finished(&patient, step, next.as_ref(), today);
        self.notifier.send(&patient.email, &subject, &body)?;

        match self.db.mark_notified(step.id) {
            Ok(true) => {
                step.notification_sent = true;
                log::debug!("notified {} for step {} ({})", patient.email, step.id, step.name);
                Ok(true)
            }
            Ok(false) => {
                log::warn!(
                    "step {} was already marked notified; a duplicate message may have gone out",
                    step.id
                );
                step.notification_sent = true;
                Ok(false)
            }
            Err(e) => {
                log::warn!(
                    "sent notification for step {} but failed to persist the marker: {e}",
                    step.id
                );
                Err(e.into())
            }
        }
    }

    /// Complete the step and activate its successor.
    ///
    /// Does not require the step to be finished or notified: this is the
    /// override used to force progression. Only active steps can be
    /// completed; anything else yields [`AdvanceOutcome::StepInactive`].
    pub fn complete_and_advance(&self, step: &mut Step) -> Result<AdvanceOutcome> {
        let today = self.clock.today();
        let outcome =
            self.db
                .complete_and_activate(step.id, step.treatment_id, step.order, today)?;

        match &outcome {
            AdvanceOutcome::StepInactive => {
                log::warn!("step {} is not active; completion refused", step.id);
            }
            AdvanceOutcome::Activated(next) => {
                step.is_completed = true;
                step.is_active = false;
                log::debug!(
                    "step {} completed; step {} activated starting {}",
                    step.id,
                    next.id,
                    next.start_date
                );
            }
            AdvanceOutcome::NoNextStep => {
                step.is_completed = true;
                step.is_active = false;
                log::debug!("step {} completed; treatment {} done", step.id, step.treatment_id);
            }
        }
        Ok(outcome)
    }

    /// Tell the patient their newly activated step has started. Best-effort:
    /// a failure is logged and reported as `false`, never fatal.
    pub fn announce_started(&self, step: &Step) -> bool {
        let patient = match self.db.patient_for_treatment(step.treatment_id) {
            Ok(patient) => patient,
            Err(e) => {
                log::warn!("cannot announce step {}: {e}", step.id);
                return false;
            }
        };
        let (subject, body) = message::step_started(&patient, step);
        match self.notifier.send(&patient.email, &subject, &body) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to announce step {} to {}: {e}", step.id, patient.email);
                false
            }
        }
    }

    pub(super) fn database(&self) -> &Database {
        self.db
    }

    pub(super) fn clock(&self) -> &dyn Clock {
        self.clock
    }
}
