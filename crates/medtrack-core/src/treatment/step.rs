use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// One ordered phase of a patient's treatment plan.
///
/// A step is *finished* once today reaches `start_date + duration_days`.
/// Finishing is purely a function of the calendar -- no transition call is
/// needed. Completion, by contrast, is an explicit state flip performed by
/// the progression engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub treatment_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Position in the treatment sequence. Unique within a treatment.
    pub order: u32,
    /// Zero-day steps finish on their start date.
    pub duration_days: u32,
    /// Date the step became active; reset when a predecessor completes.
    pub start_date: NaiveDate,
    pub is_active: bool,
    pub is_completed: bool,
    pub notification_sent: bool,
}

/// Derived step state, a pure function of the record and today's date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not yet activated.
    Pending,
    /// Active, duration still running.
    InProgress,
    /// Active and past its duration, patient not yet notified.
    Finished,
    /// Active, finished, and notified; waiting to be completed.
    Notified,
    /// Terminal.
    Completed,
}

impl Step {
    /// First date on which the step counts as finished.
    ///
    /// Saturates at the calendar maximum rather than overflowing for
    /// unreasonable durations.
    pub fn end_date(&self) -> NaiveDate {
        self.start_date
            .checked_add_days(Days::new(u64::from(self.duration_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Whether the step's duration has elapsed as of `today`.
    pub fn is_finished(&self, today: NaiveDate) -> bool {
        today >= self.end_date()
    }

    /// Days until the step finishes. Negative once it is past due.
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        (self.end_date() - today).num_days()
    }

    /// Whether the next live scan would send a notification for this step.
    pub fn needs_notification(&self, today: NaiveDate) -> bool {
        self.is_active && !self.is_completed && !self.notification_sent && self.is_finished(today)
    }

    pub fn status(&self, today: NaiveDate) -> StepStatus {
        if self.is_completed {
            StepStatus::Completed
        } else if !self.is_active {
            StepStatus::Pending
        } else if !self.is_finished(today) {
            StepStatus::InProgress
        } else if self.notification_sent {
            StepStatus::Notified
        } else {
            StepStatus::Finished
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn step(start: NaiveDate, duration_days: u32) -> Step {
        Step {
            id: 1,
            treatment_id: 1,
            name: "Aligner 1".into(),
            description: String::new(),
            order: 1,
            duration_days,
            start_date: start,
            is_active: true,
            is_completed: false,
            notification_sent: false,
        }
    }

    #[test]
    fn finished_on_and_after_end_date() {
        let s = step(date(2026, 1, 10), 7);
        assert!(!s.is_finished(date(2026, 1, 16)));
        assert!(s.is_finished(date(2026, 1, 17)));
        assert!(s.is_finished(date(2026, 1, 18)));
    }

    #[test]
    fn zero_duration_finishes_on_start_date() {
        let s = step(date(2026, 1, 10), 0);
        assert!(!s.is_finished(date(2026, 1, 9)));
        assert!(s.is_finished(date(2026, 1, 10)));
    }

    #[test]
    fn end_date_saturates_for_huge_durations() {
        let s = step(date(2026, 1, 10), u32::MAX);
        assert_eq!(s.end_date(), NaiveDate::MAX);
        assert!(!s.is_finished(date(2100, 1, 1)));
    }

    #[test]
    fn days_remaining_counts_down() {
        let s = step(date(2026, 1, 10), 7);
        assert_eq!(s.days_remaining(date(2026, 1, 10)), 7);
        assert_eq!(s.days_remaining(date(2026, 1, 17)), 0);
        assert_eq!(s.days_remaining(date(2026, 1, 19)), -2);
    }

    #[test]
    fn status_derivation() {
        let today = date(2026, 1, 17);
        let mut s = step(date(2026, 1, 10), 7);
        assert_eq!(s.status(date(2026, 1, 12)), StepStatus::InProgress);
        assert_eq!(s.status(today), StepStatus::Finished);

        s.notification_sent = true;
        assert_eq!(s.status(today), StepStatus::Notified);

        s.is_active = false;
        s.is_completed = true;
        assert_eq!(s.status(today), StepStatus::Completed);

        let pending = Step {
            is_active: false,
            is_completed: false,
            ..step(date(2026, 1, 10), 7)
        };
        assert_eq!(pending.status(today), StepStatus::Pending);
    }

    #[test]
    fn inactive_step_never_needs_notification() {
        let today = date(2026, 1, 17);
        let mut s = step(date(2026, 1, 10), 7);
        assert!(s.needs_notification(today));
        s.is_active = false;
        assert!(!s.needs_notification(today));
    }

    proptest! {
        #[test]
        fn finished_iff_elapsed_days_reach_duration(
            start_offset in 0i64..20_000,
            duration in 0u32..10_000,
            today_offset in 0i64..40_000,
        ) {
            let base = date(1970, 1, 1);
            let start = base + chrono::Duration::days(start_offset);
            let today = base + chrono::Duration::days(today_offset);
            let s = step(start, duration);
            let elapsed = (today - start).num_days();
            prop_assert_eq!(s.is_finished(today), elapsed >= i64::from(duration));
        }
    }
}
