//! Calendar clock abstraction.
//!
//! Step progression is a function of "today": a step is finished once the
//! current date reaches its start date plus duration. The engine never reads
//! the wall clock directly -- it asks an injected [`Clock`], so tests pin the
//! date and the CLI can preview a scan as of an arbitrary day.

use chrono::{NaiveDate, Utc};

/// Supplies the current date to the progression engine.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock implementation (UTC calendar date).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock pinned to a fixed date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_returns_pinned_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        assert_eq!(FixedClock(date).today(), date);
    }

    #[test]
    fn system_clock_is_today() {
        assert_eq!(SystemClock.today(), Utc::now().date_naive());
    }
}
