//! # Medtrack Core Library
//!
//! This library provides the core business logic for Medtrack, a
//! medical-treatment tracking backend. Patients move through ordered
//! treatment steps; when a step's duration elapses the patient is notified
//! once, and the treatment optionally advances to the next step.
//!
//! ## Architecture
//!
//! - **Progression Engine**: a date-driven state machine over treatment
//!   steps. It holds no wall clock of its own -- the caller injects a
//!   [`Clock`], which makes every decision replayable in tests and lets the
//!   CLI preview a future scan.
//! - **Storage**: SQLite-based patient/treatment/step persistence and
//!   TOML-based configuration
//! - **Notifications**: pluggable [`Notifier`] backends (HTTP mail relay,
//!   console) behind a single trait
//! - **Batch scan**: the periodic driver that notifies every finished step
//!   and applies the auto-progress policy
//!
//! ## Key Components
//!
//! - [`ProgressionEngine`]: step transition and notification logic
//! - [`Database`]: patient, treatment, and step persistence
//! - [`Config`]: application configuration management
//! - [`Notifier`]: trait for outbound patient messages

pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod storage;
pub mod treatment;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, IntegrityError, NotifyError};
pub use events::Event;
pub use notify::{ConsoleMailer, HttpMailer, Notifier};
pub use storage::{Config, Database};
pub use treatment::{
    AdvanceOutcome, Patient, ProgressionEngine, ScanOptions, ScanReport, Step, StepStatus,
    Treatment,
};
