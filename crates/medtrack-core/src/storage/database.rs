//! SQLite-based persistence for patients, treatments, and steps.
//!
//! Provides the repository surface the progression engine runs against:
//! - Patient and treatment records
//! - Ordered treatment steps with their progression flags
//! - A key-value store for operational state (last scan report)

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CoreError, DatabaseError, IntegrityError};
use crate::treatment::{AdvanceOutcome, Patient, Step, Treatment};

use super::data_dir;

/// Format a calendar date for storage.
fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a stored date. A malformed value is a conversion error, not a
/// silent fallback.
fn parse_date(idx: usize, raw: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Build a Step from a full-column row
/// (id, treatment_id, name, description, ord, duration_days, start_date,
/// is_active, is_completed, notification_sent).
fn row_to_step(row: &rusqlite::Row) -> Result<Step, rusqlite::Error> {
    let start_date_raw: String = row.get(6)?;
    Ok(Step {
        id: row.get(0)?,
        treatment_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        order: row.get(4)?,
        duration_days: row.get(5)?,
        start_date: parse_date(6, &start_date_raw)?,
        is_active: row.get(7)?,
        is_completed: row.get(8)?,
        notification_sent: row.get(9)?,
    })
}

fn row_to_patient(row: &rusqlite::Row) -> Result<Patient, rusqlite::Error> {
    Ok(Patient {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
    })
}

/// SQLite database for treatment storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/medtrack/medtrack.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?
            .join("medtrack.db");
        let conn = Connection::open(&path).map_err(|source| DatabaseError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, Box<dyn std::error::Error>> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS patients (
                id    INTEGER PRIMARY KEY AUTOINCREMENT,
                name  TEXT NOT NULL,
                email TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS treatments (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id INTEGER NOT NULL REFERENCES patients(id)
            );

            CREATE TABLE IF NOT EXISTS steps (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                treatment_id      INTEGER NOT NULL REFERENCES treatments(id),
                name              TEXT NOT NULL,
                description       TEXT NOT NULL DEFAULT '',
                ord               INTEGER NOT NULL,
                duration_days     INTEGER NOT NULL,
                start_date        TEXT NOT NULL,
                is_active         INTEGER NOT NULL DEFAULT 0,
                is_completed      INTEGER NOT NULL DEFAULT 0,
                notification_sent INTEGER NOT NULL DEFAULT 0,
                UNIQUE (treatment_id, ord)
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Create indexes for the scan's eligibility filter and the
            -- successor lookup
            CREATE INDEX IF NOT EXISTS idx_steps_eligible
                ON steps(is_active, is_completed, notification_sent);
            CREATE INDEX IF NOT EXISTS idx_steps_treatment_ord
                ON steps(treatment_id, ord);",
        )?;
        Ok(())
    }

    // ── Patients & treatments ────────────────────────────────────────

    pub fn add_patient(&self, name: &str, email: &str) -> Result<Patient, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO patients (name, email) VALUES (?1, ?2)",
            params![name, email],
        )?;
        Ok(Patient {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    pub fn list_patients(&self) -> Result<Vec<Patient>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, email FROM patients ORDER BY id")?;
        let rows = stmt.query_map([], row_to_patient)?;
        rows.collect()
    }

    pub fn get_patient(&self, id: i64) -> Result<Option<Patient>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, name, email FROM patients WHERE id = ?1",
                params![id],
                row_to_patient,
            )
            .optional()
    }

    /// Create a treatment for an existing patient.
    pub fn create_treatment(&self, patient_id: i64) -> Result<Treatment, DatabaseError> {
        if self.get_patient(patient_id)?.is_none() {
            return Err(DatabaseError::NotFound {
                entity: "patient",
                id: patient_id,
            });
        }
        self.conn.execute(
            "INSERT INTO treatments (patient_id) VALUES (?1)",
            params![patient_id],
        )?;
        Ok(Treatment {
            id: self.conn.last_insert_rowid(),
            patient_id,
        })
    }

    pub fn get_treatment(&self, id: i64) -> Result<Option<Treatment>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, patient_id FROM treatments WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Treatment {
                        id: row.get(0)?,
                        patient_id: row.get(1)?,
                    })
                },
            )
            .optional()
    }

    /// The registered recipient for a treatment's notifications.
    pub fn patient_for_treatment(&self, treatment_id: i64) -> Result<Patient, DatabaseError> {
        let patient = self
            .conn
            .query_row(
                "SELECT p.id, p.name, p.email
                 FROM patients p JOIN treatments t ON t.patient_id = p.id
                 WHERE t.id = ?1",
                params![treatment_id],
                row_to_patient,
            )
            .optional()?;
        patient.ok_or(DatabaseError::NotFound {
            entity: "patient",
            id: treatment_id,
        })
    }

    // ── Steps ────────────────────────────────────────────────────────

    /// Append a step to a treatment.
    ///
    /// Without an explicit order the step lands after the current last one.
    /// The first step of a treatment with no active step is activated
    /// immediately (seed rule); later steps wake up through progression.
    pub fn add_step(
        &self,
        treatment_id: i64,
        name: &str,
        description: &str,
        duration_days: u32,
        start_date: NaiveDate,
        order: Option<u32>,
    ) -> Result<Step, CoreError> {
        if self.get_treatment(treatment_id)?.is_none() {
            return Err(DatabaseError::NotFound {
                entity: "treatment",
                id: treatment_id,
            }
            .into());
        }

        let order = match order {
            Some(o) => o,
            None => {
                let max: u32 = self.conn.query_row(
                    "SELECT COALESCE(MAX(ord), 0) FROM steps WHERE treatment_id = ?1",
                    params![treatment_id],
                    |row| row.get(0),
                )?;
                max + 1
            }
        };

        let active_count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM steps WHERE treatment_id = ?1 AND is_active = 1",
            params![treatment_id],
            |row| row.get(0),
        )?;
        let activate = active_count == 0;

        let inserted = self.conn.execute(
            "INSERT INTO steps
                 (treatment_id, name, description, ord, duration_days, start_date, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                treatment_id,
                name,
                description,
                order,
                duration_days,
                format_date(start_date),
                activate,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(IntegrityError::DuplicateOrder {
                    treatment_id,
                    order,
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Step {
            id: self.conn.last_insert_rowid(),
            treatment_id,
            name: name.to_string(),
            description: description.to_string(),
            order,
            duration_days,
            start_date,
            is_active: activate,
            is_completed: false,
            notification_sent: false,
        })
    }

    pub fn get_step(&self, id: i64) -> Result<Option<Step>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, treatment_id, name, description, ord, duration_days, start_date,
                        is_active, is_completed, notification_sent
                 FROM steps WHERE id = ?1",
                params![id],
                row_to_step,
            )
            .optional()
    }

    /// All steps of a treatment in sequence order.
    pub fn steps_for_treatment(&self, treatment_id: i64) -> Result<Vec<Step>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, treatment_id, name, description, ord, duration_days, start_date,
                    is_active, is_completed, notification_sent
             FROM steps WHERE treatment_id = ?1 ORDER BY ord",
        )?;
        let rows = stmt.query_map(params![treatment_id], row_to_step)?;
        rows.collect()
    }

    /// The step with the lowest order strictly greater than `after_order`.
    pub fn next_step(
        &self,
        treatment_id: i64,
        after_order: u32,
    ) -> Result<Option<Step>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, treatment_id, name, description, ord, duration_days, start_date,
                        is_active, is_completed, notification_sent
                 FROM steps WHERE treatment_id = ?1 AND ord > ?2
                 ORDER BY ord LIMIT 1",
                params![treatment_id, after_order],
                row_to_step,
            )
            .optional()
    }

    /// Steps the scan considers: active, not completed, not yet notified.
    pub fn eligible_steps(&self) -> Result<Vec<Step>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, treatment_id, name, description, ord, duration_days, start_date,
                    is_active, is_completed, notification_sent
             FROM steps
             WHERE is_active = 1 AND is_completed = 0 AND notification_sent = 0
             ORDER BY treatment_id, ord",
        )?;
        let rows = stmt.query_map([], row_to_step)?;
        rows.collect()
    }

    /// Every active step, most recently started first.
    pub fn active_steps(&self) -> Result<Vec<Step>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, treatment_id, name, description, ord, duration_days, start_date,
                    is_active, is_completed, notification_sent
             FROM steps WHERE is_active = 1
             ORDER BY start_date DESC, id",
        )?;
        let rows = stmt.query_map([], row_to_step)?;
        rows.collect()
    }

    /// Mark a step notified, compare-and-set style.
    ///
    /// Returns false when another run already claimed the notification (or
    /// the step stopped being eligible), so the caller never double-marks.
    pub fn mark_notified(&self, step_id: i64) -> Result<bool, rusqlite::Error> {
        let changed = self.conn.execute(
            "UPDATE steps SET notification_sent = 1
             WHERE id = ?1 AND notification_sent = 0 AND is_active = 1 AND is_completed = 0",
            params![step_id],
        )?;
        Ok(changed == 1)
    }

    /// Suppress a pending notification without sending it (audit repair).
    pub fn silence_step(&self, step_id: i64) -> Result<bool, rusqlite::Error> {
        let changed = self.conn.execute(
            "UPDATE steps SET notification_sent = 1 WHERE id = ?1 AND notification_sent = 0",
            params![step_id],
        )?;
        Ok(changed == 1)
    }

    /// Complete a step and activate its successor in one transaction.
    ///
    /// The completion is guarded on `is_active = 1`: a step that already
    /// lost its active flag (completed earlier, or raced by an overlapping
    /// run) yields [`AdvanceOutcome::StepInactive`] and the successor is
    /// left untouched.
    pub fn complete_and_activate(
        &self,
        step_id: i64,
        treatment_id: i64,
        after_order: u32,
        today: NaiveDate,
    ) -> Result<AdvanceOutcome, rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;

        let completed = tx.execute(
            "UPDATE steps SET is_completed = 1, is_active = 0
             WHERE id = ?1 AND is_active = 1",
            params![step_id],
        )?;
        if completed == 0 {
            return Ok(AdvanceOutcome::StepInactive);
        }

        let next = tx
            .query_row(
                "SELECT id, treatment_id, name, description, ord, duration_days, start_date,
                        is_active, is_completed, notification_sent
                 FROM steps WHERE treatment_id = ?1 AND ord > ?2
                 ORDER BY ord LIMIT 1",
                params![treatment_id, after_order],
                row_to_step,
            )
            .optional()?;

        let outcome = match next {
            Some(mut next) => {
                tx.execute(
                    "UPDATE steps SET is_active = 1, start_date = ?2 WHERE id = ?1",
                    params![next.id, format_date(today)],
                )?;
                next.is_active = true;
                next.start_date = today;
                AdvanceOutcome::Activated(next)
            }
            None => AdvanceOutcome::NoNextStep,
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Treatments holding more than one active step, with their counts.
    pub fn integrity_violations(&self) -> Result<Vec<(i64, u32)>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT treatment_id, COUNT(*) FROM steps
             WHERE is_active = 1
             GROUP BY treatment_id HAVING COUNT(*) > 1",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, u32>(1)?)))?;
        rows.collect()
    }

    /// Flip a step active regardless of state, bypassing the invariant.
    #[cfg(test)]
    pub(crate) fn force_active(&self, step_id: i64) {
        self.conn
            .execute(
                "UPDATE steps SET is_active = 1, is_completed = 0 WHERE id = ?1",
                params![step_id],
            )
            .unwrap();
    }

    // ── Key-value store ──────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// One patient, one treatment, three pending steps; the first activated.
    fn seed(db: &Database) -> (i64, Vec<Step>) {
        let patient = db.add_patient("Amal", "amal@example.com").unwrap();
        let treatment = db.create_treatment(patient.id).unwrap();
        let start = date(2026, 1, 1);
        let steps = vec![
            db.add_step(treatment.id, "Aligner 1", "", 7, start, None)
                .unwrap(),
            db.add_step(treatment.id, "Aligner 2", "", 10, start, None)
                .unwrap(),
            db.add_step(treatment.id, "Retainer", "", 30, start, None)
                .unwrap(),
        ];
        (treatment.id, steps)
    }

    #[test]
    fn first_step_is_activated_on_seed() {
        let db = Database::open_memory().unwrap();
        let (_, steps) = seed(&db);
        assert!(steps[0].is_active);
        assert!(!steps[1].is_active);
        assert!(!steps[2].is_active);
        assert_eq!(steps.iter().map(|s| s.order).collect::<Vec<_>>(), [1, 2, 3]);
    }

    #[test]
    fn duplicate_order_is_rejected() {
        let db = Database::open_memory().unwrap();
        let (treatment_id, _) = seed(&db);
        let err = db
            .add_step(treatment_id, "Dup", "", 5, date(2026, 1, 1), Some(2))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Integrity(IntegrityError::DuplicateOrder { order: 2, .. })
        ));
    }

    #[test]
    fn add_step_to_missing_treatment_fails() {
        let db = Database::open_memory().unwrap();
        let err = db
            .add_step(99, "Orphan", "", 5, date(2026, 1, 1), None)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Database(DatabaseError::NotFound { id: 99, .. })
        ));
    }

    #[test]
    fn next_step_skips_order_gaps() {
        let db = Database::open_memory().unwrap();
        let patient = db.add_patient("Amal", "amal@example.com").unwrap();
        let treatment = db.create_treatment(patient.id).unwrap();
        let start = date(2026, 1, 1);
        for (name, ord) in [("a", 10), ("b", 20), ("c", 30)] {
            db.add_step(treatment.id, name, "", 5, start, Some(ord))
                .unwrap();
        }

        let next = db.next_step(treatment.id, 10).unwrap().unwrap();
        assert_eq!(next.order, 20);
        let next = db.next_step(treatment.id, 25).unwrap().unwrap();
        assert_eq!(next.order, 30);
        assert!(db.next_step(treatment.id, 30).unwrap().is_none());
    }

    #[test]
    fn mark_notified_is_compare_and_set() {
        let db = Database::open_memory().unwrap();
        let (_, steps) = seed(&db);
        assert!(db.mark_notified(steps[0].id).unwrap());
        // A second claim (overlapping run) must lose.
        assert!(!db.mark_notified(steps[0].id).unwrap());
        // Inactive steps can't be claimed at all.
        assert!(!db.mark_notified(steps[1].id).unwrap());
    }

    #[test]
    fn complete_and_activate_moves_the_active_flag() {
        let db = Database::open_memory().unwrap();
        let (treatment_id, steps) = seed(&db);
        let today = date(2026, 1, 9);

        let outcome = db
            .complete_and_activate(steps[0].id, treatment_id, steps[0].order, today)
            .unwrap();
        let next = match outcome {
            AdvanceOutcome::Activated(next) => next,
            other => panic!("expected Activated, got {other:?}"),
        };
        assert_eq!(next.id, steps[1].id);
        assert_eq!(next.start_date, today);

        let all = db.steps_for_treatment(treatment_id).unwrap();
        assert!(all[0].is_completed && !all[0].is_active);
        assert!(all[1].is_active && !all[1].is_completed);
        assert!(!all[2].is_active);
        assert_eq!(all.iter().filter(|s| s.is_active).count(), 1);
    }

    #[test]
    fn completing_an_inactive_step_is_refused() {
        let db = Database::open_memory().unwrap();
        let (treatment_id, steps) = seed(&db);
        let today = date(2026, 1, 9);

        let outcome = db
            .complete_and_activate(steps[1].id, treatment_id, steps[1].order, today)
            .unwrap();
        assert!(matches!(outcome, AdvanceOutcome::StepInactive));

        // Successor untouched.
        let all = db.steps_for_treatment(treatment_id).unwrap();
        assert!(!all[2].is_active);
    }

    #[test]
    fn last_step_reports_no_next() {
        let db = Database::open_memory().unwrap();
        let (treatment_id, steps) = seed(&db);
        let today = date(2026, 1, 9);

        for step in &steps[..2] {
            db.complete_and_activate(step.id, treatment_id, step.order, today)
                .unwrap();
        }
        let outcome = db
            .complete_and_activate(steps[2].id, treatment_id, steps[2].order, today)
            .unwrap();
        assert!(matches!(outcome, AdvanceOutcome::NoNextStep));
    }

    #[test]
    fn eligible_steps_filters_on_all_three_flags() {
        let db = Database::open_memory().unwrap();
        let (treatment_id, steps) = seed(&db);

        assert_eq!(db.eligible_steps().unwrap().len(), 1);
        db.mark_notified(steps[0].id).unwrap();
        assert!(db.eligible_steps().unwrap().is_empty());

        db.complete_and_activate(steps[0].id, treatment_id, steps[0].order, date(2026, 1, 9))
            .unwrap();
        let eligible = db.eligible_steps().unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, steps[1].id);
    }

    #[test]
    fn integrity_violations_finds_double_active() {
        let db = Database::open_memory().unwrap();
        let (treatment_id, steps) = seed(&db);
        assert!(db.integrity_violations().unwrap().is_empty());

        // Force a second active step behind the repository's back.
        db.force_active(steps[2].id);
        let violations = db.integrity_violations().unwrap();
        assert_eq!(violations, vec![(treatment_id, 2)]);
    }

    #[test]
    fn silence_step_suppresses_once() {
        let db = Database::open_memory().unwrap();
        let (_, steps) = seed(&db);
        assert!(db.silence_step(steps[0].id).unwrap());
        assert!(!db.silence_step(steps[0].id).unwrap());
        assert!(db.eligible_steps().unwrap().is_empty());
    }

    #[test]
    fn patient_for_treatment_resolves_recipient() {
        let db = Database::open_memory().unwrap();
        let (treatment_id, _) = seed(&db);
        let patient = db.patient_for_treatment(treatment_id).unwrap();
        assert_eq!(patient.email, "amal@example.com");

        let err = db.patient_for_treatment(42).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { id: 42, .. }));
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("last_scan_report").unwrap().is_none());
        db.kv_set("last_scan_report", "{}").unwrap();
        assert_eq!(db.kv_get("last_scan_report").unwrap().as_deref(), Some("{}"));
        db.kv_set("last_scan_report", "{\"notified\":1}").unwrap();
        assert_eq!(
            db.kv_get("last_scan_report").unwrap().as_deref(),
            Some("{\"notified\":1}")
        );
    }
}
