use clap::Subcommand;
use medtrack_core::{
    AdvanceOutcome, Clock, Config, Database, ProgressionEngine, Step, StepStatus, SystemClock,
};

use super::notify::build_notifier;

#[derive(Subcommand)]
pub enum StepAction {
    /// List a treatment's steps in sequence order
    List {
        treatment_id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Show every active step and whether the next scan would notify it
    Status,
    /// Complete a step and activate its successor (manual override)
    Complete { step_id: i64 },
    /// Report integrity problems; --fix silences stuck notifications
    Audit {
        /// Mark finished-but-unnotified steps as notified without sending
        #[arg(long)]
        fix: bool,
    },
}

pub(crate) fn status_label(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "pending",
        StepStatus::InProgress => "in progress",
        StepStatus::Finished => "finished",
        StepStatus::Notified => "notified",
        StepStatus::Completed => "completed",
    }
}

pub fn run(action: StepAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let today = SystemClock.today();

    match action {
        StepAction::List { treatment_id, json } => {
            let steps = db.steps_for_treatment(treatment_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&steps)?);
                return Ok(());
            }
            if steps.is_empty() {
                println!("Treatment {treatment_id} has no steps.");
                return Ok(());
            }
            for step in &steps {
                println!(
                    "#{} [{}] {} -- starts {}, {} days",
                    step.order,
                    status_label(step.status(today)),
                    step.name,
                    step.start_date,
                    step.duration_days,
                );
            }
        }
        StepAction::Status => {
            let steps = db.active_steps()?;
            println!("Found {} active steps:", steps.len());
            for step in &steps {
                print_status_block(&db, step, today);
            }
        }
        StepAction::Complete { step_id } => {
            let mut step = db
                .get_step(step_id)?
                .ok_or_else(|| format!("no step with id {step_id}"))?;
            let config = Config::load()?;
            let notifier = build_notifier(&config);
            let rt = tokio::runtime::Runtime::new()?;
            let _guard = rt.enter();
            let clock = SystemClock;
            let engine = ProgressionEngine::new(&db, &clock, notifier.as_ref());

            match engine.complete_and_advance(&mut step)? {
                AdvanceOutcome::Activated(next) => {
                    println!(
                        "Step '{}' completed. Next step '{}' activated, starting {}.",
                        step.name, next.name, next.start_date
                    );
                    if engine.announce_started(&next) {
                        println!("Patient notified about the new step.");
                    } else {
                        println!("Could not notify the patient; see the log.");
                    }
                }
                AdvanceOutcome::NoNextStep => {
                    println!("Step '{}' completed. Treatment is complete.", step.name);
                }
                AdvanceOutcome::StepInactive => {
                    println!("Step '{}' is not active; nothing to do.", step.name);
                }
            }
        }
        StepAction::Audit { fix } => {
            let violations = db.integrity_violations()?;
            for (treatment_id, active_count) in &violations {
                println!(
                    "WARNING: treatment {treatment_id} has {active_count} active steps; expected at most one"
                );
            }

            let stuck: Vec<Step> = db
                .eligible_steps()?
                .into_iter()
                .filter(|s| s.is_finished(today))
                .collect();
            println!(
                "Found {} finished steps still waiting to notify.",
                stuck.len()
            );
            for step in &stuck {
                println!(
                    "  step {} '{}' (treatment {}, finished {})",
                    step.id,
                    step.name,
                    step.treatment_id,
                    step.end_date(),
                );
            }

            if fix {
                let mut fixed = 0;
                for step in &stuck {
                    if db.silence_step(step.id)? {
                        fixed += 1;
                    }
                }
                println!("Silenced {fixed} pending notifications.");
            } else if !stuck.is_empty() {
                println!("Run with --fix to silence them without sending.");
            }

            if violations.is_empty() && stuck.is_empty() {
                println!("No integrity problems found.");
            }
        }
    }
    Ok(())
}

fn print_status_block(db: &Database, step: &Step, today: chrono::NaiveDate) {
    println!();
    println!("Step: '{}' (id {})", step.name, step.id);
    println!("  Start date: {}", step.start_date);
    println!("  Duration: {} days", step.duration_days);
    println!("  Expected end: {}", step.end_date());
    println!("  Completed: {}", step.is_completed);
    println!("  Notification sent: {}", step.notification_sent);

    if step.needs_notification(today) {
        println!("  READY FOR NOTIFICATION on the next scan");
    } else if step.is_finished(today) && step.notification_sent {
        println!("  Notification already sent");
    } else if !step.is_finished(today) {
        println!("  {} days remaining", step.days_remaining(today));
    }

    match db.patient_for_treatment(step.treatment_id) {
        Ok(patient) => println!("  Patient: {}", patient.email),
        Err(_) => println!("  Patient: no patient assigned"),
    }
}
