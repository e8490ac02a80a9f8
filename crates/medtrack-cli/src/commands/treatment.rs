use chrono::NaiveDate;
use clap::Subcommand;
use medtrack_core::{Clock, Database, SystemClock};

use super::step::status_label;

#[derive(Subcommand)]
pub enum TreatmentAction {
    /// Create a treatment for an existing patient
    Create {
        #[arg(long)]
        patient: i64,
    },
    /// Append a step to a treatment
    AddStep {
        treatment_id: i64,
        /// Step name shown in notifications
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        duration_days: u32,
        /// Explicit position; defaults to the end of the sequence
        #[arg(long)]
        order: Option<u32>,
        /// Start date; defaults to today
        #[arg(long, value_name = "YYYY-MM-DD")]
        start: Option<String>,
    },
    /// Show a treatment and its steps
    Show {
        id: i64,
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: TreatmentAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        TreatmentAction::Create { patient } => {
            let treatment = db.create_treatment(patient)?;
            println!("Treatment {} created for patient {}.", treatment.id, patient);
        }
        TreatmentAction::AddStep {
            treatment_id,
            name,
            description,
            duration_days,
            order,
            start,
        } => {
            let start_date = match start {
                Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?,
                None => SystemClock.today(),
            };
            let step = db.add_step(
                treatment_id,
                &name,
                &description,
                duration_days,
                start_date,
                order,
            )?;
            let state = if step.is_active { "active" } else { "pending" };
            println!(
                "Step {} '{}' added to treatment {} as #{} ({state}).",
                step.id, step.name, treatment_id, step.order
            );
        }
        TreatmentAction::Show { id, json } => {
            let treatment = db
                .get_treatment(id)?
                .ok_or_else(|| format!("no treatment with id {id}"))?;
            let steps = db.steps_for_treatment(id)?;
            if json {
                let doc = serde_json::json!({
                    "treatment": treatment,
                    "steps": steps,
                });
                println!("{}", serde_json::to_string_pretty(&doc)?);
                return Ok(());
            }
            let patient = db.patient_for_treatment(id)?;
            let today = SystemClock.today();
            println!(
                "Treatment {} for {} <{}> -- {} steps",
                treatment.id,
                patient.name,
                patient.email,
                steps.len()
            );
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
    }
    Ok(())
}
