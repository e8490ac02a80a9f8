use clap::Subcommand;
use medtrack_core::Database;

#[derive(Subcommand)]
pub enum PatientAction {
    /// Register a patient
    Add {
        #[arg(long)]
        name: String,
        /// Notification recipient address
        #[arg(long)]
        email: String,
    },
    /// List registered patients
    List {
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: PatientAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        PatientAction::Add { name, email } => {
            let patient = db.add_patient(&name, &email)?;
            println!("Patient {} added: {} <{}>", patient.id, patient.name, patient.email);
        }
        PatientAction::List { json } => {
            let patients = db.list_patients()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&patients)?);
                return Ok(());
            }
            for patient in &patients {
                println!("{}  {} <{}>", patient.id, patient.name, patient.email);
            }
        }
    }
    Ok(())
}
