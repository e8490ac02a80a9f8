use chrono::NaiveDate;
use clap::Subcommand;
use medtrack_core::notify::message;
use medtrack_core::{
    Clock, Config, ConsoleMailer, Database, Event, FixedClock, HttpMailer, Notifier,
    ProgressionEngine, ScanOptions, ScanReport, SystemClock,
};

const LAST_SCAN_KEY: &str = "last_scan_report";

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Scan finished steps, notify patients, optionally auto-progress
    Run {
        /// Show what would be done without sending emails or mutating state
        #[arg(long)]
        dry_run: bool,
        /// Complete each notified step and activate the next one
        #[arg(long)]
        auto_progress: bool,
        /// Evaluate the scan as of this date instead of today
        #[arg(long, value_name = "YYYY-MM-DD")]
        as_of: Option<String>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the most recent scan report
    Last {
        #[arg(long)]
        json: bool,
    },
    /// Send a delivery-check message through the configured backend
    Test {
        /// Recipient address
        #[arg(long)]
        to: String,
    },
}

/// Relay when configured, console otherwise.
pub(crate) fn build_notifier(config: &Config) -> Box<dyn Notifier> {
    match HttpMailer::from_config(&config.notifications) {
        Ok(mailer) => Box::new(mailer),
        Err(_) => Box::new(ConsoleMailer),
    }
}

pub fn run(action: NotifyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        NotifyAction::Run {
            dry_run,
            auto_progress,
            as_of,
            json,
        } => {
            let db = Database::open()?;
            let config = Config::load()?;
            let clock: Box<dyn Clock> = match as_of {
                Some(raw) => Box::new(FixedClock(NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?)),
                None => Box::new(SystemClock),
            };
            let notifier = build_notifier(&config);
            let opts = ScanOptions {
                dry_run,
                auto_progress: auto_progress || config.auto_progress,
                sends_enabled: config.notifications.enabled,
            };
            log::debug!(
                "scan: dry_run={} auto_progress={} backend={}",
                opts.dry_run,
                opts.auto_progress,
                notifier.name()
            );

            let rt = tokio::runtime::Runtime::new()?;
            let _guard = rt.enter();
            let engine = ProgressionEngine::new(&db, clock.as_ref(), notifier.as_ref());
            let report = engine.scan(&opts)?;

            db.kv_set(LAST_SCAN_KEY, &serde_json::to_string(&report)?)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        NotifyAction::Last { json } => {
            let db = Database::open()?;
            match db.kv_get(LAST_SCAN_KEY)? {
                Some(raw) => {
                    let report: ScanReport = serde_json::from_str(&raw)?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        print_report(&report);
                    }
                }
                None => println!("No scan has run yet."),
            }
        }
        NotifyAction::Test { to } => {
            let config = Config::load()?;
            let notifier = build_notifier(&config);
            let rt = tokio::runtime::Runtime::new()?;
            let _guard = rt.enter();
            let (subject, body) = message::delivery_check(&to);
            notifier.send(&to, &subject, &body)?;
            println!("Delivery check sent to {to} via the {} backend.", notifier.name());
        }
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    println!("Checking {} active treatment steps...", report.checked);

    for event in &report.events {
        match event {
            Event::IntegrityWarning {
                treatment_id,
                active_count,
                ..
            } => println!(
                "WARNING: treatment {treatment_id} has {active_count} active steps; expected at most one"
            ),
            Event::WouldNotify {
                step_name,
                recipient,
                ..
            } => println!("[DRY RUN] Would notify {recipient} for step '{step_name}'"),
            Event::NotificationSent {
                step_name,
                recipient,
                ..
            } => println!("Notification sent to {recipient} for step '{step_name}'"),
            Event::NotificationFailed {
                step_name, reason, ..
            } => println!("Failed to send notification for step '{step_name}': {reason}"),
            Event::NotificationSkipped { step_name, .. } => {
                println!("Notifications disabled; skipped step '{step_name}'")
            }
            Event::StepCompleted { .. } => {}
            Event::StepActivated { step_name, .. } => {
                println!("  -> Auto-progressed to next step: '{step_name}'")
            }
            Event::TreatmentCompleted { .. } => {
                println!("  -> Treatment completed! No more steps.")
            }
            Event::AdvanceFailed {
                step_name, reason, ..
            } => println!("Failed to auto-progress step '{step_name}': {reason}"),
        }
    }

    println!();
    if report.dry_run {
        println!("[DRY RUN] Would send {} notifications.", report.notified);
    } else {
        println!("Sent {} notifications.", report.notified);
        if report.auto_progress {
            println!("Progressed {} patients to next steps.", report.progressed);
        }
        if report.failed > 0 {
            println!("{} steps failed; they stay eligible for the next run.", report.failed);
        }
    }
}
