use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "medtrack-cli", version, about = "Medtrack CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Notification scan and delivery checks
    Notify {
        #[command(subcommand)]
        action: commands::notify::NotifyAction,
    },
    /// Step inspection and progression
    Step {
        #[command(subcommand)]
        action: commands::step::StepAction,
    },
    /// Treatment management
    Treatment {
        #[command(subcommand)]
        action: commands::treatment::TreatmentAction,
    },
    /// Patient management
    Patient {
        #[command(subcommand)]
        action: commands::patient::PatientAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Notify { action } => commands::notify::run(action),
        Commands::Step { action } => commands::step::run(action),
        Commands::Treatment { action } => commands::treatment::run(action),
        Commands::Patient { action } => commands::patient::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
