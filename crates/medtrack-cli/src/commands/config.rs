use clap::Subcommand;
use medtrack_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the active configuration as TOML
    Show,
    /// Set the HTTP mail relay endpoint
    SetRelay {
        url: String,
        /// Bearer token, when the relay requires one
        #[arg(long)]
        token: Option<String>,
    },
    /// Set the standing auto-progress policy
    SetAutoProgress {
        #[arg(value_parser = clap::value_parser!(bool))]
        enabled: bool,
    },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::SetRelay { url, token } => {
            let mut config = Config::load()?;
            config.notifications.relay_url = Some(url);
            config.notifications.relay_token = token;
            config.save()?;
            println!("Mail relay updated.");
        }
        ConfigAction::SetAutoProgress { enabled } => {
            let mut config = Config::load()?;
            config.auto_progress = enabled;
            config.save()?;
            println!("Auto-progress set to {enabled}.");
        }
    }
    Ok(())
}
