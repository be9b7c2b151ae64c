//! chattr binary entry point.

use clap::Parser;
use chattr::cli::{commands, Cli, Commands};
use chattr::config::{LogSettings, Settings};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            chattr::logging::init(&LogSettings::default());
            tracing::error!(error = %e, "failed to load settings");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    chattr::logging::init(&settings.log);

    let result = match cli.command {
        Commands::Serve(args) => commands::serve(settings, args).await,
        Commands::Chat(args) => commands::chat(settings, args).await,
        Commands::CheckConfig => commands::check_config(&settings),
        Commands::Ingest(args) => commands::ingest(settings, args).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, category = ?e.category(), "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
