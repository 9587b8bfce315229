use clap::Parser;
use portwarden::cli::{Cli, Commands};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
    set_up_logger();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Encrypt => portwarden::cli::commands::encrypt::execute(&cli),
        Commands::Decrypt => portwarden::cli::commands::decrypt::execute(&cli),
        Commands::Restore => portwarden::cli::commands::restore::execute(&cli),
        Commands::Completions { ref shell } => portwarden::cli::commands::completions::execute(shell),
    };

    if let Err(e) = result {
        portwarden::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

/// Log to stderr with RFC 3339 UTC timestamps. `RUST_LOG` picks the level
/// (`info` when unset).
fn set_up_logger() {
    let subscriber = FmtSubscriber::builder()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Unable to set global default subscriber");
    }
}
