pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use quotecalc_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "quotecalc",
    about = "Price quote calculation engine operator CLI",
    after_help = "Examples:\n  quotecalc migrate\n  quotecalc preview --input quote.toml --reference-date 2026-03-01\n  quotecalc config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Calculate a quote from an input file without persisting it")]
    Preview {
        #[arg(long, help = "Path to a TOML file with the raw quote inputs")]
        input: PathBuf,
        #[arg(long, help = "Deal id to stamp on the previewed aggregate")]
        deal: Option<String>,
        #[arg(long, help = "Fixed reference date (YYYY-MM-DD) for the payment schedule")]
        reference_date: Option<String>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

fn init_tracing() {
    // Best effort: an invalid config already fails loudly in the command
    // itself, so logging falls back to defaults here.
    let (level, format) = AppConfig::load(LoadOptions::default())
        .map(|config| (config.logging.level, config.logging.format))
        .unwrap_or_else(|_| ("info".to_string(), LogFormat::Compact));

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    // A second init in tests is fine to ignore.
    let _ = result;
}

pub fn run() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Preview { input, deal, reference_date } => {
            commands::preview::run(&input, deal, reference_date)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
