use crate::commands::{self, BootstrapArgs, CsvDirArgs, GenerateArgs, LoadArgs, WaitArgs};
use clap::{Parser, Subcommand};
use estatecore_ops::config::{AppConfig, TelemetryConfig};
use estatecore_ops::error::AppError;
use estatecore_ops::telemetry;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "estatecore-ops",
    about = "Schema bootstrap, bulk CSV loading and database readiness for EstateCore",
    version
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every catalog CSV header against its column contract
    Validate(CsvDirArgs),
    /// Write a reviewable COPY script for psql
    Generate(GenerateArgs),
    /// Load the CSV directory in a single transaction
    Load(LoadArgs),
    /// Apply (or print) the idempotent column migration
    Bootstrap(BootstrapArgs),
    /// Wait for the database, then optionally launch a command
    Wait(WaitArgs),
}

pub(crate) async fn run() -> Result<ExitCode, AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Validate(args) => {
            offline()?;
            commands::validate(args)
        }
        Command::Generate(args) => {
            offline()?;
            commands::generate(args)
        }
        Command::Load(args) => commands::load(&online()?, args).await,
        Command::Bootstrap(args) => commands::bootstrap(&online()?, args).await,
        Command::Wait(args) => commands::wait(&online()?, args).await,
    }
}

/// Telemetry only. `validate` and `generate` never touch the database.
fn offline() -> Result<(), AppError> {
    telemetry::init(&TelemetryConfig::load())?;
    Ok(())
}

fn online() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    debug!(
        environment = ?config.environment,
        port = config.server.port,
        "configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn wait_collects_trailing_command() {
        let cli = Cli::try_parse_from([
            "estatecore-ops",
            "wait",
            "--attempts",
            "5",
            "--interval",
            "500ms",
            "--",
            "gunicorn",
            "-b",
            "0.0.0.0:8000",
            "wsgi:app",
        ])
        .expect("wait parses");

        match cli.command {
            Command::Wait(args) => {
                assert_eq!(args.attempts, Some(5));
                assert_eq!(args.interval, Some(Duration::from_millis(500)));
                assert_eq!(args.command, ["gunicorn", "-b", "0.0.0.0:8000", "wsgi:app"]);
            }
            other => panic!("expected wait, got {other:?}"),
        }
    }

    #[test]
    fn bootstrap_defaults_to_user_role() {
        let cli = Cli::try_parse_from(["estatecore-ops", "bootstrap", "--print"])
            .expect("bootstrap parses");
        match cli.command {
            Command::Bootstrap(args) => {
                assert!(args.print);
                let migration = args.migration();
                assert_eq!(migration.table, "user");
                assert_eq!(migration.column, "role");
                assert!(!migration.nullable);
            }
            other => panic!("expected bootstrap, got {other:?}"),
        }
    }

    #[test]
    fn zero_attempts_are_rejected() {
        let parsed = Cli::try_parse_from(["estatecore-ops", "wait", "--attempts", "0"]);
        assert!(parsed.is_err());
    }
}
