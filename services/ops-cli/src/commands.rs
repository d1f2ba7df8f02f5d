use crate::launch;
use clap::Args;
use estatecore_ops::bootstrap::ColumnMigration;
use estatecore_ops::config::AppConfig;
use estatecore_ops::database;
use estatecore_ops::error::AppError;
use estatecore_ops::loader::{execute_plan, CopyScript, LoadPlan};
use estatecore_ops::readiness::{self, RetryPolicy};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct CsvDirArgs {
    /// Directory holding the *_psql.csv exports
    #[arg(long, default_value = ".")]
    pub(crate) csv_dir: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct GenerateArgs {
    #[command(flatten)]
    pub(crate) input: CsvDirArgs,
    /// Write the script here instead of stdout
    #[arg(long, short)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct LoadArgs {
    #[command(flatten)]
    pub(crate) input: CsvDirArgs,
    /// Run the readiness gate before connecting
    #[arg(long)]
    pub(crate) wait: bool,
    /// Print the load report as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct BootstrapArgs {
    /// Print the SQL instead of applying it
    #[arg(long)]
    pub(crate) print: bool,
    #[arg(long, default_value = "user")]
    pub(crate) table: String,
    #[arg(long, default_value = "role")]
    pub(crate) column: String,
    #[arg(long, default_value = "VARCHAR(50)")]
    pub(crate) sql_type: String,
    /// Value backfilled into existing rows
    #[arg(long, default_value = "user")]
    pub(crate) default: String,
    /// Leave the column nullable after the backfill
    #[arg(long)]
    pub(crate) nullable: bool,
}

impl BootstrapArgs {
    pub(crate) fn migration(&self) -> ColumnMigration {
        ColumnMigration::new(&self.table, &self.column, &self.sql_type, &self.default)
            .nullable(self.nullable)
    }
}

#[derive(Args, Debug)]
pub(crate) struct WaitArgs {
    /// Override DB_WAIT_ATTEMPTS
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) attempts: Option<u32>,
    /// Override DB_WAIT_INTERVAL (e.g. 2s, 500ms)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) interval: Option<Duration>,
    /// Command launched once the database answers
    #[arg(last = true)]
    pub(crate) command: Vec<String>,
}

impl WaitArgs {
    fn policy(&self, config: &AppConfig) -> RetryPolicy {
        RetryPolicy::new(
            self.attempts.unwrap_or(config.readiness.max_attempts()),
            self.interval.unwrap_or(config.readiness.interval()),
        )
    }
}

pub(crate) fn validate(args: CsvDirArgs) -> Result<ExitCode, AppError> {
    let plan = LoadPlan::discover(&args.csv_dir)?;
    println!("CSV directory: {}", plan.directory().display());
    for entry in plan.entries() {
        println!(
            "- {} ({}): header ok -> {}",
            entry.spec().file_name,
            entry.entity.label(),
            entry.spec().table
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn generate(args: GenerateArgs) -> Result<ExitCode, AppError> {
    let plan = LoadPlan::discover(&args.input.csv_dir)?;
    let script = CopyScript::from_plan(&plan);

    match args.output {
        Some(path) => {
            script.write_to(&path)?;
            info!(
                output = %path.display(),
                statements = script.statements().len(),
                "wrote COPY script"
            );
        }
        None => print!("{}", script.render()),
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) async fn load(config: &AppConfig, args: LoadArgs) -> Result<ExitCode, AppError> {
    let url = config.database.require_url()?;
    let plan = LoadPlan::discover(&args.input.csv_dir)?;

    if args.wait {
        readiness::wait_for_database(url, config.readiness).await?;
    }

    let mut client = database::connect(url).await?;
    let report = execute_plan(&mut client, &plan).await?;

    if args.json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|err| AppError::Io(err.into()))?;
        println!("{rendered}");
    } else {
        for table in &report.tables {
            println!("[{}] {} rows loaded", table.table, table.rows);
        }
        println!("Done. {} total rows.", report.total_rows());
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) async fn bootstrap(
    config: &AppConfig,
    args: BootstrapArgs,
) -> Result<ExitCode, AppError> {
    let migration = args.migration();
    if args.print {
        print!("{}", migration.render_script());
        return Ok(ExitCode::SUCCESS);
    }

    let url = config.database.require_url()?;
    let mut client = database::connect(url).await?;
    migration.apply(&mut client).await?;
    Ok(ExitCode::SUCCESS)
}

/// Entrypoint gate: block until the database answers, then hand over to the
/// trailing command.
pub(crate) async fn wait(config: &AppConfig, args: WaitArgs) -> Result<ExitCode, AppError> {
    let url = config.database.require_url()?;
    readiness::wait_for_database(url, args.policy(config)).await?;

    let Some((program, rest)) = args.command.split_first() else {
        return Ok(ExitCode::SUCCESS);
    };

    info!(%program, port = config.server.port, "launching");
    Ok(launch::hand_over(program, rest)?)
}
