mod cli;
mod commands;
mod launch;

use estatecore_ops::error::AppError;
use std::process::ExitCode;

pub async fn run() -> Result<ExitCode, AppError> {
    cli::run().await
}
