mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use ivi_alerts::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
