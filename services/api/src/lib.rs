mod cli;
mod commands;
mod infra;
mod routes;
mod scheduler;
mod server;

use feed_relay::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
