use crate::commands::{run_convert, run_groups, ConvertArgs, GroupsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use feed_relay::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Feed Relay",
    about = "Convert developer listing feeds into marketplace ad feeds",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run one conversion and write the marketplace feed
    Convert(ConvertArgs),
    /// Print listing counts per building with override coverage
    Groups(GroupsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    // Feed downloads use a blocking client, so one-shot commands leave the runtime.
    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Convert(args) => blocking(move || run_convert(args)).await,
        Command::Groups(args) => blocking(move || run_groups(args)).await,
    }
}

async fn blocking<F>(command: F) -> Result<(), AppError>
where
    F: FnOnce() -> Result<(), AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(command)
        .await
        .map_err(|err| AppError::Io(std::io::Error::other(err)))?
}
