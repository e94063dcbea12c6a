use crate::demo::{run_demo, run_price, DemoArgs, PriceArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use fleet_lease::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Fleet Lease Quotes",
    about = "Price fleet-leasing quotes and drive them through the proposal workflow",
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
    /// Price a single catalog vehicle and print the monthly breakdown
    Price(PriceArgs),
    /// Create a quote and walk it through the approval workflow
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// CSV export of vehicle groups replacing the seeded catalog
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Price(args) => run_price(args),
        Command::Demo(args) => run_demo(args),
    }
}
