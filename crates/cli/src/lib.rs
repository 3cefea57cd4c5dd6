mod cli_args;
mod state;

use clap::Parser;
use cli_args::CliArgs;
use harvest_diagnostics::enable_tracing_by_env;

pub async fn main() -> miette::Result<()> {
    enable_tracing_by_env();
    CliArgs::parse().run().await
}
