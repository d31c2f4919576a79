use clap::Parser;
use portal_gateway::cli::Cli;
use portal_gateway::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse();
    portal_telemetry::init(config.log_format.into())?;

    server::run(config).await
}
