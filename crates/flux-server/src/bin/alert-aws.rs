use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use flux_config::{validate, ConfigLoader};
use flux_server::aws::{build_poller, run_poller, PROGRAM};
use flux_server::{bus_client, hostname, init_logging};
use flux_shutdown::SignalHandler;

#[derive(Parser, Debug)]
#[command(name = "alert-aws", version, about = "Polls cloud instance state and publishes alerts on change")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "alerta.toml")]
    config: String,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::from_file(&args.config).load()?;
    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }
    validate(&config)?;

    init_logging(&config.logging)?;
    let hostname = hostname();
    info!(program = PROGRAM, config = %args.config, hostname = %hostname, "Starting AWS poller");

    let (handler, listener) = SignalHandler::new();
    let signals = tokio::spawn(async move {
        if let Err(e) = handler.wait_for_system_signal().await {
            error!(error = %e, "Failed to listen for signals");
        }
    });

    let poller = build_poller(&config, &hostname)?;
    let bus = bus_client(&config.broker, PROGRAM, &hostname, listener.clone());

    let result = run_poller(poller, bus, &config.destinations.alerts, listener).await;
    signals.abort();

    if let Err(e) = &result {
        error!(error = %e, "AWS poller failed");
    }
    result
}
