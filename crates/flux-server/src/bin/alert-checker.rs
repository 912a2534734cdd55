use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use flux_bus::{BusClient, ReconnectPolicy};
use flux_config::ConfigLoader;
use flux_server::bus::transport;
use flux_server::checker::{dry_run_output, CheckerArgs, PROGRAM};
use flux_server::{hostname, init_logging};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CheckerArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CheckerArgs) -> anyhow::Result<()> {
    let config = ConfigLoader::from_file(&args.config).load()?;
    // 日志初始化失败不影响检查
    let _ = init_logging(&config.logging);

    let hostname = hostname();
    let (alert, headers) = args.prepare(&config.checker, &hostname).await?;
    info!(alert_id = %alert.id, summary = %alert.summary, "Check complete");

    if args.dry_run {
        println!("{}", dry_run_output(&alert, &headers)?);
        return Ok(());
    }

    let client_id = format!("{}-{}", PROGRAM, alert.id);
    let mut bus = BusClient::new(
        transport(&config.broker, &client_id),
        ReconnectPolicy::single_attempt(),
    );

    let published = bus.publish(&config.destinations.alerts, &alert, headers).await;
    if let Err(e) = bus.disconnect().await {
        error!(error = %e, "Bus disconnect failed");
    }
    published.map_err(|e| anyhow::anyhow!("Could not send alert to broker - {}", e))?;

    if !args.quiet {
        println!("{}", alert.id);
    }
    Ok(())
}
