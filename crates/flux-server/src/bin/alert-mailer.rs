use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use flux_config::{validate_mailer, ConfigLoader};
use flux_server::mailer::{wait_while_disabled, MailerContext, PROGRAM};
use flux_server::{hostname, init_logging};
use flux_shutdown::SignalHandler;

#[derive(Parser, Debug)]
#[command(name = "alert-mailer", version, about = "Sends rate-limited notifications for alert transitions")]
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
    validate_mailer(&config)?;

    init_logging(&config.logging)?;
    let hostname = hostname();
    info!(program = PROGRAM, config = %args.config, hostname = %hostname, "Starting alert mailer");

    let (handler, listener) = SignalHandler::new();
    let signals = tokio::spawn(async move {
        if let Err(e) = handler.wait_for_system_signal().await {
            error!(error = %e, "Failed to listen for signals");
        }
    });

    if let Some(flag) = &config.mailer.disable_file {
        let mut startup = listener.clone();
        if !wait_while_disabled(flag, config.mailer.disable_poll(), &mut startup).await {
            info!("Shutdown while disabled");
            return Ok(());
        }
    }

    let context = MailerContext::from_config(&config, &hostname, listener)?;
    let result = context.run().await;
    signals.abort();

    match result {
        Ok(stats) => {
            info!(
                delivered = stats.delivered,
                suppressed = stats.suppressed,
                rate_limited = stats.rate_limited,
                failed = stats.delivery_failed,
                malformed = stats.malformed,
                "Alert mailer stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Alert mailer failed");
            Err(e)
        }
    }
}
