//! ADC hub server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port with the default password
//! adchub-server
//!
//! # Custom endpoint, LAN clients skip the password challenge
//! adchub-server --bind 0.0.0.0:412 --password sekrit --bypass-prefix 10.
//! ```

use adchub_server::{HubConfig, Server, ServerConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// ADC hub server
#[derive(Parser, Debug)]
#[command(name = "adchub-server")]
#[command(about = "ADC chat/file-sharing hub server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3231")]
    bind: String,

    /// Shared hub password
    #[arg(short, long, default_value = "madcap")]
    password: String,

    /// Address prefix whose clients skip the password challenge
    #[arg(long)]
    bypass_prefix: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("ADC hub starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerConfig {
        bind_address: args.bind,
        password: args.password,
        hub: HubConfig { bypass_prefix: args.bypass_prefix },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Hub listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
