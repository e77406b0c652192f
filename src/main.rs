use clap::Parser;
use tracing_subscriber::EnvFilter;

use rover_base_runtime::config::{BaseConfig, DEFAULT_BAUD, DEFAULT_PORT, DEFAULT_TOPIC_PREFIX};

/// Omnidirectional base runtime: velocity commands in, motor commands and IMU telemetry out
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Serial port of the motor controller
    #[arg(long, default_value = DEFAULT_PORT)]
    port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Prefix for every zenoh topic
    #[arg(long, default_value = DEFAULT_TOPIC_PREFIX)]
    topic_prefix: String,
}

#[tokio::main]
async fn main() {
    // Setup logging (RUST_LOG overrides the default "info")
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = BaseConfig {
        port: args.port,
        baud: args.baud,
        topic_prefix: args.topic_prefix,
        ..BaseConfig::default()
    };

    if let Err(e) = rover_base_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
