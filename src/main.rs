// `main.rs` only sets up logging, parses the command line and delegates to
// `server::run()`. The command table, serial sink, HTTP handlers and MQTT
// subscriber each live in their own module under `src/`.
mod command;
mod config;
mod dispatch;
mod handlers;
mod lifecycle;
mod metrics;
mod mqtt;
mod serial;
mod server;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = config::Args::parse();
    server::run(args).await
}
