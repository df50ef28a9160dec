use autocare_server::{config, logging};
use clap::Parser;
use std::path::PathBuf;

/// LAN data server for AutoCare clients.
#[derive(Parser)]
#[command(name = "autocare-server", version)]
struct Args {
    /// Override `server.host` from the config.
    #[arg(long)]
    host: Option<String>,
    /// Override `server.port` from the config.
    #[arg(long)]
    port: Option<u16>,
    /// Override `storage.data_path` from the config.
    #[arg(long)]
    data: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = config::get_config()?.clone();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data) = args.data {
        config.storage.data_path = data;
    }

    logging::init_logging(&config.logging);
    autocare_server::run(&config).await
}
