use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Role-gated natural-language SQL service with karma-based reputation.
#[derive(Parser)]
#[command(name = "querywarden", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "querywarden=info,tower_http=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = querywarden::config::Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    querywarden::gateway::run(config).await
}
