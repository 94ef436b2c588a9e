//! duplex-ftp server entry point

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

use duplex_ftp::error::ServerError;
use duplex_ftp::{Server, ServerConfig};

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Parser, Debug)]
#[command(name = "duplex-ftp-server", about = "Minimal active-mode FTP server.")]
struct Args {
    /// Configuration file; `config.toml` is used when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind the control listener to
    #[arg(short, long)]
    bind: Option<String>,

    /// Control port
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory sessions are confined to
    #[arg(short, long)]
    root: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<ServerConfig, ServerError> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path, true)?,
        None => ServerConfig::load(DEFAULT_CONFIG.as_ref(), false)?,
    };

    if let Some(bind) = &args.bind {
        config.bind_address = bind.clone();
    }
    if let Some(port) = args.port {
        config.control_port = port;
    }
    if let Some(root) = &args.root {
        config.server_root = root.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<(), ServerError> {
    let config = load_config(&args)?;
    info!(
        "Loaded configuration: {} users, max {} clients",
        config.users.len(),
        config.max_clients
    );

    let server = Server::bind(&config).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Launching FTP server...");
    if let Err(e) = run(Args::parse()).await {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("Server stopped");
}
