//! TunnelGate CLI
//!
//! Runs the WebSocket tunnel gateway and manages its settings.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use tunnelgate_daemon::GatewayServer;
use tunnelgate_logging::init_logging;
use tunnelgate_settings::{ServerConfig, Settings};

/// TunnelGate - authenticated TCP tunnels over WebSocket
#[derive(Parser)]
#[command(name = "tunnelgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway (default)
    Serve(ServeArgs),

    /// Print a fresh random UUID to use as the identity token
    Token,

    /// Show the resolved configuration and exit
    CheckConfig(ServeArgs),

    /// Write a settings file with default values
    InitConfig {
        /// Destination file
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface address to bind
    #[arg(long)]
    host: Option<String>,

    /// TCP port to bind (0 picks a free port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Identity token, overrides the UUID environment variable
    #[arg(long)]
    uuid: Option<String>,

    /// Outbound connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,
}

impl ServeArgs {
    /// File, then environment, then flags
    fn load(&self) -> Result<ServerConfig> {
        let mut settings = match &self.config {
            Some(path) => Settings::load_from(path)
                .with_context(|| format!("Failed to load settings from {:?}", path))?,
            None => Settings::default(),
        };
        settings.apply_env();

        if let Some(host) = &self.host {
            settings.listen.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.listen.port = port;
        }
        if let Some(uuid) = &self.uuid {
            settings.auth.uuid = uuid.clone();
        }
        if let Some(secs) = self.connect_timeout {
            settings.outbound.connect_timeout_secs = secs;
        }

        settings.resolve().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => {
            run_server(args.load()?).await?;
        }
        Commands::Token => {
            println!("{}", uuid::Uuid::new_v4());
        }
        Commands::CheckConfig(args) => {
            print_config(&args.load()?);
        }
        Commands::InitConfig { path, force } => {
            init_config(&path, force)?;
        }
    }

    Ok(())
}

async fn run_server(config: ServerConfig) -> Result<()> {
    info!("Starting TunnelGate gateway...");

    let server = GatewayServer::bind(&config).await?;
    info!("Accepting tunnels on {}", server.local_addr());

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down...");
        })
        .await?;

    Ok(())
}

fn print_config(config: &ServerConfig) {
    println!("TunnelGate Configuration");
    println!("========================");
    println!("Listen:          {}", config.listen_addr);
    println!(
        "UUID:            <redacted>{}",
        if config.identity.is_default() {
            " (built-in default, testing only)"
        } else {
            ""
        }
    );
    println!("Connect timeout: {}s", config.connect_timeout.as_secs());
}

fn init_config(path: &PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
    }

    let mut settings = Settings::default();
    settings.auth.uuid = uuid::Uuid::new_v4().to_string();
    settings
        .save_to(path)
        .with_context(|| format!("Failed to write {:?}", path))?;

    println!("Wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = ServeArgs {
            host: Some("127.0.0.1".to_string()),
            port: Some(0),
            uuid: Some("00112233445566778899aabbccddeeff".to_string()),
            connect_timeout: Some(3),
            ..ServeArgs::default()
        };

        let config = args.load().unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:0".parse().unwrap());
        assert!(!config.identity.is_default());
        assert_eq!(config.connect_timeout.as_secs(), 3);
    }

    #[test]
    fn test_bad_uuid_flag_fails() {
        let args = ServeArgs {
            uuid: Some("nope".to_string()),
            ..ServeArgs::default()
        };
        assert!(args.load().is_err());
    }

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::try_parse_from(["tunnelgate", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.command.is_none());
    }
}
