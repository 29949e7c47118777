use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;
use whatsapp_bridge::{server, BridgeConfig, MemoryClientFactory, SessionManager, WebhookRelay};

/// Multi-session WhatsApp bridge relaying events to a business application.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Host the command interface binds to.
    #[arg(long)]
    host: Option<String>,

    /// Port the command interface listens on (overrides PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Base URL of the relay target (overrides ODOO_URL).
    #[arg(long)]
    relay_url: Option<String>,

    /// Choose a command to run.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bridge service (default).
    Serve,
    /// Print the effective configuration.
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = BridgeConfig::from_env();
    if let Some(host) = cli.host {
        config = config.with_host(host);
    }
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(url) = cli.relay_url {
        config = config.with_relay_url(url);
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            info!("relaying events to {}", config.relay.hook_url());
            let sink = Arc::new(WebhookRelay::new(config.relay.clone()));
            let factory = Arc::new(MemoryClientFactory::new().with_pairing_qr());
            let manager = Arc::new(
                SessionManager::new(factory, sink)
                    .with_message_limit(config.default_message_limit),
            );
            server::serve(&config.listen_addr(), manager).await?;
        }
        Commands::ShowConfig => {
            println!("{:#?}", config);
        }
    }

    Ok(())
}
