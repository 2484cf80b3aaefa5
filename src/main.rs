//! Glucose relay entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use glucose_relay::api::{create_router, AppState};
use glucose_relay::cache::ReadingCache;
use glucose_relay::config::Config;
use glucose_relay::metrics;
use glucose_relay::provider::{DexcomClient, ReadingProvider, UnavailableProvider};
use glucose_relay::utils::shutdown_signal;

/// Plain-text relay for the latest Dexcom Share glucose reading.
#[derive(Parser, Debug)]
#[command(name = "glucose-relay")]
#[command(about = "Serve the latest Dexcom Share glucose reading as plain text")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP relay (default).
    Serve {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Fetch one reading directly, bypassing the refresh interval.
    Fetch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("glucose_relay=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::Serve { port }) => cmd_serve(port.or(args.port)).await,
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Fetch) => cmd_fetch().await,
        None => cmd_serve(args.port).await,
    }
}

/// Load configuration, warning about missing credentials.
fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    for name in config.missing_credentials() {
        warn!("{} is not set; fetches will fail until it is configured", name);
    }

    Ok(config)
}

/// Build the Share client, or a stand-in that always fails.
fn build_provider(config: &Config) -> Arc<dyn ReadingProvider> {
    match DexcomClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to construct Dexcom client: {}", e);
            Arc::new(UnavailableProvider::new(e.to_string()))
        }
    }
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("GLUCOSE RELAY - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    let missing = config.missing_credentials();

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!(
        "  Username: {}",
        config.dexcom_username.as_deref().unwrap_or("<unset>")
    );
    println!(
        "  Password: {}",
        if config.dexcom_password.is_some() { "<set>" } else { "<unset>" }
    );
    println!(
        "  Region: {} ({})",
        config.dexcom_region,
        config.dexcom_region.base_url()
    );
    println!("  Fetch Timeout: {}ms", config.fetch_timeout_ms);
    println!("  Port: {}", config.port);
    println!(
        "  Metrics: {}",
        if config.metrics_enabled { "Enabled" } else { "Disabled" }
    );
    println!("======================================================================");

    if missing.is_empty() {
        println!("CONFIGURATION CHECK PASSED");
    } else {
        println!("WARNING: missing {}", missing.join(", "));
    }
    println!("======================================================================");

    Ok(())
}

/// Fetch one reading and print it in the HTTP body format.
async fn cmd_fetch() -> anyhow::Result<()> {
    let config = load_config()?;
    let client = DexcomClient::new(&config)?;

    let reading = tokio::time::timeout(config.fetch_timeout(), client.current_reading())
        .await
        .map_err(|_| anyhow::anyhow!("fetch timed out after {}ms", config.fetch_timeout_ms))??;

    match reading.to_plain_text() {
        Some(body) => println!("{}", body),
        None => println!("No Data"),
    }

    if let Some(mmol) = reading.mmol_l() {
        info!("{} mmol/L", mmol);
    }

    Ok(())
}

/// Run the HTTP relay.
async fn cmd_serve(port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = load_config()?;

    if let Some(port) = port_override {
        config.port = port;
    }

    let provider = build_provider(&config);
    let cache = ReadingCache::new(config.fetch_timeout());
    let mut app_state = AppState::new(provider, cache);

    if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => app_state = app_state.with_metrics(handle),
            Err(e) => warn!("Metrics disabled: {}", e),
        }
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    info!("Region: {}", config.dexcom_region);

    axum::serve(listener, create_router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
