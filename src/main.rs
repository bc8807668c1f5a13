use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ratewindow::config::{Backend, LoggingConfig, RatewindowConfig};
use ratewindow::transport::{MemoryTransport, RedisTransport, Transport};
use ratewindow::{FixedWindowStore, Limiter, Rate};

/// Inspect fixed-window rate limit counters.
#[derive(Debug, Parser)]
#[command(name = "ratewindow", version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the store answers its liveness round-trip
    Ping,
    /// Count one request for an identifier and print the decision as JSON
    Get {
        identifier: String,
        /// Rate such as 100-M, overriding the configured one
        #[arg(long)]
        rate: Option<Rate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = RatewindowConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.store.backend,
        "Starting ratewindow"
    );

    match config.store.backend {
        Backend::Redis => {
            let transport =
                RedisTransport::from_url(&config.store.url, config.store.pool_max_size)?;
            run(transport, &config, cli.command).await
        }
        Backend::Memory => run(MemoryTransport::new(), &config, cli.command).await,
    }
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run<T: Transport>(
    transport: T,
    config: &RatewindowConfig,
    command: Command,
) -> anyhow::Result<()> {
    let store = FixedWindowStore::new(transport, &config.limiter.prefix).await?;

    match command {
        Command::Ping => {
            info!(prefix = %store.prefix(), "Store is reachable");
            println!("PONG");
        }
        Command::Get { identifier, rate } => {
            let limiter = Limiter::new(store, rate.unwrap_or(config.limiter.rate));
            let decision = limiter.get(&identifier).await?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
    }

    Ok(())
}
