//! CATH Shield daemon
//!
//! Wires the engine with the mock Deep3 analyzer and price supplier, starts
//! the bot lifecycle scheduler and the metrics endpoint, and optionally feeds
//! simulated transfers through the classification pipeline.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use cath_shield::bot_templates::builtin_template;
use cath_shield::clock::SystemClock;
use cath_shield::components::deep3::MockDeep3Analyzer;
use cath_shield::components::event_bus::ShieldEvent;
use cath_shield::components::price_feed::MockPriceSource;
use cath_shield::config::{Config, StorageBackend};
use cath_shield::demo::DemoGenerator;
use cath_shield::metrics::metrics;
use cath_shield::storage::{MemStorage, Repository};
use cath_shield::types::NewWallet;
use cath_shield::{endpoints, ShieldEngine};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Metrics port (overrides the config file)
    #[arg(long, env = "CATH_SHIELD_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Storage backend (memory or sled, overrides the config file)
    #[arg(long)]
    storage: Option<String>,

    /// Feed simulated transfers through the pipeline
    #[arg(long)]
    demo: bool,

    /// Seconds between simulated transfers
    #[arg(long, default_value = "5")]
    demo_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.json_logs)?;

    info!("🛡️ Starting CATH Shield");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("📋 Loading configuration from: {}", args.config);
    let mut config = load_config(&args.config)?;
    if let Some(port) = args.metrics_port {
        config.monitoring.metrics_port = port;
    }
    if let Some(backend) = &args.storage {
        config.storage.backend = parse_backend(backend)?;
    }

    let storage = open_repository(&config)?;

    let analyzer = Arc::new(MockDeep3Analyzer::new(
        Duration::from_millis(config.suppliers.analysis_latency_min_ms),
        Duration::from_millis(config.suppliers.analysis_latency_max_ms),
    ));
    let prices = Arc::new(MockPriceSource::new(
        config.suppliers.cath_price_in_sol,
        config.suppliers.sol_price_in_usd,
    ));
    let engine = ShieldEngine::new(
        config.clone(),
        storage.repo.clone(),
        analyzer,
        prices,
        Arc::new(SystemClock),
    );

    if config.monitoring.enable_metrics {
        let metrics_port = config.monitoring.metrics_port;
        info!("📊 Starting metrics server on port {}", metrics_port);
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(metrics_port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    match engine.price_list().await {
        Ok(list) => info!(
            "💰 Pro tier {:.4} SOL, Pro+ tier {:.4} SOL",
            list.pro_tier.sol, list.pro_plus_tier.sol
        ),
        Err(e) => warn!("Price list unavailable: {}", e),
    }

    let lifecycle = engine.lifecycle_manager();
    lifecycle.start();

    info!("✅ All components initialized successfully");

    let demo = if args.demo {
        Some(Duration::from_secs(args.demo_interval_secs.max(1)))
    } else {
        None
    };
    let result = run_event_loop(&engine, demo).await;

    lifecycle.stop();
    storage.flush().await?;

    info!("👋 Shut down gracefully");
    result
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "cath_shield=debug,info"
    } else {
        "cath_shield=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
            .context("Failed to install JSON log subscriber")?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .context("Failed to install log subscriber")?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_backend(value: &str) -> Result<StorageBackend> {
    match value {
        "memory" => Ok(StorageBackend::Memory),
        "sled" => Ok(StorageBackend::Sled),
        other => anyhow::bail!("unknown storage backend '{}'", other),
    }
}

/// Repository plus the concrete sled handle, kept for the shutdown flush
struct OpenedStorage {
    repo: Arc<dyn Repository>,
    #[cfg(feature = "sled-storage")]
    sled: Option<Arc<cath_shield::storage::SledStorage>>,
}

impl OpenedStorage {
    async fn flush(&self) -> Result<()> {
        #[cfg(feature = "sled-storage")]
        {
            if let Some(sled) = &self.sled {
                let bytes = sled.flush().await.context("Failed to flush storage")?;
                info!("💾 Flushed {} bytes to disk", bytes);
            }
        }
        Ok(())
    }
}

#[cfg(feature = "sled-storage")]
fn open_repository(config: &Config) -> Result<OpenedStorage> {
    use cath_shield::storage::SledStorage;

    match config.storage.backend {
        StorageBackend::Memory => {
            info!("💾 Using in-memory storage");
            Ok(OpenedStorage {
                repo: Arc::new(MemStorage::new()),
                sled: None,
            })
        }
        StorageBackend::Sled => {
            info!("💾 Opening sled storage at {}", config.storage.path);
            let store = Arc::new(
                SledStorage::open(&config.storage.path)
                    .with_context(|| format!("Failed to open sled at {}", config.storage.path))?,
            );
            Ok(OpenedStorage {
                repo: store.clone(),
                sled: Some(store),
            })
        }
    }
}

#[cfg(not(feature = "sled-storage"))]
fn open_repository(config: &Config) -> Result<OpenedStorage> {
    if config.storage.backend == StorageBackend::Sled {
        anyhow::bail!("sled storage requested but the `sled-storage` feature is disabled");
    }
    info!("💾 Using in-memory storage");
    Ok(OpenedStorage {
        repo: Arc::new(MemStorage::new()),
    })
}

/// Register a demo wallet with enough CATH for Pro+ and one bot
async fn seed_demo(engine: &ShieldEngine, generator: &DemoGenerator) -> Result<String> {
    let wallet = engine
        .wallets
        .connect(NewWallet::new(generator.wallet_address()).with_cath_balance(150.0))
        .await?;
    let resolution = engine
        .tiers
        .refresh_tier(&wallet.id)
        .await?
        .context("demo wallet vanished")?;
    info!("👛 Demo wallet {} resolved to {}", wallet.address, resolution.tier);

    if let Some(template) = builtin_template("conservativeArbitrage") {
        let bot = engine
            .bots
            .create_bot(template.template.into_new_bot(&wallet.id, &wallet.address)?)
            .await?;
        info!("🤖 Demo bot '{}' created (inactive)", bot.bot_name);
    }

    Ok(wallet.address)
}

/// Main event loop
async fn run_event_loop(engine: &ShieldEngine, demo: Option<Duration>) -> Result<()> {
    info!("Event loop started");

    let mut events = engine.events.subscribe();
    let generator = DemoGenerator::new();
    let demo_wallet = match demo {
        Some(_) => Some(seed_demo(engine, &generator).await?),
        None => None,
    };

    let mut demo_interval = tokio::time::interval(demo.unwrap_or(Duration::from_secs(3600)));
    let mut stats_interval = tokio::time::interval(Duration::from_secs(60));

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(ShieldEvent::ThreatDetected { transaction, threat_level }) => {
                        warn!(
                            "🚨 {} threat: {} ({}) -> {}",
                            threat_level,
                            transaction.token_name,
                            transaction.token_symbol,
                            transaction.final_classification
                        );
                    }
                    Ok(ShieldEvent::TierUpdate(change)) => {
                        info!("🏷️ {} tier {} -> {}", change.address, change.previous, change.resolution.tier);
                    }
                    Ok(ShieldEvent::BotUpdate { change, bot }) => {
                        info!("🤖 Bot '{}' {:?}", bot.bot_name, change);
                    }
                    Ok(ShieldEvent::Transaction(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Event listener lagged, {} events dropped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            _ = demo_interval.tick(), if demo_wallet.is_some() => {
                if let Some(address) = &demo_wallet {
                    let incoming = generator.next_transaction(address);
                    match engine.transactions.process_incoming(incoming).await {
                        Ok(Some(tx)) => info!(
                            "📥 {} ({}) classified {} / {}",
                            tx.token_name, tx.token_symbol, tx.final_classification, tx.final_threat_level
                        ),
                        Ok(None) => warn!("Demo wallet not registered"),
                        Err(e) => error!("Demo transfer failed: {}", e),
                    }
                }
            }

            _ = stats_interval.tick() => {
                let m = metrics();
                m.event_subscribers.set(engine.events.subscriber_count() as i64);
                info!("📊 Statistics:");
                info!("   Classified: {}", m.transactions_classified.get());
                info!("   Blocked: {}", m.transactions_blocked.get());
                info!("   Threats: {}", m.threats_detected.get());
                info!("   Lifecycle sweeps: {}", m.lifecycle_sweeps.get());
            }

            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}
