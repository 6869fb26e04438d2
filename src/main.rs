//! respcache - operator CLI
//!
//! Inspects and maintains the persistent cache tier on disk, and performs
//! metered read-through fetches.
//!
//! ```text
//! respcache [--config FILE] [--store-path PATH] <command>
//!
//!   get <namespace> [k=v ...]          print a cached value
//!   set <namespace> <json> [k=v ...]   store a value
//!   delete <namespace> [k=v ...]       remove a value
//!   invalidate <pattern>               remove every key containing pattern
//!   sweep                              drop expired records, enforce cap
//!   clear                              remove every cached record
//!   fetch <url>                        cached GET, prints metrics export
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use respcache::cache::{CacheCategory, CacheFacade, CacheKey, FileStore, Scalar};
use respcache::clock::{SharedClock, SystemClock};
use respcache::config::Settings;
use respcache::interceptor::{CallInterceptor, MeteredHttpClient};
use respcache::monitoring::MetricsCollector;

// =============================================================================
// CLI Arguments
// =============================================================================

/// respcache - two-tier response cache tooling
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (YAML)
    #[arg(long, env = "RESPCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Durable store file, overrides the settings file
    #[arg(long, env = "RESPCACHE_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the cached value for a key
    Get {
        namespace: String,
        /// Key parameters as k=v
        params: Vec<String>,
    },
    /// Store a JSON value
    Set {
        namespace: String,
        /// Value as JSON
        value: String,
        /// Key parameters as k=v
        params: Vec<String>,
        /// Data category, selects the default TTL
        #[arg(long, default_value = "product-detail")]
        category: CacheCategory,
        /// Explicit TTL in seconds, overrides the category default
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Remove a key from both tiers
    Delete {
        namespace: String,
        /// Key parameters as k=v
        params: Vec<String>,
    },
    /// Remove every key containing a substring
    Invalidate { pattern: String },
    /// Drop expired and undecodable records, then enforce the entry cap
    Sweep,
    /// Remove every cached record
    Clear,
    /// GET a JSON URL through the cache and print the metrics export
    Fetch {
        url: String,
        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let mut settings = Settings::load_or_default(args.config.as_deref())?;
    if let Some(store_path) = args.store_path.clone() {
        settings.store_path = store_path;
    }
    info!(store = %settings.store_path.display(), "Opening response cache");

    let clock: SharedClock = Arc::new(SystemClock);
    let store = Arc::new(FileStore::open(&settings.store_path));
    let cache: CacheFacade<Value> = CacheFacade::new(settings.cache.clone(), store, clock.clone());

    match args.command {
        Command::Get { namespace, params } => {
            let key = build_key(&namespace, &params)?;
            match cache.get(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => bail!("no live entry for {}", key),
            }
        }
        Command::Set {
            namespace,
            value,
            params,
            category,
            ttl_secs,
        } => {
            let key = build_key(&namespace, &params)?;
            let value: Value = serde_json::from_str(&value).context("value must be valid JSON")?;
            let ttl = ttl_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| cache.ttl_for(category));
            cache.set(key.clone(), value, ttl);
            info!(key = %key, ttl_secs = ttl.as_secs(), "Stored entry");
        }
        Command::Delete { namespace, params } => {
            let key = build_key(&namespace, &params)?;
            if !cache.delete(&key) {
                bail!("no entry for {}", key);
            }
            info!(key = %key, "Deleted entry");
        }
        Command::Invalidate { pattern } => {
            let removed = cache.invalidate_pattern(&pattern);
            println!("{}", removed);
        }
        Command::Sweep => {
            let report = cache.sweep();
            println!(
                "expired={} evicted={} remaining={}",
                report.expired, report.evicted, report.remaining
            );
        }
        Command::Clear => {
            cache.clear();
            info!("Cleared response cache");
        }
        Command::Fetch { url, timeout_secs } => {
            let metrics = Arc::new(MetricsCollector::new(settings.metrics.clone(), clock.clone()));
            let interceptor = CallInterceptor::new(metrics.clone(), clock);
            let client = MeteredHttpClient::new(interceptor, Duration::from_secs(timeout_secs))?;

            let key = CacheFacade::<Value>::generate_key("fetch", [("url", url.as_str())]);
            let mut loaded = false;
            cache
                .get_or_load(&key, || {
                    loaded = true;
                    client.get_json::<Value>(&url)
                })
                .await?;
            metrics.record_cache(key.as_str(), !loaded);
            info!(url = %url, from_cache = !loaded, "Fetched");

            println!("{}", metrics.export_json()?);
        }
    }

    Ok(())
}

/// Build a cache key from a namespace and `k=v` arguments
fn build_key(namespace: &str, params: &[String]) -> anyhow::Result<CacheKey> {
    let mut pairs = Vec::with_capacity(params.len());
    for param in params {
        let Some((name, raw)) = param.split_once('=') else {
            bail!("parameter '{}' is not of the form k=v", param);
        };
        pairs.push((name.to_string(), Scalar::parse_literal(raw)));
    }
    Ok(CacheKey::generate(namespace, pairs))
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    // Logs go to stderr; stdout carries command output
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}
