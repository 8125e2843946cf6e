//! TTL Store demo
//!
//! Populates a store, keeps one key alive by reading it, and shows that every
//! other key expires.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_store::{ExpiringStore, StoreConfig};

const KEEP_ALIVE_KEY: &str = "float";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let defaults = StoreConfig::new(Duration::from_secs(4), Duration::from_secs(1))
        .with_initial_capacity(3);
    let config = StoreConfig::from_env_with_defaults(defaults);
    info!(
        "Configuration loaded: default_ttl={}ms, initial_capacity={}, sweep_interval={}ms, refresh_on_read={}",
        config.default_ttl.as_millis(),
        config.initial_capacity,
        config.sweep_interval.as_millis(),
        config.refresh_on_read
    );

    // Ctrl+C stops expiry even if the demo never reaches shutdown
    let store = Arc::new(
        ExpiringStore::with_cancellation(config.clone(), async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .context("failed to create store")?,
    );

    for (key, value) in [
        ("string", "a b c"),
        ("int", "3"),
        ("float", "4.4"),
        ("int_array", "1, 2, 3"),
        ("bool", "false"),
        ("rune", "{"),
        ("byte", "0x7b"),
        ("uint64", "123456789"),
    ] {
        store.put(key, value.to_string());
    }

    println!("Store length: {}", store.len());
    store.for_each(|key, value| {
        println!("[{:>9}] {}", key, value);
        true
    });

    // Reading the key refreshes its last access, so it never expires
    let refresh_period = (config.default_ttl / 2).max(Duration::from_millis(1));
    let reader = Arc::clone(&store);
    let refresher = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh_period);
        loop {
            ticker.tick().await;
            reader.get(KEEP_ALIVE_KEY);
        }
    });

    let sleep_time = config.default_ttl + 2 * config.sweep_interval;
    println!(
        "Sleeping {:?}, every key except '{}' should expire",
        sleep_time, KEEP_ALIVE_KEY
    );
    tokio::time::sleep(sleep_time).await;

    for key in ["string", "int", "float", "int_array", "bool", "rune", "byte", "uint64"] {
        match store.get_passive(key) {
            Some(value) => println!("[{:>9}] {} (present)", key, value),
            None => println!("[{:>9}] (expired)", key),
        }
    }
    println!("Store length: {} (should equal 1)", store.len());

    refresher.abort();
    store.shutdown();

    let stats = serde_json::to_string_pretty(&store.stats()).context("failed to encode stats")?;
    println!("{}", stats);

    Ok(())
}
