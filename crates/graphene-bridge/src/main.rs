//! Graphene bridge smoke runner entry point.
//!
//! Drives a real [`Bridge`] against the in-process [`LoopbackHost`] through
//! one complete session and logs what happened.  Useful for checking a
//! config file and for watching the protocol at `RUST_LOG=debug`.
//!
//! # Usage
//!
//! ```text
//! graphene-bridge [OPTIONS]
//!
//! Options:
//!   --config <PATH>               TOML config file
//!   --request-timeout-ms <MS>     Request timeout, 0 disables [default: from config]
//!   --log-level <FILTER>          Fallback log filter [default: from config]
//!   --events <N>                  Host events to emit [default: 3]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                      | Description                    |
//! |-------------------------------|--------------------------------|
//! | `GRAPHENE_CONFIG`             | Config file path               |
//! | `GRAPHENE_REQUEST_TIMEOUT_MS` | Request timeout in ms          |
//! | `GRAPHENE_LOG`                | Fallback log filter            |
//!
//! `RUST_LOG`, when set, takes precedence over every log level setting.
//!
//! # Session
//!
//! 1. install the receiver (READY is announced to the host)
//! 2. content → host requests: echo, typed sum, and a missing channel
//! 3. host → content events on `app:tick`
//! 4. host → content request answered by a content handler
//! 5. shutdown

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use graphene_bridge::application::Bridge;
use graphene_bridge::domain::BridgeConfig;
use graphene_bridge::infrastructure::config_file::timeout_from_millis;
use graphene_bridge::infrastructure::{load_config, LoopbackHost};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Graphene bridge smoke runner.
#[derive(Debug, Parser)]
#[command(
    name = "graphene-bridge",
    about = "Runs a loopback session through the Graphene content bridge",
    version
)]
struct Cli {
    /// TOML config file.  A missing file means defaults.
    #[arg(long, env = "GRAPHENE_CONFIG")]
    config: Option<PathBuf>,

    /// Content request timeout in milliseconds; `0` waits forever.
    ///
    /// Overrides `bridge.request_timeout_ms` from the config file.
    #[arg(long, env = "GRAPHENE_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,

    /// Log filter used when `RUST_LOG` is unset.
    ///
    /// Overrides `logging.level` from the config file.
    #[arg(long, env = "GRAPHENE_LOG")]
    log_level: Option<String>,

    /// Number of `app:tick` events the host emits.
    #[arg(long, default_value_t = 3)]
    events: u32,
}

impl Cli {
    /// Loads the config file (if any) and applies CLI overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from '{}'", path.display()))?,
            None => BridgeConfig::default(),
        };
        if let Some(ms) = self.request_timeout_ms {
            config.request_timeout = timeout_from_millis(ms);
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        Ok(config)
    }
}

// ── Smoke session ─────────────────────────────────────────────────────────────

/// What one smoke session observed.
#[derive(Debug, Clone, PartialEq)]
struct SmokeReport {
    echo: Value,
    sum: i64,
    missing_code: Option<String>,
    ticks_seen: usize,
    content_echo: Value,
    ready_count: usize,
}

async fn run_smoke(config: BridgeConfig, events: u32) -> anyhow::Result<SmokeReport> {
    let host = LoopbackHost::new();
    host.on_request("app:echo", Ok);
    host.on_request("app:sum", |payload| {
        let a = payload["a"].as_i64().ok_or("missing 'a'")?;
        let b = payload["b"].as_i64().ok_or("missing 'b'")?;
        Ok(json!(a + b))
    });

    let bridge = Bridge::new(config, host.clone());
    let ticks = Arc::new(AtomicUsize::new(0));
    let tick_counter = Arc::clone(&ticks);
    bridge.on("app:tick", move |_| {
        tick_counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    bridge.handle_fn("app:content-echo", |payload| async move { Ok(json!({ "echo": payload })) });

    let receiver = bridge.install().await;
    info!("bridge {}: receiver '{}' handed to host", bridge.id(), receiver.name());
    host.attach(receiver);

    let echo = bridge
        .request("app:echo", json!({ "hello": "host" }))
        .await
        .context("echo request failed")?;
    let sum: i64 = bridge
        .request_as("app:sum", json!({ "a": 2, "b": 3 }))
        .await
        .context("sum request failed")?;
    let missing_code = match bridge.request("app:missing", json!({})).await {
        Ok(value) => {
            warn!("request to a missing channel unexpectedly succeeded: {value}");
            None
        }
        Err(e) => e.code().map(str::to_string),
    };

    for seq in 0..events {
        host.emit("app:tick", json!({ "seq": seq }));
    }

    let content_echo = host
        .request("app:content-echo", json!([1, 2, 3]), Duration::from_secs(5))
        .await
        .map_err(|e| anyhow::anyhow!("host request failed: {e}"))?;

    let report = SmokeReport {
        echo,
        sum,
        missing_code,
        ticks_seen: ticks.load(Ordering::SeqCst),
        content_echo,
        ready_count: host.ready_count(),
    };
    bridge.shutdown();
    Ok(report)
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let events = cli.events;
    let config = cli.into_bridge_config()?;

    // `RUST_LOG` wins; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "Graphene bridge smoke run starting: receiver={}, request timeout={:?}",
        config.receiver_name, config.request_timeout
    );

    let report = run_smoke(config, events).await?;

    info!("echo reply: {}", report.echo);
    info!("sum reply: {}", report.sum);
    info!("missing channel failed with: {:?}", report.missing_code);
    info!("content saw {} of {} tick event(s)", report.ticks_seen, events);
    info!("content handler reply: {}", report.content_echo);
    info!("READY announcements: {}", report.ready_count);
    info!("Graphene bridge smoke run finished");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        // Arrange: parse with no arguments (all defaults apply)
        let cli = Cli::parse_from(["graphene-bridge"]);

        // Assert
        assert_eq!(cli.events, 3);
    }

    #[test]
    fn test_cli_overrides_apply_on_top_of_defaults() {
        let cli = Cli::parse_from([
            "graphene-bridge",
            "--request-timeout-ms",
            "250",
            "--log-level",
            "debug",
        ]);
        let config = cli.into_bridge_config().unwrap();
        assert_eq!(config.request_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_cli_zero_timeout_disables_timeout() {
        let cli = Cli::parse_from(["graphene-bridge", "--request-timeout-ms", "0"]);
        let config = cli.into_bridge_config().unwrap();
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let cli = Cli {
            config: Some(PathBuf::from("/definitely/not/here/graphene.toml")),
            request_timeout_ms: None,
            log_level: None,
            events: 1,
        };
        assert_eq!(cli.into_bridge_config().unwrap(), BridgeConfig::default());
    }

    #[tokio::test]
    async fn test_smoke_session_exercises_every_path() {
        // Act
        let report = run_smoke(BridgeConfig::default(), 4).await.unwrap();

        // Assert
        assert_eq!(report.echo, json!({ "hello": "host" }));
        assert_eq!(report.sum, 5);
        assert_eq!(report.missing_code.as_deref(), Some("handler_not_found"));
        assert_eq!(report.ticks_seen, 4);
        assert_eq!(report.content_echo, json!({ "echo": [1, 2, 3] }));
        assert_eq!(report.ready_count, 1);
    }
}
