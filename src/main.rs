//! Log Relay - send one record through configured log transporters
//!
//! Usage:
//!   log-relay "service started"                 Console, info
//!   log-relay -c relay.toml -s err "disk full"  Configured transporters
//!   log-relay -s debug -k db --debug 'db*' ...  Debug record under a key
//!   log-relay --json '{"user":"ada"}'           Structured payload

use anyhow::{Context, Result};
use clap::Parser;
use log_relay::cli::Cli;
use log_relay::logging::init_tracing;
use log_relay::{config, DebugMatcher, Logger, LoggerConfig, Payload, Record};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => config::load(path)?,
        None => LoggerConfig::default(),
    };

    let value = if cli.json {
        let json: serde_json::Value =
            serde_json::from_str(&cli.message_text()).context("Message is not valid JSON")?;
        Payload::from(json)
    } else {
        Payload::from(cli.message_text())
    };

    let mut record = Record::new(cli.severity, value);
    if let Some(key) = &cli.debug_key {
        record = record.with_key(key.as_str());
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut logger = Logger::from_config(&config).await?;
        if let Some(patterns) = &cli.debug {
            logger = logger.with_debug_matcher(DebugMatcher::parse(patterns));
        }

        let outcomes = logger.dispatch(&record).await;
        tracing::debug!(
            transporters = logger.transporters().len(),
            written = outcomes.iter().filter(|o| !o.is_skipped()).count(),
            "record dispatched"
        );
        Ok::<_, anyhow::Error>(())
    })
}
