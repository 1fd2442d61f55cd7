//! Command-line interface definition using clap
//!
//! Provides structured argument parsing with automatic help generation.

use crate::severity::Severity;
use clap::Parser;
use std::path::PathBuf;

// =============================================================================
// CLI Definition
// =============================================================================

/// Send one record through the configured log transporters
#[derive(Parser, Debug)]
#[command(name = "log-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Transporter config file (TOML); defaults to a single console transporter
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Severity name or number (0 = emergency .. 7 = debug)
    #[arg(short, long, value_name = "SEVERITY", default_value = "info")]
    pub severity: Severity,

    /// Debug key to tag the record with
    #[arg(short = 'k', long = "key", value_name = "KEY")]
    pub debug_key: Option<String>,

    /// Debug-key patterns (overrides config), e.g. "db:*,-db:noisy"
    #[arg(long, value_name = "PATTERNS")]
    pub debug: Option<String>,

    /// Parse the message as JSON instead of sending it as text
    #[arg(long)]
    pub json: bool,

    /// Message text (joined with spaces)
    #[arg(required = true, value_name = "MESSAGE")]
    pub message: Vec<String>,
}

impl Cli {
    /// Message words joined back into one string
    pub fn message_text(&self) -> String {
        self.message.join(" ")
    }
}

// =============================================================================
// Tests
// =============================================================================
