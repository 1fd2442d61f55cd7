//! Dispatcher: fans each record out to every configured transporter
//!
//! Transporters run concurrently for a single call and complete
//! independently; no ordering is guaranteed between them. Per-transporter
//! failures go to the logger's [`ErrorHandler`] and never abort sibling
//! transporters.

use crate::config::LoggerConfig;
use crate::encode::Payload;
use crate::error::{LogError, Result};
use crate::logging::{ErrorHandler, StderrHandler};
use crate::pattern::DebugMatcher;
use crate::severity::Severity;
use crate::transport::{Outcome, Transporter};
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, trace};

/// One log call: value, severity and optional debug key
#[derive(Debug, Clone)]
pub struct Record {
    pub value: Payload,
    pub severity: Severity,
    pub debug_key: Option<String>,
}

impl Record {
    pub fn new(severity: Severity, value: impl Into<Payload>) -> Self {
        Self {
            value: value.into(),
            severity,
            debug_key: None,
        }
    }

    /// Tag the record with a debug key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.debug_key = Some(key.into());
        self
    }
}

/// Ordered set of transporters plus the debug-key matcher
pub struct Logger {
    transporters: Vec<Arc<Transporter>>,
    debug: DebugMatcher,
    errors: Arc<dyn ErrorHandler>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("transporters", &self.transporters)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Logger {
    /// Logger over already-built transporters
    pub fn new(transporters: Vec<Arc<Transporter>>, errors: Arc<dyn ErrorHandler>) -> Self {
        Self {
            transporters,
            debug: DebugMatcher::default(),
            errors,
        }
    }

    /// Build from config, reporting errors to stderr
    pub async fn from_config(config: &LoggerConfig) -> Result<Self> {
        Self::from_config_with_handler(config, Arc::new(StderrHandler)).await
    }

    /// Build from config with an explicit error handler
    ///
    /// Entries with an unknown `type` are reported to `errors` and skipped.
    /// Any other invalid entry fails construction.
    pub async fn from_config_with_handler(
        config: &LoggerConfig,
        errors: Arc<dyn ErrorHandler>,
    ) -> Result<Self> {
        let mut transporters = Vec::with_capacity(config.transporters.len());

        for (index, entry) in config.transporters.iter().enumerate() {
            if let Err(e @ LogError::UnsupportedTransporter { .. }) = entry.kind() {
                errors.handle(&e);
                continue;
            }

            let name = entry.display_name(index);
            let transporter = Transporter::from_config(entry, name, errors.clone()).await?;
            transporters.push(Arc::new(transporter));
        }

        debug!(count = transporters.len(), "logger configured");
        Ok(Self {
            transporters,
            debug: config.debug.matcher(),
            errors,
        })
    }

    /// Replace the debug-key matcher
    pub fn with_debug_matcher(mut self, matcher: DebugMatcher) -> Self {
        self.debug = matcher;
        self
    }

    pub fn transporters(&self) -> &[Arc<Transporter>] {
        &self.transporters
    }

    pub fn error_handler(&self) -> &Arc<dyn ErrorHandler> {
        &self.errors
    }

    /// Whether debug records tagged `key` are let through
    pub fn is_debug_active(&self, key: &str) -> bool {
        self.debug.is_active(key)
    }

    /// Send a record to every transporter
    ///
    /// Returns one outcome per transporter, in configuration order. A debug
    /// record whose key is not enabled reaches no transporter.
    pub async fn dispatch(&self, record: &Record) -> Vec<Outcome> {
        if record.severity == Severity::Debug {
            if let Some(key) = record.debug_key.as_deref() {
                if !self.debug.is_active(key) {
                    trace!(key, "debug key not enabled");
                    return Vec::new();
                }
            }
        }

        let key = record.debug_key.as_deref();
        join_all(
            self.transporters
                .iter()
                .map(|t| t.log(&record.value, record.severity, key)),
        )
        .await
    }

    /// Log `value` at `severity`
    pub async fn log(&self, severity: Severity, value: impl Into<Payload>) -> Vec<Outcome> {
        self.dispatch(&Record::new(severity, value)).await
    }

    /// Log `value` at debug severity under `key`, if the key is enabled
    pub async fn debug_key(&self, key: &str, value: impl Into<Payload>) -> Vec<Outcome> {
        self.dispatch(&Record::new(Severity::Debug, value).with_key(key))
            .await
    }

    pub async fn emergency(&self, value: impl Into<Payload>) -> Vec<Outcome> {
        self.log(Severity::Emergency, value).await
    }

    pub async fn alert(&self, value: impl Into<Payload>) -> Vec<Outcome> {
        self.log(Severity::Alert, value).await
    }

    pub async fn critical(&self, value: impl Into<Payload>) -> Vec<Outcome> {
        self.log(Severity::Critical, value).await
    }

    pub async fn error(&self, value: impl Into<Payload>) -> Vec<Outcome> {
        self.log(Severity::Error, value).await
    }

    pub async fn warning(&self, value: impl Into<Payload>) -> Vec<Outcome> {
        self.log(Severity::Warning, value).await
    }

    pub async fn notice(&self, value: impl Into<Payload>) -> Vec<Outcome> {
        self.log(Severity::Notice, value).await
    }

    pub async fn info(&self, value: impl Into<Payload>) -> Vec<Outcome> {
        self.log(Severity::Info, value).await
    }

    pub async fn debug(&self, value: impl Into<Payload>) -> Vec<Outcome> {
        self.log(Severity::Debug, value).await
    }
}
