//! Error reporting and internal diagnostics
//!
//! - [`ErrorHandler`] - receives transporter failures that must not reach
//!   the caller (write errors, unsupported config entries, header overflow)
//! - [`init_tracing`] - internal tracing output for the relay itself

use crate::error::LogError;
use parking_lot::Mutex;

/// Receiver of non-fatal transport errors
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &LogError);
}

/// Default handler: one line per error on stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrHandler;

impl ErrorHandler for StderrHandler {
    fn handle(&self, error: &LogError) {
        eprintln!("log-relay: {}", error);
    }
}

/// Handler that keeps error messages in memory
#[derive(Debug, Default)]
pub struct CollectingHandler {
    errors: Mutex<Vec<String>>,
}

impl CollectingHandler {
    /// Messages received so far, oldest first
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl ErrorHandler for CollectingHandler {
    fn handle(&self, error: &LogError) {
        tracing::debug!(%error, "collected transport error");
        self.errors.lock().push(error.to_string());
    }
}

/// Initialize internal tracing for relay debug output
///
/// Call early in main() before any logging occurs.
/// Set `verbose` to true for debug-level output.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = if verbose { "debug" } else { "warn" };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(false)
                .compact(),
        )
        .with(tracing_subscriber::EnvFilter::new(level))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_handler_keeps_order() {
        let handler = CollectingHandler::default();
        handler.handle(&LogError::UnsupportedTransporter { kind: "carrier-pigeon".into() });
        handler.handle(&LogError::InvalidSeverity { value: "loud".into() });

        let errors = handler.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("carrier-pigeon"));
        assert!(errors[1].contains("loud"));
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false);
        init_tracing(true);
    }
}
