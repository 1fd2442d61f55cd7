//! Log Relay - bounded log encoding and multi-sink dispatch
//!
//! A [`Logger`] fans each record out to its transporters. Every
//! [`Transporter`] filters by severity, encodes the value within its byte
//! budget, and writes to one sink (console, stream, memory, UDP or RFC5424
//! syslog), handing oversized records to an optional fallback transporter.

pub mod cli;
pub mod config;
pub mod constants;
pub mod encode;
pub mod error;
pub mod logger;
pub mod logging;
pub mod pattern;
pub mod severity;
pub mod transport;

pub use config::{LoggerConfig, TransporterConfig, TransporterKind};
pub use encode::{encode, Encoder, ErrorPayload, Mode, ObjectRef, Payload};
pub use error::{LogError, Result};
pub use logger::{Logger, Record};
pub use logging::{CollectingHandler, ErrorHandler, StderrHandler};
pub use pattern::DebugMatcher;
pub use severity::{Severity, SeverityRange};
pub use transport::{Outcome, Sink, Transporter};
