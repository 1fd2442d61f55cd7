//! Transporters: severity routing, size budget and fallback around a sink
//!
//! A transporter handles one record in four steps:
//! 1. Skip silently when the severity is outside its range
//! 2. Encode the value in its output mode
//! 3. Write header + message when the message fits the budget left after
//!    the sink's protocol header
//! 4. Otherwise write an overflow notice instead, after handing the
//!    original record to the fallback transporter when one is configured
//!
//! Write failures go to the transporter's [`ErrorHandler`]; they are never
//! returned to the caller.

pub mod sink;
pub mod syslog;
pub mod udp;

pub use sink::{ConsoleSink, MemorySink, Sink, StreamSink};
pub use syslog::{printable_ascii, Facility, SyslogHeader, SyslogSink};
pub use udp::DatagramSink;

use crate::config::TransporterConfig;
use crate::constants::OVERFLOW_NOTICE_PREFIX;
use crate::encode::{Clock, Encoder, Mode, ObjectRef, Payload};
use crate::error::{LogError, Result};
use crate::logging::{ErrorHandler, StderrHandler};
use crate::severity::{Severity, SeverityRange};
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::{debug, trace};

/// Result of handing one record to a transporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Severity outside the transporter's range
    Skipped,
    /// Message written as encoded
    Written(String),
    /// Message over budget; an overflow notice was written instead
    Overflowed {
        notice: String,
        fallback: Option<Box<Outcome>>,
    },
    /// Write failed and was reported to the error handler
    Failed(String),
}

impl Outcome {
    /// The message this transporter produced, delivered or not
    ///
    /// `None` when nothing was produced: a skip, or a failure before any
    /// message was encoded.
    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Skipped => None,
            Outcome::Written(m) => Some(m.as_str()),
            Outcome::Failed(m) => Some(m.as_str()).filter(|m| !m.is_empty()),
            Outcome::Overflowed { notice, .. } => Some(notice.as_str()),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Sink plus severity range, size budget, output mode and optional fallback
pub struct Transporter {
    name: String,
    range: SeverityRange,
    size_limit: Option<usize>,
    encoder: Encoder,
    sink: Sink,
    fallback: Option<Arc<Transporter>>,
    errors: Arc<dyn ErrorHandler>,
}

impl std::fmt::Debug for Transporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transporter")
            .field("name", &self.name)
            .field("range", &self.range)
            .field("size_limit", &self.size_limit)
            .field("mode", &self.encoder.mode())
            .field("sink", &self.sink.kind())
            .field("fallback", &self.fallback.as_ref().map(|t| t.name()))
            .finish()
    }
}

impl Transporter {
    /// Start building a transporter around `sink`
    pub fn builder(name: impl Into<String>, sink: Sink) -> TransporterBuilder {
        TransporterBuilder {
            name: name.into(),
            sink,
            range: SeverityRange::all(),
            size_limit: None,
            mode: Mode::Plain,
            clock: None,
            fallback: None,
            errors: None,
        }
    }

    /// Build a transporter, and its fallback chain, from config
    pub fn from_config<'a>(
        config: &'a TransporterConfig,
        name: String,
        errors: Arc<dyn ErrorHandler>,
    ) -> BoxFuture<'a, Result<Transporter>> {
        async move {
            config.validate(&name)?;

            let fallback = match &config.fallback {
                Some(fb) => {
                    let fb_name = fb.name.clone().unwrap_or_else(|| format!("{}.fallback", name));
                    Some(Arc::new(Transporter::from_config(fb, fb_name, errors.clone()).await?))
                }
                None => None,
            };

            let sink = Sink::configure(config).await?;
            let mut builder = Transporter::builder(name, sink)
                .range(config.severity_range()?)
                .mode(Mode::from_json_flag(config.json))
                .error_handler(errors);
            if let Some(limit) = config.size_limit()? {
                builder = builder.size_limit(limit);
            }
            if let Some(fallback) = fallback {
                builder = builder.fallback(fallback);
            }
            builder.build()
        }
        .boxed()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> SeverityRange {
        self.range
    }

    pub fn size_limit(&self) -> Option<usize> {
        self.size_limit
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn fallback(&self) -> Option<&Arc<Transporter>> {
        self.fallback.as_ref()
    }

    /// Route, encode and deliver one record
    pub fn log<'a>(
        &'a self,
        value: &'a Payload,
        severity: Severity,
        debug_key: Option<&'a str>,
    ) -> BoxFuture<'a, Outcome> {
        self.log_record(value, severity, debug_key).boxed()
    }

    async fn log_record(&self, value: &Payload, severity: Severity, debug_key: Option<&str>) -> Outcome {
        if !self.range.contains(severity) {
            trace!(transporter = %self.name, %severity, "severity outside range");
            return Outcome::Skipped;
        }

        let now = Utc::now();
        let Some((header, budget)) = self.header(severity, debug_key, now) else {
            return Outcome::Failed(String::new());
        };

        let message = self.encoder.encode(value, None);
        match budget {
            Some(budget) if message.len() > budget => self.overflow(value, severity, debug_key).await,
            _ => {
                if self.deliver(&header, &message, severity, debug_key, now).await {
                    Outcome::Written(message)
                } else {
                    Outcome::Failed(message)
                }
            }
        }
    }

    /// Protocol header for a write at `now` and the byte budget left after it
    ///
    /// Reports `HeaderOverflow` and returns `None` when the header alone
    /// leaves no room for a message.
    fn header(
        &self,
        severity: Severity,
        debug_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<(String, Option<usize>)> {
        let header = self.sink.header(severity, debug_key, now);
        match self.size_limit {
            None => Some((header, None)),
            Some(limit) if header.len() < limit => {
                let budget = limit - header.len();
                Some((header, Some(budget)))
            }
            Some(limit) => {
                self.errors.handle(&LogError::HeaderOverflow {
                    transporter: self.name.clone(),
                    header_len: header.len(),
                    size_limit: limit,
                });
                None
            }
        }
    }

    async fn overflow(&self, value: &Payload, severity: Severity, debug_key: Option<&str>) -> Outcome {
        let limit = self.size_limit.unwrap_or_default();
        debug!(
            transporter = %self.name,
            limit,
            fallback = self.fallback.is_some(),
            "message exceeded size limit"
        );

        let fallback = match &self.fallback {
            Some(fb) => Some(fb.log(value, severity, debug_key).await),
            None => None,
        };

        // Timestamp the notice after the fallback has finished
        let now = Utc::now();
        let Some((header, budget)) = self.header(severity, debug_key, now) else {
            return Outcome::Failed(String::new());
        };
        let budget = budget.unwrap_or(limit);

        let notice = self.notice(limit, fallback.as_ref().and_then(Outcome::message), budget);
        if self.deliver(&header, &notice, severity, debug_key, now).await {
            Outcome::Overflowed {
                notice,
                fallback: fallback.map(Box::new),
            }
        } else {
            Outcome::Failed(notice)
        }
    }

    /// Overflow notice within `budget`, with the fallback's message when present
    ///
    /// Json notices keep both `message` and `fallback` keys; only the
    /// fallback text is shortened to fit.
    fn notice(&self, limit: usize, fallback: Option<&str>, budget: usize) -> String {
        let text = format!("{} {}", OVERFLOW_NOTICE_PREFIX, limit);
        match (self.encoder.mode(), fallback) {
            (Mode::Plain, Some(fb)) => {
                let composite = Payload::String(format!("{}, {}", text, fb));
                self.encoder.encode(&composite, Some(budget as i64))
            }
            (Mode::Json, Some(fb)) => self
                .encoder
                .encode_object_field(&[("message", text.as_str())], "fallback", fb, budget)
                .unwrap_or_else(|| self.encoder.encode(&Payload::from(&text), Some(budget as i64))),
            (Mode::Plain, None) => self.encoder.encode(&Payload::String(text), Some(budget as i64)),
            (Mode::Json, None) => {
                let obj = ObjectRef::new().with("message", text);
                self.encoder.encode(&Payload::Object(obj), Some(budget as i64))
            }
        }
    }

    /// Write header + message, reporting failure to the error handler
    async fn deliver(
        &self,
        header: &str,
        message: &str,
        severity: Severity,
        debug_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let frame = if header.is_empty() {
            message.to_string()
        } else {
            format!("{}{}", header, message)
        };

        match self.sink.write(&frame, severity, debug_key, now).await {
            Ok(()) => true,
            Err(e) => {
                self.errors.handle(&e);
                false
            }
        }
    }
}

/// Builder for programmatic transporter construction
pub struct TransporterBuilder {
    name: String,
    sink: Sink,
    range: SeverityRange,
    size_limit: Option<usize>,
    mode: Mode,
    clock: Option<Arc<dyn Clock>>,
    fallback: Option<Arc<Transporter>>,
    errors: Option<Arc<dyn ErrorHandler>>,
}

impl TransporterBuilder {
    pub fn range(mut self, range: SeverityRange) -> Self {
        self.range = range;
        self
    }

    /// Byte budget per frame; must be greater than 0
    pub fn size_limit(mut self, limit: usize) -> Self {
        self.size_limit = Some(limit);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Clock for the encoder's shrink deadline
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn fallback(mut self, fallback: Arc<Transporter>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn error_handler(mut self, errors: Arc<dyn ErrorHandler>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn build(self) -> Result<Transporter> {
        if self.size_limit == Some(0) {
            return Err(LogError::ConfigValidation {
                field: "size_limit",
                reason: "must be greater than 0".into(),
            });
        }

        let mut encoder = Encoder::new(self.mode);
        if let Some(clock) = self.clock {
            encoder = encoder.with_clock(clock);
        }

        debug!(
            transporter = %self.name,
            sink = self.sink.kind().name(),
            min = %self.range.min(),
            max = %self.range.max(),
            size_limit = ?self.size_limit,
            "transporter configured"
        );

        Ok(Transporter {
            name: self.name,
            range: self.range,
            size_limit: self.size_limit,
            encoder,
            sink: self.sink,
            fallback: self.fallback,
            errors: self.errors.unwrap_or_else(|| Arc::new(StderrHandler)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::CollectingHandler;

    fn memory_transporter(name: &str) -> (TransporterBuilder, MemorySink) {
        let memory = MemorySink::new();
        (Transporter::builder(name, Sink::Memory(memory.clone())), memory)
    }

    // === Routing ===

    #[tokio::test]
    async fn test_severity_outside_range_is_skipped() {
        let (builder, memory) = memory_transporter("info-only");
        let t = builder
            .range(SeverityRange::new(Severity::Info, Severity::Info).unwrap())
            .build()
            .unwrap();

        let value = Payload::from("hello");
        assert_eq!(t.log(&value, Severity::Info, None).await, Outcome::Written("hello".into()));
        assert!(t.log(&value, Severity::Debug, None).await.is_skipped());
        assert!(t.log(&value, Severity::Warning, None).await.is_skipped());
        assert_eq!(memory.messages(), vec!["hello"]);
    }

    // === Budget ===

    #[tokio::test]
    async fn test_overflow_without_fallback_writes_notice() {
        let (builder, memory) = memory_transporter("small");
        let t = builder.size_limit(40).build().unwrap();

        let value = Payload::from("x".repeat(41));
        let outcome = t.log(&value, Severity::Info, None).await;

        assert_eq!(memory.messages(), vec!["message exceeded sizeLimit of 40"]);
        assert!(matches!(outcome, Outcome::Overflowed { fallback: None, .. }));
    }

    #[tokio::test]
    async fn test_json_overflow_notice_without_fallback() {
        let (builder, memory) = memory_transporter("small-json");
        let t = builder.size_limit(60).mode(Mode::Json).build().unwrap();

        t.log(&Payload::from("y".repeat(80)), Severity::Info, None).await;
        assert_eq!(
            memory.messages(),
            vec![r#"{"message":"message exceeded sizeLimit of 60"}"#]
        );
    }

    #[tokio::test]
    async fn test_exact_fit_is_written() {
        let (builder, memory) = memory_transporter("exact");
        let t = builder.size_limit(5).build().unwrap();

        t.log(&Payload::from("12345"), Severity::Info, None).await;
        assert_eq!(memory.messages(), vec!["12345"]);
    }

    #[tokio::test]
    async fn test_notice_is_bounded_by_budget() {
        let (builder, memory) = memory_transporter("tiny");
        let t = builder.size_limit(5).build().unwrap();

        t.log(&Payload::from("a".repeat(20)), Severity::Info, None).await;
        let written = memory.messages();
        assert_eq!(written.len(), 1);
        assert!(written[0].len() <= 5);
        assert_ne!(written[0], "a".repeat(20));
    }

    // === Fallback ===

    #[tokio::test]
    async fn test_fallback_receives_original_value() {
        let (fb_builder, fb_memory) = memory_transporter("b");
        let fallback = Arc::new(fb_builder.build().unwrap());

        let (builder, memory) = memory_transporter("a");
        let t = builder.size_limit(5).fallback(fallback).build().unwrap();

        let original = "0123456789abcdefghij";
        let outcome = t.log(&Payload::from(original), Severity::Info, None).await;

        assert_eq!(fb_memory.messages(), vec![original]);
        assert!(memory.messages().iter().all(|m| m != original && m.len() <= 5));
        match outcome {
            Outcome::Overflowed { fallback, .. } => {
                assert_eq!(fallback.as_deref(), Some(&Outcome::Written(original.into())))
            }
            other => panic!("Expected Overflowed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_composite_notice_plain() {
        let (fb_builder, _fb_memory) = memory_transporter("b");
        let fallback = Arc::new(fb_builder.build().unwrap());

        let (builder, memory) = memory_transporter("a");
        let t = builder.size_limit(60).fallback(fallback).build().unwrap();

        let original = "z".repeat(61);
        t.log(&Payload::from(original), Severity::Info, None).await;

        let written = memory.messages();
        assert!(written[0].starts_with("message exceeded sizeLimit of 60, zzz"));
        assert_eq!(written[0].len(), 60);
    }

    #[tokio::test]
    async fn test_composite_notice_json() {
        let (fb_builder, _fb_memory) = memory_transporter("b");
        let fallback = Arc::new(fb_builder.build().unwrap());

        let (builder, memory) = memory_transporter("a");
        let t = builder
            .size_limit(200)
            .mode(Mode::Json)
            .fallback(fallback)
            .build()
            .unwrap();

        let original = "q".repeat(250);
        t.log(&Payload::from(original.clone()), Severity::Info, None).await;

        let written = memory.messages();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].len(), 200);

        let notice: serde_json::Value = serde_json::from_str(&written[0]).unwrap();
        assert_eq!(notice["message"], "message exceeded sizeLimit of 200");
        let fb = notice["fallback"].as_str().unwrap();
        assert!(!fb.is_empty());
        assert!(original.starts_with(fb));
    }

    #[tokio::test]
    async fn test_json_notice_without_room_for_fallback() {
        let (fb_builder, _fb_memory) = memory_transporter("b");
        let fallback = Arc::new(fb_builder.build().unwrap());

        let (builder, memory) = memory_transporter("a");
        let t = builder
            .size_limit(40)
            .mode(Mode::Json)
            .fallback(fallback)
            .build()
            .unwrap();

        t.log(&Payload::from("q".repeat(100)), Severity::Info, None).await;

        let written = memory.messages();
        assert!(written[0].len() <= 40);
        let notice: serde_json::Value = serde_json::from_str(&written[0]).unwrap();
        assert_eq!(notice["msg"], "message exceeded sizeLimit of ");
    }

    #[tokio::test]
    async fn test_skipping_fallback_leaves_plain_notice() {
        let (fb_builder, fb_memory) = memory_transporter("errors-only");
        let fallback = Arc::new(
            fb_builder
                .range(SeverityRange::new(Severity::Emergency, Severity::Error).unwrap())
                .build()
                .unwrap(),
        );

        let (builder, memory) = memory_transporter("a");
        let t = builder.size_limit(40).fallback(fallback).build().unwrap();

        t.log(&Payload::from("w".repeat(50)), Severity::Info, None).await;
        assert!(fb_memory.messages().is_empty());
        assert_eq!(memory.messages(), vec!["message exceeded sizeLimit of 40"]);
    }

    #[tokio::test]
    async fn test_fallback_chain_recurses() {
        let (c_builder, c_memory) = memory_transporter("c");
        let c = Arc::new(c_builder.build().unwrap());

        let (b_builder, b_memory) = memory_transporter("b");
        let b = Arc::new(b_builder.size_limit(45).fallback(c).build().unwrap());

        let (a_builder, _a_memory) = memory_transporter("a");
        let a = a_builder.size_limit(45).fallback(b).build().unwrap();

        let original = "m".repeat(100);
        a.log(&Payload::from(original.clone()), Severity::Info, None).await;

        assert_eq!(c_memory.messages(), vec![original]);
        assert!(b_memory.messages()[0].starts_with("message exceeded sizeLimit of 45, mmm"));
    }

    // === Errors ===

    #[tokio::test]
    async fn test_write_failure_goes_to_handler() {
        let handler = Arc::new(CollectingHandler::default());

        // Larger than any IPv4 UDP payload, so the send itself fails
        let socket = DatagramSink::connect("127.0.0.1", 9).await.unwrap();
        let t = Transporter::builder("udp", Sink::Udp(socket))
            .error_handler(handler.clone())
            .build()
            .unwrap();

        let outcome = t.log(&Payload::from("x".repeat(70_000)), Severity::Info, None).await;
        assert!(outcome.is_failed());
        assert_eq!(handler.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_header_larger_than_limit_reported() {
        let handler = Arc::new(CollectingHandler::default());
        let socket = DatagramSink::connect("127.0.0.1", 9).await.unwrap();
        let header = SyslogHeader::new().hostname("h").app_name("a").process_id("p");

        let t = Transporter::builder("syslog", Sink::Syslog(SyslogSink::new(header, socket)))
            .size_limit(10)
            .error_handler(handler.clone())
            .build()
            .unwrap();

        let outcome = t.log(&Payload::from("hi"), Severity::Info, None).await;
        assert!(outcome.is_failed());
        assert!(handler.errors()[0].contains("exceeds sizeLimit of 10"));
    }

    #[tokio::test]
    async fn test_fallback_header_overflow_not_embedded() {
        let handler = Arc::new(CollectingHandler::default());
        let socket = DatagramSink::connect("127.0.0.1", 9).await.unwrap();
        let header = SyslogHeader::new().hostname("h").app_name("a").process_id("p");
        let fallback = Transporter::builder("syslog", Sink::Syslog(SyslogSink::new(header, socket)))
            .size_limit(10)
            .error_handler(handler.clone())
            .build()
            .unwrap();

        let (builder, memory) = memory_transporter("a");
        let t = builder
            .size_limit(40)
            .fallback(Arc::new(fallback))
            .error_handler(handler.clone())
            .build()
            .unwrap();

        let outcome = t.log(&Payload::from("w".repeat(50)), Severity::Info, None).await;

        assert_eq!(memory.messages(), vec!["message exceeded sizeLimit of 40"]);
        assert_eq!(handler.errors().len(), 1);
        match outcome {
            Outcome::Overflowed { fallback: Some(fb), .. } => {
                assert!(fb.is_failed());
                assert_eq!(fb.message(), None);
            }
            other => panic!("Expected Overflowed with fallback, got {:?}", other),
        }
    }

    // === Clock ===

    /// Clock that advances a fixed step on every read
    #[derive(Debug)]
    struct StepClock {
        base: std::time::Instant,
        step: std::time::Duration,
        ticks: std::sync::atomic::AtomicU32,
    }

    impl Clock for StepClock {
        fn now(&self) -> std::time::Instant {
            let n = self.ticks.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.base + self.step * n
        }
    }

    #[tokio::test]
    async fn test_notice_shrink_times_out_with_injected_clock() {
        let clock = Arc::new(StepClock {
            base: std::time::Instant::now(),
            step: std::time::Duration::from_millis(60),
            ticks: std::sync::atomic::AtomicU32::new(0),
        });

        let (builder, memory) = memory_transporter("slow");
        let t = builder.size_limit(30).clock(clock).build().unwrap();

        let outcome = t.log(&Payload::from("z".repeat(500)), Severity::Info, None).await;

        assert_eq!(memory.messages(), vec!["stringify timeout"]);
        assert_eq!(outcome.message(), Some("stringify timeout"));
    }

    #[test]
    fn test_zero_size_limit_rejected() {
        let (builder, _memory) = memory_transporter("zero");
        assert!(builder.size_limit(0).build().is_err());
    }

    // === Config ===

    #[tokio::test]
    async fn test_from_config_builds_fallback_chain() {
        let mut config = TransporterConfig::of_kind(crate::config::TransporterKind::Memory);
        config.size_limit = Some(10);
        config.fallback = Some(Box::new(TransporterConfig::of_kind(
            crate::config::TransporterKind::Memory,
        )));

        let handler: Arc<dyn ErrorHandler> = Arc::new(CollectingHandler::default());
        let t = Transporter::from_config(&config, "primary".into(), handler)
            .await
            .unwrap();

        assert_eq!(t.name(), "primary");
        assert_eq!(t.size_limit(), Some(10));
        assert_eq!(t.fallback().map(|f| f.name()), Some("primary.fallback"));
    }
}
