//! Sink variants
//!
//! A sink is where a transporter's frames end up. The set is closed:
//! console, append-only stream, in-memory buffer, raw UDP and syslog UDP.
//! Every variant exposes the same three operations:
//! - `configure`: build from a validated [`TransporterConfig`]
//! - `header`: protocol prefix counted against the size budget
//! - `write`: deliver one frame

use super::syslog::{Facility, SyslogHeader, SyslogSink};
use super::udp::DatagramSink;
use crate::config::{TransporterConfig, TransporterKind};
use crate::constants::TIMESTAMP_FORMAT;
use crate::error::{LogError, Result};
use crate::severity::Severity;
use chrono::{DateTime, Local, Utc};
use crossterm::style::{Color, Stylize};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Destination of a transporter's frames
#[derive(Debug)]
pub enum Sink {
    Console(ConsoleSink),
    Stream(StreamSink),
    Memory(MemorySink),
    Udp(DatagramSink),
    Syslog(SyslogSink),
}

impl Sink {
    /// Build the sink a transporter config describes
    pub async fn configure(config: &TransporterConfig) -> Result<Sink> {
        let sink = match config.kind()? {
            TransporterKind::Console => Sink::Console(ConsoleSink::new(config.colors)),
            TransporterKind::Memory => Sink::Memory(MemorySink::new()),
            TransporterKind::Stream => {
                let path = config.path.as_deref().ok_or_else(|| missing(config, "path"))?;
                Sink::Stream(StreamSink::open(path).await?)
            }
            TransporterKind::Udp => Sink::Udp(connect(config).await?),
            TransporterKind::Syslog => {
                let header = syslog_header(config);
                Sink::Syslog(SyslogSink::new(header, connect(config).await?))
            }
        };
        Ok(sink)
    }

    /// Short variant name
    pub fn kind(&self) -> TransporterKind {
        match self {
            Sink::Console(_) => TransporterKind::Console,
            Sink::Stream(_) => TransporterKind::Stream,
            Sink::Memory(_) => TransporterKind::Memory,
            Sink::Udp(_) => TransporterKind::Udp,
            Sink::Syslog(_) => TransporterKind::Syslog,
        }
    }

    /// Protocol prefix written before the message (empty for most sinks)
    pub fn header(&self, severity: Severity, debug_key: Option<&str>, now: DateTime<Utc>) -> String {
        match self {
            Sink::Syslog(syslog) => syslog.header().prefix(severity, debug_key, now),
            _ => String::new(),
        }
    }

    /// Deliver one complete frame
    pub async fn write(
        &self,
        frame: &str,
        severity: Severity,
        debug_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match self {
            Sink::Console(console) => console.write(frame, severity, debug_key, now),
            Sink::Stream(stream) => stream.write(frame).await,
            Sink::Memory(memory) => {
                memory.push(frame);
                Ok(())
            }
            Sink::Udp(socket) => socket.send(frame.as_bytes()).await,
            Sink::Syslog(syslog) => syslog.write(frame).await,
        }
    }
}

fn missing(config: &TransporterConfig, field: &'static str) -> LogError {
    LogError::MissingField {
        transporter: config.display_name(0),
        field,
    }
}

async fn connect(config: &TransporterConfig) -> Result<DatagramSink> {
    let address = config.address.as_deref().ok_or_else(|| missing(config, "address"))?;
    let port = config.port.ok_or_else(|| missing(config, "port"))?;
    DatagramSink::connect(address, port).await
}

fn syslog_header(config: &TransporterConfig) -> SyslogHeader {
    let mut header = SyslogHeader::new()
        .timezone_offset(config.timezone_offset.as_ref().and_then(|v| v.as_f64()));

    if let Some(facility) = &config.facility {
        header = header.facility(Facility::resolve(&facility.to_string()));
    }
    if let Some(hostname) = &config.hostname {
        header = header.hostname(hostname);
    }
    if let Some(app_name) = &config.app_name {
        header = header.app_name(app_name);
    }
    if let Some(process_id) = &config.process_id {
        header = header.process_id(process_id);
    }
    if let Some(sd) = &config.structured_data {
        header = header.structured_data(sd.clone());
    }
    header
}

// =============================================================================
// Console
// =============================================================================

const KEY_PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Blue,
    Color::Green,
    Color::Yellow,
    Color::DarkCyan,
];

/// Decorated console output
///
/// Severities up to `warning` go to stderr, the rest to stdout. Each debug
/// key is assigned a palette color the first time it is seen; assignments
/// are kept for the life of the sink.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    colors: bool,
    key_colors: Mutex<HashMap<String, Color>>,
}

impl ConsoleSink {
    pub fn new(colors: bool) -> Self {
        Self {
            colors,
            key_colors: Mutex::new(HashMap::new()),
        }
    }

    /// Color assigned to a debug key, allocating one on first use
    pub fn key_color(&self, key: &str) -> Color {
        let mut colors = self.key_colors.lock();
        let next = KEY_PALETTE[colors.len() % KEY_PALETTE.len()];
        *colors.entry(key.to_string()).or_insert(next)
    }

    /// Format one console line
    pub fn format_line(
        &self,
        message: &str,
        severity: Severity,
        debug_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> String {
        let timestamp = now.with_timezone(&Local).format(TIMESTAMP_FORMAT);
        let level = format!("{:<9}", severity.name().to_ascii_uppercase());

        let (level, key) = if self.colors {
            let level = level.with(severity_color(severity)).to_string();
            let key = debug_key
                .map(|k| format!("{} ", format!("[{}]", k).with(self.key_color(k))))
                .unwrap_or_default();
            (level, key)
        } else {
            let key = debug_key.map(|k| format!("[{}] ", k)).unwrap_or_default();
            (level, key)
        };

        format!("{} {} {}{}", timestamp, level, key, message)
    }

    fn write(
        &self,
        message: &str,
        severity: Severity,
        debug_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let line = self.format_line(message, severity, debug_key, now);
        let result = if severity <= Severity::Warning {
            writeln!(std::io::stderr().lock(), "{}", line)
        } else {
            writeln!(std::io::stdout().lock(), "{}", line)
        };
        result.map_err(|e| LogError::ConsoleWrite { source: e })
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Emergency | Severity::Alert | Severity::Critical | Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Notice => Color::Cyan,
        Severity::Info => Color::Green,
        Severity::Debug => Color::DarkGrey,
    }
}

// =============================================================================
// Stream
// =============================================================================

/// Append-only file sink, one message per line, flushed per write
#[derive(Debug)]
pub struct StreamSink {
    path: PathBuf,
    writer: tokio::sync::Mutex<BufWriter<tokio::fs::File>>,
}

impl StreamSink {
    /// Open (or create) `path` for appending
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LogError::StreamOpen {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| LogError::StreamOpen {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: tokio::sync::Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, message: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let result = async {
            writer.write_all(message.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;

        result.map_err(|e| LogError::StreamWrite {
            target: self.path.display().to_string(),
            source: e,
        })
    }
}

// =============================================================================
// Memory
// =============================================================================

/// Frames kept in memory, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, frame: &str) {
        self.frames.lock().push(frame.to_string());
    }

    /// Snapshot of every frame written so far
    pub fn messages(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    /// Remove and return every frame written so far
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.frames.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScalarValue;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    // === Console ===

    #[test]
    fn test_key_colors_assigned_once_round_robin() {
        let console = ConsoleSink::new(true);
        let first = console.key_color("db");
        let second = console.key_color("http");

        assert_eq!(first, KEY_PALETTE[0]);
        assert_eq!(second, KEY_PALETTE[1]);
        assert_eq!(console.key_color("db"), first);
        assert_eq!(console.key_colors.lock().len(), 2);
    }

    #[test]
    fn test_plain_console_line() {
        let console = ConsoleSink::new(false);
        let line = console.format_line("hello", Severity::Info, Some("db"), now());

        assert!(line.ends_with(" INFO      [db] hello"));
        assert!(!line.contains('\u{1b}'));
    }

    #[test]
    fn test_colored_console_line_has_escape_codes() {
        let console = ConsoleSink::new(true);
        let line = console.format_line("hello", Severity::Error, None, now());

        assert!(line.contains('\u{1b}'));
        assert!(line.ends_with("hello"));
    }

    // === Memory ===

    #[tokio::test]
    async fn test_memory_sink_shares_frames_between_clones() {
        let memory = MemorySink::new();
        let sink = Sink::Memory(memory.clone());

        sink.write("one", Severity::Info, None, now()).await.unwrap();
        sink.write("two", Severity::Info, None, now()).await.unwrap();

        assert_eq!(memory.messages(), vec!["one", "two"]);
        assert_eq!(memory.drain().len(), 2);
        assert!(memory.messages().is_empty());
    }

    // === Stream ===

    #[tokio::test]
    async fn test_stream_sink_appends_lines() {
        let dir = std::env::temp_dir().join(format!("log-relay-stream-{}", std::process::id()));
        let path = dir.join("nested").join("out.log");

        let mut config = TransporterConfig::of_kind(TransporterKind::Stream);
        config.path = Some(path.clone());
        let sink = Sink::configure(&config).await.unwrap();

        sink.write("first", Severity::Info, None, now()).await.unwrap();
        sink.write("second", Severity::Debug, None, now()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");

        let _ = std::fs::remove_dir_all(&dir);
    }

    // === Header ===

    #[tokio::test]
    async fn test_only_syslog_has_header() {
        let memory = Sink::Memory(MemorySink::new());
        assert!(memory.header(Severity::Info, None, now()).is_empty());

        let mut config = TransporterConfig::of_kind(TransporterKind::Syslog);
        config.address = Some("127.0.0.1".into());
        config.port = Some(5514);
        config.facility = Some(ScalarValue::Text("sec".into()));
        config.hostname = Some("h".into());
        config.app_name = Some("a".into());
        config.process_id = Some(ScalarValue::Int(7));

        let syslog = Sink::configure(&config).await.unwrap();
        assert_eq!(syslog.kind(), TransporterKind::Syslog);

        let header = syslog.header(Severity::Info, None, now());
        let fields: Vec<&str> = header.trim_end().split(' ').collect();
        assert_eq!(fields[0], "<86>1");
        assert_eq!(&fields[2..], &["h", "a", "7", "-", "-"]);
    }

    #[tokio::test]
    async fn test_unknown_kind_not_configured() {
        let config = TransporterConfig {
            kind: "pager".into(),
            ..Default::default()
        };
        assert!(matches!(
            Sink::configure(&config).await,
            Err(LogError::UnsupportedTransporter { .. })
        ));
    }
}
