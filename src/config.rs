//! Configuration management
//!
//! A logger is described by a TOML document: debug-key patterns plus an
//! ordered list of transporters. Fallback transporters are nested inside the
//! transporter they back up, so a fallback chain can never loop.
//!
//! ```toml
//! [debug]
//! include = ["db:*"]
//! exclude = ["db:noisy*"]
//!
//! [[transporters]]
//! type = "syslog"
//! address = "127.0.0.1"
//! port = 514
//! size_limit = 1024
//!
//! [transporters.fallback]
//! type = "stream"
//! path = "overflow.log"
//! ```

use crate::error::{LogError, Result};
use crate::pattern::DebugMatcher;
use crate::severity::{Severity, SeverityRange};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

// =============================================================================
// Logger Configuration
// =============================================================================

/// Top-level logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub debug: DebugConfig,
    pub transporters: Vec<TransporterConfig>,
}

impl Default for LoggerConfig {
    /// A single console transporter accepting every severity
    fn default() -> Self {
        Self {
            debug: DebugConfig::default(),
            transporters: vec![TransporterConfig::default()],
        }
    }
}

impl LoggerConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Debug-key patterns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Keys to enable (`*` wildcard); non-string and empty entries are dropped
    #[serde(deserialize_with = "lenient_patterns")]
    pub include: Vec<String>,
    /// Keys to suppress even when included
    #[serde(deserialize_with = "lenient_patterns")]
    pub exclude: Vec<String>,
}

impl DebugConfig {
    /// Compile the pattern lists
    pub fn matcher(&self) -> DebugMatcher {
        DebugMatcher::new(&self.include, &self.exclude)
    }
}

/// Accept any list, keeping only non-empty strings
fn lenient_patterns<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
        .collect())
}

// =============================================================================
// Transporter Configuration
// =============================================================================

/// Sink variant named by a transporter's `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransporterKind {
    /// Decorated lines on stdout/stderr
    Console,
    /// Append-only file, one message per line
    Stream,
    /// Raw message as one UDP datagram
    Udp,
    /// RFC5424 frame as one UDP datagram
    Syslog,
    /// In-memory buffer for inspection
    Memory,
}

impl TransporterKind {
    pub fn name(self) -> &'static str {
        match self {
            TransporterKind::Console => "console",
            TransporterKind::Stream => "stream",
            TransporterKind::Udp => "udp",
            TransporterKind::Syslog => "syslog",
            TransporterKind::Memory => "memory",
        }
    }
}

impl FromStr for TransporterKind {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(TransporterKind::Console),
            "stream" | "file" => Ok(TransporterKind::Stream),
            "udp" | "socket" => Ok(TransporterKind::Udp),
            "syslog" => Ok(TransporterKind::Syslog),
            "memory" => Ok(TransporterKind::Memory),
            _ => Err(LogError::UnsupportedTransporter {
                kind: s.to_string(),
            }),
        }
    }
}

/// String, number or boolean config value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Numeric reading, parsing text when possible
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(i) => Some(*i as f64),
            ScalarValue::Float(f) => Some(*f),
            ScalarValue::Text(s) => s.trim().parse().ok(),
            ScalarValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Int(i) => write!(f, "{}", i),
            ScalarValue::Float(x) => write!(f, "{}", x),
            ScalarValue::Text(s) => f.write_str(s),
        }
    }
}

/// One transporter: sink type, routing range, size budget and sink options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransporterConfig {
    /// Sink type: console, stream, udp, syslog or memory
    #[serde(rename = "type")]
    pub kind: String,
    /// Display name used in diagnostics (default `<type>#<index>`)
    pub name: Option<String>,
    /// Most urgent severity accepted
    pub min_severity: Severity,
    /// Least urgent severity accepted
    pub max_severity: Severity,
    /// Byte budget per frame (unbounded when absent)
    pub size_limit: Option<u64>,
    /// Encode messages as JSON objects
    pub json: bool,

    // === Console ===
    /// Colorize severity and debug key
    pub colors: bool,

    // === Stream ===
    /// File appended to by a stream transporter
    pub path: Option<PathBuf>,

    // === Datagram (udp, syslog) ===
    pub address: Option<String>,
    pub port: Option<u16>,

    // === Syslog ===
    /// Facility name or number (unknown names fall back to `user`)
    pub facility: Option<ScalarValue>,
    pub hostname: Option<String>,
    pub app_name: Option<String>,
    pub process_id: Option<ScalarValue>,
    /// Hours east of UTC (-16..16); anything else uses the local offset
    pub timezone_offset: Option<ScalarValue>,
    pub structured_data: Option<String>,

    /// Transporter that carries the record when this one overflows
    pub fallback: Option<Box<TransporterConfig>>,
}

impl Default for TransporterConfig {
    fn default() -> Self {
        Self {
            kind: TransporterKind::Console.name().to_string(),
            name: None,
            min_severity: Severity::Emergency,
            max_severity: Severity::Debug,
            size_limit: None,
            json: false,
            colors: true,
            path: None,
            address: None,
            port: None,
            facility: None,
            hostname: None,
            app_name: None,
            process_id: None,
            timezone_offset: None,
            structured_data: None,
            fallback: None,
        }
    }
}

impl TransporterConfig {
    /// Config for the given sink type with defaults everywhere else
    pub fn of_kind(kind: TransporterKind) -> Self {
        Self {
            kind: kind.name().to_string(),
            ..Default::default()
        }
    }

    /// Parsed sink type
    pub fn kind(&self) -> Result<TransporterKind> {
        self.kind.parse()
    }

    /// Name for diagnostics, `<type>#<index>` when none is configured
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}#{}", self.kind, index))
    }

    /// Validated severity range
    pub fn severity_range(&self) -> Result<SeverityRange> {
        SeverityRange::new(self.min_severity, self.max_severity)
    }

    /// Validated size limit
    pub fn size_limit(&self) -> Result<Option<usize>> {
        match self.size_limit {
            None => Ok(None),
            Some(0) => Err(LogError::ConfigValidation {
                field: "size_limit",
                reason: "must be greater than 0".into(),
            }),
            Some(n) => usize::try_from(n)
                .map(Some)
                .map_err(|_| LogError::ConfigValidation {
                    field: "size_limit",
                    reason: format!("{} does not fit in memory", n),
                }),
        }
    }

    /// Check everything construction depends on, fallback chain included
    pub fn validate(&self, name: &str) -> Result<()> {
        let kind = self.kind()?;
        self.severity_range()?;
        self.size_limit()?;

        match kind {
            TransporterKind::Udp | TransporterKind::Syslog => {
                self.require(name, "address", self.address.is_some())?;
                self.require(name, "port", self.port.is_some())?;
            }
            TransporterKind::Stream => self.require(name, "path", self.path.is_some())?,
            TransporterKind::Console | TransporterKind::Memory => {}
        }

        if let Some(fallback) = &self.fallback {
            fallback.validate(&format!("{}.fallback", name))?;
        }
        Ok(())
    }

    fn require(&self, name: &str, field: &'static str, present: bool) -> Result<()> {
        if present {
            Ok(())
        } else {
            Err(LogError::MissingField {
                transporter: name.to_string(),
                field,
            })
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Load a logger config from a TOML file
pub fn load(path: &Path) -> Result<LoggerConfig> {
    let content = fs::read_to_string(path).map_err(|e| LogError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = LoggerConfig::from_toml(&content).map_err(|e| LogError::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!(
        path = %path.display(),
        transporters = config.transporters.len(),
        "loaded logger config"
    );
    Ok(config)
}

// ============================================================================
// Tests
// ============================================================================
