//! Severity levels and per-transporter severity ranges
//!
//! Severities follow the syslog numbering: lower is more urgent.
//! The numeric value is wire-visible in the syslog PRI field.

use crate::error::{LogError, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Log severity (0 = emergency .. 7 = debug)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl Severity {
    /// All severities, most urgent first
    pub const ALL: [Severity; 8] = [
        Severity::Emergency,
        Severity::Alert,
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Notice,
        Severity::Info,
        Severity::Debug,
    ];

    /// Numeric syslog value
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Severity for a numeric syslog value
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Canonical lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Severity::Emergency => "emergency",
            Severity::Alert => "alert",
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Severity {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let severity = match lower.as_str() {
            "emergency" | "emerg" => Severity::Emergency,
            "alert" => Severity::Alert,
            "critical" | "crit" => Severity::Critical,
            "error" | "err" => Severity::Error,
            "warning" | "warn" => Severity::Warning,
            "notice" => Severity::Notice,
            "info" => Severity::Info,
            "debug" => Severity::Debug,
            other => other
                .parse::<u8>()
                .ok()
                .and_then(Severity::from_code)
                .ok_or_else(|| LogError::InvalidSeverity {
                    value: s.to_string(),
                })?,
        };
        Ok(severity)
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SeverityVisitor;

        impl Visitor<'_> for SeverityVisitor {
            type Value = Severity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a severity name or a number from 0 to 7")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Severity, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Severity, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(Severity::from_code)
                    .ok_or_else(|| E::custom(format!("severity {} out of range 0..7", v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Severity, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(Severity::from_code)
                    .ok_or_else(|| E::custom(format!("severity {} out of range 0..7", v)))
            }
        }

        deserializer.deserialize_any(SeverityVisitor)
    }
}

/// Inclusive severity range a transporter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityRange {
    min: Severity,
    max: Severity,
}

impl SeverityRange {
    /// Build a range, rejecting `min > max`
    pub fn new(min: Severity, max: Severity) -> Result<Self> {
        if min > max {
            return Err(LogError::ConfigValidation {
                field: "severity range",
                reason: format!("min {} is above max {}", min, max),
            });
        }
        Ok(Self { min, max })
    }

    /// Range covering every severity
    pub fn all() -> Self {
        Self {
            min: Severity::Emergency,
            max: Severity::Debug,
        }
    }

    /// Check if a severity is routed by this range
    #[inline]
    pub fn contains(&self, severity: Severity) -> bool {
        self.min <= severity && severity <= self.max
    }

    pub fn min(&self) -> Severity {
        self.min
    }

    pub fn max(&self) -> Severity {
        self.max
    }
}

impl Default for SeverityRange {
    fn default() -> Self {
        Self::all()
    }
}
