//! RFC5424 syslog framing
//!
//! Frame layout:
//!
//! ```text
//! <PRI>1 TIMESTAMP HOSTNAME APP-NAME PROCID MSGID STRUCTURED-DATA MSG
//! ```
//!
//! Header fields are reduced to printable US-ASCII and capped when they are
//! set, never at write time. Only MSGID depends on the call: it carries the
//! debug key for debug records and is `-` otherwise.

use super::udp::DatagramSink;
use crate::constants::{
    MAX_APP_NAME_LEN, MAX_HOSTNAME_LEN, MAX_MSGID_LEN, MAX_PROCID_LEN,
    MAX_TIMEZONE_OFFSET_HOURS, NIL_VALUE, SYSLOG_VERSION, TIMESTAMP_FORMAT,
};
use crate::error::Result;
use crate::severity::Severity;
use chrono::{DateTime, FixedOffset, Local, Utc};
use std::fmt;
use tracing::warn;

/// Reduce `input` to printable US-ASCII (0x21..=0x7E), capped at `max_len`
///
/// Runs of printable characters are concatenated without separators.
/// Returns `-` when nothing printable remains.
pub fn printable_ascii(input: impl fmt::Display, max_len: usize) -> String {
    let filtered: String = input
        .to_string()
        .chars()
        .filter(|c| ('\x21'..='\x7e').contains(c))
        .take(max_len)
        .collect();

    if filtered.is_empty() {
        NIL_VALUE.to_string()
    } else {
        filtered
    }
}

// =============================================================================
// Facility
// =============================================================================

/// Syslog facility code (0..=23)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Facility(u8);

impl Facility {
    pub const KERN: Facility = Facility(0);
    pub const USER: Facility = Facility(1);
    pub const MAIL: Facility = Facility(2);
    pub const DAEMON: Facility = Facility(3);
    pub const AUTH: Facility = Facility(4);
    pub const SYSLOG: Facility = Facility(5);
    pub const LPR: Facility = Facility(6);
    pub const NEWS: Facility = Facility(7);
    pub const UUCP: Facility = Facility(8);
    pub const CRON: Facility = Facility(9);
    pub const SEC: Facility = Facility(10);
    pub const FTP: Facility = Facility(11);
    pub const NTP: Facility = Facility(12);
    pub const AUDIT: Facility = Facility(13);
    pub const ALERT: Facility = Facility(14);
    pub const CLOCK: Facility = Facility(15);
    pub const LOCAL0: Facility = Facility(16);

    /// Facility for a numeric code, if in range
    pub fn from_code(code: u8) -> Option<Self> {
        (code <= 23).then_some(Facility(code))
    }

    /// Resolve a facility name or number; anything unrecognized is `user`
    pub fn resolve(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        let code = match lower.as_str() {
            "kern" => 0,
            "user" => 1,
            "mail" => 2,
            "daemon" => 3,
            "auth" => 4,
            "syslog" => 5,
            "lpr" => 6,
            "news" => 7,
            "uucp" => 8,
            "cron" => 9,
            "sec" | "authpriv" => 10,
            "ftp" => 11,
            "ntp" => 12,
            "audit" => 13,
            "alert" | "console" => 14,
            "clock" => 15,
            other => match other.strip_prefix("local").and_then(|n| n.parse::<u8>().ok()) {
                Some(n) if n <= 7 => 16 + n,
                _ => match other.parse::<u8>().ok().and_then(Facility::from_code) {
                    Some(f) => return f,
                    None => {
                        warn!(facility = name, "unknown syslog facility, using user");
                        1
                    }
                },
            },
        };
        Facility(code)
    }

    pub fn code(self) -> u8 {
        self.0
    }
}

impl Default for Facility {
    fn default() -> Self {
        Facility::USER
    }
}

// =============================================================================
// Header
// =============================================================================

/// Pre-filtered RFC5424 header fields
#[derive(Debug, Clone)]
pub struct SyslogHeader {
    facility: Facility,
    hostname: String,
    app_name: String,
    process_id: String,
    offset: Option<FixedOffset>,
    structured_data: String,
}

impl Default for SyslogHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl SyslogHeader {
    /// Header with process defaults: OS hostname, executable name, pid,
    /// local timezone
    pub fn new() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_default();
        let app_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();

        Self {
            facility: Facility::USER,
            hostname: printable_ascii(hostname, MAX_HOSTNAME_LEN),
            app_name: printable_ascii(app_name, MAX_APP_NAME_LEN),
            process_id: printable_ascii(std::process::id(), MAX_PROCID_LEN),
            offset: None,
            structured_data: NIL_VALUE.to_string(),
        }
    }

    pub fn facility(mut self, facility: Facility) -> Self {
        self.facility = facility;
        self
    }

    pub fn hostname(mut self, hostname: impl fmt::Display) -> Self {
        self.hostname = printable_ascii(hostname, MAX_HOSTNAME_LEN);
        self
    }

    pub fn app_name(mut self, app_name: impl fmt::Display) -> Self {
        self.app_name = printable_ascii(app_name, MAX_APP_NAME_LEN);
        self
    }

    pub fn process_id(mut self, process_id: impl fmt::Display) -> Self {
        self.process_id = printable_ascii(process_id, MAX_PROCID_LEN);
        self
    }

    /// Fixed UTC offset in hours; out-of-range or non-finite values keep
    /// the local offset
    pub fn timezone_offset(mut self, hours: Option<f64>) -> Self {
        self.offset = hours.and_then(offset_from_hours);
        self
    }

    /// Structured data element, written verbatim (`-` when blank)
    pub fn structured_data(mut self, sd: impl Into<String>) -> Self {
        let sd = sd.into();
        self.structured_data = if sd.trim().is_empty() {
            NIL_VALUE.to_string()
        } else {
            sd
        };
        self
    }

    /// PRI value: facility * 8 + severity
    pub fn priority(&self, severity: Severity) -> u16 {
        u16::from(self.facility.code()) * 8 + u16::from(severity.code())
    }

    /// ISO-8601 timestamp with milliseconds and numeric offset
    pub fn timestamp(&self, now: DateTime<Utc>) -> String {
        match self.offset {
            Some(offset) => now.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string(),
            None => now.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Everything before MSG, including the trailing space
    pub fn prefix(&self, severity: Severity, debug_key: Option<&str>, now: DateTime<Utc>) -> String {
        let msg_id = match (severity, debug_key) {
            (Severity::Debug, Some(key)) => printable_ascii(key, MAX_MSGID_LEN),
            _ => NIL_VALUE.to_string(),
        };

        format!(
            "<{}>{} {} {} {} {} {} {} ",
            self.priority(severity),
            SYSLOG_VERSION,
            self.timestamp(now),
            self.hostname,
            self.app_name,
            self.process_id,
            msg_id,
            self.structured_data
        )
    }
}

fn offset_from_hours(hours: f64) -> Option<FixedOffset> {
    if !hours.is_finite() || hours.abs() > MAX_TIMEZONE_OFFSET_HOURS {
        warn!(hours, "timezone offset out of range, using local offset");
        return None;
    }
    FixedOffset::east_opt((hours * 3600.0).round() as i32)
}

// =============================================================================
// Sink
// =============================================================================

/// Syslog header plus the datagram socket frames are sent on
#[derive(Debug)]
pub struct SyslogSink {
    header: SyslogHeader,
    socket: DatagramSink,
}

impl SyslogSink {
    pub fn new(header: SyslogHeader, socket: DatagramSink) -> Self {
        Self { header, socket }
    }

    pub fn header(&self) -> &SyslogHeader {
        &self.header
    }

    /// Send one complete frame as a single datagram
    pub async fn write(&self, frame: &str) -> Result<()> {
        self.socket.send(frame.as_bytes()).await
    }
}
