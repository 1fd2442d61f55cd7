//! Crate-wide constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

use std::time::Duration;

// =============================================================================
// Encoder
// =============================================================================

/// Field key used when a value has to be wrapped into a JSON object
pub const DEFAULT_FIELD: &str = "msg";

/// Wall-clock bound of the shrink loop
pub const STRINGIFY_TIMEOUT: Duration = Duration::from_millis(100);

/// Placeholder returned when the shrink loop runs out of time
pub const STRINGIFY_TIMEOUT_MESSAGE: &str = "stringify timeout";

/// Placeholder returned for a size limit of zero or less
pub const INVALID_MAX_LENGTH_MESSAGE: &str = "invalid max length";

/// Prefix of the overflow notice written when a message exceeds its budget
pub const OVERFLOW_NOTICE_PREFIX: &str = "message exceeded sizeLimit of";

// =============================================================================
// Syslog (RFC5424 field caps)
// =============================================================================

/// Syslog protocol version written after PRI
pub const SYSLOG_VERSION: u8 = 1;

/// Maximum HOSTNAME length
pub const MAX_HOSTNAME_LEN: usize = 255;

/// Maximum APP-NAME length
pub const MAX_APP_NAME_LEN: usize = 48;

/// Maximum PROCID length
pub const MAX_PROCID_LEN: usize = 128;

/// Maximum MSGID length
pub const MAX_MSGID_LEN: usize = 32;

/// Value written for an absent header field
pub const NIL_VALUE: &str = "-";

/// Largest accepted timezone offset, in hours, either direction
pub const MAX_TIMEZONE_OFFSET_HOURS: f64 = 16.0;

// =============================================================================
// Time
// =============================================================================

/// ISO-8601 with milliseconds and numeric UTC offset
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";
