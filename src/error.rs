//! Centralized error types for the log pipeline
//!
//! All pipeline errors are represented by the `LogError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, LogError>`.
//!
//! Configuration errors surface synchronously from construction. Write-time
//! errors never reach the caller of a log call; they are handed to the
//! configured [`ErrorHandler`](crate::logging::ErrorHandler) instead.

use std::fmt;
use std::path::PathBuf;

/// All pipeline errors
#[derive(Debug)]
pub enum LogError {
    // === Configuration ===
    /// Unknown severity name or out-of-range severity number
    InvalidSeverity { value: String },
    /// Invalid config value
    ConfigValidation { field: &'static str, reason: String },
    /// A required transporter field was not supplied
    MissingField {
        transporter: String,
        field: &'static str,
    },
    /// Transporter type not known to this crate
    UnsupportedTransporter { kind: String },
    /// Failed to read a config file
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file is not valid TOML for `LoggerConfig`
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // === Network ===
    /// Sink address could not be resolved
    AddressResolve {
        address: String,
        source: std::io::Error,
    },
    /// Failed to create or bind the local datagram socket
    UdpBind { source: std::io::Error },
    /// Datagram send failed
    Send {
        target: String,
        source: std::io::Error,
    },

    // === Streams ===
    /// Failed to open a stream sink
    StreamOpen {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Stream write or flush failed
    StreamWrite {
        target: String,
        source: std::io::Error,
    },
    /// Console write failed
    ConsoleWrite { source: std::io::Error },

    // === Framing ===
    /// Protocol header alone does not fit the transporter's size limit
    HeaderOverflow {
        transporter: String,
        header_len: usize,
        size_limit: usize,
    },
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigRead { source, .. }
            | Self::AddressResolve { source, .. }
            | Self::UdpBind { source }
            | Self::Send { source, .. }
            | Self::StreamOpen { source, .. }
            | Self::StreamWrite { source, .. }
            | Self::ConsoleWrite { source } => Some(source),
            Self::ConfigParse { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSeverity { value } => write!(f, "Invalid severity: {}", value),
            Self::ConfigValidation { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
            Self::MissingField { transporter, field } => {
                write!(f, "Transporter {} requires {}", transporter, field)
            }
            Self::UnsupportedTransporter { kind } => {
                write!(f, "Unsupported transporter type: {}", kind)
            }
            Self::ConfigRead { path, .. } => write!(f, "Cannot read config: {}", path.display()),
            Self::ConfigParse { path, source } => {
                write!(f, "Invalid config {}: {}", path.display(), source)
            }
            Self::AddressResolve { address, source } => {
                write!(f, "Cannot resolve {}: {}", address, source)
            }
            Self::UdpBind { source } => write!(f, "Cannot bind UDP socket: {}", source),
            Self::Send { target, source } => write!(f, "Send to {} failed: {}", target, source),
            Self::StreamOpen { path, source } => {
                write!(f, "Cannot open {}: {}", path.display(), source)
            }
            Self::StreamWrite { target, source } => {
                write!(f, "Write to {} failed: {}", target, source)
            }
            Self::ConsoleWrite { source } => write!(f, "Console write failed: {}", source),
            Self::HeaderOverflow {
                transporter,
                header_len,
                size_limit,
            } => write!(
                f,
                "Transporter {}: header of {} bytes exceeds sizeLimit of {}",
                transporter, header_len, size_limit
            ),
        }
    }
}

/// Alias for Result with LogError
pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_config_validation() {
        let err = LogError::ConfigValidation {
            field: "size_limit",
            reason: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "Invalid size_limit: must be greater than 0");
    }

    #[test]
    fn test_send_error_exposes_source() {
        let err = LogError::Send {
            target: "127.0.0.1:514".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("127.0.0.1:514"));
    }

    #[test]
    fn test_unsupported_transporter_has_no_source() {
        let err = LogError::UnsupportedTransporter {
            kind: "carrier-pigeon".into(),
        };
        assert!(err.source().is_none());
    }
}
