//! Unified error types for the exposure core library.
//!
//! This module provides a unified error type [`ExposureError`] that covers all failure
//! modes across the exposure system. Each module also has its own specific error types
//! (`ClientError`, `BluetoothError`, `ConfigError`) for internal use.
//!
//! # Error families
//!
//! - **Network**: the remote statistics API could not be reached or returned junk
//! - **Statistics**: a series was too short to aggregate
//! - **Scan**: the radio could not be used or a scan is already running
//! - **Selection**: the user picked a country or date range that does not exist
//!
//! # Example
//!
//! ```rust
//! use exposure_core::error::{ExposureError, Result};
//! use exposure_core::DailyCasePoint;
//!
//! fn last_point(series: &[DailyCasePoint]) -> Result<&DailyCasePoint> {
//!     series.last().ok_or(ExposureError::InsufficientData)
//! }
//! ```

use thiserror::Error;

/// The unified error type for all exposure operations.
#[derive(Debug, Error)]
pub enum ExposureError {
    // =========================================================================
    // NETWORK ERRORS
    // =========================================================================
    /// The remote statistics API failed (transport, status or parse failure).
    #[error("Network error: {0}")]
    Network(String),

    // =========================================================================
    // STATISTICS ERRORS
    // =========================================================================
    /// An empty series was handed to the aggregator.
    #[error("Not enough data to compute statistics: the series is empty")]
    InsufficientData,

    // =========================================================================
    // SCAN ERRORS
    // =========================================================================
    /// The Bluetooth adapter is unavailable or refused to start scanning.
    #[error("Bluetooth scan failed (code {code}): {message}")]
    ScanAdapter {
        /// Adapter error code.
        code: i32,
        /// Description reported by the adapter.
        message: String,
    },

    /// A scan was requested while another one is still running.
    #[error("A proximity scan is already in progress")]
    ScanInProgress,

    /// The configured target is not a valid Bluetooth MAC address.
    #[error("Invalid Bluetooth address: '{0}'. Expected format XX:XX:XX:XX:XX:XX.")]
    InvalidAddress(String),

    // =========================================================================
    // SELECTION ERRORS
    // =========================================================================
    /// The requested country index or code does not exist.
    #[error("Invalid country selection: {0}")]
    Selection(String),

    /// One or both bounds of the date range have not been chosen yet.
    #[error("Date range is incomplete. Select both a start and an end date.")]
    IncompleteDateRange,

    /// The end of the date range lies before its start.
    #[error("Invalid date range: end date {to} is before start date {from}")]
    InvalidDateRange {
        /// Start date (`YYYY-MM-DD`).
        from: String,
        /// End date (`YYYY-MM-DD`).
        to: String,
    },

    /// A date string is not in `YYYY-MM-DD` format.
    #[error("Invalid date: '{0}'. Expected format YYYY-MM-DD (e.g., '2021-03-01').")]
    InvalidDate(String),

    // =========================================================================
    // CONFIGURATION & I/O ERRORS
    // =========================================================================
    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    /// An error occurred while persisting or reading data.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for exposure operations.
pub type Result<T> = std::result::Result<T, ExposureError>;

impl ExposureError {
    /// Returns `true` if this error came from the remote statistics API.
    #[inline]
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Returns `true` if this error is related to Bluetooth scanning.
    #[inline]
    #[must_use]
    pub const fn is_scan_error(&self) -> bool {
        matches!(
            self,
            Self::ScanAdapter { .. } | Self::ScanInProgress | Self::InvalidAddress(_)
        )
    }

    /// Returns `true` if this error stems from a user selection.
    #[inline]
    #[must_use]
    pub const fn is_selection_error(&self) -> bool {
        matches!(
            self,
            Self::Selection(_)
                | Self::IncompleteDateRange
                | Self::InvalidDateRange { .. }
                | Self::InvalidDate(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if retrying the same operation later may succeed.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::ScanInProgress | Self::ScanAdapter { .. }
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidDate(_) | Self::InvalidDateRange { .. } => 400,

            // 404 Not Found
            Self::Selection(_) => 404,

            // 409 Conflict - cannot run in the current state
            Self::ScanInProgress => 409,

            // 422 Unprocessable Entity - semantic errors
            Self::IncompleteDateRange
            | Self::InsufficientData
            | Self::InvalidAddress(_)
            | Self::ConfigParseError(_)
            | Self::ConfigValidationError(_) => 422,

            // 500 Internal Server Error
            Self::PersistenceError(_) | Self::IoError(_) => 500,

            // 502 Bad Gateway - upstream API failed
            Self::Network(_) => 502,

            // 503 Service Unavailable - scan task lost before resolving
            Self::ScanAdapter { .. } => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Network(_) => "NETWORK_ERROR",
            Self::InsufficientData => "INSUFFICIENT_DATA",
            Self::ScanAdapter { .. } => "SCAN_ADAPTER_ERROR",
            Self::ScanInProgress => "SCAN_IN_PROGRESS",
            Self::InvalidAddress(_) => "INVALID_ADDRESS",
            Self::Selection(_) => "INVALID_SELECTION",
            Self::IncompleteDateRange => "INCOMPLETE_DATE_RANGE",
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::InvalidDate(_) => "INVALID_DATE",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::client::ClientError> for ExposureError {
    fn from(err: crate::client::ClientError) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<crate::bluetooth::BluetoothError> for ExposureError {
    fn from(err: crate::bluetooth::BluetoothError) -> Self {
        use crate::bluetooth::BluetoothError;
        match err {
            BluetoothError::ScanInProgress => Self::ScanInProgress,
            BluetoothError::InvalidAddress { address } => Self::InvalidAddress(address),
            other => Self::ScanAdapter {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }
}

impl From<crate::config::ConfigError> for ExposureError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::LoadError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {path}: {source}"))
            }
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
