//! # exposure-core
//!
//! Core logic for the exposure service: COVID-19 statistics for a chosen
//! country and date range, and Bluetooth Low Energy scanning for a configured
//! "infected" device address.
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`client`] - HTTP client for the time-series statistics API
//! - [`stats`] - Reduction of cumulative daily series into range deltas
//! - [`bluetooth`] - Timed BLE proximity scans with a resolve-once state machine
//! - [`session`] - Orchestration of selections, fetches and scans behind a watch channel
//! - [`config`] - Layered configuration (defaults, TOML file, environment)
//! - [`dates`] - `YYYY-MM-DD` helpers shared with the API
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared data model and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod bluetooth;
pub mod client;
pub mod config;
pub mod dates;
pub mod error;
pub mod session;
pub mod stats;
pub mod types;

// Re-export primary types for convenience
#[cfg(all(feature = "bluetooth", target_os = "linux"))]
pub use bluetooth::BluerAdapter;
#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub use bluetooth::{MockDevice, MockRadio};
pub use bluetooth::{
    BluetoothError, BluetoothResult, ProximityScanner, RadioAdapter, RadioEvent, ScanFilter,
};
pub use client::{ClientError, TimeSeriesClient, TimeSeriesSource};
pub use config::{
    default_config_path, is_valid_mac_address, ApiConfig, Config, ConfigError, ConfigResult,
    ScanConfig, ServerConfig,
};
pub use dates::{are_dates_chronological, date_from_picker, format_api_date, parse_api_date};
pub use error::{ExposureError, Result};
pub use session::{CountrySelector, SessionController, SessionSnapshot};
pub use stats::aggregate;
pub use types::{
    CaseDelta, Country, DailyCasePoint, DatePoint, DateRange, ScanSession, ScanState,
};
