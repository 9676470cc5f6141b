//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use exposure_core::{
    BluetoothError, BluetoothResult, Config, RadioAdapter, RadioEvent, ScanFilter,
    SessionController, TimeSeriesClient, TimeSeriesSource,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    session: SessionController,
    bluetooth_available: bool,
    started_at: Instant,
}

impl AppState {
    /// Build state from configuration: the statistics client and the radio.
    ///
    /// # Errors
    ///
    /// Returns an error if the statistics client cannot be created.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let client = TimeSeriesClient::new(&config.api.base_url, config.api.timeout())?;
        info!(base_url = %client.base_url(), "Statistics client ready");

        let (radio, bluetooth_available) = open_radio().await;
        Ok(Self::with_parts(
            config,
            Arc::new(client),
            radio,
            bluetooth_available,
        ))
    }

    /// Build state from explicit parts.
    pub fn with_parts(
        config: Config,
        source: Arc<dyn TimeSeriesSource>,
        radio: Arc<dyn RadioAdapter>,
        bluetooth_available: bool,
    ) -> Self {
        let session = SessionController::new(source, radio, config.scan.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                session,
                bluetooth_available,
                started_at: Instant::now(),
            }),
        }
    }

    /// Loaded configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The session controller.
    pub fn session(&self) -> &SessionController {
        &self.inner.session
    }

    /// Whether a real radio was opened.
    pub fn bluetooth_available(&self) -> bool {
        self.inner.bluetooth_available
    }

    /// Seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}

/// Radio used when no adapter could be opened; every scan fails.
struct UnavailableRadio;

#[async_trait]
impl RadioAdapter for UnavailableRadio {
    async fn start_scan(&self, _filter: &ScanFilter) -> BluetoothResult<mpsc::Receiver<RadioEvent>> {
        Err(BluetoothError::AdapterNotFound)
    }

    async fn stop_scan(&self) {}
}

#[cfg(feature = "mock-bluetooth")]
async fn open_radio() -> (Arc<dyn RadioAdapter>, bool) {
    warn!("Using mock Bluetooth radio");
    (Arc::new(exposure_core::MockRadio::new()), true)
}

#[cfg(all(
    not(feature = "mock-bluetooth"),
    feature = "bluetooth",
    target_os = "linux"
))]
async fn open_radio() -> (Arc<dyn RadioAdapter>, bool) {
    match exposure_core::BluerAdapter::new().await {
        Ok(adapter) => (Arc::new(adapter), true),
        Err(e) => {
            warn!(error = %e, "Bluetooth unavailable, scans will fail");
            (Arc::new(UnavailableRadio), false)
        }
    }
}

#[cfg(all(
    not(feature = "mock-bluetooth"),
    not(all(feature = "bluetooth", target_os = "linux"))
))]
async fn open_radio() -> (Arc<dyn RadioAdapter>, bool) {
    warn!("Built without Bluetooth support, scans will fail");
    (Arc::new(UnavailableRadio), false)
}
