//! Bluetooth Low Energy proximity scanning.
//!
//! A [`ProximityScanner`] runs one bounded scan at a time for a single target
//! address and resolves it to exactly one terminal [`ScanState`]:
//!
//! - [`ScanState::Found`] when a matching advertisement arrives before the deadline
//! - [`ScanState::NotFound`] when the deadline passes or [`ProximityScanner::stop`] is called
//! - [`ScanState::Failed`] when the radio cannot start or reports an error
//!
//! The radio itself sits behind the [`RadioAdapter`] trait. On Linux the
//! `bluetooth` feature provides [`BluerAdapter`] (BlueZ over D-Bus); tests and
//! hardware-less builds use [`MockRadio`].
//!
//! Several event sources race to end a scan: radio events and the deadline
//! inside the scan loop, and `stop()` from any other task. Each of them has to
//! win the session's compare-and-set claim before it may publish a terminal
//! state, so a late timer or a second advertisement is always a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, info, warn};

use crate::config::is_valid_mac_address;
use crate::types::{ScanSession, ScanState};

/// Adapter error codes reported in [`ScanState::Failed`].
///
/// Codes 1-4 follow the numbering of Android's `ScanCallback`.
pub mod codes {
    /// A scan with the same settings is already running on the adapter.
    pub const ALREADY_STARTED: i32 = 1;
    /// The scan could not be registered with the radio stack.
    pub const APPLICATION_REGISTRATION_FAILED: i32 = 2;
    /// Internal radio stack error.
    pub const INTERNAL_ERROR: i32 = 3;
    /// The hardware does not support LE scanning.
    pub const FEATURE_UNSUPPORTED: i32 = 4;
    /// No adapter is present or it is powered off.
    pub const ADAPTER_UNAVAILABLE: i32 = 5;
}

/// Errors from the scanner and radio adapters.
#[derive(Debug, Error)]
pub enum BluetoothError {
    /// No Bluetooth adapter was found.
    #[error("No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded.")]
    AdapterNotFound,

    /// The adapter exists but is powered off.
    #[error("Bluetooth adapter is powered off. Run 'bluetoothctl power on' to enable.")]
    AdapterPoweredOff,

    /// A scan is already running on this scanner.
    #[error("A scan is already in progress")]
    ScanInProgress,

    /// The target address is not a MAC address.
    #[error("Invalid Bluetooth address: '{address}'")]
    InvalidAddress {
        /// The rejected address.
        address: String,
    },

    /// The radio refused to start scanning.
    #[error("Failed to start scan (code {code}): {message}")]
    ScanStartFailed {
        /// Adapter error code, see [`codes`].
        code: i32,
        /// Description from the radio stack.
        message: String,
    },

    /// Any other radio stack failure.
    #[error("Bluetooth error: {message}")]
    Internal {
        /// Description from the radio stack.
        message: String,
    },
}

impl BluetoothError {
    /// Adapter error code for this failure.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::AdapterNotFound | Self::AdapterPoweredOff => codes::ADAPTER_UNAVAILABLE,
            Self::ScanInProgress => codes::ALREADY_STARTED,
            Self::InvalidAddress { .. } => codes::APPLICATION_REGISTRATION_FAILED,
            Self::ScanStartFailed { code, .. } => *code,
            Self::Internal { .. } => codes::INTERNAL_ERROR,
        }
    }
}

/// Result type for Bluetooth operations.
pub type BluetoothResult<T> = std::result::Result<T, BluetoothError>;

/// What the radio should scan for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFilter {
    /// Target MAC address, upper-case `XX:XX:XX:XX:XX:XX`.
    pub address: String,
}

/// Event delivered by a radio adapter while a scan runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// An advertisement was received.
    Advertisement {
        /// Advertiser MAC address.
        address: String,
        /// Received signal strength in dBm.
        rssi: Option<i16>,
    },
    /// The radio aborted the scan.
    Failed {
        /// Adapter error code, see [`codes`].
        code: i32,
    },
}

/// Platform radio used by [`ProximityScanner`].
///
/// Implementations should apply the address filter when the platform supports
/// it; the scanner re-checks every advertisement regardless.
#[async_trait]
pub trait RadioAdapter: Send + Sync {
    /// Start scanning and return the event stream for this scan.
    async fn start_scan(&self, filter: &ScanFilter) -> BluetoothResult<mpsc::Receiver<RadioEvent>>;

    /// Stop the current scan. Must be a no-op when nothing is running.
    async fn stop_scan(&self);
}

/// Upper-case and trim an address for comparison.
#[must_use]
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}

fn addresses_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolution guard shared by the scan loop and `stop()`.
struct ActiveScan {
    resolved: AtomicBool,
    cancel: Notify,
}

impl ActiveScan {
    fn new() -> Self {
        Self {
            resolved: AtomicBool::new(false),
            cancel: Notify::new(),
        }
    }

    /// Returns `true` for exactly one caller per scan.
    fn claim(&self) -> bool {
        self.resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Clears the active slot when a scan ends, including when its future is dropped.
struct ActiveSlotGuard<'a> {
    slot: &'a Mutex<Option<Arc<ActiveScan>>>,
    running: &'a watch::Sender<bool>,
}

impl Drop for ActiveSlotGuard<'_> {
    fn drop(&mut self) {
        let mut slot = lock(self.slot);
        slot.take();
        self.running.send_replace(false);
    }
}

/// Callback invoked synchronously with every published session.
pub type ScanObserver = Arc<dyn Fn(&ScanSession) + Send + Sync>;

/// Runs timed scans for a target address.
pub struct ProximityScanner {
    adapter: Arc<dyn RadioAdapter>,
    session: watch::Sender<ScanSession>,
    active: Mutex<Option<Arc<ActiveScan>>>,
    observer: Option<ScanObserver>,
    observer_gate: Mutex<()>,
    running: watch::Sender<bool>,
}

impl ProximityScanner {
    /// Create a scanner over the given radio.
    pub fn new(adapter: Arc<dyn RadioAdapter>) -> Self {
        let (session, _) = watch::channel(ScanSession::idle());
        Self {
            adapter,
            session,
            active: Mutex::new(None),
            observer: None,
            observer_gate: Mutex::new(()),
            running: watch::channel(false).0,
        }
    }

    /// Call `observer` with the session every time it changes.
    #[must_use]
    pub fn with_observer(mut self, observer: ScanObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Subscribe to session updates.
    pub fn subscribe(&self) -> watch::Receiver<ScanSession> {
        self.session.subscribe()
    }

    /// The latest session.
    pub fn session(&self) -> ScanSession {
        self.session.borrow().clone()
    }

    /// Whether a scan is currently running.
    pub fn is_scanning(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Wait until no scan task is running and the radio has been stopped.
    ///
    /// A scan resolved by [`stop`](Self::stop) reports `NotFound` at once; its
    /// task still has to leave the radio. This resolves after that.
    pub async fn wait_until_idle(&self) {
        let mut running = self.running.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = running.wait_for(|running| !running).await;
    }

    /// Scan for `target` for at most `timeout` and return the terminal state.
    ///
    /// Adapter failures are not returned as errors; they resolve the session to
    /// [`ScanState::Failed`].
    ///
    /// # Errors
    ///
    /// - [`BluetoothError::InvalidAddress`] if `target` is not a MAC address
    /// - [`BluetoothError::ScanInProgress`] if another scan is running
    pub async fn start_scan(&self, target: &str, timeout: Duration) -> BluetoothResult<ScanState> {
        if !is_valid_mac_address(target) {
            return Err(BluetoothError::InvalidAddress {
                address: target.to_string(),
            });
        }
        let target = normalize_address(target);

        let active = {
            let mut slot = lock(&self.active);
            if slot.is_some() {
                debug!(target = %target, "Rejecting scan request, scan already running");
                return Err(BluetoothError::ScanInProgress);
            }
            // Session changes happen under the slot lock: stop() may only
            // resolve the session that belongs to the scan it claimed.
            self.session
                .send_replace(ScanSession::begin(target.clone(), timeout));
            let active = Arc::new(ActiveScan::new());
            *slot = Some(Arc::clone(&active));
            self.running.send_replace(true);
            active
        };
        let _guard = ActiveSlotGuard {
            slot: &self.active,
            running: &self.running,
        };

        self.notify_observer();
        info!(target = %target, timeout_ms = timeout.as_millis(), "Proximity scan started");

        let outcome = self.run(&active, &target, timeout).await;

        // A claim lost to stop() is published before stop() releases the lock.
        let (state, resolved_here) = {
            let _slot = lock(&self.active);
            let resolved_here = match outcome {
                Some((state, rssi)) if active.claim() => {
                    self.resolve(state, rssi);
                    true
                }
                _ => false,
            };
            (self.session.borrow().state, resolved_here)
        };
        if resolved_here {
            self.notify_observer();
        }

        Ok(state)
    }

    /// Stop the running scan, resolving it to [`ScanState::NotFound`].
    ///
    /// Returns `true` if this call ended a scan. Calling it when idle or after
    /// the scan resolved does nothing.
    pub fn stop(&self) -> bool {
        let stopped = {
            let slot = lock(&self.active);
            match slot.as_ref() {
                Some(active) if active.claim() => {
                    self.resolve(ScanState::NotFound, None);
                    active.cancel.notify_one();
                    true
                }
                _ => false,
            }
        };

        if stopped {
            self.notify_observer();
            info!("Proximity scan stopped on request");
        } else {
            debug!("Stop requested with no unresolved scan");
        }
        stopped
    }

    /// Drive one scan until an outcome is known, then stop the radio.
    ///
    /// Returns `None` when `stop()` already resolved the session.
    async fn run(
        &self,
        active: &ActiveScan,
        target: &str,
        timeout: Duration,
    ) -> Option<(ScanState, Option<i16>)> {
        let filter = ScanFilter {
            address: target.to_string(),
        };
        let mut events = match self.adapter.start_scan(&filter).await {
            Ok(events) => events,
            Err(e) => {
                warn!(target = %target, code = e.code(), error = %e, "Failed to start scan");
                return Some((ScanState::Failed { code: e.code() }, None));
            }
        };

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut stream_open = true;

        let outcome = loop {
            tokio::select! {
                biased;

                () = active.cancel.notified() => break None,

                event = events.recv(), if stream_open => match event {
                    Some(RadioEvent::Advertisement { address, rssi }) => {
                        if addresses_match(&address, target) {
                            info!(target = %target, rssi = ?rssi, "Target address found");
                            break Some((ScanState::Found, rssi));
                        }
                        debug!(address = %address, "Ignoring advertisement from other device");
                    }
                    Some(RadioEvent::Failed { code }) => {
                        warn!(target = %target, code, "Radio reported scan failure");
                        break Some((ScanState::Failed { code }, None));
                    }
                    None => {
                        debug!("Radio event stream closed before deadline");
                        stream_open = false;
                    }
                },

                () = &mut deadline => {
                    info!(target = %target, "Scan window elapsed without a match");
                    break Some((ScanState::NotFound, None));
                }
            }
        };

        self.adapter.stop_scan().await;
        outcome
    }

    /// Write the terminal state. Callers hold the slot lock and won the claim.
    fn resolve(&self, state: ScanState, rssi: Option<i16>) {
        self.session.send_modify(|session| {
            session.state = state;
            session.rssi_dbm = rssi;
            session.resolved_at_utc = Some(Utc::now());
        });
        debug!(state = ?state, "Scan session resolved");
    }

    /// Calls are serialized and always read the latest session, so the
    /// observer's final view matches the published state.
    fn notify_observer(&self) {
        if let Some(observer) = &self.observer {
            let _gate = lock(&self.observer_gate);
            let session = self.session.borrow().clone();
            observer(&session);
        }
    }
}

// ============================================================================
// BlueZ adapter
// ============================================================================

#[cfg(all(feature = "bluetooth", target_os = "linux"))]
pub use bluez::BluerAdapter;

#[cfg(all(feature = "bluetooth", target_os = "linux"))]
mod bluez {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bluer::{AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport};
    use futures::StreamExt;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tracing::{debug, info};

    use super::{codes, lock, BluetoothError, BluetoothResult, RadioAdapter, RadioEvent, ScanFilter};

    /// Radio adapter backed by BlueZ.
    pub struct BluerAdapter {
        _session: bluer::Session,
        adapter: bluer::Adapter,
        forwarder: Mutex<Option<JoinHandle<()>>>,
    }

    impl BluerAdapter {
        /// Connect to BlueZ and open the default adapter.
        ///
        /// # Errors
        ///
        /// Returns an error if the D-Bus session cannot be opened or no adapter exists.
        pub async fn new() -> BluetoothResult<Self> {
            let session = bluer::Session::new()
                .await
                .map_err(|e| BluetoothError::Internal {
                    message: e.to_string(),
                })?;
            let adapter = session
                .default_adapter()
                .await
                .map_err(|_| BluetoothError::AdapterNotFound)?;
            info!(adapter = adapter.name(), "Opened Bluetooth adapter");

            Ok(Self {
                _session: session,
                adapter,
                forwarder: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl RadioAdapter for BluerAdapter {
        async fn start_scan(
            &self,
            filter: &ScanFilter,
        ) -> BluetoothResult<mpsc::Receiver<RadioEvent>> {
            let powered = self
                .adapter
                .is_powered()
                .await
                .map_err(|e| BluetoothError::Internal {
                    message: e.to_string(),
                })?;
            if !powered {
                return Err(BluetoothError::AdapterPoweredOff);
            }

            let target: Address =
                filter
                    .address
                    .parse()
                    .map_err(|_| BluetoothError::InvalidAddress {
                        address: filter.address.clone(),
                    })?;

            let mut discovery = DiscoveryFilter::default();
            discovery.transport = DiscoveryTransport::Le;
            discovery.duplicate_data = true;
            self.adapter
                .set_discovery_filter(discovery)
                .await
                .map_err(|e| BluetoothError::ScanStartFailed {
                    code: codes::FEATURE_UNSUPPORTED,
                    message: e.to_string(),
                })?;

            let stream = self
                .adapter
                .discover_devices_with_changes()
                .await
                .map_err(|e| BluetoothError::ScanStartFailed {
                    code: codes::APPLICATION_REGISTRATION_FAILED,
                    message: e.to_string(),
                })?;

            let (tx, rx) = mpsc::channel(32);
            let adapter = self.adapter.clone();
            let handle = tokio::spawn(async move {
                let mut stream = Box::pin(stream);
                while let Some(event) = stream.next().await {
                    let AdapterEvent::DeviceAdded(address) = event else {
                        continue;
                    };
                    if address != target {
                        continue;
                    }
                    let rssi = match adapter.device(address) {
                        Ok(device) => device.rssi().await.ok().flatten(),
                        Err(_) => None,
                    };
                    let event = RadioEvent::Advertisement {
                        address: address.to_string(),
                        rssi,
                    };
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                debug!("BlueZ discovery stream ended");
            });

            if let Some(previous) = lock(&self.forwarder).replace(handle) {
                previous.abort();
            }
            Ok(rx)
        }

        async fn stop_scan(&self) {
            // Dropping the discovery stream ends the BlueZ discovery session.
            if let Some(handle) = lock(&self.forwarder).take() {
                handle.abort();
            }
        }
    }
}

// ============================================================================
// Mock adapter
// ============================================================================

/// A device the mock radio reports as in range.
#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDevice {
    /// Device MAC address.
    pub address: String,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
#[derive(Default)]
struct MockState {
    sender: Option<mpsc::Sender<RadioEvent>>,
    devices: Vec<MockDevice>,
    pending: Vec<RadioEvent>,
    start_error: Option<BluetoothError>,
    starts: usize,
    stops: usize,
}

/// In-memory radio for tests and hardware-less builds.
///
/// Devices added with [`MockRadio::with_device`] advertise as soon as a scan
/// starts. Events passed to [`MockRadio::inject`] go to the running scan, or to
/// the next one if none is running.
#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
#[derive(Default)]
pub struct MockRadio {
    state: Mutex<MockState>,
}

#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
impl MockRadio {
    /// A radio with no devices in range.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device that advertises at the start of every scan.
    #[must_use]
    pub fn with_device(self, address: &str, rssi: Option<i16>) -> Self {
        lock(&self.state).devices.push(MockDevice {
            address: address.to_string(),
            rssi,
        });
        self
    }

    /// Make the next `start_scan` fail with `error`.
    pub fn fail_next_start(&self, error: BluetoothError) {
        lock(&self.state).start_error = Some(error);
    }

    /// Deliver an event to the running scan, or queue it for the next scan.
    pub fn inject(&self, event: RadioEvent) {
        let mut state = lock(&self.state);
        let delivered = state
            .sender
            .as_ref()
            .is_some_and(|sender| sender.try_send(event.clone()).is_ok());
        if !delivered {
            state.pending.push(event);
        }
    }

    /// Number of scans started.
    pub fn start_count(&self) -> usize {
        lock(&self.state).starts
    }

    /// Number of stop requests that ended a running scan.
    pub fn stop_count(&self) -> usize {
        lock(&self.state).stops
    }
}

#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
#[async_trait]
impl RadioAdapter for MockRadio {
    async fn start_scan(&self, _filter: &ScanFilter) -> BluetoothResult<mpsc::Receiver<RadioEvent>> {
        let mut state = lock(&self.state);
        if let Some(error) = state.start_error.take() {
            return Err(error);
        }
        state.starts += 1;

        let (tx, rx) = mpsc::channel(64);
        let devices = state.devices.clone();
        for device in devices {
            let _ = tx.try_send(RadioEvent::Advertisement {
                address: device.address,
                rssi: device.rssi,
            });
        }
        for event in std::mem::take(&mut state.pending) {
            let _ = tx.try_send(event);
        }
        state.sender = Some(tx);
        Ok(rx)
    }

    async fn stop_scan(&self) {
        let mut state = lock(&self.state);
        if state.sender.take().is_some() {
            state.stops += 1;
        }
    }
}
