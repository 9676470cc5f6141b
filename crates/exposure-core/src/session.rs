//! Session orchestration.
//!
//! [`SessionController`] owns everything a presentation layer needs to show:
//! the country list and selection, the chosen date range, the last computed
//! [`CaseDelta`], the proximity scan session, a loading flag and the last error
//! message. All of it lives in one [`SessionSnapshot`] published through a
//! `tokio::sync::watch` channel; subscribers always see a consistent copy.
//!
//! Fetch and scan failures never escape as panics. They are published as
//! `error_message` and also returned to the caller, and the loading flag is
//! cleared on every exit path by a drop guard.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::bluetooth::{codes, ProximityScanner, RadioAdapter, ScanObserver};
use crate::client::TimeSeriesSource;
use crate::config::ScanConfig;
use crate::dates::format_api_date;
use crate::error::{ExposureError, Result};
use crate::stats::aggregate;
use crate::types::{
    sort_countries, CaseDelta, Country, DatePoint, DateRange, ScanSession, ScanState,
};

/// How the user picked a country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum CountrySelector {
    /// Position in the sorted country list.
    Index {
        /// Zero-based index.
        index: usize,
    },
    /// ISO 3166-1 alpha-2 code, case-insensitive.
    Code {
        /// Country code, e.g. `IL`.
        code: String,
    },
}

/// Everything the presentation layer observes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionSnapshot {
    /// A fetch is running.
    pub is_loading: bool,

    /// Last failure, until the next operation starts or it is cleared.
    pub error_message: Option<String>,

    /// Countries sorted by name.
    pub countries: Vec<Country>,

    /// Selected country.
    pub selected_country: Option<Country>,

    /// Position of the selected country in `countries`.
    pub selected_index: Option<usize>,

    /// Start of the date range.
    #[schema(value_type = Option<String>, format = Date)]
    pub from_date: Option<NaiveDate>,

    /// End of the date range.
    #[schema(value_type = Option<String>, format = Date)]
    pub to_date: Option<NaiveDate>,

    /// Result of the last successful statistics fetch.
    pub case_delta: Option<CaseDelta>,

    /// Current or last proximity scan.
    pub scan: ScanSession,
}

impl SessionSnapshot {
    /// The selected range, if both bounds are set.
    #[must_use]
    pub const fn date_range(&self) -> Option<DateRange> {
        match (self.from_date, self.to_date) {
            (Some(from), Some(to)) => Some(DateRange::new(from, to)),
            _ => None,
        }
    }
}

/// Keeps `is_loading` true while at least one fetch is in flight.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<SessionSnapshot>,
    in_flight: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
    fn begin(state: &'a watch::Sender<SessionSnapshot>, in_flight: &'a AtomicUsize) -> Self {
        // The counter only changes under the watch lock, so the flag cannot go stale.
        state.send_modify(|snapshot| {
            in_flight.fetch_add(1, Ordering::SeqCst);
            snapshot.is_loading = true;
            snapshot.error_message = None;
        });
        Self { state, in_flight }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let in_flight = self.in_flight;
        self.state.send_if_modified(|snapshot| {
            if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                snapshot.is_loading = false;
                true
            } else {
                false
            }
        });
    }
}

/// Orchestrates statistics fetches and proximity scans for one user session.
pub struct SessionController {
    source: Arc<dyn TimeSeriesSource>,
    scanner: Arc<ProximityScanner>,
    scan_config: ScanConfig,
    state: Arc<watch::Sender<SessionSnapshot>>,
    in_flight: AtomicUsize,
}

impl SessionController {
    /// Create a controller over a statistics source and a radio.
    pub fn new(
        source: Arc<dyn TimeSeriesSource>,
        adapter: Arc<dyn RadioAdapter>,
        scan_config: ScanConfig,
    ) -> Self {
        let (sender, _) = watch::channel(SessionSnapshot::default());
        let state = Arc::new(sender);

        let mirror = Arc::clone(&state);
        let observer: ScanObserver = Arc::new(move |session: &ScanSession| {
            mirror.send_modify(|snapshot| {
                snapshot.scan = session.clone();
                if let ScanState::Failed { code } = session.state {
                    snapshot.error_message = Some(scan_failure_message(code));
                }
            });
        });
        let scanner = Arc::new(ProximityScanner::new(adapter).with_observer(observer));

        Self {
            source,
            scanner,
            scan_config,
            state,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// A copy of the current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// The scan settings this controller uses.
    pub const fn scan_config(&self) -> &ScanConfig {
        &self.scan_config
    }

    /// Select a country from the current list.
    ///
    /// An unknown index or code leaves the selection untouched and is only
    /// reported to the caller; it is not published as an error message.
    ///
    /// # Errors
    ///
    /// Returns [`ExposureError::Selection`] if no country matches.
    pub fn select_country(&self, selector: &CountrySelector) -> Result<Country> {
        let mut selected = None;
        self.state.send_if_modified(|snapshot| {
            let index = match selector {
                CountrySelector::Index { index } => {
                    Some(*index).filter(|i| *i < snapshot.countries.len())
                }
                CountrySelector::Code { code } => snapshot
                    .countries
                    .iter()
                    .position(|c| c.iso2.eq_ignore_ascii_case(code.trim())),
            };
            let Some(index) = index else {
                return false;
            };
            let country = snapshot.countries.get(index).cloned();
            snapshot.selected_index = Some(index);
            snapshot.selected_country.clone_from(&country);
            selected = country;
            true
        });

        match selected {
            Some(country) => {
                debug!(country = %country.name, "Country selected");
                Ok(country)
            }
            None => {
                debug!(?selector, "Ignoring selection with no matching country");
                Err(ExposureError::Selection(match selector {
                    CountrySelector::Index { index } => format!("no country at index {index}"),
                    CountrySelector::Code { code } => format!("no country with code '{code}'"),
                }))
            }
        }
    }

    /// Set one end of the date range.
    pub fn set_date_range_bound(&self, point: DatePoint, date: NaiveDate) {
        self.state.send_modify(|snapshot| match point {
            DatePoint::Start => snapshot.from_date = Some(date),
            DatePoint::End => snapshot.to_date = Some(date),
        });
        debug!(?point, date = %date, "Date range bound set");
    }

    /// Drop the current error message.
    pub fn clear_error(&self) {
        self.state.send_if_modified(|snapshot| snapshot.error_message.take().is_some());
    }

    /// Fetch the country list, sort it by name and select the first country.
    ///
    /// # Errors
    ///
    /// Returns the source's error after publishing it as `error_message`.
    pub async fn fetch_countries(&self) -> Result<Vec<Country>> {
        let _loading = LoadingGuard::begin(&self.state, &self.in_flight);

        match self.source.list_countries().await {
            Ok(mut countries) => {
                sort_countries(&mut countries);
                info!(count = countries.len(), "Country list updated");
                self.state.send_modify(|snapshot| {
                    snapshot.countries.clone_from(&countries);
                    snapshot.selected_country = countries.first().cloned();
                    snapshot.selected_index = snapshot.selected_country.as_ref().map(|_| 0);
                });
                Ok(countries)
            }
            Err(e) => {
                self.publish_error(&e);
                Err(e)
            }
        }
    }

    /// Fetch the daily series for the selection and publish its [`CaseDelta`].
    ///
    /// # Errors
    ///
    /// Returns, after publishing it as `error_message`:
    /// - [`ExposureError::Selection`] if no country is selected
    /// - [`ExposureError::IncompleteDateRange`] / [`ExposureError::InvalidDateRange`]
    /// - [`ExposureError::Network`] if the fetch fails
    /// - [`ExposureError::InsufficientData`] if the API returned no samples
    pub async fn fetch_statistics(&self) -> Result<CaseDelta> {
        let _loading = LoadingGuard::begin(&self.state, &self.in_flight);

        match self.load_statistics().await {
            Ok(delta) => {
                info!(
                    country = %delta.country,
                    confirmed = delta.confirmed,
                    deaths = delta.deaths,
                    recovered = delta.recovered,
                    "Statistics updated"
                );
                self.state
                    .send_modify(|snapshot| snapshot.case_delta = Some(delta.clone()));
                Ok(delta)
            }
            Err(e) => {
                self.publish_error(&e);
                Err(e)
            }
        }
    }

    async fn load_statistics(&self) -> Result<CaseDelta> {
        let (country, from, to) = {
            let snapshot = self.state.borrow();
            (
                snapshot.selected_country.clone(),
                snapshot.from_date,
                snapshot.to_date,
            )
        };

        let country =
            country.ok_or_else(|| ExposureError::Selection("no country selected".to_string()))?;
        let (Some(from), Some(to)) = (from, to) else {
            return Err(ExposureError::IncompleteDateRange);
        };
        if !DateRange::new(from, to).is_valid() {
            return Err(ExposureError::InvalidDateRange {
                from: format_api_date(from),
                to: format_api_date(to),
            });
        }

        let series = self.source.daily_series(&country.slug, from, to).await?;
        aggregate(&country.name, &series)
    }

    /// Scan for the configured target and return the terminal state.
    ///
    /// The scan runs on its own task, so dropping the returned future does not
    /// abort it. A [`ScanState::Failed`] outcome is returned as `Ok` and also
    /// published as `error_message`.
    ///
    /// # Errors
    ///
    /// Returns [`ExposureError::ScanInProgress`] if a scan is already running
    /// or [`ExposureError::InvalidAddress`] if the configured target is invalid.
    pub async fn start_proximity_scan(&self) -> Result<ScanState> {
        self.state
            .send_if_modified(|snapshot| snapshot.error_message.take().is_some());

        let scanner = Arc::clone(&self.scanner);
        let target = self.scan_config.target_address.clone();
        let duration = self.scan_config.duration();

        let outcome = tokio::spawn(async move { scanner.start_scan(&target, duration).await })
            .await
            .map_err(|e| ExposureError::ScanAdapter {
                code: codes::INTERNAL_ERROR,
                message: e.to_string(),
            })
            .and_then(|result| result.map_err(ExposureError::from));

        match outcome {
            Ok(state) => Ok(state),
            Err(e) => {
                self.publish_error(&e);
                Err(e)
            }
        }
    }

    /// Stop the running scan. Returns `true` if a scan was ended.
    pub fn stop_proximity_scan(&self) -> bool {
        self.scanner.stop()
    }

    /// Wait until no scan task holds the radio.
    pub async fn wait_for_scan_idle(&self) {
        self.scanner.wait_until_idle().await;
    }

    fn publish_error(&self, error: &ExposureError) {
        warn!(error_code = error.error_code(), error = %error, "Operation failed");
        let message = error.to_string();
        self.state
            .send_modify(|snapshot| snapshot.error_message = Some(message));
    }
}

fn scan_failure_message(code: i32) -> String {
    format!("Bluetooth scan failed with code {code}")
}
