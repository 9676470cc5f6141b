//! Reduction of daily case series into range totals.
//!
//! The API reports cumulative counters, so the number of new cases over a
//! range is the last sample minus the first one. Callers must pass the series
//! sorted by date, which [`crate::client::TimeSeriesClient`] guarantees.

use tracing::debug;

use crate::error::{ExposureError, Result};
use crate::types::{CaseDelta, DailyCasePoint};

/// Compute the change of every counter between the first and last sample.
///
/// A single sample yields all-zero deltas.
///
/// # Errors
///
/// Returns [`ExposureError::InsufficientData`] if `series` is empty.
pub fn aggregate(country: &str, series: &[DailyCasePoint]) -> Result<CaseDelta> {
    let (first, last) = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(ExposureError::InsufficientData),
    };

    let delta = CaseDelta {
        country: country.to_string(),
        confirmed: last.confirmed - first.confirmed,
        deaths: last.deaths - first.deaths,
        recovered: last.recovered - first.recovered,
    };

    debug!(
        country,
        points = series.len(),
        from = %first.date,
        to = %last.date,
        confirmed = delta.confirmed,
        "Aggregated daily series"
    );

    Ok(delta)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn point(day: u32, confirmed: i64, deaths: i64, recovered: i64) -> DailyCasePoint {
        DailyCasePoint {
            date: NaiveDate::from_ymd_opt(2021, 3, day).unwrap(),
            confirmed,
            deaths,
            recovered,
        }
    }

    #[test]
    fn test_empty_series_is_insufficient() {
        let result = aggregate("Israel", &[]);
        assert!(matches!(result, Err(ExposureError::InsufficientData)));
    }

    #[test]
    fn test_single_point_is_all_zero() {
        let delta = aggregate("Israel", &[point(1, 100, 5, 40)]).unwrap();
        assert_eq!(
            delta,
            CaseDelta {
                country: "Israel".into(),
                confirmed: 0,
                deaths: 0,
                recovered: 0,
            }
        );
    }

    #[test]
    fn test_last_minus_first() {
        let delta = aggregate("Israel", &[point(1, 10, 1, 2), point(2, 25, 3, 9)]).unwrap();
        assert_eq!(delta.confirmed, 15);
        assert_eq!(delta.deaths, 2);
        assert_eq!(delta.recovered, 7);
    }

    #[test]
    fn test_middle_points_are_ignored() {
        let series = [point(1, 10, 0, 0), point(2, 999, 50, 50), point(3, 30, 2, 4)];
        let delta = aggregate("Israel", &series).unwrap();
        assert_eq!(delta.confirmed, 20);
        assert_eq!(delta.deaths, 2);
        assert_eq!(delta.recovered, 4);
    }

    #[test]
    fn test_downward_correction_is_negative() {
        let delta = aggregate("Israel", &[point(1, 50, 3, 20), point(2, 48, 3, 20)]).unwrap();
        assert_eq!(delta.confirmed, -2);
    }
}
