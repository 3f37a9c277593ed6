//! Time handling: Julian Dates, ephemeris seconds and sample grids.
//!
//! Epochs are carried through the crate as Julian Dates in the TDB scale. SPK kernels
//! index their records with ephemeris seconds past J2000 (ET ≡ TDB to the precision
//! relevant here), hence [`jd_to_et_seconds`]. Calendar strings are parsed and printed
//! through [`hifitime`].
use hifitime::{Epoch, TimeScale};
use std::str::FromStr;

use crate::cometprop_errors::{CometPropError, Result};
use crate::constants::{JulianDate, J2000_JD, SECONDS_PER_DAY};

/// Julian Date (TDB) → ephemeris seconds past J2000.
pub fn jd_to_et_seconds(jd: JulianDate) -> f64 {
    (jd - J2000_JD) * SECONDS_PER_DAY
}

/// Ephemeris seconds past J2000 → Julian Date (TDB).
pub fn et_seconds_to_jd(et: f64) -> JulianDate {
    J2000_JD + et / SECONDS_PER_DAY
}

/// Julian Date (TDB) → [`Epoch`].
pub fn jd_to_epoch(jd: JulianDate) -> Epoch {
    Epoch::from_jde_tdb(jd)
}

/// Parse a calendar date (e.g. `"1994-02-17T00:00:00 TDB"`) into a Julian Date (TDB).
///
/// Argument
/// --------
/// * `date`: any format accepted by [`Epoch::from_str`]; UTC when no scale is given.
///
/// Return
/// ------
/// * the Julian Date in the TDB scale, or [`CometPropError::InvalidRequest`] on a malformed date.
pub fn calendar_to_jd(date: &str) -> Result<JulianDate> {
    let epoch = Epoch::from_str(date)
        .map_err(|e| CometPropError::InvalidRequest(format!("invalid date '{date}': {e}")))?;
    Ok(epoch.to_jde_tdb_days())
}

/// Render a Julian Date (TDB) as a Gregorian calendar string in the TDB scale.
pub fn jd_to_calendar(jd: JulianDate) -> String {
    jd_to_epoch(jd).to_gregorian_str(TimeScale::TDB)
}

/// `n_points` evenly spaced times between `start` and `end`, both included.
///
/// A single point yields `[start]`. The last sample is exactly `end`.
///
/// Return
/// ------
/// * the time grid, or [`CometPropError::InvalidRequest`] when `n_points == 0`,
///   `end < start` or a bound is not finite.
pub fn sample_times(start: JulianDate, end: JulianDate, n_points: usize) -> Result<Vec<JulianDate>> {
    if n_points == 0 {
        return Err(CometPropError::InvalidRequest(
            "n_points must be at least 1".into(),
        ));
    }
    if !start.is_finite() || !end.is_finite() || end < start {
        return Err(CometPropError::InvalidRequest(format!(
            "invalid time range [{start}, {end}]"
        )));
    }
    if n_points == 1 {
        return Ok(vec![start]);
    }

    let step = (end - start) / (n_points - 1) as f64;
    Ok((0..n_points)
        .map(|i| {
            if i == n_points - 1 {
                end
            } else {
                start + i as f64 * step
            }
        })
        .collect())
}

#[cfg(test)]
mod time_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_et_roundtrip() {
        assert_eq!(jd_to_et_seconds(J2000_JD), 0.0);
        assert_eq!(jd_to_et_seconds(J2000_JD + 1.0), 86400.0);
        assert_relative_eq!(
            et_seconds_to_jd(jd_to_et_seconds(2449400.5)),
            2449400.5,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_calendar_roundtrip() {
        let jd = calendar_to_jd("2000-01-01T12:00:00 TDB").unwrap();
        assert_relative_eq!(jd, J2000_JD, epsilon = 1e-8);
        let printed = jd_to_calendar(2449400.5);
        assert!(printed.starts_with("1994-02-1"));
        assert_relative_eq!(calendar_to_jd(&printed).unwrap(), 2449400.5, epsilon = 1e-6);
        assert!(calendar_to_jd("not a date").is_err());
    }

    #[test]
    fn test_sample_times() {
        let t = sample_times(10.0, 20.0, 5).unwrap();
        assert_eq!(t, vec![10.0, 12.5, 15.0, 17.5, 20.0]);
        assert_eq!(sample_times(10.0, 20.0, 1).unwrap(), vec![10.0]);
        assert_eq!(sample_times(10.0, 10.0, 3).unwrap(), vec![10.0, 10.0, 10.0]);
        assert!(sample_times(10.0, 20.0, 0).is_err());
        assert!(sample_times(20.0, 10.0, 3).is_err());
    }
}
