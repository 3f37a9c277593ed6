//! # Constants and type definitions for cometprop
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **common type
//! definitions** used throughout the crate.
//!
//! ## Overview
//!
//! - Gravitational parameter of the Sun in Gaussian units (AU, day)
//! - Unit conversions (degrees ↔ radians, days ↔ seconds, AU ↔ km)
//! - Reference epochs (J2000) expressed as Julian Dates
//! - Core type aliases used across the crate
//!
//! Every propagation in the crate works in the **heliocentric ecliptic J2000** frame with
//! lengths in AU and times in days (epochs as Julian Dates, TDB).

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Number of days in a Julian year
pub const DAYS_PER_JULIAN_YEAR: f64 = 365.25;

/// Number of days in a Julian century
pub const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;

/// Astronomical Unit in kilometers (IAU 2012)
pub const AU: f64 = 149_597_870.7;

/// Julian Date of J2000.0 (2000-01-01 12:00:00 TDB)
pub const J2000_JD: f64 = 2_451_545.0;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648000.0;

/// Mean obliquity of the ecliptic at J2000 (IAU 1976), in arcseconds
pub const OBLIQUITY_J2000_ARCSEC: f64 = 84_381.448;

/// Gaussian gravitational constant k (used in classical orbit dynamics)
pub const GAUSS_GRAV: f64 = 0.01720209895;

/// k², the heliocentric gravitational parameter μ☉ in AU³/day²
pub const GAUSS_GRAV_SQUARED: f64 = GAUSS_GRAV * GAUSS_GRAV;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in radians
pub type Radian = f64;
/// Distance in astronomical units
pub type AstronomicalUnit = f64;
/// Julian Date (days, TDB)
pub type JulianDate = f64;
/// Comet designation as published by the MPC (e.g. `"1P/Halley"`, `"C/2020 F3"`)
pub type Designation = String;

#[cfg(test)]
mod constants_test {
    use super::*;

    #[test]
    fn test_gaussian_mu() {
        assert_eq!(GAUSS_GRAV_SQUARED, 2.9591220828559115e-4);
    }

    #[test]
    fn test_obliquity_value() {
        approx::assert_relative_eq!(
            OBLIQUITY_J2000_ARCSEC * RADSEC,
            0.40909280422232897,
            epsilon = 1e-15
        );
    }
}
