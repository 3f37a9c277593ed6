//! # Planet position providers
//!
//! The N-body force model needs heliocentric positions of the perturbing planets. They
//! come from a [`PlanetPositionProvider`], with two implementations:
//!
//! * [`naif::NaifEphemeris`] – **precise**, Chebyshev records of a JPL SPK kernel
//!   (DE4xx). May answer [`CometPropError::EphemerisUnavailable`] when the kernel is not
//!   loaded, lacks a body or does not cover the requested time.
//! * [`analytic::AnalyticEphemeris`] – **analytic fallback**, J2000 mean elements. Always
//!   available.
//!
//! [`PerturberEphemeris`] implements the selection policy (precise first, analytic on
//! unavailability) and records every lookup in an [`EphemerisUsage`] ledger, so a result
//! always states which source(s) produced it.
//!
//! All positions are heliocentric, ecliptic J2000, in AU; times are Julian Dates (TDB).
//!
//! [`CometPropError::EphemerisUnavailable`]: crate::cometprop_errors::CometPropError::EphemerisUnavailable
pub mod analytic;
pub mod naif;
mod perturber;
mod planet;
mod usage;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::cometprop_errors::Result;
use crate::constants::JulianDate;

pub use perturber::PerturberEphemeris;
pub use planet::Planet;
pub use usage::{EphemerisUsage, EphemerisUsageReport};

/// Origin of a planet position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EphemerisSource {
    Precise,
    Analytic,
}

impl EphemerisSource {
    pub(crate) fn index(&self) -> usize {
        match self {
            EphemerisSource::Precise => 0,
            EphemerisSource::Analytic => 1,
        }
    }
}

impl std::fmt::Display for EphemerisSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EphemerisSource::Precise => f.write_str("precise"),
            EphemerisSource::Analytic => f.write_str("analytic"),
        }
    }
}

/// Heliocentric planet positions.
///
/// Implementations must be shareable across threads: the same provider serves every
/// right-hand-side evaluation of every integration running in the process.
pub trait PlanetPositionProvider: Send + Sync {
    /// Heliocentric ecliptic J2000 position of `planet` at `jd`, in AU.
    ///
    /// An [`EphemerisUnavailable`](crate::cometprop_errors::CometPropError::EphemerisUnavailable)
    /// error is an ordinary answer meaning "ask another source".
    fn position(&self, planet: Planet, jd: JulianDate) -> Result<Vector3<f64>>;

    fn source(&self) -> EphemerisSource;
}
