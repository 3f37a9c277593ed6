use nalgebra::Vector3;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cometprop_errors::{CometPropError, Result};
use crate::config::EphemerisSettings;
use crate::constants::JulianDate;

use super::{
    analytic::AnalyticEphemeris, naif::LazyNaifEphemeris, EphemerisSource, EphemerisUsage,
    Planet, PlanetPositionProvider,
};

/// Planet positions for the force model: precise source first, analytic fallback.
///
/// The handle is cheap to clone and is passed explicitly to every N-body propagator.
#[derive(Clone)]
pub struct PerturberEphemeris {
    precise: Option<Arc<dyn PlanetPositionProvider>>,
    analytic: Arc<AnalyticEphemeris>,
}

impl PerturberEphemeris {
    /// Analytic positions only.
    pub fn analytic_only() -> Result<Self> {
        Ok(PerturberEphemeris {
            precise: None,
            analytic: Arc::new(AnalyticEphemeris::new()?),
        })
    }

    /// Precise positions from `precise`, analytic positions where it has no coverage.
    pub fn with_precise(precise: Arc<dyn PlanetPositionProvider>) -> Result<Self> {
        Ok(PerturberEphemeris {
            precise: Some(precise),
            analytic: Arc::new(AnalyticEphemeris::new()?),
        })
    }

    /// Build the selection from configuration.
    ///
    /// With `use_precise_ephemeris` and a kernel path, the kernel is loaded lazily on the
    /// first lookup. Without a kernel path the precise source is disabled with a warning.
    pub fn from_settings(settings: &EphemerisSettings) -> Result<Self> {
        if !settings.use_precise_ephemeris {
            return Self::analytic_only();
        }
        match &settings.ephemeris_kernel {
            Some(path) => Self::with_precise(Arc::new(LazyNaifEphemeris::new(path.clone()))),
            None => {
                warn!("precise ephemeris requested but no kernel configured, using analytic positions");
                Self::analytic_only()
            }
        }
    }

    pub fn has_precise(&self) -> bool {
        self.precise.is_some()
    }

    /// Heliocentric ecliptic position of `planet` at `jd`, recording the source used.
    ///
    /// Arguments
    /// -----------------
    /// * `planet`: the perturbing body.
    /// * `jd`: Julian Date (TDB).
    /// * `usage`: ledger of the running propagation.
    ///
    /// Return
    /// ----------
    /// * the position in AU. Precise unavailability is absorbed by the analytic fallback;
    ///   any other precise-source error is returned.
    pub fn position(
        &self,
        planet: Planet,
        jd: JulianDate,
        usage: &EphemerisUsage,
    ) -> Result<Vector3<f64>> {
        if let Some(precise) = &self.precise {
            match precise.position(planet, jd) {
                Ok(position) => {
                    usage.record(planet, EphemerisSource::Precise);
                    return Ok(position);
                }
                Err(CometPropError::EphemerisUnavailable { reason, .. }) => {
                    if usage.count(planet, EphemerisSource::Analytic) == 0 {
                        warn!(%planet, jd, %reason, "precise ephemeris unavailable, falling back to analytic elements");
                    } else {
                        debug!(%planet, jd, %reason, "analytic fallback");
                    }
                }
                Err(err) => return Err(err),
            }
        }

        let position = self.analytic.position(planet, jd)?;
        usage.record(planet, EphemerisSource::Analytic);
        Ok(position)
    }
}

impl fmt::Debug for PerturberEphemeris {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerturberEphemeris")
            .field("precise", &self.precise.as_ref().map(|p| p.source()))
            .field("analytic", &EphemerisSource::Analytic)
            .finish()
    }
}
