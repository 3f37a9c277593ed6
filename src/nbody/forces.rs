//! Heliocentric equations of motion of a massless body.
//!
//! In a heliocentric frame the acceleration is the solar term plus, for each planet, its
//! direct pull on the comet minus its pull on the Sun (the indirect term):
//!
//! ```text
//! a = −μ r/|r|³ + Σ μ_p ((r_p − r)/|r_p − r|³ − r_p/|r_p|³)
//! ```
use nalgebra::Vector3;

use crate::cometprop_errors::{CometPropError, Result};
use crate::constants::{JulianDate, GAUSS_GRAV_SQUARED};
use crate::ephemeris::{EphemerisUsage, PerturberEphemeris, Planet};

use super::integrator::OdeSystem;

/// Acceleration (AU/day²) at heliocentric position `r`.
///
/// Arguments
/// -----------------
/// * `jd`: evaluation time, for error reporting.
/// * `r`: comet position (AU).
/// * `perturbers`: `(μ_p, r_p)` pairs, planet gravitational parameter (AU³/day²) and
///   heliocentric position (AU).
///
/// Return
/// ----------
/// * The acceleration, or [`CometPropError::IntegrationFailure`] when the comet sits on
///   the Sun or on a planet.
pub fn heliocentric_acceleration(
    jd: JulianDate,
    r: &Vector3<f64>,
    perturbers: &[(f64, Vector3<f64>)],
) -> Result<Vector3<f64>> {
    let singular = |what: &str| CometPropError::IntegrationFailure {
        jd,
        step_size: 0.0,
        reason: format!("singular acceleration: zero distance to {what}"),
    };

    let r_norm = r.norm();
    if r_norm == 0.0 {
        return Err(singular("the Sun"));
    }
    let mut acceleration = -GAUSS_GRAV_SQUARED * r / r_norm.powi(3);

    for (gm, r_p) in perturbers {
        let delta = r_p - r;
        let delta_norm = delta.norm();
        let r_p_norm = r_p.norm();
        if delta_norm == 0.0 || r_p_norm == 0.0 {
            return Err(singular("a perturbing planet"));
        }
        acceleration += *gm * (delta / delta_norm.powi(3) - r_p / r_p_norm.powi(3));
    }
    Ok(acceleration)
}

/// The comet's equations of motion as a first-order system on `[x, y, z, vx, vy, vz]`.
pub struct CometForceModel<'a> {
    perturbers: &'a [Planet],
    ephemeris: &'a PerturberEphemeris,
    usage: &'a EphemerisUsage,
}

impl<'a> CometForceModel<'a> {
    pub fn new(
        perturbers: &'a [Planet],
        ephemeris: &'a PerturberEphemeris,
        usage: &'a EphemerisUsage,
    ) -> Self {
        CometForceModel {
            perturbers,
            ephemeris,
            usage,
        }
    }

    pub fn acceleration(&self, jd: JulianDate, r: &Vector3<f64>) -> Result<Vector3<f64>> {
        let perturbers = self
            .perturbers
            .iter()
            .map(|planet| Ok((planet.gm(), self.ephemeris.position(*planet, jd, self.usage)?)))
            .collect::<Result<smallvec::SmallVec<[(f64, Vector3<f64>); 8]>>>()?;
        heliocentric_acceleration(jd, r, &perturbers)
    }
}

impl OdeSystem<6> for CometForceModel<'_> {
    fn rhs(&self, t: f64, y: &[f64; 6], dydt: &mut [f64; 6]) -> Result<()> {
        let r = Vector3::new(y[0], y[1], y[2]);
        let a = self.acceleration(t, &r)?;
        dydt[..3].copy_from_slice(&y[3..]);
        dydt[3] = a.x;
        dydt[4] = a.y;
        dydt[5] = a.z;
        Ok(())
    }
}
