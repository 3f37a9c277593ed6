//! Analytic planet positions from J2000 mean elements.
//!
//! Each planet is described by its mean elements at J2000 (Standish, *Keplerian Elements
//! for Approximate Positions of the Major Planets*, table 1, valid 1800–2050) and a mean
//! longitude rate. Positions are obtained through the same Kepler solver and perifocal
//! rotation as comets ([`TwoBodyPropagator`]), with the tabulated mean motion.
//!
//! The accuracy is that of mean elements: good enough for the magnitude and direction of
//! a planetary perturbation, not a substitute for a precise ephemeris.
use nalgebra::Vector3;

use crate::cometprop_errors::Result;
use crate::constants::{JulianDate, DAYS_PER_JULIAN_CENTURY, J2000_JD, RADEG};
use crate::kepler::{ConvergencePolicy, KeplerSolverSettings};
use crate::orbit_type::KeplerianElements;
use crate::two_body::TwoBodyPropagator;

use super::{EphemerisSource, Planet, PlanetPositionProvider};

/// J2000 mean elements of a planet.
///
/// Angles in degrees, `mean_longitude_rate` in degrees per Julian century.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanElements {
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub mean_longitude: f64,
    pub perihelion_longitude: f64,
    pub ascending_node_longitude: f64,
    pub mean_longitude_rate: f64,
}

impl MeanElements {
    pub fn of(planet: Planet) -> Self {
        let (a, e, i, l, peri, node, rate) = match planet {
            Planet::Mercury => (
                0.38709927,
                0.20563593,
                7.00497902,
                252.25032350,
                77.45779628,
                48.33076593,
                149472.67411175,
            ),
            Planet::Venus => (
                0.72333566,
                0.00677672,
                3.39467605,
                181.97909950,
                131.60246718,
                76.67984255,
                58517.81538729,
            ),
            Planet::EarthMoon => (
                1.00000261,
                0.01671123,
                -0.00001531,
                100.46457166,
                102.93768193,
                0.0,
                35999.37244981,
            ),
            Planet::Mars => (
                1.52371034,
                0.09339410,
                1.84969142,
                -4.55343205,
                -23.94362959,
                49.55953891,
                19140.30268499,
            ),
            Planet::Jupiter => (
                5.20288700,
                0.04838624,
                1.30439695,
                34.39644051,
                14.72847983,
                100.47390909,
                3034.74612775,
            ),
            Planet::Saturn => (
                9.53667594,
                0.05386179,
                2.48599187,
                49.95424423,
                92.59887831,
                113.66242448,
                1222.49362201,
            ),
            Planet::Uranus => (
                19.18916464,
                0.04725744,
                0.77263783,
                313.23810451,
                170.95427630,
                74.01692503,
                428.48202785,
            ),
            Planet::Neptune => (
                30.06992276,
                0.00859048,
                1.77004347,
                -55.12002969,
                44.96476227,
                131.78422574,
                218.45945325,
            ),
        };
        MeanElements {
            semi_major_axis: a,
            eccentricity: e,
            inclination: i,
            mean_longitude: l,
            perihelion_longitude: peri,
            ascending_node_longitude: node,
            mean_longitude_rate: rate,
        }
    }

    /// Keplerian elements at J2000: `ω = ϖ − Ω`, `M₀ = L − ϖ`.
    pub fn to_keplerian(&self) -> Result<KeplerianElements> {
        KeplerianElements::from_degrees(
            J2000_JD,
            self.semi_major_axis,
            self.eccentricity,
            self.inclination,
            self.ascending_node_longitude,
            self.perihelion_longitude - self.ascending_node_longitude,
            self.mean_longitude - self.perihelion_longitude,
        )
    }

    /// Mean motion in rad/day.
    pub fn mean_motion(&self) -> f64 {
        self.mean_longitude_rate * RADEG / DAYS_PER_JULIAN_CENTURY
    }
}

/// Planet positions from mean elements, always available.
#[derive(Debug, Clone)]
pub struct AnalyticEphemeris {
    propagators: Vec<TwoBodyPropagator>,
}

impl AnalyticEphemeris {
    pub fn new() -> Result<Self> {
        // Planetary eccentricities are small: a non-converged solve is not expected,
        // and a tolerated estimate is still far below the model error.
        let settings = KeplerSolverSettings {
            convergence_policy: ConvergencePolicy::Tolerate,
            ..Default::default()
        };
        let propagators = Planet::ALL
            .iter()
            .map(|planet| {
                let mean = MeanElements::of(*planet);
                TwoBodyPropagator::with_mean_motion(mean.to_keplerian()?, settings, mean.mean_motion())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(AnalyticEphemeris { propagators })
    }
}

impl PlanetPositionProvider for AnalyticEphemeris {
    fn position(&self, planet: Planet, jd: JulianDate) -> Result<Vector3<f64>> {
        Ok(self.propagators[planet.index()].propagate(jd)?.position)
    }

    fn source(&self) -> EphemerisSource {
        EphemerisSource::Analytic
    }
}
