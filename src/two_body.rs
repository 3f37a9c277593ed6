//! # Closed-form two-body propagation
//!
//! [`TwoBodyPropagator`] turns a bound [`KeplerianElements`] set into heliocentric
//! ecliptic J2000 state vectors at arbitrary times:
//!
//! 1. `n = 2π/P`, `M = M₀ + n(t − t₀)`,
//! 2. `E` from [`solve_kepler`],
//! 3. `ν = 2·atan2(√(1+e)·sin(E/2), √(1−e)·cos(E/2))`, `r = a(1 − e·cos E)`,
//! 4. in-plane position `(r cos ν, r sin ν)` and velocity
//!    `(−a n sin E/(1 − e cos E), a n √(1−e²) cos E/(1 − e cos E))`,
//! 5. rotation into the reference frame by the 3×2 perifocal matrix of `(Ω, i, ω)`.
//!
//! Each sample is independent, so [`TwoBodyPropagator::propagate_range`] evaluates the
//! samples in parallel with `rayon`.
//!
//! Parabolic and hyperbolic orbits (`e ≥ 1`) are rejected at construction with
//! [`CometPropError::UnsupportedOrbitRegime`]; they are never approximated.
use nalgebra::{Matrix3x2, Vector2, Vector3};
use rayon::prelude::*;

use crate::cometprop_errors::{CometPropError, Result};
use crate::constants::{AstronomicalUnit, JulianDate};
use crate::kepler::{solve_kepler, true_anomaly, KeplerSolverSettings};
use crate::orbit_type::{KeplerianElements, StateVector};
use crate::ref_system::perifocal_to_reference;

/// Sampled positions of a body, as consumed by plotting and comparison layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub times: Vec<JulianDate>,
    pub positions: Vec<Vector3<f64>>,
}

/// Closed-form propagator for one bound element set.
///
/// The propagator owns its elements; the mean motion and the perifocal rotation are
/// computed once at construction.
#[derive(Debug, Clone)]
pub struct TwoBodyPropagator {
    elements: KeplerianElements,
    settings: KeplerSolverSettings,
    mean_motion: f64,
    rotation: Matrix3x2<f64>,
}

impl TwoBodyPropagator {
    /// Build a propagator with the default solver settings.
    pub fn new(elements: KeplerianElements) -> Result<Self> {
        Self::with_settings(elements, KeplerSolverSettings::default())
    }

    /// Build a propagator with explicit Kepler solver settings.
    ///
    /// Return
    /// ------
    /// * the propagator, or [`CometPropError::UnsupportedOrbitRegime`] when `e ≥ 1`.
    pub fn with_settings(elements: KeplerianElements, settings: KeplerSolverSettings) -> Result<Self> {
        let mean_motion = elements
            .mean_motion()
            .ok_or(CometPropError::UnsupportedOrbitRegime {
                eccentricity: elements.eccentricity(),
            })?;
        let rotation = perifocal_to_reference(
            elements.ascending_node_longitude(),
            elements.inclination(),
            elements.periapsis_argument(),
        );

        Ok(TwoBodyPropagator {
            elements,
            settings,
            mean_motion,
            rotation,
        })
    }

    /// Build a propagator whose mean motion is given instead of derived from `a`.
    ///
    /// Used for mean planetary elements, whose tabulated mean-longitude rate already
    /// includes the planet's own mass.
    pub fn with_mean_motion(
        elements: KeplerianElements,
        settings: KeplerSolverSettings,
        mean_motion: f64,
    ) -> Result<Self> {
        if !(mean_motion.is_finite() && mean_motion > 0.0) {
            return Err(CometPropError::InvalidElements(format!(
                "mean motion must be positive, got {mean_motion}"
            )));
        }
        let mut propagator = Self::with_settings(elements, settings)?;
        propagator.mean_motion = mean_motion;
        Ok(propagator)
    }

    pub fn elements(&self) -> &KeplerianElements {
        &self.elements
    }

    pub fn mean_motion(&self) -> f64 {
        self.mean_motion
    }

    /// State vector at time `t` (Julian Date).
    ///
    /// Return
    /// ------
    /// * the heliocentric ecliptic state, or [`CometPropError::ConvergenceFailure`] when the
    ///   Kepler solve fails and the configured policy rejects it.
    pub fn propagate(&self, t: JulianDate) -> Result<StateVector> {
        let e = self.elements.eccentricity();
        let a = self.elements.semi_major_axis();
        let n = self.mean_motion;

        let mean_anomaly = self.elements.mean_anomaly() + n * (t - self.elements.epoch());
        let ecc_anomaly = solve_kepler(mean_anomaly, e, &self.settings)?.resolve(
            self.settings.convergence_policy,
            mean_anomaly,
            e,
        )?;

        let nu = true_anomaly(ecc_anomaly, e);
        let (sin_e, cos_e) = ecc_anomaly.sin_cos();
        let one_minus_ecos = 1.0 - e * cos_e;
        let r = a * one_minus_ecos;

        let position_plane = Vector2::new(r * nu.cos(), r * nu.sin());
        let velocity_plane = Vector2::new(
            -a * n * sin_e / one_minus_ecos,
            a * n * (1.0 - e * e).sqrt() * cos_e / one_minus_ecos,
        );

        Ok(StateVector::new(
            self.rotation * position_plane,
            self.rotation * velocity_plane,
            t,
        ))
    }

    /// States at `n_points` evenly spaced times over `[start, end]`, endpoints included.
    ///
    /// Samples are computed in parallel and returned in time order.
    ///
    /// Return
    /// ------
    /// * the ordered states, or the first error encountered; an empty or reversed range
    ///   is [`CometPropError::InvalidRequest`].
    pub fn propagate_range(
        &self,
        start: JulianDate,
        end: JulianDate,
        n_points: usize,
    ) -> Result<Vec<StateVector>> {
        let times = crate::time::sample_times(start, end, n_points)?;
        times.par_iter().map(|&t| self.propagate(t)).collect()
    }

    /// Same as [`Self::propagate_range`] with the sample count chosen from the span:
    /// about one sample every ten days, clamped to `[min_points, max_points]`.
    pub fn propagate_range_adaptive(
        &self,
        start: JulianDate,
        end: JulianDate,
        min_points: usize,
        max_points: usize,
    ) -> Result<Vec<StateVector>> {
        let n_points = adaptive_sample_count(start, end, min_points, max_points);
        self.propagate_range(start, end, n_points)
    }

    /// Times and positions over `[start, end]`.
    pub fn trajectory(&self, start: JulianDate, end: JulianDate, n_points: usize) -> Result<Trajectory> {
        let states = self.propagate_range(start, end, n_points)?;
        let (times, positions) = states.iter().map(|s| (s.time, s.position)).unzip();
        Ok(Trajectory { times, positions })
    }

    /// Heliocentric distance at `t` (AU).
    pub fn heliocentric_distance(&self, t: JulianDate) -> Result<AstronomicalUnit> {
        Ok(self.propagate(t)?.distance())
    }
}

/// Number of samples for a span: `⌊span/10⌋` days, clamped to `[min_points, max_points]`.
pub fn adaptive_sample_count(
    start: JulianDate,
    end: JulianDate,
    min_points: usize,
    max_points: usize,
) -> usize {
    let by_span = ((end - start) / 10.0).max(0.0) as usize;
    by_span.max(min_points).min(max_points)
}
