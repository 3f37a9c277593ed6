//! # N-body perturbed propagation
//!
//! The comet starts from its osculating two-body state at the element epoch and is
//! integrated under the Sun and the selected planets ([`forces`]) with the adaptive
//! RKF7(8) pair ([`integrator`]).
//!
//! ## Sampling
//! * [`NBodyPropagator::propagate_range`] integrates epoch → `start` once, then continues
//!   through every sample time in the same solve. Steps are shortened to land exactly on
//!   the sample times.
//! * [`NBodyPropagator::dense`] keeps every accepted step and answers any time of the span
//!   by quintic Hermite interpolation ([`DenseTrajectory::state_at`]).
//!
//! Times before the epoch are reached by integrating backward.
//!
//! Every result carries the [`IntegrationStats`] of its solve and the
//! [`EphemerisUsageReport`] telling which planet-position sources were used.
pub mod forces;
pub mod integrator;

use itertools::Itertools;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::cancellation::CancellationToken;
use crate::cometprop_errors::{CometPropError, Result};
use crate::constants::JulianDate;
use crate::ephemeris::{EphemerisUsage, EphemerisUsageReport, PerturberEphemeris, Planet};
use crate::kepler::KeplerSolverSettings;
use crate::orbit_type::{KeplerianElements, StateVector};
use crate::time::sample_times;
use crate::two_body::TwoBodyPropagator;

use forces::CometForceModel;
pub use integrator::{IntegrationStats, IntegratorSettings, OdeSystem, Rkf78, Step};

/// States produced by one integration, with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NBodySolution {
    pub states: Vec<StateVector>,
    pub stats: IntegrationStats,
    pub ephemeris_usage: EphemerisUsageReport,
}

/// Perturbed propagator of one comet.
#[derive(Debug, Clone)]
pub struct NBodyPropagator {
    elements: KeplerianElements,
    initial_state: StateVector,
    perturbers: SmallVec<[Planet; 8]>,
    ephemeris: PerturberEphemeris,
    settings: IntegratorSettings,
    cancellation: Option<CancellationToken>,
}

impl NBodyPropagator {
    /// Arguments
    /// -----------------
    /// * `elements`: osculating elements; the initial state is their two-body state at
    ///   the epoch.
    /// * `perturbers`: planets included in the force model (duplicates are ignored).
    /// * `ephemeris`: source of the planet positions.
    /// * `settings`: integrator tolerances and step limits.
    ///
    /// Return
    /// ----------
    /// * The propagator, [`CometPropError::UnsupportedOrbitRegime`] for `e ≥ 1`, or
    ///   [`CometPropError::InvalidRequest`] for invalid settings.
    pub fn new(
        elements: KeplerianElements,
        perturbers: &[Planet],
        ephemeris: PerturberEphemeris,
        settings: IntegratorSettings,
    ) -> Result<Self> {
        Self::with_solver_settings(
            elements,
            perturbers,
            ephemeris,
            settings,
            KeplerSolverSettings::default(),
        )
    }

    /// Same as [`NBodyPropagator::new`], with explicit Kepler solver settings for the
    /// initial state.
    pub fn with_solver_settings(
        elements: KeplerianElements,
        perturbers: &[Planet],
        ephemeris: PerturberEphemeris,
        settings: IntegratorSettings,
        solver: KeplerSolverSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let initial_state =
            TwoBodyPropagator::with_settings(elements, solver)?.propagate(elements.epoch())?;

        let unique: SmallVec<[Planet; 8]> = perturbers.iter().copied().unique().collect();

        Ok(NBodyPropagator {
            elements,
            initial_state,
            perturbers: unique,
            ephemeris,
            settings,
            cancellation: None,
        })
    }

    /// Poll `token` at every integration step.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn elements(&self) -> &KeplerianElements {
        &self.elements
    }

    pub fn initial_state(&self) -> &StateVector {
        &self.initial_state
    }

    pub fn perturbers(&self) -> &[Planet] {
        &self.perturbers
    }

    /// Perturbed state at `t`.
    pub fn propagate(&self, t: JulianDate) -> Result<StateVector> {
        let mut solution = self.propagate_times(&[t])?;
        solution.states.pop().ok_or_else(|| {
            CometPropError::InvalidRequest(format!("no state produced for JD {t}"))
        })
    }

    /// Perturbed states at `n_points` evenly spaced times of `[start, end]`.
    ///
    /// Return
    /// ----------
    /// * The states in time order with the integration bookkeeping, or
    ///   [`CometPropError::InvalidRequest`] for an empty or reversed range, or the first
    ///   integration error.
    ///
    /// See also
    /// ------------
    /// * [`crate::two_body::TwoBodyPropagator::propagate_range`] – same sampling, closed form.
    pub fn propagate_range(
        &self,
        start: JulianDate,
        end: JulianDate,
        n_points: usize,
    ) -> Result<NBodySolution> {
        self.propagate_times(&sample_times(start, end, n_points)?)
    }

    /// Perturbed states at arbitrary times, integrated in the given order.
    pub fn propagate_times(&self, times: &[JulianDate]) -> Result<NBodySolution> {
        let usage = EphemerisUsage::new();
        let model = CometForceModel::new(&self.perturbers, &self.ephemeris, &usage);
        let mut solver = Rkf78::new(self.settings);

        let mut t = self.initial_state.time;
        let mut y = self.initial_state.to_array();
        let mut states = Vec::with_capacity(times.len());
        for &target in times {
            y = solver.integrate(&model, t, &y, target, self.cancellation.as_ref(), |_| {})?;
            t = target;
            states.push(StateVector::from_array(&y, target));
        }

        let stats = solver.stats();
        debug!(
            samples = times.len(),
            accepted = stats.accepted_steps,
            rejected = stats.rejected_steps,
            "n-body integration done"
        );
        Ok(NBodySolution {
            states,
            stats,
            ephemeris_usage: usage.report(),
        })
    }

    /// Integrate over `[start, end]` and keep the steps for interpolation.
    pub fn dense(&self, start: JulianDate, end: JulianDate) -> Result<DenseTrajectory> {
        if !(start <= end) {
            return Err(CometPropError::InvalidRequest(format!(
                "dense output needs start <= end, got {start} > {end}"
            )));
        }
        let usage = EphemerisUsage::new();
        let model = CometForceModel::new(&self.perturbers, &self.ephemeris, &usage);
        let mut solver = Rkf78::new(self.settings);
        let cancel = self.cancellation.as_ref();

        let y_start = solver.integrate(
            &model,
            self.initial_state.time,
            &self.initial_state.to_array(),
            start,
            cancel,
            |_| {},
        )?;

        let mut segments = Vec::new();
        solver.integrate(&model, start, &y_start, end, cancel, |step| {
            segments.push(HermiteSegment::from_step(step));
        })?;

        Ok(DenseTrajectory {
            start: StateVector::from_array(&y_start, start),
            segments,
            stats: solver.stats(),
            ephemeris_usage: usage.report(),
        })
    }
}

/// Quintic Hermite interpolant over one accepted step.
///
/// Matches position, velocity and acceleration at both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HermiteSegment {
    pub t0: JulianDate,
    pub t1: JulianDate,
    p0: Vector3<f64>,
    v0: Vector3<f64>,
    a0: Vector3<f64>,
    p1: Vector3<f64>,
    v1: Vector3<f64>,
    a1: Vector3<f64>,
}

impl HermiteSegment {
    fn from_step(step: &Step<6>) -> Self {
        let split = |y: &[f64; 6]| {
            (
                Vector3::new(y[0], y[1], y[2]),
                Vector3::new(y[3], y[4], y[5]),
            )
        };
        let (p0, v0) = split(&step.y0);
        let (p1, v1) = split(&step.y1);
        HermiteSegment {
            t0: step.t0,
            t1: step.t1,
            p0,
            v0,
            a0: Vector3::new(step.f0[3], step.f0[4], step.f0[5]),
            p1,
            v1,
            a1: Vector3::new(step.f1[3], step.f1[4], step.f1[5]),
        }
    }

    fn contains(&self, t: JulianDate) -> bool {
        t >= self.t0.min(self.t1) && t <= self.t0.max(self.t1)
    }

    pub fn state_at(&self, t: JulianDate) -> StateVector {
        let h = self.t1 - self.t0;
        let s = (t - self.t0) / h;
        let (s2, s3, s4, s5) = (s * s, s.powi(3), s.powi(4), s.powi(5));

        let h0 = 1.0 - 10.0 * s3 + 15.0 * s4 - 6.0 * s5;
        let h1 = s - 6.0 * s3 + 8.0 * s4 - 3.0 * s5;
        let h2 = 0.5 * s2 - 1.5 * s3 + 1.5 * s4 - 0.5 * s5;
        let h3 = 0.5 * s3 - s4 + 0.5 * s5;
        let h4 = -4.0 * s3 + 7.0 * s4 - 3.0 * s5;
        let h5 = 10.0 * s3 - 15.0 * s4 + 6.0 * s5;

        let d0 = -30.0 * s2 + 60.0 * s3 - 30.0 * s4;
        let d1 = 1.0 - 18.0 * s2 + 32.0 * s3 - 15.0 * s4;
        let d2 = s - 4.5 * s2 + 6.0 * s3 - 2.5 * s4;
        let d3 = 1.5 * s2 - 4.0 * s3 + 2.5 * s4;
        let d4 = -12.0 * s2 + 28.0 * s3 - 15.0 * s4;
        let d5 = 30.0 * s2 - 60.0 * s3 + 30.0 * s4;

        let h_sq = h * h;
        let position = h0 * self.p0
            + h1 * h * self.v0
            + h2 * h_sq * self.a0
            + h3 * h_sq * self.a1
            + h4 * h * self.v1
            + h5 * self.p1;
        let velocity = (d0 * self.p0
            + d1 * h * self.v0
            + d2 * h_sq * self.a0
            + d3 * h_sq * self.a1
            + d4 * h * self.v1
            + d5 * self.p1)
            / h;

        StateVector::new(position, velocity, t)
    }
}

/// Continuous perturbed trajectory over `[start, end]`.
#[derive(Debug, Clone)]
pub struct DenseTrajectory {
    start: StateVector,
    segments: Vec<HermiteSegment>,
    pub stats: IntegrationStats,
    pub ephemeris_usage: EphemerisUsageReport,
}

impl DenseTrajectory {
    pub fn start_time(&self) -> JulianDate {
        self.start.time
    }

    pub fn end_time(&self) -> JulianDate {
        self.segments.last().map_or(self.start.time, |s| s.t1)
    }

    pub fn segments(&self) -> &[HermiteSegment] {
        &self.segments
    }

    /// Interpolated state at `t`.
    ///
    /// Return
    /// ----------
    /// * The state, or [`CometPropError::InvalidRequest`] when `t` is outside the span.
    pub fn state_at(&self, t: JulianDate) -> Result<StateVector> {
        if t == self.start.time {
            return Ok(self.start);
        }
        if !(t >= self.start_time() && t <= self.end_time()) {
            return Err(CometPropError::InvalidRequest(format!(
                "JD {t} is outside the dense span [{}, {}]",
                self.start_time(),
                self.end_time()
            )));
        }
        let index = self
            .segments
            .partition_point(|segment| segment.t1 < t)
            .min(self.segments.len() - 1);
        let segment = &self.segments[index];
        debug_assert!(segment.contains(t));
        Ok(segment.state_at(t))
    }

    /// Interpolated states at each of `times`.
    pub fn states_at(&self, times: &[JulianDate]) -> Result<Vec<StateVector>> {
        times.iter().map(|&t| self.state_at(t)).collect()
    }
}
