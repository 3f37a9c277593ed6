//! # Kepler's equation for elliptic orbits
//!
//! Solves `M = E - e·sin(E)` for the eccentric anomaly `E` with a Newton–Raphson
//! iteration. The solver never hides a failure: the outcome is a [`KeplerSolution`]
//! that either carries the converged anomaly or the last estimate together with the
//! number of iterations spent, and the caller decides through a [`ConvergencePolicy`]
//! whether a non-converged estimate is acceptable.
//!
//! Only `0 ≤ e < 1` is accepted. Parabolic and hyperbolic anomaly equations are a
//! different problem and are rejected with
//! [`CometPropError::UnsupportedOrbitRegime`].
//!
//! ## See also
//!
//! - [`crate::two_body::TwoBodyPropagator`] – main consumer of the solver.
//! - [`crate::ephemeris::analytic::AnalyticEphemeris`] – reuses it for planets.
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::warn;

use crate::cometprop_errors::{CometPropError, Result};
use crate::constants::{Radian, DPI};

/// Returns the principal value of an angle in radians, in [0, 2π).
pub fn principal_angle(a: f64) -> f64 {
    a.rem_euclid(DPI)
}

/// Returns the principal difference between two angles, in [-π, π].
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let a = principal_angle(a);
    let b = principal_angle(b);

    let mut diff = a - b;

    if diff > PI {
        diff -= DPI;
    } else if diff < -PI {
        diff += DPI;
    }

    diff
}

/// True anomaly ν from the eccentric anomaly, `ν = 2·atan2(√(1+e)·sin(E/2), √(1-e)·cos(E/2))`.
pub fn true_anomaly(eccentric_anomaly: Radian, eccentricity: f64) -> Radian {
    let half = 0.5 * eccentric_anomaly;
    2.0 * ((1.0 + eccentricity).sqrt() * half.sin())
        .atan2((1.0 - eccentricity).sqrt() * half.cos())
}

/// What to do with an estimate that did not meet the tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergencePolicy {
    /// Surface the failure as [`CometPropError::ConvergenceFailure`].
    #[default]
    Reject,
    /// Keep the last estimate and log a warning.
    Tolerate,
}

/// Tuning of the Newton–Raphson iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeplerSolverSettings {
    /// Stop once `|ΔE|` falls below this value (radians).
    pub tolerance: f64,
    pub max_iterations: usize,
    pub convergence_policy: ConvergencePolicy,
}

impl Default for KeplerSolverSettings {
    fn default() -> Self {
        KeplerSolverSettings {
            tolerance: 1e-10,
            max_iterations: 100,
            convergence_policy: ConvergencePolicy::Reject,
        }
    }
}

/// Outcome of [`solve_kepler`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeplerSolution {
    Converged {
        eccentric_anomaly: Radian,
        iterations: usize,
    },
    DidNotConverge {
        last_estimate: Radian,
        iterations: usize,
    },
}

impl KeplerSolution {
    pub fn is_converged(&self) -> bool {
        matches!(self, KeplerSolution::Converged { .. })
    }

    /// The eccentric anomaly, converged or not.
    pub fn estimate(&self) -> Radian {
        match *self {
            KeplerSolution::Converged {
                eccentric_anomaly, ..
            } => eccentric_anomaly,
            KeplerSolution::DidNotConverge { last_estimate, .. } => last_estimate,
        }
    }

    /// Apply a [`ConvergencePolicy`] to the solution.
    ///
    /// Arguments
    /// -----------------
    /// * `policy`: whether a non-converged estimate is acceptable.
    /// * `mean_anomaly`, `eccentricity`: the inputs of the solve, reported in the error.
    ///
    /// Return
    /// ----------
    /// * The eccentric anomaly, or [`CometPropError::ConvergenceFailure`] when the
    ///   solve did not converge and the policy is [`ConvergencePolicy::Reject`].
    pub fn resolve(
        self,
        policy: ConvergencePolicy,
        mean_anomaly: Radian,
        eccentricity: f64,
    ) -> Result<Radian> {
        match self {
            KeplerSolution::Converged {
                eccentric_anomaly, ..
            } => Ok(eccentric_anomaly),
            KeplerSolution::DidNotConverge {
                last_estimate,
                iterations,
            } => match policy {
                ConvergencePolicy::Reject => Err(CometPropError::ConvergenceFailure {
                    mean_anomaly,
                    eccentricity,
                    last_estimate,
                    iterations,
                }),
                ConvergencePolicy::Tolerate => {
                    warn!(
                        mean_anomaly,
                        eccentricity,
                        last_estimate,
                        iterations,
                        "Kepler solver did not converge, keeping last estimate"
                    );
                    Ok(last_estimate)
                }
            },
        }
    }
}

/// Solve Kepler's equation `M = E - e·sin(E)` for an elliptic orbit.
///
/// The mean anomaly is first reduced to `[0, 2π)`, so the returned `E` lies in the
/// same revolution (`E ∈ [0, 2π]`). The initial guess is `E₀ = M` for `e < 0.8` and
/// `E₀ = π` otherwise, which keeps the iteration stable for high-eccentricity orbits.
///
/// Arguments
/// -----------------
/// * `mean_anomaly`: mean anomaly `M` (radians, any value).
/// * `eccentricity`: eccentricity `e`, must satisfy `0 ≤ e < 1`.
/// * `settings`: tolerance and iteration budget.
///
/// Return
/// ----------
/// * A [`KeplerSolution`], or [`CometPropError::UnsupportedOrbitRegime`] for `e ∉ [0, 1)`
///   and [`CometPropError::InvalidElements`] for a non-finite mean anomaly.
///
/// See also
/// ------------
/// * [`KeplerSolution::resolve`] – turns the outcome into an anomaly or an error.
pub fn solve_kepler(
    mean_anomaly: Radian,
    eccentricity: f64,
    settings: &KeplerSolverSettings,
) -> Result<KeplerSolution> {
    if !(0.0..1.0).contains(&eccentricity) {
        return Err(CometPropError::UnsupportedOrbitRegime { eccentricity });
    }
    if !mean_anomaly.is_finite() {
        return Err(CometPropError::InvalidElements(format!(
            "non-finite mean anomaly {mean_anomaly}"
        )));
    }

    let m = principal_angle(mean_anomaly);
    let mut ecc_anomaly = if eccentricity < 0.8 { m } else { PI };

    for iteration in 1..=settings.max_iterations {
        let f = ecc_anomaly - eccentricity * ecc_anomaly.sin() - m;
        let fp = 1.0 - eccentricity * ecc_anomaly.cos();
        let delta = f / fp;
        ecc_anomaly -= delta;

        if delta.abs() < settings.tolerance {
            return Ok(KeplerSolution::Converged {
                eccentric_anomaly: ecc_anomaly,
                iterations: iteration,
            });
        }
    }

    Ok(KeplerSolution::DidNotConverge {
        last_estimate: ecc_anomaly,
        iterations: settings.max_iterations,
    })
}

#[cfg(test)]
mod kepler_test {
    use super::*;
    use approx::assert_relative_eq;

    fn residual(e_anom: f64, m: f64, e: f64) -> f64 {
        angle_diff(e_anom - e * e_anom.sin(), m)
    }

    #[test]
    fn test_principal_angle_and_diff() {
        assert_relative_eq!(principal_angle(-PI / 2.0), 1.5 * PI, epsilon = 1e-15);
        assert_relative_eq!(principal_angle(5.0 * PI), PI, epsilon = 1e-14);
        assert_relative_eq!(angle_diff(0.1, DPI - 0.1), 0.2, epsilon = 1e-14);
        assert_relative_eq!(angle_diff(DPI - 0.1, 0.1), -0.2, epsilon = 1e-14);
    }

    #[test]
    fn test_circular_orbit_is_identity() {
        let settings = KeplerSolverSettings::default();
        let sol = solve_kepler(1.234, 0.0, &settings).unwrap();
        assert!(sol.is_converged());
        assert_relative_eq!(sol.estimate(), 1.234, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_low_and_high_eccentricity() {
        let settings = KeplerSolverSettings::default();
        for &e in &[0.0167, 0.2056, 0.5, 0.79, 0.8, 0.9, 0.967, 0.999] {
            for k in 0..36 {
                let m = k as f64 * 10.0_f64.to_radians();
                let sol = solve_kepler(m, e, &settings).unwrap();
                assert!(sol.is_converged(), "e = {e}, M = {m}");
                assert!(residual(sol.estimate(), m, e).abs() < 1e-9, "e = {e}, M = {m}");
            }
        }
    }

    #[test]
    fn test_mean_anomaly_outside_principal_range() {
        let settings = KeplerSolverSettings::default();
        let e = 0.6;
        let base = solve_kepler(0.75, e, &settings).unwrap().estimate();
        let shifted = solve_kepler(0.75 + 3.0 * DPI, e, &settings)
            .unwrap()
            .estimate();
        let negative = solve_kepler(0.75 - DPI, e, &settings).unwrap().estimate();
        assert_relative_eq!(base, shifted, epsilon = 1e-12);
        assert_relative_eq!(base, negative, epsilon = 1e-12);
    }

    #[test]
    fn test_unsupported_regime() {
        let settings = KeplerSolverSettings::default();
        assert_eq!(
            solve_kepler(0.3, 1.0, &settings),
            Err(CometPropError::UnsupportedOrbitRegime { eccentricity: 1.0 })
        );
        assert_eq!(
            solve_kepler(0.3, 1.5, &settings),
            Err(CometPropError::UnsupportedOrbitRegime { eccentricity: 1.5 })
        );
        assert!(solve_kepler(0.3, -0.1, &settings).is_err());
    }

    #[test]
    fn test_non_convergence_is_reported() {
        let settings = KeplerSolverSettings {
            max_iterations: 1,
            tolerance: 1e-15,
            ..Default::default()
        };
        let sol = solve_kepler(0.3, 0.95, &settings).unwrap();
        assert!(!sol.is_converged());
        let KeplerSolution::DidNotConverge { iterations, .. } = sol else {
            panic!("expected a non-converged solution");
        };
        assert_eq!(iterations, 1);

        let rejected = sol.resolve(ConvergencePolicy::Reject, 0.3, 0.95);
        assert!(matches!(
            rejected,
            Err(CometPropError::ConvergenceFailure { iterations: 1, .. })
        ));

        let tolerated = sol.resolve(ConvergencePolicy::Tolerate, 0.3, 0.95).unwrap();
        assert_eq!(tolerated, sol.estimate());
    }

    #[test]
    fn test_true_anomaly_quadrants() {
        assert_relative_eq!(true_anomaly(0.0, 0.5), 0.0);
        assert_relative_eq!(true_anomaly(PI, 0.5).abs(), PI, epsilon = 1e-12);
        // Circular: ν = E
        assert_relative_eq!(true_anomaly(1.0, 0.0), 1.0, epsilon = 1e-15);
        // Ahead of the conic's semi-latus rectum: ν > E for E in (0, π)
        assert!(true_anomaly(1.0, 0.5) > 1.0);
    }
}
