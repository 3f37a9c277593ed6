//! Runge–Kutta–Fehlberg 7(8) integrator with adaptive step size.
//!
//! Thirteen stages (Fehlberg, NASA TR R-287, 1968). The solution is advanced with the
//! 8th-order weights; the difference with the embedded 7th-order solution,
//! `41/840 · (k₁ + k₁₁ − k₁₂ − k₁₃) · h`, drives the step controller.
//!
//! Each accepted step also evaluates the derivative at its end point, which serves as the
//! first stage of the next step and gives the dense-output callers both end derivatives.
use serde::{Deserialize, Serialize};

use crate::cancellation::CancellationToken;
use crate::cometprop_errors::{CometPropError, Result};

/// First-order system `dy/dt = f(t, y)` of fixed dimension.
pub trait OdeSystem<const N: usize> {
    /// Evaluate `f(t, y)` into `dydt`.
    ///
    /// An [`CometPropError::IntegrationFailure`] raised here gets the step size of the
    /// failing attempt filled in by the integrator.
    fn rhs(&self, t: f64, y: &[f64; N], dydt: &mut [f64; N]) -> Result<()>;
}

/// `[integrator]` settings. Times are in days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    pub rtol: f64,
    pub atol: f64,
    /// First trial step.
    pub initial_step: f64,
    /// Floor below which a rejected step aborts the integration.
    pub min_step: f64,
    pub max_step: f64,
    /// Budget of step attempts (accepted and rejected) per integration.
    pub max_steps: usize,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        IntegratorSettings {
            rtol: 1e-10,
            atol: 1e-12,
            initial_step: 1.0,
            min_step: 1e-8,
            max_step: 100.0,
            max_steps: 1_000_000,
        }
    }
}

impl IntegratorSettings {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("rtol", self.rtol),
            ("atol", self.atol),
            ("initial_step", self.initial_step),
            ("min_step", self.min_step),
            ("max_step", self.max_step),
        ];
        if let Some((name, value)) = positive
            .iter()
            .find(|(_, value)| !value.is_finite() || *value <= 0.0)
        {
            return Err(CometPropError::InvalidRequest(format!(
                "integrator.{name} must be positive, got {value}"
            )));
        }
        if self.min_step > self.max_step {
            return Err(CometPropError::InvalidRequest(format!(
                "integrator.min_step ({}) exceeds max_step ({})",
                self.min_step, self.max_step
            )));
        }
        if self.max_steps == 0 {
            return Err(CometPropError::InvalidRequest(
                "integrator.max_steps must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Work counters of an integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub rhs_evaluations: usize,
}

impl IntegrationStats {
    pub fn attempts(&self) -> usize {
        self.accepted_steps + self.rejected_steps
    }
}

/// An accepted step with the state and its derivative at both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step<const N: usize> {
    pub t0: f64,
    pub t1: f64,
    pub y0: [f64; N],
    pub y1: [f64; N],
    pub f0: [f64; N],
    pub f1: [f64; N],
}

const STAGES: usize = 13;

const C: [f64; STAGES] = [
    0.0,
    2.0 / 27.0,
    1.0 / 9.0,
    1.0 / 6.0,
    5.0 / 12.0,
    1.0 / 2.0,
    5.0 / 6.0,
    1.0 / 6.0,
    2.0 / 3.0,
    1.0 / 3.0,
    1.0,
    0.0,
    1.0,
];

#[rustfmt::skip]
const A: [[f64; STAGES - 1]; STAGES] = [
    [0.0; 12],
    [2.0 / 27.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 36.0, 1.0 / 12.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 24.0, 0.0, 1.0 / 8.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [-25.0 / 108.0, 0.0, 0.0, 125.0 / 108.0, -65.0 / 27.0, 125.0 / 54.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [31.0 / 300.0, 0.0, 0.0, 0.0, 61.0 / 225.0, -2.0 / 9.0, 13.0 / 900.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [2.0, 0.0, 0.0, -53.0 / 6.0, 704.0 / 45.0, -107.0 / 9.0, 67.0 / 90.0, 3.0, 0.0, 0.0, 0.0, 0.0],
    [-91.0 / 108.0, 0.0, 0.0, 23.0 / 108.0, -976.0 / 135.0, 311.0 / 54.0, -19.0 / 60.0, 17.0 / 6.0, -1.0 / 12.0, 0.0, 0.0, 0.0],
    [2383.0 / 4100.0, 0.0, 0.0, -341.0 / 164.0, 4496.0 / 1025.0, -301.0 / 82.0, 2133.0 / 4100.0, 45.0 / 82.0, 45.0 / 164.0, 18.0 / 41.0, 0.0, 0.0],
    [3.0 / 205.0, 0.0, 0.0, 0.0, 0.0, -6.0 / 41.0, -3.0 / 205.0, -3.0 / 41.0, 3.0 / 41.0, 6.0 / 41.0, 0.0, 0.0],
    [-1777.0 / 4100.0, 0.0, 0.0, -341.0 / 164.0, 4496.0 / 1025.0, -289.0 / 82.0, 2193.0 / 4100.0, 51.0 / 82.0, 33.0 / 164.0, 12.0 / 41.0, 0.0, 1.0],
];

/// 8th-order weights.
const B: [f64; STAGES] = [
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    34.0 / 105.0,
    9.0 / 35.0,
    9.0 / 35.0,
    9.0 / 280.0,
    9.0 / 280.0,
    0.0,
    41.0 / 840.0,
    41.0 / 840.0,
];

const ERROR_WEIGHT: f64 = 41.0 / 840.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Adaptive RKF7(8) solver.
///
/// The solver keeps its step-size suggestion between calls to [`Rkf78::integrate`], so
/// an integration split at sample times continues with the step it had reached.
#[derive(Debug, Clone)]
pub struct Rkf78 {
    settings: IntegratorSettings,
    step: f64,
    stats: IntegrationStats,
}

impl Rkf78 {
    pub fn new(settings: IntegratorSettings) -> Self {
        Rkf78 {
            step: settings.initial_step.clamp(settings.min_step, settings.max_step),
            settings,
            stats: IntegrationStats::default(),
        }
    }

    pub fn settings(&self) -> &IntegratorSettings {
        &self.settings
    }

    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }

    /// Current step-size suggestion (days, positive).
    pub fn step_size(&self) -> f64 {
        self.step
    }

    fn evaluate<S, const N: usize>(
        &mut self,
        system: &S,
        t: f64,
        y: &[f64; N],
        dydt: &mut [f64; N],
        h: f64,
    ) -> Result<()>
    where
        S: OdeSystem<N>,
    {
        self.stats.rhs_evaluations += 1;
        system.rhs(t, y, dydt).map_err(|err| match err {
            CometPropError::IntegrationFailure { jd, reason, .. } => {
                CometPropError::IntegrationFailure {
                    jd,
                    step_size: h.abs(),
                    reason,
                }
            }
            other => other,
        })
    }

    /// One trial step of signed size `h` from `(t, y)` with `f = f(t, y)`.
    ///
    /// Return
    /// ----------
    /// * The 8th-order solution and the scaled error norm (≤ 1 means acceptable).
    fn attempt<S, const N: usize>(
        &mut self,
        system: &S,
        t: f64,
        y: &[f64; N],
        f: &[f64; N],
        h: f64,
    ) -> Result<([f64; N], f64)>
    where
        S: OdeSystem<N>,
    {
        let mut k = [[0.0; N]; STAGES];
        k[0] = *f;

        for stage in 1..STAGES {
            let mut y_stage = *y;
            for (i, value) in y_stage.iter_mut().enumerate() {
                let increment: f64 = (0..stage).map(|j| A[stage][j] * k[j][i]).sum();
                *value += h * increment;
            }
            let mut dydt = [0.0; N];
            self.evaluate(system, t + C[stage] * h, &y_stage, &mut dydt, h)?;
            k[stage] = dydt;
        }

        let mut y_new = *y;
        let mut error_norm: f64 = 0.0;
        for i in 0..N {
            let increment: f64 = (0..STAGES).map(|s| B[s] * k[s][i]).sum();
            y_new[i] += h * increment;

            let local_error = h * ERROR_WEIGHT * (k[0][i] + k[10][i] - k[11][i] - k[12][i]);
            let scale = self.settings.atol + self.settings.rtol * y[i].abs().max(y_new[i].abs());
            error_norm = error_norm.max(local_error.abs() / scale);
        }
        Ok((y_new, error_norm))
    }

    /// Integrate from `(t0, y0)` to exactly `t_end`, forward or backward in time.
    ///
    /// Arguments
    /// -----------------
    /// * `system`: the right-hand side.
    /// * `t0`, `y0`: initial time and state.
    /// * `t_end`: final time; the last step is shortened to land on it.
    /// * `cancel`: polled before every step attempt.
    /// * `on_step`: called with every accepted step, in order.
    ///
    /// Return
    /// ----------
    /// * The state at `t_end`, or
    ///   - [`CometPropError::IntegrationFailure`] on a non-finite state, a step below
    ///     `min_step` or an exhausted `max_steps` budget,
    ///   - [`CometPropError::Cancelled`] when the token trips,
    ///   - any error of the right-hand side.
    pub fn integrate<S, F, const N: usize>(
        &mut self,
        system: &S,
        t0: f64,
        y0: &[f64; N],
        t_end: f64,
        cancel: Option<&CancellationToken>,
        mut on_step: F,
    ) -> Result<[f64; N]>
    where
        S: OdeSystem<N>,
        F: FnMut(&Step<N>),
    {
        if !t0.is_finite() || !t_end.is_finite() {
            return Err(CometPropError::InvalidRequest(format!(
                "integration bounds must be finite ({t0} -> {t_end})"
            )));
        }
        if t_end == t0 {
            return Ok(*y0);
        }
        let direction = (t_end - t0).signum();

        let mut t = t0;
        let mut y = *y0;
        let mut f = [0.0; N];
        self.evaluate(system, t, &y, &mut f, self.step)?;

        let mut attempts = 0usize;
        let mut h = self.step;
        while (t_end - t) * direction > 0.0 {
            if let Some(token) = cancel {
                token.check(t)?;
            }
            if attempts >= self.settings.max_steps {
                return Err(CometPropError::IntegrationFailure {
                    jd: t,
                    step_size: h,
                    reason: format!("step budget of {} attempts exhausted", self.settings.max_steps),
                });
            }
            attempts += 1;

            let remaining = (t_end - t).abs();
            let clipped = h >= remaining;
            let h_try = if clipped { remaining } else { h };

            let (y_new, error_norm) = self.attempt(system, t, &y, &f, direction * h_try)?;
            if !error_norm.is_finite() || y_new.iter().any(|v| !v.is_finite()) {
                return Err(CometPropError::IntegrationFailure {
                    jd: t,
                    step_size: h_try,
                    reason: "non-finite state".into(),
                });
            }

            let factor = if error_norm == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * error_norm.powf(-1.0 / 8.0)).clamp(MIN_FACTOR, MAX_FACTOR)
            };

            if error_norm <= 1.0 {
                let t_new = if clipped { t_end } else { t + direction * h_try };
                let mut f_new = [0.0; N];
                self.evaluate(system, t_new, &y_new, &mut f_new, h_try)?;
                self.stats.accepted_steps += 1;
                on_step(&Step {
                    t0: t,
                    t1: t_new,
                    y0: y,
                    y1: y_new,
                    f0: f,
                    f1: f_new,
                });

                t = t_new;
                y = y_new;
                f = f_new;
                // a step shortened to land on t_end says nothing about the next one
                let suggested = h_try * factor;
                h = if clipped { suggested.max(h) } else { suggested };
                h = h.min(self.settings.max_step);
            } else {
                self.stats.rejected_steps += 1;
                h = h_try * factor;
                if h < self.settings.min_step {
                    return Err(CometPropError::IntegrationFailure {
                        jd: t,
                        step_size: h,
                        reason: format!(
                            "step size fell below the floor of {} day",
                            self.settings.min_step
                        ),
                    });
                }
            }
        }

        self.step = h.clamp(self.settings.min_step, self.settings.max_step);
        Ok(y)
    }
}

#[cfg(test)]
mod integrator_test {
    use super::*;

    struct HarmonicOscillator {
        omega: f64,
    }

    impl OdeSystem<2> for HarmonicOscillator {
        fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) -> Result<()> {
            dydt[0] = y[1];
            dydt[1] = -self.omega * self.omega * y[0];
            Ok(())
        }
    }

    struct Exponential;

    impl OdeSystem<1> for Exponential {
        fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) -> Result<()> {
            dydt[0] = y[0];
            Ok(())
        }
    }

    #[test]
    fn test_tableau_consistency() {
        for (stage, row) in A.iter().enumerate() {
            let sum: f64 = row.iter().sum();
            assert!((sum - C[stage]).abs() < 1e-14, "row {stage}: {sum} != {}", C[stage]);
        }
        assert!((B.iter().sum::<f64>() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_harmonic_oscillator() {
        let system = HarmonicOscillator { omega: 1.0 };
        let mut solver = Rkf78::new(IntegratorSettings {
            initial_step: 0.1,
            ..Default::default()
        });
        let period = 2.0 * std::f64::consts::PI;
        let y = solver
            .integrate(&system, 0.0, &[1.0, 0.0], 10.0 * period, None, |_| {})
            .unwrap();
        assert!((y[0] - 1.0).abs() < 1e-8);
        assert!(y[1].abs() < 1e-8);

        let stats = solver.stats();
        assert!(stats.accepted_steps > 0);
        assert_eq!(
            stats.rhs_evaluations,
            1 + 13 * stats.accepted_steps + 12 * stats.rejected_steps
        );
    }

    #[test]
    fn test_backward_and_steps_contiguous() {
        let mut solver = Rkf78::new(IntegratorSettings::default());
        let mut steps: Vec<Step<1>> = Vec::new();
        let y = solver
            .integrate(&Exponential, 2.0, &[2f64.exp()], 0.0, None, |s| steps.push(*s))
            .unwrap();
        assert!((y[0] - 1.0).abs() < 1e-9);

        assert_eq!(steps.first().unwrap().t0, 2.0);
        assert_eq!(steps.last().unwrap().t1, 0.0);
        for pair in steps.windows(2) {
            assert_eq!(pair[0].t1, pair[1].t0);
            assert!(pair[1].t1 < pair[1].t0);
            assert_eq!(pair[0].y1, pair[1].y0);
        }
    }

    #[test]
    fn test_zero_span_and_cancellation() {
        let mut solver = Rkf78::new(IntegratorSettings::default());
        assert_eq!(
            solver.integrate(&Exponential, 1.0, &[3.0], 1.0, None, |_| {}).unwrap(),
            [3.0]
        );
        assert_eq!(solver.stats().rhs_evaluations, 0);

        let token = CancellationToken::new();
        token.cancel();
        let err = solver
            .integrate(&Exponential, 0.0, &[1.0], 1.0, Some(&token), |_| {})
            .unwrap_err();
        assert_eq!(err, CometPropError::Cancelled { jd: 0.0 });
    }

    #[test]
    fn test_step_budget() {
        let mut solver = Rkf78::new(IntegratorSettings {
            initial_step: 0.01,
            max_step: 0.01,
            min_step: 0.001,
            max_steps: 5,
            ..Default::default()
        });
        let err = solver
            .integrate(&Exponential, 0.0, &[1.0], 1.0, None, |_| {})
            .unwrap_err();
        assert!(matches!(err, CometPropError::IntegrationFailure { .. }));
        assert!(err.to_string().contains("budget"));
    }

    #[test]
    fn test_settings_validation() {
        assert!(IntegratorSettings::default().validate().is_ok());
        assert!(IntegratorSettings {
            rtol: 0.0,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(IntegratorSettings {
            min_step: 10.0,
            max_step: 1.0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }
}
