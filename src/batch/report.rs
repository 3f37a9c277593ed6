//! Per-object results and the serializable batch report.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cometprop_errors::{CometPropError, ErrorKind, FailureDetail};
use crate::constants::{Designation, JulianDate};
use crate::ephemeris::EphemerisUsageReport;
use crate::nbody::IntegrationStats;
use crate::orbit_type::{StatePoint, StateVector};

use super::execution::{ExecutionMode, PropagationMethod};
use super::BatchOutcome;

/// Outcome of one object of a batch.
///
/// Exactly one of `trajectory` (non-empty on success) and `error` is meaningful, as
/// told by `success`. N-body results also carry their integration and ephemeris
/// bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryResult {
    pub designation: Designation,
    pub method: PropagationMethod,
    pub success: bool,
    #[serde(default)]
    pub trajectory: Vec<StateVector>,
    #[serde(default)]
    pub error: Option<FailureDetail>,
    pub calculation_time_ms: f64,
    #[serde(default)]
    pub integration_stats: Option<IntegrationStats>,
    #[serde(default)]
    pub ephemeris_usage: Option<EphemerisUsageReport>,
    #[serde(default)]
    pub from_cache: bool,
}

impl TrajectoryResult {
    pub fn success(
        designation: impl Into<Designation>,
        method: PropagationMethod,
        trajectory: Vec<StateVector>,
        calculation_time_ms: f64,
    ) -> Self {
        TrajectoryResult {
            designation: designation.into(),
            method,
            success: true,
            trajectory,
            error: None,
            calculation_time_ms,
            integration_stats: None,
            ephemeris_usage: None,
            from_cache: false,
        }
    }

    pub fn failure(
        designation: impl Into<Designation>,
        method: PropagationMethod,
        error: &CometPropError,
        calculation_time_ms: f64,
    ) -> Self {
        TrajectoryResult {
            designation: designation.into(),
            method,
            success: false,
            trajectory: Vec::new(),
            error: Some(FailureDetail::from(error)),
            calculation_time_ms,
            integration_stats: None,
            ephemeris_usage: None,
            from_cache: false,
        }
    }

    /// Attach the bookkeeping of an N-body solve.
    pub fn with_nbody_details(
        mut self,
        stats: IntegrationStats,
        usage: EphemerisUsageReport,
    ) -> Self {
        self.integration_stats = Some(stats);
        self.ephemeris_usage = Some(usage);
        self
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|detail| detail.kind)
    }

    /// The sampled trajectory as exposed to consuming layers; `None` for a failure.
    pub fn to_range_trajectory(&self) -> Option<RangeTrajectory> {
        let (first, last) = (self.trajectory.first()?, self.trajectory.last()?);
        if !self.success {
            return None;
        }
        Some(RangeTrajectory {
            points: self.trajectory.iter().copied().map(StatePoint::from).collect(),
            start_time: first.time,
            end_time: last.time,
            method: self.method,
        })
    }
}

/// Sampled trajectory DTO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeTrajectory {
    pub points: Vec<StatePoint>,
    pub start_time: JulianDate,
    pub end_time: JulianDate,
    pub method: PropagationMethod,
}

/// Counters of one batch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    /// Objects in the request, unknown designations included.
    pub total_objects: usize,
    pub successful: usize,
    pub failed: usize,
    pub not_found: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Wall-clock time of the whole call.
    pub total_time_ms: f64,
    /// Mean per-object computation time over the returned results.
    pub avg_calc_time_ms: f64,
    pub method: PropagationMethod,
    pub parallel: bool,
    /// Executor the computed objects ran on.
    pub executor: ExecutionMode,
    pub workers: usize,
}

impl fmt::Display for BatchStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch statistics ({}, parallel: {})", self.method, self.parallel)?;
        writeln!(f, "-----------------")?;
        writeln!(f, "  objects       : {}", self.total_objects)?;
        writeln!(f, "  successful    : {}", self.successful)?;
        writeln!(f, "  failed        : {}", self.failed)?;
        writeln!(f, "  not found     : {}", self.not_found)?;
        writeln!(f, "  executor      : {} ({} workers)", self.executor, self.workers)?;
        writeln!(
            f,
            "  cache         : {} hits / {} misses",
            self.cache_hits, self.cache_misses
        )?;
        writeln!(f, "  total time    : {:.1} ms", self.total_time_ms)?;
        write!(f, "  avg per object: {:.3} ms", self.avg_calc_time_ms)
    }
}

/// Response of a batch request, ready for serialization.
///
/// Objects without orbital elements are listed in `not_found` together with the
/// designations the catalog does not know; every other failure is in `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub trajectories: BTreeMap<Designation, RangeTrajectory>,
    pub errors: BTreeMap<Designation, FailureDetail>,
    pub not_found: Vec<Designation>,
    pub statistics: BatchStatistics,
}

impl BatchReport {
    pub fn from_outcome(outcome: &BatchOutcome) -> Self {
        let mut trajectories = BTreeMap::new();
        let mut errors = BTreeMap::new();
        let mut not_found = outcome.not_found.clone();

        for (designation, result) in &outcome.results {
            match (&result.error, result.to_range_trajectory()) {
                (None, Some(trajectory)) => {
                    trajectories.insert(designation.clone(), trajectory);
                }
                (Some(detail), _) if detail.kind == ErrorKind::ElementsMissing => {
                    not_found.push(designation.clone());
                }
                (Some(detail), _) => {
                    errors.insert(designation.clone(), detail.clone());
                }
                (None, None) => {
                    errors.insert(
                        designation.clone(),
                        FailureDetail {
                            kind: ErrorKind::InvalidInput,
                            message: "empty trajectory".to_string(),
                        },
                    );
                }
            }
        }
        not_found.sort();
        not_found.dedup();

        BatchReport {
            trajectories,
            errors,
            not_found,
            statistics: outcome.statistics.clone(),
        }
    }
}
