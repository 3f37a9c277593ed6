//! # Batch trajectory computation
//!
//! [`BatchScheduler`] propagates many comets over one sample grid:
//!
//! 1. results already in the [`TrajectoryCache`] are returned as they are,
//! 2. the remaining objects are dispatched to the [`ExecutionStrategy`] of the request
//!    (rayon pool for two-body, `nbody_worker` child processes for N-body, or the
//!    calling thread),
//! 3. successes are cached and everything is gathered into a [`BatchOutcome`] keyed by
//!    designation, with its [`BatchStatistics`].
//!
//! A failing object never fails the batch: its error is stored in its
//! [`TrajectoryResult`]. Cancellation is checked before each unit, inside N-body
//! integrations, and while waiting for worker processes.
pub mod cache;
pub mod execution;
pub mod progress_bar;
pub mod report;
pub mod worker;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;
use crate::catalog::{Catalog, CometRecord};
use crate::cometprop_errors::{CometPropError, Result};
use crate::config::CometPropConfig;
use crate::constants::{Designation, JulianDate};
use crate::ephemeris::{EphemerisUsageReport, PerturberEphemeris};
use crate::nbody::{IntegrationStats, NBodyPropagator};
use crate::orbit_type::StateVector;
use crate::two_body::TwoBodyPropagator;

pub use cache::{CacheKey, TrajectoryCache};
pub use execution::{locate_worker, ExecutionMode, ExecutionStrategy, PropagationMethod};
pub use progress_bar::{fmt_dur, BatchProgress, IterTimer};
pub use report::{BatchReport, BatchStatistics, RangeTrajectory, TrajectoryResult};
pub use worker::{run_isolated, serve, WorkerRequest};

/// What to compute for every object of a batch.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub start: JulianDate,
    pub end: JulianDate,
    pub n_points: usize,
    pub method: PropagationMethod,
    pub parallel: bool,
    pub cancellation: Option<CancellationToken>,
}

impl BatchRequest {
    /// A parallel request without cancellation.
    pub fn new(start: JulianDate, end: JulianDate, n_points: usize, method: PropagationMethod) -> Self {
        BatchRequest {
            start,
            end,
            n_points,
            method,
            parallel: true,
            cancellation: None,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Reject grids no propagator can sample.
    pub fn validate(&self) -> Result<()> {
        crate::time::sample_times(self.start, self.end, self.n_points.min(2)).map(|_| ())
    }

    fn cache_key(&self, designation: &str) -> CacheKey {
        CacheKey::new(designation, self.start, self.end, self.n_points, self.method)
    }
}

/// Results of one batch call.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// One entry per distinct requested designation known to the catalog.
    pub results: HashMap<Designation, TrajectoryResult>,
    /// Designations the catalog does not know.
    pub not_found: Vec<Designation>,
    pub statistics: BatchStatistics,
}

impl BatchOutcome {
    pub fn report(&self) -> BatchReport {
        BatchReport::from_outcome(self)
    }
}

type NBodyDetails = (IntegrationStats, EphemerisUsageReport);

/// Propagate one record over `[start, end]` and wrap the outcome.
///
/// Arguments
/// -----------------
/// * `record`: the comet; [`CometPropError::ElementsMissing`] when it has no elements.
/// * `start`, `end`, `n_points`: the sample grid.
/// * `method`: two-body or N-body.
/// * `config`: solver, integrator and perturber settings.
/// * `ephemeris`: planet positions for N-body.
/// * `cancel`: optional token, checked before starting and at each integration step.
///
/// Return
/// ----------
/// * A [`TrajectoryResult`], successful or carrying the failure.
#[allow(clippy::too_many_arguments)]
pub fn propagate_record(
    record: &CometRecord,
    start: JulianDate,
    end: JulianDate,
    n_points: usize,
    method: PropagationMethod,
    config: &CometPropConfig,
    ephemeris: &PerturberEphemeris,
    cancel: Option<&CancellationToken>,
) -> TrajectoryResult {
    let timer = Instant::now();
    let designation = record.designation.as_str();

    let computed = (|| -> Result<(Vec<StateVector>, Option<NBodyDetails>)> {
        if let Some(token) = cancel {
            token.check(start)?;
        }
        let elements = record
            .elements
            .ok_or_else(|| CometPropError::ElementsMissing(record.designation.clone()))?;
        match method {
            PropagationMethod::TwoBody => {
                let states = TwoBodyPropagator::with_settings(elements, config.solver)?
                    .propagate_range(start, end, n_points)?;
                Ok((states, None))
            }
            PropagationMethod::NBody => {
                let mut propagator = NBodyPropagator::with_solver_settings(
                    elements,
                    &config.propagation.perturbers,
                    ephemeris.clone(),
                    config.integrator,
                    config.solver,
                )?;
                if let Some(token) = cancel {
                    propagator = propagator.with_cancellation(token.clone());
                }
                let solution = propagator.propagate_range(start, end, n_points)?;
                Ok((
                    solution.states,
                    Some((solution.stats, solution.ephemeris_usage)),
                ))
            }
        }
    })();
    let elapsed_ms = timer.elapsed().as_secs_f64() * 1e3;

    match computed {
        Ok((states, details)) => {
            debug!(designation, %method, points = states.len(), elapsed_ms, "trajectory computed");
            let result = TrajectoryResult::success(designation, method, states, elapsed_ms);
            match details {
                Some((stats, usage)) => {
                    debug!(designation, accepted_steps = stats.accepted_steps, %usage, "planet positions used");
                    result.with_nbody_details(stats, usage)
                }
                None => result,
            }
        }
        Err(err) => {
            debug!(designation, %method, %err, "trajectory failed");
            TrajectoryResult::failure(designation, method, &err, elapsed_ms)
        }
    }
}

/// Batch front end: cache, executors and statistics.
///
/// The cache and the ephemeris handle are injected, so several schedulers (or several
/// calls) can share them.
pub struct BatchScheduler {
    config: CometPropConfig,
    cache: Arc<TrajectoryCache>,
    ephemeris: PerturberEphemeris,
}

impl BatchScheduler {
    pub fn new(
        config: CometPropConfig,
        cache: Arc<TrajectoryCache>,
        ephemeris: PerturberEphemeris,
    ) -> Self {
        BatchScheduler {
            config,
            cache,
            ephemeris,
        }
    }

    /// Scheduler with a fresh cache and the ephemeris described by `config`.
    pub fn from_config(config: CometPropConfig) -> Result<Self> {
        config.validate()?;
        let ephemeris = PerturberEphemeris::from_settings(&config.propagation)?;
        Ok(Self::new(config, Arc::new(TrajectoryCache::new()), ephemeris))
    }

    pub fn config(&self) -> &CometPropConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TrajectoryCache> {
        &self.cache
    }

    /// Compute the trajectories of `records`.
    ///
    /// Return
    /// ----------
    /// * The per-designation results and statistics, or
    ///   [`CometPropError::InvalidRequest`] when the sample grid itself is invalid.
    ///
    /// See also
    /// ------------
    /// * [`BatchScheduler::calculate_designations`] – same, starting from a catalog.
    pub fn calculate(&self, records: &[CometRecord], request: &BatchRequest) -> Result<BatchOutcome> {
        let refs: Vec<&CometRecord> = records.iter().collect();
        self.run(&refs, Vec::new(), request)
    }

    /// Resolve `designations` in `catalog` and compute the known ones; unknown
    /// designations go to [`BatchOutcome::not_found`].
    pub fn calculate_designations(
        &self,
        catalog: &Catalog,
        designations: &[String],
        request: &BatchRequest,
    ) -> Result<BatchOutcome> {
        let (found, missing) = catalog.resolve(designations);
        let not_found = missing.into_iter().map(str::to_string).collect();
        self.run(&found, not_found, request)
    }

    fn run(
        &self,
        records: &[&CometRecord],
        mut not_found: Vec<Designation>,
        request: &BatchRequest,
    ) -> Result<BatchOutcome> {
        request.validate()?;
        let timer = Instant::now();
        let cache_enabled = self.config.batch.cache_enabled;

        let mut results = HashMap::with_capacity(records.len());
        let mut pending: Vec<&CometRecord> = Vec::with_capacity(records.len());
        let mut seen = HashSet::with_capacity(records.len());
        let (mut cache_hits, mut cache_misses) = (0, 0);

        for record in records.iter().copied() {
            if !seen.insert(record.designation.as_str()) {
                continue;
            }
            let hit = cache_enabled
                .then(|| self.cache.get(&request.cache_key(&record.designation)))
                .flatten();
            match hit {
                Some(result) => {
                    cache_hits += 1;
                    results.insert(record.designation.clone(), result);
                }
                None => {
                    cache_misses += 1;
                    pending.push(record);
                }
            }
        }

        let strategy =
            request
                .method
                .execution_strategy(request.parallel, pending.len(), &self.config.batch);
        info!(
            objects = records.len(),
            to_compute = pending.len(),
            method = %request.method,
            %strategy,
            "starting batch"
        );

        let progress = BatchProgress::new(pending.len());
        let computed = self.execute(&strategy, &pending, request, &progress);
        progress.finish();

        for result in computed {
            if cache_enabled {
                self.cache.insert(request.cache_key(&result.designation), &result);
            }
            results.insert(result.designation.clone(), result);
        }

        not_found.sort();
        not_found.dedup();
        let successful = results.values().filter(|r| r.success).count();
        let avg_calc_time_ms = if results.is_empty() {
            0.0
        } else {
            results.values().map(|r| r.calculation_time_ms).sum::<f64>() / results.len() as f64
        };
        let statistics = BatchStatistics {
            total_objects: seen.len() + not_found.len(),
            successful,
            failed: results.len() - successful,
            not_found: not_found.len(),
            cache_hits,
            cache_misses,
            total_time_ms: timer.elapsed().as_secs_f64() * 1e3,
            avg_calc_time_ms,
            method: request.method,
            parallel: request.parallel,
            executor: strategy.mode(),
            workers: strategy.workers(),
        };
        info!(
            successful,
            total = statistics.total_objects,
            cache_hits,
            executor = %statistics.executor,
            total_time_ms = statistics.total_time_ms,
            "batch complete"
        );

        Ok(BatchOutcome {
            results,
            not_found,
            statistics,
        })
    }

    fn execute(
        &self,
        strategy: &ExecutionStrategy,
        pending: &[&CometRecord],
        request: &BatchRequest,
        progress: &BatchProgress,
    ) -> Vec<TrajectoryResult> {
        match strategy {
            ExecutionStrategy::InProcess => pending
                .iter()
                .map(|record| self.in_process_unit(record, request, progress))
                .collect(),
            ExecutionStrategy::ThreadPool { max_workers } => {
                match rayon::ThreadPoolBuilder::new().num_threads(*max_workers).build() {
                    Ok(pool) => pool.install(|| {
                        pending
                            .par_iter()
                            .map(|record| self.in_process_unit(record, request, progress))
                            .collect()
                    }),
                    Err(err) => {
                        warn!(%err, "cannot build the thread pool, running in-process");
                        self.execute(&ExecutionStrategy::InProcess, pending, request, progress)
                    }
                }
            }
            ExecutionStrategy::IsolatedProcess {
                executable,
                max_workers,
                timeout,
            } => {
                // the pool threads only wait on their child process
                match rayon::ThreadPoolBuilder::new().num_threads(*max_workers).build() {
                    Ok(pool) => pool.install(|| {
                        pending
                            .par_iter()
                            .map(|record| {
                                let timer = Instant::now();
                                let result =
                                    self.isolated_unit(record, request, executable, *timeout);
                                progress.unit_done(timer.elapsed());
                                result
                            })
                            .collect()
                    }),
                    Err(err) => {
                        warn!(%err, "cannot build the worker pool, running in-process");
                        self.execute(&ExecutionStrategy::InProcess, pending, request, progress)
                    }
                }
            }
        }
    }

    fn in_process_unit(
        &self,
        record: &CometRecord,
        request: &BatchRequest,
        progress: &BatchProgress,
    ) -> TrajectoryResult {
        let timer = Instant::now();
        let result = propagate_record(
            record,
            request.start,
            request.end,
            request.n_points,
            request.method,
            &self.config,
            &self.ephemeris,
            request.cancellation.as_ref(),
        );
        progress.unit_done(timer.elapsed());
        result
    }

    fn isolated_unit(
        &self,
        record: &CometRecord,
        request: &BatchRequest,
        executable: &camino::Utf8Path,
        timeout: std::time::Duration,
    ) -> TrajectoryResult {
        let timer = Instant::now();
        let cancel = request.cancellation.as_ref();
        let fail = |err: CometPropError| {
            TrajectoryResult::failure(
                &*record.designation,
                request.method,
                &err,
                timer.elapsed().as_secs_f64() * 1e3,
            )
        };

        if let Some(Err(err)) = cancel.map(|token| token.check(request.start)) {
            return fail(err);
        }
        if record.elements.is_none() {
            return fail(CometPropError::ElementsMissing(record.designation.clone()));
        }

        let worker_request = WorkerRequest {
            record: record.clone(),
            start: request.start,
            end: request.end,
            n_points: request.n_points,
            method: request.method,
            config: self.config.clone(),
        };
        match run_isolated(executable, &worker_request, timeout, cancel) {
            Ok(result) => result,
            Err(err) => {
                warn!(designation = %record.designation, %err, "worker process failed");
                fail(err)
            }
        }
    }
}

#[cfg(test)]
mod batch_test {
    use super::*;
    use crate::cometprop_errors::ErrorKind;
    use crate::orbit_type::KeplerianElements;

    fn records() -> Vec<CometRecord> {
        let bound =
            KeplerianElements::from_degrees(2451545.0, 3.1, 0.6, 12.0, 70.0, 30.0, 10.0).unwrap();
        let open =
            KeplerianElements::from_perihelion(1.2, 1.05, 40.0, 120.0, 80.0, 2451545.0).unwrap();
        vec![
            CometRecord::new("P/2000 B1", "Bound", Some(bound)),
            CometRecord::new("C/2000 C1", "Open", Some(open)),
            CometRecord::new("C/2000 D1", "Bare", None),
        ]
    }

    fn scheduler(cache_enabled: bool) -> BatchScheduler {
        let mut config = CometPropConfig::default();
        config.batch.cache_enabled = cache_enabled;
        BatchScheduler::new(
            config,
            Arc::new(TrajectoryCache::new()),
            PerturberEphemeris::analytic_only().unwrap(),
        )
    }

    #[test]
    fn test_per_object_failures() {
        let scheduler = scheduler(true);
        let request = BatchRequest::new(2451545.0, 2451645.0, 11, PropagationMethod::TwoBody);
        let outcome = scheduler.calculate(&records(), &request).unwrap();

        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.results["P/2000 B1"].success);
        assert_eq!(outcome.results["P/2000 B1"].trajectory.len(), 11);
        assert_eq!(
            outcome.results["C/2000 C1"].error_kind(),
            Some(ErrorKind::UnsupportedOrbitRegime)
        );
        assert_eq!(
            outcome.results["C/2000 D1"].error_kind(),
            Some(ErrorKind::ElementsMissing)
        );

        let stats = &outcome.statistics;
        assert_eq!(stats.total_objects, 3);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.cache_misses, 3);
        assert_eq!(scheduler.cache().len(), 1);
    }

    #[test]
    fn test_cache_hits_match_fresh_results() {
        let scheduler = scheduler(true);
        let request = BatchRequest::new(2451545.0, 2452545.0, 20, PropagationMethod::TwoBody)
            .with_parallel(false);
        let first = scheduler.calculate(&records(), &request).unwrap();
        let second = scheduler.calculate(&records(), &request).unwrap();

        assert_eq!(second.statistics.cache_hits, 1);
        assert_eq!(second.statistics.cache_misses, 2);
        let (fresh, cached) = (&first.results["P/2000 B1"], &second.results["P/2000 B1"]);
        assert!(!fresh.from_cache);
        assert!(cached.from_cache);
        assert_eq!(fresh.trajectory, cached.trajectory);

        let uncached = self::scheduler(false);
        uncached.calculate(&records(), &request).unwrap();
        let again = uncached.calculate(&records(), &request).unwrap();
        assert_eq!(again.statistics.cache_hits, 0);
        assert!(uncached.cache().is_empty());
    }

    #[test]
    fn test_designations_and_report() {
        let scheduler = scheduler(true);
        let catalog: Catalog = records().into_iter().collect();
        let wanted = vec![
            "P/2000 B1".to_string(),
            "C/2000 D1".to_string(),
            "C/1999 Z9".to_string(),
            "P/2000 B1".to_string(),
        ];
        let request = BatchRequest::new(2451545.0, 2451555.0, 3, PropagationMethod::TwoBody);
        let outcome = scheduler
            .calculate_designations(&catalog, &wanted, &request)
            .unwrap();

        assert_eq!(outcome.not_found, vec!["C/1999 Z9".to_string()]);
        assert_eq!(outcome.statistics.total_objects, 3);
        assert_eq!(outcome.statistics.not_found, 1);

        let report = outcome.report();
        assert_eq!(report.trajectories.len(), 1);
        assert!(report.errors.is_empty());
        assert_eq!(
            report.not_found,
            vec!["C/1999 Z9".to_string(), "C/2000 D1".to_string()]
        );
    }

    #[test]
    fn test_cancelled_batch() {
        let scheduler = scheduler(true);
        let token = CancellationToken::new();
        token.cancel();
        let request = BatchRequest::new(2451545.0, 2451645.0, 5, PropagationMethod::NBody)
            .with_cancellation(token);
        let outcome = scheduler.calculate(&records(), &request).unwrap();

        assert!(outcome
            .results
            .values()
            .all(|r| r.error_kind() == Some(ErrorKind::Cancelled)));
        assert!(scheduler.cache().is_empty());
    }

    #[test]
    fn test_invalid_grid() {
        let scheduler = scheduler(true);
        let request = BatchRequest::new(2451645.0, 2451545.0, 5, PropagationMethod::TwoBody);
        assert!(scheduler.calculate(&records(), &request).is_err());
        let request = BatchRequest::new(2451545.0, 2451645.0, 0, PropagationMethod::TwoBody);
        assert!(scheduler.calculate(&records(), &request).is_err());
    }

    #[test]
    fn test_nbody_without_worker_runs_on_thread_pool() {
        let mut config = CometPropConfig::default();
        config.batch.cache_enabled = false;
        config.batch.worker_executable = Some("missing/dir/nbody_worker".into());
        let scheduler = BatchScheduler::new(
            config,
            Arc::new(TrajectoryCache::new()),
            PerturberEphemeris::analytic_only().unwrap(),
        );

        let request = BatchRequest::new(2451545.0, 2451745.0, 4, PropagationMethod::NBody);
        let outcome = scheduler.calculate(&records()[..1], &request).unwrap();
        assert_eq!(outcome.statistics.executor, ExecutionMode::ThreadPool);
        assert!(outcome.statistics.workers >= 1);

        let result = &outcome.results["P/2000 B1"];
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.trajectory.len(), 4);
        assert!(result.integration_stats.unwrap().accepted_steps > 0);
        assert!(!result.ephemeris_usage.as_ref().unwrap().is_mixed());

        let sequential = scheduler
            .calculate(&records()[..1], &request.with_parallel(false))
            .unwrap();
        assert_eq!(sequential.statistics.executor, ExecutionMode::InProcess);
        assert_eq!(sequential.results["P/2000 B1"].trajectory, result.trajectory);
    }
}
