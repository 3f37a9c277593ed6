//! Propagation methods and the executor each one runs on.
//!
//! | method    | parallel executor                                   | workers            |
//! |-----------|-----------------------------------------------------|--------------------|
//! | `twobody` | [`ExecutionStrategy::ThreadPool`] (rayon)           | `min(2·cpus, n)`   |
//! | `nbody`   | [`ExecutionStrategy::IsolatedProcess`] (`nbody_worker`) | `min(cpus, n)` |
//!
//! Both worker counts are further capped by `batch.max_workers`. A sequential request runs
//! [`ExecutionStrategy::InProcess`].
//!
//! The worker executable is `batch.worker_executable` when set, otherwise an `nbody_worker`
//! found next to the running executable (or in its parent directory, where cargo puts the
//! binaries of test executables). When no worker can be found an N-body batch runs on a
//! [`ExecutionStrategy::ThreadPool`] without process isolation. The executor actually used
//! is reported in [`crate::batch::BatchStatistics::executor`].
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cometprop_errors::CometPropError;
use crate::config::BatchSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropagationMethod {
    /// Closed-form Keplerian motion.
    #[serde(rename = "twobody", alias = "two_body")]
    TwoBody,
    /// Numerical integration under the Sun and the configured planets.
    #[serde(rename = "nbody", alias = "n_body")]
    NBody,
}

impl PropagationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropagationMethod::TwoBody => "twobody",
            PropagationMethod::NBody => "nbody",
        }
    }

    /// Executor for `n_units` objects of this method; see [`ExecutionStrategy::select`].
    pub fn execution_strategy(
        self,
        parallel: bool,
        n_units: usize,
        settings: &BatchSettings,
    ) -> ExecutionStrategy {
        ExecutionStrategy::select(self, parallel, n_units, settings)
    }
}

impl fmt::Display for PropagationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropagationMethod {
    type Err = CometPropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twobody" | "two_body" | "two-body" | "kepler" => Ok(PropagationMethod::TwoBody),
            "nbody" | "n_body" | "n-body" => Ok(PropagationMethod::NBody),
            other => Err(CometPropError::InvalidRequest(format!(
                "unknown propagation method '{other}', expected 'twobody' or 'nbody'"
            ))),
        }
    }
}

/// File name of the isolated N-body worker binary.
pub const WORKER_BINARY: &str = "nbody_worker";

/// Locate the `nbody_worker` binary.
///
/// A configured path is used as is when it exists. Without one, the directory of the
/// running executable and its parent are searched.
///
/// Return
/// ----------
/// * The path of an existing worker binary, or `None`.
pub fn locate_worker(settings: &BatchSettings) -> Option<Utf8PathBuf> {
    if let Some(configured) = &settings.worker_executable {
        if configured.is_file() {
            return Some(configured.clone());
        }
        warn!(path = %configured, "configured worker executable does not exist");
        return None;
    }

    let current = std::env::current_exe().ok()?;
    let current = Utf8PathBuf::from_path_buf(current).ok()?;
    let file_name = format!("{WORKER_BINARY}{}", std::env::consts::EXE_SUFFIX);
    let found = current
        .ancestors()
        .skip(1)
        .take(2)
        .map(|dir: &Utf8Path| dir.join(&file_name))
        .find(|candidate| candidate.is_file());
    if let Some(path) = &found {
        debug!(%path, "found worker executable next to the running binary");
    }
    found
}

/// Kind of executor a batch ran on, as reported in the batch statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    InProcess,
    ThreadPool,
    IsolatedProcess,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionMode::InProcess => "in-process",
            ExecutionMode::ThreadPool => "thread pool",
            ExecutionMode::IsolatedProcess => "isolated processes",
        })
    }
}

/// Where the units of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// One after the other on the calling thread.
    InProcess,
    /// A dedicated rayon pool.
    ThreadPool { max_workers: usize },
    /// One `nbody_worker` child per unit, at most `max_workers` alive at once.
    IsolatedProcess {
        executable: Utf8PathBuf,
        max_workers: usize,
        timeout: Duration,
    },
}

impl ExecutionStrategy {
    /// Pick the executor of a batch.
    ///
    /// Arguments
    /// -----------------
    /// * `method`: propagation method of the batch.
    /// * `parallel`: `false` forces [`ExecutionStrategy::InProcess`].
    /// * `n_units`: number of objects left to compute.
    /// * `settings`: the `[batch]` configuration.
    pub fn select(
        method: PropagationMethod,
        parallel: bool,
        n_units: usize,
        settings: &BatchSettings,
    ) -> Self {
        if !parallel || n_units == 0 {
            return ExecutionStrategy::InProcess;
        }
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let cap = |workers: usize| {
            settings
                .max_workers
                .map_or(workers, |max| workers.min(max))
                .max(1)
        };

        match method {
            PropagationMethod::TwoBody => ExecutionStrategy::ThreadPool {
                max_workers: cap((2 * cpus).min(n_units)),
            },
            PropagationMethod::NBody => match locate_worker(settings) {
                Some(executable) => ExecutionStrategy::IsolatedProcess {
                    executable,
                    max_workers: cap(cpus.min(n_units)),
                    timeout: settings.object_timeout(),
                },
                None => {
                    warn!(
                        n_units,
                        "no {WORKER_BINARY} executable found, running the n-body batch on a thread pool without process isolation"
                    );
                    ExecutionStrategy::ThreadPool {
                        max_workers: cap(cpus.min(n_units)),
                    }
                }
            },
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        match self {
            ExecutionStrategy::InProcess => ExecutionMode::InProcess,
            ExecutionStrategy::ThreadPool { .. } => ExecutionMode::ThreadPool,
            ExecutionStrategy::IsolatedProcess { .. } => ExecutionMode::IsolatedProcess,
        }
    }

    pub fn workers(&self) -> usize {
        match self {
            ExecutionStrategy::InProcess => 1,
            ExecutionStrategy::ThreadPool { max_workers }
            | ExecutionStrategy::IsolatedProcess { max_workers, .. } => *max_workers,
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStrategy::InProcess => write!(f, "in-process"),
            ExecutionStrategy::ThreadPool { max_workers } => {
                write!(f, "thread pool ({max_workers} workers)")
            }
            ExecutionStrategy::IsolatedProcess {
                executable,
                max_workers,
                timeout,
            } => write!(
                f,
                "isolated processes ({max_workers} x {executable}, timeout {}s)",
                timeout.as_secs()
            ),
        }
    }
}

#[cfg(test)]
mod execution_test {
    use super::*;

    #[test]
    fn test_method_names() {
        assert_eq!("nbody".parse::<PropagationMethod>().unwrap(), PropagationMethod::NBody);
        assert_eq!("Two-Body".parse::<PropagationMethod>().unwrap(), PropagationMethod::TwoBody);
        assert!("rk4".parse::<PropagationMethod>().is_err());
        assert_eq!(
            serde_json::to_string(&PropagationMethod::TwoBody).unwrap(),
            "\"twobody\""
        );
        let method: PropagationMethod = serde_json::from_str("\"nbody\"").unwrap();
        assert_eq!(method.to_string(), "nbody");
    }

    #[test]
    fn test_strategy_selection() {
        let settings = BatchSettings::default();
        assert_eq!(
            ExecutionStrategy::select(PropagationMethod::TwoBody, false, 10, &settings),
            ExecutionStrategy::InProcess
        );
        assert_eq!(
            ExecutionStrategy::select(PropagationMethod::NBody, false, 10, &settings),
            ExecutionStrategy::InProcess
        );
        assert!(matches!(
            ExecutionStrategy::select(PropagationMethod::TwoBody, true, 1, &settings),
            ExecutionStrategy::ThreadPool { max_workers: 1 }
        ));

        let dir = tempfile::tempdir().unwrap();
        let worker = Utf8PathBuf::from_path_buf(dir.path().join(WORKER_BINARY)).unwrap();
        std::fs::write(&worker, b"").unwrap();
        let settings = BatchSettings {
            max_workers: Some(2),
            worker_executable: Some(worker.clone()),
            ..BatchSettings::default()
        };
        let strategy = ExecutionStrategy::select(PropagationMethod::NBody, true, 50, &settings);
        assert_eq!(strategy.mode(), ExecutionMode::IsolatedProcess);
        match strategy {
            ExecutionStrategy::IsolatedProcess {
                executable,
                max_workers,
                timeout,
            } => {
                assert_eq!(executable, worker);
                assert!((1..=2).contains(&max_workers));
                assert_eq!(timeout, Duration::from_secs(300));
            }
            other => panic!("unexpected strategy {other}"),
        }
    }

    #[test]
    fn test_nbody_without_worker_keeps_parallelism() {
        let settings = BatchSettings {
            max_workers: Some(3),
            worker_executable: Some("missing/dir/nbody_worker".into()),
            ..BatchSettings::default()
        };
        assert!(locate_worker(&settings).is_none());

        let strategy = ExecutionStrategy::select(PropagationMethod::NBody, true, 8, &settings);
        assert_eq!(strategy.mode(), ExecutionMode::ThreadPool);
        assert!((1..=3).contains(&strategy.workers()));
    }

    #[test]
    fn test_locate_worker_next_to_executable() {
        let settings = BatchSettings::default();
        // whatever is found must be the worker binary itself
        if let Some(path) = locate_worker(&settings) {
            assert!(path.is_file());
            assert!(path.file_stem().is_some_and(|stem| stem == WORKER_BINARY));
        }
    }
}
