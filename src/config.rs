//! # Configuration
//!
//! Every tunable of the engine, loaded from a TOML file. Each section and each field is
//! optional and falls back to the defaults below.
//!
//! ```toml
//! [propagation]
//! perturbers = ["jupiter", "saturn"]
//! use_precise_ephemeris = false
//! ephemeris_kernel = "data/de440.bsp"
//!
//! [solver]
//! tolerance = 1e-10
//! max_iterations = 100
//! convergence_policy = "reject"      # or "tolerate"
//!
//! [integrator]
//! rtol = 1e-10
//! atol = 1e-12
//! initial_step = 1.0                 # days
//! min_step = 1e-8
//! max_step = 100.0
//! max_steps = 1000000
//!
//! [batch]
//! cache_enabled = true
//! max_workers = 8                    # default: derived from the CPU count
//! worker_executable = "target/release/nbody_worker"
//! object_timeout_secs = 300
//!
//! [logging]
//! level = "info"
//! json = false
//! ```
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::cometprop_errors::{CometPropError, Result};
use crate::ephemeris::Planet;
use crate::kepler::KeplerSolverSettings;
use crate::nbody::IntegratorSettings;

/// Planets in a perturber list; never more than eight.
pub type PerturberList = SmallVec<[Planet; 8]>;

/// `[propagation]`: which planets perturb and where their positions come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EphemerisSettings {
    pub perturbers: PerturberList,
    pub use_precise_ephemeris: bool,
    pub ephemeris_kernel: Option<Utf8PathBuf>,
}

impl Default for EphemerisSettings {
    fn default() -> Self {
        EphemerisSettings {
            perturbers: smallvec![Planet::Jupiter, Planet::Saturn],
            use_precise_ephemeris: false,
            ephemeris_kernel: None,
        }
    }
}

/// `[batch]`: cache and executor tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub cache_enabled: bool,
    /// Upper bound on concurrent units; derived from the CPU count when absent.
    pub max_workers: Option<usize>,
    /// `nbody_worker` binary; searched next to the running executable when absent.
    pub worker_executable: Option<Utf8PathBuf>,
    /// Wall-clock budget of one isolated N-body object.
    pub object_timeout_secs: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            cache_enabled: true,
            max_workers: None,
            worker_executable: None,
            object_timeout_secs: 300,
        }
    }
}

impl BatchSettings {
    pub fn object_timeout(&self) -> Duration {
        Duration::from_secs(self.object_timeout_secs)
    }
}

/// `[logging]`: see [`crate::logging::init_logger`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CometPropConfig {
    pub propagation: EphemerisSettings,
    pub solver: KeplerSolverSettings,
    pub integrator: IntegratorSettings,
    pub batch: BatchSettings,
    pub logging: LoggingSettings,
}

impl CometPropConfig {
    /// Load and validate a TOML configuration file.
    ///
    /// Arguments
    /// -----------------
    /// * `path`: the file to read.
    ///
    /// Return
    /// ----------
    /// * The configuration, [`CometPropError::IoError`] if the file cannot be read,
    ///   [`CometPropError::ConfigError`] on malformed TOML or
    ///   [`CometPropError::InvalidRequest`] on out-of-range values.
    ///
    /// See also
    /// ------------
    /// * [`CometPropConfig::from_toml_str`]
    pub fn from_file(path: &Utf8Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CometPropConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the propagators cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CometPropError::InvalidRequest(msg));

        if !(self.solver.tolerance > 0.0) || self.solver.max_iterations == 0 {
            return invalid(format!(
                "solver needs a positive tolerance and iteration budget, got {:?}",
                self.solver
            ));
        }
        self.integrator.validate()?;
        if self.batch.max_workers == Some(0) {
            return invalid("batch.max_workers must be at least 1".into());
        }
        if self.batch.object_timeout_secs == 0 {
            return invalid("batch.object_timeout_secs must be at least 1".into());
        }
        if self.propagation.use_precise_ephemeris && self.propagation.ephemeris_kernel.is_none() {
            tracing::warn!("use_precise_ephemeris is set without ephemeris_kernel");
        }
        Ok(())
    }
}

#[cfg(test)]
mod config_test {
    use super::*;
    use crate::kepler::ConvergencePolicy;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CometPropConfig::from_toml_str("").unwrap();
        assert_eq!(config, CometPropConfig::default());
        assert_eq!(
            config.propagation.perturbers.as_slice(),
            &[Planet::Jupiter, Planet::Saturn]
        );
        assert!(!config.propagation.use_precise_ephemeris);
        assert_eq!(config.solver.tolerance, 1e-10);
        assert_eq!(config.solver.max_iterations, 100);
        assert_eq!(config.integrator.rtol, 1e-10);
        assert_eq!(config.integrator.atol, 1e-12);
        assert!(config.batch.cache_enabled);
        assert_eq!(config.batch.object_timeout(), Duration::from_secs(300));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[propagation]
perturbers = ["jupiter", "saturn", "earth", "neptune"]
use_precise_ephemeris = true
ephemeris_kernel = "data/de440.bsp"

[solver]
convergence_policy = "tolerate"

[integrator]
rtol = 1e-9
max_step = 20.0

[batch]
cache_enabled = false
max_workers = 3
worker_executable = "bin/nbody_worker"

[logging]
level = "debug"
json = true
"#
        )
        .unwrap();
        let path = Utf8Path::from_path(file.path()).unwrap();
        let config = CometPropConfig::from_file(path).unwrap();

        assert_eq!(
            config.propagation.perturbers.as_slice(),
            &[Planet::Jupiter, Planet::Saturn, Planet::EarthMoon, Planet::Neptune]
        );
        assert_eq!(
            config.propagation.ephemeris_kernel.as_deref(),
            Some(Utf8Path::new("data/de440.bsp"))
        );
        assert_eq!(config.solver.convergence_policy, ConvergencePolicy::Tolerate);
        assert_eq!(config.solver.max_iterations, 100);
        assert_eq!(config.integrator.rtol, 1e-9);
        assert_eq!(config.integrator.atol, 1e-12);
        assert_eq!(config.integrator.max_step, 20.0);
        assert!(!config.batch.cache_enabled);
        assert_eq!(config.batch.max_workers, Some(3));
        assert!(config.logging.json);
    }

    #[test]
    fn test_invalid_configurations() {
        let err = CometPropConfig::from_toml_str("[propagation]\nperturbers = [\"pluto\"]").unwrap_err();
        assert_eq!(err.kind(), crate::cometprop_errors::ErrorKind::Configuration);

        let err = CometPropConfig::from_toml_str("[integrator]\nrtol = -1.0").unwrap_err();
        assert_eq!(err.kind(), crate::cometprop_errors::ErrorKind::InvalidInput);

        let err = CometPropConfig::from_toml_str("[batch]\nmax_workers = 0").unwrap_err();
        assert_eq!(err.kind(), crate::cometprop_errors::ErrorKind::InvalidInput);

        assert!(CometPropConfig::from_file(Utf8Path::new("missing/cometprop.toml")).is_err());
    }
}
