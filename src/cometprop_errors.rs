use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::JulianDate;

#[derive(Error, Debug)]
pub enum CometPropError {
    #[error("Unsupported orbit regime: eccentricity {eccentricity} (only e < 1 is supported)")]
    UnsupportedOrbitRegime { eccentricity: f64 },

    #[error(
        "Kepler equation did not converge after {iterations} iterations \
         (M = {mean_anomaly}, e = {eccentricity}, last E = {last_estimate})"
    )]
    ConvergenceFailure {
        mean_anomaly: f64,
        eccentricity: f64,
        last_estimate: f64,
        iterations: usize,
    },

    #[error("Ephemeris unavailable for {body} at JD {jd}: {reason}")]
    EphemerisUnavailable {
        body: String,
        jd: JulianDate,
        reason: String,
    },

    #[error("Integration failure at JD {jd} (step = {step_size} day): {reason}")]
    IntegrationFailure {
        jd: JulianDate,
        step_size: f64,
        reason: String,
    },

    #[error("No orbital elements for object: {0}")]
    ElementsMissing(String),

    #[error("Propagation cancelled at JD {jd}")]
    Cancelled { jd: JulianDate },

    #[error("Invalid orbital elements: {0}")]
    InvalidElements(String),

    #[error("Invalid propagation request: {0}")]
    InvalidRequest(String),

    #[error("Error during the nom parsing: {0}")]
    NomParsingError(String),

    #[error("Invalid SPK data type: {0}")]
    InvalidSpkDataType(i32),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("Worker protocol error: {0}")]
    WorkerProtocol(#[from] serde_json::Error),

    #[error("Worker process error: {0}")]
    WorkerProcess(String),
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for CometPropError {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        let message = match err {
            nom::Err::Incomplete(_) => "unexpected end of input".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("{:?} with {} bytes left", e.code, e.input.len())
            }
        };
        CometPropError::NomParsingError(message)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CometPropError>;

/// Coarse classification of a [`CometPropError`].
///
/// The kind is what crosses serialization boundaries (cache, worker processes,
/// batch reports) and what callers match on to decide between retrying and
/// reporting a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedOrbitRegime,
    ConvergenceFailure,
    EphemerisUnavailable,
    IntegrationFailure,
    ElementsMissing,
    Cancelled,
    InvalidInput,
    Ephemeris,
    Io,
    Configuration,
    Worker,
}

impl ErrorKind {
    /// Whether the same request may succeed when issued again unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Cancelled | ErrorKind::Worker | ErrorKind::Io
        )
    }
}

impl CometPropError {
    pub fn kind(&self) -> ErrorKind {
        use CometPropError::*;
        match self {
            UnsupportedOrbitRegime { .. } => ErrorKind::UnsupportedOrbitRegime,
            ConvergenceFailure { .. } => ErrorKind::ConvergenceFailure,
            EphemerisUnavailable { .. } => ErrorKind::EphemerisUnavailable,
            IntegrationFailure { .. } => ErrorKind::IntegrationFailure,
            ElementsMissing(_) => ErrorKind::ElementsMissing,
            Cancelled { .. } => ErrorKind::Cancelled,
            InvalidElements(_) | InvalidRequest(_) => ErrorKind::InvalidInput,
            NomParsingError(_) | InvalidSpkDataType(_) => ErrorKind::Ephemeris,
            IoError(_) => ErrorKind::Io,
            ConfigError(_) => ErrorKind::Configuration,
            WorkerProtocol(_) | WorkerProcess(_) => ErrorKind::Worker,
        }
    }
}

/// Serializable failure description attached to a failed trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CometPropError> for FailureDetail {
    fn from(err: &CometPropError) -> Self {
        FailureDetail {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<CometPropError> for FailureDetail {
    fn from(err: CometPropError) -> Self {
        FailureDetail::from(&err)
    }
}

impl PartialEq for CometPropError {
    fn eq(&self, other: &Self) -> bool {
        use CometPropError::*;
        match (self, other) {
            (UnsupportedOrbitRegime { eccentricity: a }, UnsupportedOrbitRegime { eccentricity: b }) => {
                a == b
            }
            (
                ConvergenceFailure {
                    mean_anomaly: m1,
                    eccentricity: e1,
                    last_estimate: l1,
                    iterations: i1,
                },
                ConvergenceFailure {
                    mean_anomaly: m2,
                    eccentricity: e2,
                    last_estimate: l2,
                    iterations: i2,
                },
            ) => m1 == m2 && e1 == e2 && l1 == l2 && i1 == i2,
            (
                EphemerisUnavailable { body: b1, jd: t1, .. },
                EphemerisUnavailable { body: b2, jd: t2, .. },
            ) => b1 == b2 && t1 == t2,
            (IntegrationFailure { jd: t1, .. }, IntegrationFailure { jd: t2, .. }) => t1 == t2,
            (ElementsMissing(a), ElementsMissing(b)) => a == b,
            (Cancelled { .. }, Cancelled { .. }) => true,
            (InvalidElements(a), InvalidElements(b)) => a == b,
            (InvalidRequest(a), InvalidRequest(b)) => a == b,
            (NomParsingError(a), NomParsingError(b)) => a == b,
            (InvalidSpkDataType(a), InvalidSpkDataType(b)) => a == b,
            (WorkerProcess(a), WorkerProcess(b)) => a == b,

            // Wrapped library errors are not comparable: same variant means equal
            (IoError(_), IoError(_)) => true,
            (ConfigError(_), ConfigError(_)) => true,
            (WorkerProtocol(_), WorkerProtocol(_)) => true,

            _ => false,
        }
    }
}
