//! Isolated N-body worker protocol.
//!
//! The parent writes one JSON [`WorkerRequest`] to the child's stdin and closes it; the
//! child (`nbody_worker`) answers with one JSON [`TrajectoryResult`] on stdout and logs on
//! stderr. A propagation failure is still a well-formed answer (`success = false`); a
//! non-zero exit status or unparsable output is a [`CometPropError::WorkerProcess`] or
//! [`CometPropError::WorkerProtocol`] error.
//!
//! While waiting, the parent polls the child and kills it when the object timeout
//! expires or the batch is cancelled.
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::catalog::CometRecord;
use crate::cometprop_errors::{CometPropError, Result};
use crate::config::CometPropConfig;
use crate::constants::JulianDate;
use crate::ephemeris::PerturberEphemeris;

use super::execution::PropagationMethod;
use super::report::TrajectoryResult;
use super::propagate_record;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One object to propagate in a child process.
///
/// The elements travel with their radian angles so the child propagates bit-identical inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    #[serde(with = "wire_record")]
    pub record: CometRecord,
    pub start: JulianDate,
    pub end: JulianDate,
    pub n_points: usize,
    pub method: PropagationMethod,
    /// Settings of the parent; the child builds its own ephemeris from them.
    pub config: CometPropConfig,
}

/// [`CometRecord`] with radian elements on the worker wire.
mod wire_record {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    use crate::catalog::{CometRecord, OrbitClass};
    use crate::constants::Designation;
    use crate::orbit_type::{ElementsInRadians, KeplerianElements};

    #[derive(Serialize, Deserialize)]
    struct WireRecord {
        designation: Designation,
        name: String,
        periodic_number: Option<u32>,
        orbit_class: OrbitClass,
        elements: Option<ElementsInRadians>,
    }

    pub fn serialize<S: Serializer>(record: &CometRecord, serializer: S) -> Result<S::Ok, S::Error> {
        WireRecord {
            designation: record.designation.clone(),
            name: record.name.clone(),
            periodic_number: record.periodic_number,
            orbit_class: record.orbit_class,
            elements: record.elements.map(ElementsInRadians::from),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CometRecord, D::Error> {
        let wire = WireRecord::deserialize(deserializer)?;
        let elements = wire
            .elements
            .map(KeplerianElements::try_from)
            .transpose()
            .map_err(D::Error::custom)?;
        Ok(CometRecord {
            designation: wire.designation,
            name: wire.name,
            periodic_number: wire.periodic_number,
            orbit_class: wire.orbit_class,
            elements,
        })
    }
}

impl WorkerRequest {
    /// Run the request in the current process.
    pub fn execute(&self) -> TrajectoryResult {
        match PerturberEphemeris::from_settings(&self.config.propagation) {
            Ok(ephemeris) => propagate_record(
                &self.record,
                self.start,
                self.end,
                self.n_points,
                self.method,
                &self.config,
                &ephemeris,
                None,
            ),
            Err(err) => TrajectoryResult::failure(&*self.record.designation, self.method, &err, 0.0),
        }
    }
}

/// Worker side: read one request from `input`, write its result to `output`.
pub fn serve<R: Read, W: Write>(input: R, mut output: W) -> Result<()> {
    let request: WorkerRequest = serde_json::from_reader(input)?;
    debug!(designation = %request.record.designation, method = %request.method, "worker request");
    let result = request.execute();
    serde_json::to_writer(&mut output, &result)?;
    output.flush()?;
    Ok(())
}

fn kill(child: &mut Child) {
    if let Err(err) = child.kill() {
        warn!(%err, "could not kill worker process");
    }
    let _ = child.wait();
}

/// Parent side: run `request` in a fresh `executable` process.
///
/// Arguments
/// -----------------
/// * `executable`: path of the `nbody_worker` binary.
/// * `request`: the object and the settings to propagate it with.
/// * `timeout`: wall-clock budget; the child is killed when it runs out.
/// * `cancel`: batch cancellation, polled while the child runs.
///
/// Return
/// ----------
/// * The child's [`TrajectoryResult`], [`CometPropError::Cancelled`] if the batch was
///   cancelled, or a worker error for a timeout, a crash or a malformed answer.
pub fn run_isolated(
    executable: &Utf8Path,
    request: &WorkerRequest,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<TrajectoryResult> {
    let designation = &request.record.designation;
    let payload = serde_json::to_vec(request)?;

    let mut child = Command::new(executable.as_std_path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|err| {
            CometPropError::WorkerProcess(format!("cannot start {executable}: {err}"))
        })?;

    let missing_pipe =
        || CometPropError::WorkerProcess(format!("no pipe to worker of {designation}"));
    {
        let mut stdin = child.stdin.take().ok_or_else(missing_pipe)?;
        if let Err(err) = stdin.write_all(&payload) {
            kill(&mut child);
            return Err(CometPropError::WorkerProcess(format!(
                "cannot send request for {designation}: {err}"
            )));
        }
    }
    let mut stdout = child.stdout.take().ok_or_else(missing_pipe)?;
    let reader = thread::spawn(move || {
        let mut buffer = Vec::new();
        stdout.read_to_end(&mut buffer).map(|_| buffer)
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if cancel.is_some_and(|token| token.is_cancelled()) {
            kill(&mut child);
            let _ = reader.join();
            return Err(CometPropError::Cancelled { jd: request.start });
        }
        if Instant::now() >= deadline {
            kill(&mut child);
            let _ = reader.join();
            return Err(CometPropError::WorkerProcess(format!(
                "worker for {designation} timed out after {}s",
                timeout.as_secs_f64()
            )));
        }
        thread::sleep(POLL_INTERVAL);
    };

    let output = reader
        .join()
        .map_err(|_| CometPropError::WorkerProcess("worker output reader panicked".into()))??;
    if !status.success() {
        return Err(CometPropError::WorkerProcess(format!(
            "worker for {designation} exited with {status}"
        )));
    }
    Ok(serde_json::from_slice(&output)?)
}
