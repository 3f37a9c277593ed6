//! Isolated N-body worker.
//!
//! Reads one JSON `WorkerRequest` on stdin, writes one JSON `TrajectoryResult` on stdout.
//! Logs go to stderr at the level of `RUST_LOG`, else `COMETPROP_WORKER_LOG`, else `warn`.
use std::io::{self, BufReader, BufWriter};
use std::process::ExitCode;

use cometprop::batch::serve;
use cometprop::logging::init_logger;

fn main() -> ExitCode {
    let level = std::env::var("COMETPROP_WORKER_LOG").unwrap_or_else(|_| "warn".to_string());
    init_logger(&level, false);

    let stdin = BufReader::new(io::stdin().lock());
    let stdout = BufWriter::new(io::stdout().lock());
    match serve(stdin, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "worker failed");
            ExitCode::FAILURE
        }
    }
}
