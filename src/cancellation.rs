//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is shared by the caller and every unit of work it started.
//! Long computations poll it at step boundaries and stop with
//! [`CometPropError::Cancelled`]; nothing is interrupted preemptively.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cometprop_errors::{CometPropError, Result};
use crate::constants::JulianDate;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also trips once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        CancellationToken {
            flag: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Same flag, with an additional (earlier) deadline.
    ///
    /// Cancelling the parent cancels the child; the child's deadline does not affect the
    /// parent.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now().checked_add(timeout);
        CancellationToken {
            flag: Arc::clone(&self.flag),
            deadline: match (self.deadline, deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// `Err(Cancelled { jd })` once the token has tripped.
    pub fn check(&self, jd: JulianDate) -> Result<()> {
        if self.is_cancelled() {
            Err(CometPropError::Cancelled { jd })
        } else {
            Ok(())
        }
    }
}
