//! Batch progress reporting.
//!
//! [`IterTimer`] keeps an exponential moving average of per-object computation time,
//! `ema ← α·dt + (1 − α)·ema`, seeded by the first sample. [`BatchProgress`] feeds it
//! from every finished unit and, with the `progress` feature, drives an `indicatif`
//! bar showing the last and the averaged object time. Without the feature the bar is
//! absent and only the timer is kept.
use std::time::Duration;

use parking_lot::Mutex;

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

/// Smoothed duration of the units of a batch.
#[derive(Debug, Clone)]
pub struct IterTimer {
    ema_ns: f64,
    alpha: f64,
    count: u64,
    last: Duration,
}

impl IterTimer {
    /// `alpha` in `(0, 1]`; `1.0` disables smoothing.
    pub fn new(alpha: f64) -> Self {
        IterTimer {
            ema_ns: 0.0,
            alpha: alpha.clamp(f64::MIN_POSITIVE, 1.0),
            count: 0,
            last: Duration::ZERO,
        }
    }

    /// Fold one unit duration into the average.
    #[inline]
    pub fn record(&mut self, dt: Duration) {
        let dt_ns = dt.as_nanos() as f64;
        self.count += 1;
        self.last = dt;
        self.ema_ns = if self.count == 1 {
            dt_ns
        } else {
            self.alpha * dt_ns + (1.0 - self.alpha) * self.ema_ns
        };
    }

    #[inline]
    pub fn avg(&self) -> Duration {
        Duration::from_nanos(self.ema_ns as u64)
    }

    #[inline]
    pub fn last(&self) -> Duration {
        self.last
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// `"253µs"`, `"42ms"` or `"3.14s"` depending on the magnitude.
#[inline]
pub fn fmt_dur(d: Duration) -> String {
    match d.as_micros() {
        us if us < 1_000 => format!("{us}µs"),
        us if us < 1_000_000 => format!("{}ms", us / 1_000),
        _ => format!("{:.2}s", d.as_secs_f32()),
    }
}

/// Shared progress of one batch; units report to it from any thread.
pub struct BatchProgress {
    timer: Mutex<IterTimer>,
    #[cfg(feature = "progress")]
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        #[cfg(not(feature = "progress"))]
        let _ = total;

        BatchProgress {
            timer: Mutex::new(IterTimer::new(0.2)),
            #[cfg(feature = "progress")]
            bar: {
                let bar = ProgressBar::new(total.max(1) as u64);
                if let Ok(style) = ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise} | {msg}",
                ) {
                    bar.set_style(style);
                }
                bar.enable_steady_tick(Duration::from_millis(200));
                bar
            },
        }
    }

    /// One unit finished after `dt`.
    pub fn unit_done(&self, dt: Duration) {
        let mut timer = self.timer.lock();
        timer.record(dt);
        #[cfg(feature = "progress")]
        {
            self.bar.set_message(format!(
                "last: {}, avg: {}",
                fmt_dur(timer.last()),
                fmt_dur(timer.avg())
            ));
            self.bar.inc(1);
        }
    }

    /// Smoothed unit duration so far.
    pub fn average(&self) -> Duration {
        self.timer.lock().avg()
    }

    pub fn finish(&self) {
        #[cfg(feature = "progress")]
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod progress_bar_test {
    use super::*;

    #[test]
    fn test_ema() {
        let mut timer = IterTimer::new(0.5);
        assert_eq!(timer.avg(), Duration::ZERO);
        timer.record(Duration::from_millis(10));
        assert_eq!(timer.avg(), Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        assert_eq!(timer.avg(), Duration::from_millis(15));
        assert_eq!(timer.last(), Duration::from_millis(20));
        assert_eq!(timer.count(), 2);
    }

    #[test]
    fn test_fmt_dur() {
        assert_eq!(fmt_dur(Duration::from_micros(253)), "253µs");
        assert_eq!(fmt_dur(Duration::from_millis(42)), "42ms");
        assert_eq!(fmt_dur(Duration::from_millis(3140)), "3.14s");
    }

    #[test]
    fn test_batch_progress() {
        let progress = BatchProgress::new(2);
        progress.unit_done(Duration::from_millis(4));
        progress.unit_done(Duration::from_millis(4));
        assert_eq!(progress.average(), Duration::from_millis(4));
        progress.finish();
    }
}
