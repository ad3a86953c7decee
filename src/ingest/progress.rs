//! Progress accounting for the ingest router.
//!
//! Components
//! -----------------
//! * [`IngestProgress`] – lock-free counters a caller can inject and poll from another
//!   thread while an ingestion runs.
//! * `GroupTimer` – exponential moving average of the group durations reported by the
//!   workers, first sample taken as is.
//! * [`fmt_dur`] – `"253µs"`, `"42ms"` or `"3.14s"` depending on the scale.
//! * `GroupProgress` – ties them together for one ingestion: it logs
//!   every `progress_interval` groups and, with the `progress` feature, drives an
//!   `indicatif` bar.
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

/// Live counters of an ingestion.
#[derive(Debug, Default)]
pub struct IngestProgress {
    total_groups: AtomicUsize,
    groups_done: AtomicUsize,
    success: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of an [`IngestProgress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total_groups: usize,
    pub groups_done: usize,
    pub success: u64,
    pub errors: u64,
}

impl IngestProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total_groups: self.total_groups.load(Ordering::Relaxed),
            groups_done: self.groups_done.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn start(&self, total_groups: usize) {
        self.total_groups.store(total_groups, Ordering::Relaxed);
    }

    /// Record a finished group and return the number of groups done so far.
    pub(crate) fn record_group(&self, success: u64, errors: u64) -> usize {
        self.success.fetch_add(success, Ordering::Relaxed);
        self.errors.fetch_add(errors, Ordering::Relaxed);
        self.groups_done.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Smoothed duration of one group, shared by the workers.
///
/// Each worker measures its own group; the average follows `ema ← α·dt + (1–α)·ema`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GroupTimer {
    ema_ns: f64,
    alpha: f64,
    samples: u64,
}

impl GroupTimer {
    pub(crate) fn new(alpha: f64) -> Self {
        Self {
            ema_ns: 0.0,
            alpha,
            samples: 0,
        }
    }

    /// Fold the duration of one group in and return the new average.
    pub(crate) fn record(&mut self, took: Duration) -> Duration {
        let dt_ns = took.as_nanos() as f64;
        self.ema_ns = match self.samples {
            0 => dt_ns,
            _ => self.alpha * dt_ns + (1.0 - self.alpha) * self.ema_ns,
        };
        self.samples += 1;
        self.avg()
    }

    pub(crate) fn avg(&self) -> Duration {
        Duration::from_nanos(self.ema_ns as u64)
    }
}

/// `"253µs"`, `"42ms"` or `"3.14s"`.
pub fn fmt_dur(d: Duration) -> String {
    match d.as_micros() {
        us @ 0..=999 => format!("{us}µs"),
        us @ 1_000..=999_999 => format!("{}ms", us / 1_000),
        _ => format!("{:.2}s", d.as_secs_f32()),
    }
}

/// Reporting state of one ingestion, shared by the worker threads.
pub(crate) struct GroupProgress<'a> {
    counters: &'a IngestProgress,
    interval: usize,
    total: usize,
    started: Instant,
    timer: Mutex<GroupTimer>,
    #[cfg(feature = "progress")]
    bar: Option<ProgressBar>,
}

impl<'a> GroupProgress<'a> {
    pub(crate) fn new(
        counters: &'a IngestProgress,
        total: usize,
        interval: usize,
        show_bar: bool,
    ) -> Self {
        counters.start(total);

        #[cfg(feature = "progress")]
        let bar = show_bar.then(|| {
            let pb = ProgressBar::new((total as u64).max(1));
            pb.set_style(
                ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise} | {msg}",
                )
                .expect("indicatif template"),
            );
            pb.enable_steady_tick(Duration::from_millis(200));
            pb
        });
        #[cfg(not(feature = "progress"))]
        let _ = show_bar;

        GroupProgress {
            counters,
            interval: interval.max(1),
            total,
            started: Instant::now(),
            timer: Mutex::new(GroupTimer::new(0.2)),
            #[cfg(feature = "progress")]
            bar,
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record a group that wrote `success` rows and dropped `errors` rows in `took`.
    pub(crate) fn group_done(&self, success: u64, errors: u64, took: Duration) {
        let done = self.counters.record_group(success, errors);
        let avg = match self.timer.lock() {
            Ok(mut timer) => timer.record(took),
            Err(_) => Duration::ZERO,
        };

        #[cfg(feature = "progress")]
        if let Some(pb) = &self.bar {
            pb.set_message(format!("last: {}, avg: {}", fmt_dur(took), fmt_dur(avg)));
            pb.inc(1);
        }

        if done % self.interval == 0 || done == self.total {
            let snap = self.counters.snapshot();
            let secs = self.elapsed().as_secs_f64();
            let rate = if secs > 0.0 {
                snap.success as f64 / secs
            } else {
                0.0
            };
            tracing::info!(
                groups = done,
                total = self.total,
                success = snap.success,
                errors = snap.errors,
                rows_per_sec = rate.round(),
                avg_group = %fmt_dur(avg),
                "ingest progress"
            );
        }
    }

    pub(crate) fn finish(&self) {
        #[cfg(feature = "progress")]
        if let Some(pb) = &self.bar {
            pb.disable_steady_tick();
            pb.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_dur_scales() {
        assert_eq!(fmt_dur(Duration::from_micros(253)), "253µs");
        assert_eq!(fmt_dur(Duration::from_millis(42)), "42ms");
        assert_eq!(fmt_dur(Duration::from_millis(3140)), "3.14s");
    }

    #[test]
    fn test_group_timer_smooths() {
        let mut timer = GroupTimer::new(0.5);
        assert_eq!(timer.avg(), Duration::ZERO);
        assert_eq!(timer.record(Duration::from_millis(10)), Duration::from_millis(10));
        assert_eq!(timer.record(Duration::from_millis(30)), Duration::from_millis(20));
        assert_eq!(timer.avg(), Duration::from_millis(20));
    }

    #[test]
    fn test_counters() {
        let counters = IngestProgress::new();
        let progress = GroupProgress::new(&counters, 3, 2, false);
        progress.group_done(10, 0, Duration::from_millis(3));
        progress.group_done(4, 1, Duration::from_millis(5));
        progress.finish();
        assert_eq!(
            counters.snapshot(),
            ProgressSnapshot {
                total_groups: 3,
                groups_done: 2,
                success: 14,
                errors: 1,
            }
        );
    }
}
