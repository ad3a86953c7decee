//! # Partition-aware batch ingestion
//!
//! [`IngestRouter`] writes keyed observations into an [`ObservationStore`], one group per
//! [`PartitionTag`] *(partition key, source id)*, and keeps going when individual rows are
//! refused.
//!
//! Protocol
//! -----------------
//! 1. Records are grouped by tag. Groups are visited in tag order; rows keep their input
//!    order inside a group.
//! 2. For each group the partition is created ([`ObservationStore::ensure_partition`]). If
//!    the store rejects it, every row of the group is counted as an error and the router
//!    moves on to the next group.
//! 3. The rows are written in chunks of `batch_size`. When a chunk is rejected it is retried
//!    row by row; each row then succeeds or fails on its own.
//! 4. A [`StoreError::Connection`] at any step aborts the whole call with
//!    [`SkyPartError::StoreConnection`].
//!
//! Groups are independent and run on a dedicated rayon pool of `workers` threads. Per-group
//! counts are merged by reduction; live progress goes to an injected [`IngestProgress`].
//!
//! ## Example
//!
//! ```rust
//! use skypart::ingest::{IngestParams, IngestRouter};
//! use skypart::store::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let params = IngestParams::builder().batch_size(100).workers(2).build().unwrap();
//! let summary = IngestRouter::new(&store, params).ingest(&[]).unwrap();
//! assert_eq!(summary.success, 0);
//! ```
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Add;
use std::time::Instant;

use rayon::prelude::*;
use serde::Deserialize;

use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_PROGRESS_INTERVAL};
use crate::observations::{KeyedObservation, Observation};
use crate::skypart_errors::SkyPartError;
use crate::store::{ObservationStore, PartitionTag, StoreError};

pub mod progress;
mod summary;

pub use progress::{IngestProgress, ProgressSnapshot};
pub use summary::IngestSummary;

use progress::GroupProgress;

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Validated ingestion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "IngestParamsBuilder")]
pub struct IngestParams {
    batch_size: usize,
    workers: usize,
    progress_interval: usize,
    progress_bar: bool,
}

impl IngestParams {
    pub fn builder() -> IngestParamsBuilder {
        IngestParamsBuilder::new()
    }

    /// Maximum number of rows per insert statement.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of groups between two progress log lines.
    pub fn progress_interval(&self) -> usize {
        self.progress_interval
    }

    pub fn progress_bar(&self) -> bool {
        self.progress_bar
    }
}

impl Default for IngestParams {
    fn default() -> Self {
        IngestParams {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: default_workers(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress_bar: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestParamsBuilder {
    batch_size: usize,
    workers: usize,
    progress_interval: usize,
    progress_bar: bool,
}

impl Default for IngestParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestParamsBuilder {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: default_workers(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress_bar: false,
        }
    }

    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }
    pub fn workers(mut self, v: usize) -> Self {
        self.workers = v;
        self
    }
    pub fn progress_interval(mut self, v: usize) -> Self {
        self.progress_interval = v;
        self
    }
    /// Draw a terminal progress bar (needs the `progress` feature, ignored otherwise).
    pub fn progress_bar(mut self, v: bool) -> Self {
        self.progress_bar = v;
        self
    }

    /// Validate and produce the parameters.
    ///
    /// Errors
    /// -----------------
    /// * [`SkyPartError::InvalidConfiguration`] when `batch_size`, `workers` or
    ///   `progress_interval` is zero.
    pub fn build(self) -> Result<IngestParams, SkyPartError> {
        for (name, value) in [
            ("batch_size", self.batch_size),
            ("workers", self.workers),
            ("progress_interval", self.progress_interval),
        ] {
            if value == 0 {
                return Err(SkyPartError::InvalidConfiguration(format!(
                    "{name} must be at least 1"
                )));
            }
        }

        Ok(IngestParams {
            batch_size: self.batch_size,
            workers: self.workers,
            progress_interval: self.progress_interval,
            progress_bar: self.progress_bar,
        })
    }
}

impl TryFrom<IngestParamsBuilder> for IngestParams {
    type Error = SkyPartError;

    fn try_from(builder: IngestParamsBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

/// State of the write of one chunk.
///
/// `Batch` sends the whole chunk as one statement. A rejected batch moves to `RowByRow`,
/// which sends the rows one at a time starting at `next`; a rejected row is counted and
/// skipped. A connection failure leaves the machine with an error from any state.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WriteAttempt<'a> {
    Batch(&'a [Observation]),
    RowByRow { rows: &'a [Observation], next: usize },
    Done,
}

/// Rows written and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    success: u64,
    errors: u64,
}

impl Add for Tally {
    type Output = Tally;

    fn add(self, rhs: Tally) -> Tally {
        Tally {
            success: self.success + rhs.success,
            errors: self.errors + rhs.errors,
        }
    }
}

/// Writes keyed observations into a store, isolating rejected rows.
pub struct IngestRouter<'s, S: ObservationStore> {
    store: &'s S,
    params: IngestParams,
}

impl<'s, S: ObservationStore> IngestRouter<'s, S> {
    pub fn new(store: &'s S, params: IngestParams) -> Self {
        IngestRouter { store, params }
    }

    pub fn params(&self) -> &IngestParams {
        &self.params
    }

    /// Ingest `records`, see the module documentation for the protocol.
    ///
    /// Errors
    /// -----------------
    /// * [`SkyPartError::StoreConnection`] if the store becomes unreachable; nothing is
    ///   reported about the groups already written.
    /// * [`SkyPartError::WorkerPool`] if the worker threads cannot be spawned.
    pub fn ingest(&self, records: &[KeyedObservation]) -> Result<IngestSummary, SkyPartError> {
        self.ingest_with_progress(records, &IngestProgress::new())
    }

    /// [`IngestRouter::ingest`], publishing live counts into `progress`.
    pub fn ingest_with_progress(
        &self,
        records: &[KeyedObservation],
        progress: &IngestProgress,
    ) -> Result<IngestSummary, SkyPartError> {
        let groups = group_records(records);
        let partitions: BTreeSet<_> = groups.iter().map(|(tag, _)| tag.key).collect();
        let entities: BTreeSet<_> = groups.iter().map(|(tag, _)| tag.source_id).collect();

        tracing::info!(
            records = records.len(),
            groups = groups.len(),
            partitions = partitions.len(),
            entities = entities.len(),
            batch_size = self.params.batch_size,
            workers = self.params.workers,
            "ingest started"
        );

        let reporter = GroupProgress::new(
            progress,
            groups.len(),
            self.params.progress_interval,
            self.params.progress_bar,
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.params.workers)
            .thread_name(|idx| format!("skypart-ingest-{idx}"))
            .build()?;

        let outcome = pool.install(|| {
            groups
                .par_iter()
                .map(|(tag, rows)| -> Result<Tally, StoreError> {
                    let started = Instant::now();
                    let tally = self.ingest_group(tag, rows)?;
                    reporter.group_done(tally.success, tally.errors, started.elapsed());
                    Ok(tally)
                })
                .try_reduce(Tally::default, |a, b| Ok(a + b))
        });
        reporter.finish();

        let tally = outcome.map_err(|e: StoreError| {
            tracing::error!(error = %e, "ingest aborted");
            SkyPartError::from(e)
        })?;

        let summary = IngestSummary {
            success: tally.success,
            errors: tally.errors,
            groups: groups.len(),
            partitions: partitions.len(),
            entities: entities.len(),
            elapsed: reporter.elapsed(),
        };
        tracing::info!(
            success = summary.success,
            errors = summary.errors,
            success_rate = summary.success_rate(),
            rows_per_sec = summary.rows_per_second().round(),
            "ingest finished"
        );
        tracing::debug!("\n{summary}");
        Ok(summary)
    }

    fn ingest_group(&self, tag: &PartitionTag, rows: &[Observation]) -> Result<Tally, StoreError> {
        match self.store.ensure_partition(tag) {
            Ok(()) => {}
            Err(StoreError::Rejected(reason)) => {
                tracing::warn!(%tag, rows = rows.len(), %reason, "partition creation refused, group dropped");
                return Ok(Tally {
                    success: 0,
                    errors: rows.len() as u64,
                });
            }
            Err(e) => return Err(e),
        }

        rows.chunks(self.params.batch_size)
            .try_fold(Tally::default(), |acc, chunk| {
                Ok(acc + write_chunk(self.store, tag, chunk)?)
            })
    }
}

/// Shorthand for an [`IngestRouter`] with default parameters and the given batch size.
pub fn ingest<S: ObservationStore>(
    store: &S,
    records: &[KeyedObservation],
    batch_size: usize,
) -> Result<IngestSummary, SkyPartError> {
    let params = IngestParams::builder().batch_size(batch_size).build()?;
    IngestRouter::new(store, params).ingest(records)
}

/// Group rows by tag, in tag order, keeping the input order inside each group.
fn group_records(records: &[KeyedObservation]) -> Vec<(PartitionTag, Vec<Observation>)> {
    let mut groups: BTreeMap<PartitionTag, Vec<Observation>> = BTreeMap::new();
    for r in records {
        groups
            .entry(PartitionTag::new(r.key, r.observation.source_id))
            .or_default()
            .push(r.observation);
    }
    groups.into_iter().collect()
}

fn write_chunk<S: ObservationStore + ?Sized>(
    store: &S,
    tag: &PartitionTag,
    chunk: &[Observation],
) -> Result<Tally, StoreError> {
    let mut tally = Tally::default();
    let mut state = WriteAttempt::Batch(chunk);
    loop {
        state = match state {
            WriteAttempt::Batch(rows) => match store.insert(tag, rows) {
                Ok(()) => {
                    tally.success += rows.len() as u64;
                    WriteAttempt::Done
                }
                Err(StoreError::Rejected(reason)) => {
                    tracing::debug!(%tag, rows = rows.len(), %reason, "batch refused, retrying row by row");
                    WriteAttempt::RowByRow { rows, next: 0 }
                }
                Err(e) => return Err(e),
            },
            WriteAttempt::RowByRow { rows, next } if next < rows.len() => {
                match store.insert(tag, &rows[next..=next]) {
                    Ok(()) => tally.success += 1,
                    Err(StoreError::Rejected(reason)) => {
                        tally.errors += 1;
                        tracing::debug!(%tag, row = next, %reason, "row dropped");
                    }
                    Err(e) => return Err(e),
                }
                WriteAttempt::RowByRow {
                    rows,
                    next: next + 1,
                }
            }
            WriteAttempt::RowByRow { .. } => WriteAttempt::Done,
            WriteAttempt::Done => return Ok(tally),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::test_support::obs;
    use crate::partitioning::PartitionKey;
    use crate::store::MemoryStore;

    fn keyed(key: u64, source_id: i64, minutes: i64) -> KeyedObservation {
        KeyedObservation::new(PartitionKey::from_raw(key), obs(source_id, 10.0, 10.0, minutes))
    }

    fn params(batch_size: usize) -> IngestParams {
        IngestParams::builder()
            .batch_size(batch_size)
            .workers(2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_validation() {
        assert!(IngestParams::builder().batch_size(0).build().is_err());
        assert!(IngestParams::builder().workers(0).build().is_err());
        assert!(IngestParams::builder().progress_interval(0).build().is_err());
        let p = IngestParams::builder().build().unwrap();
        assert_eq!(p.batch_size(), 500);
        assert_eq!(p.progress_interval(), 100);
        assert!(p.workers() >= 1);
    }

    #[test]
    fn test_grouping_keeps_row_order() {
        let records = vec![keyed(7, 2, 0), keyed(3, 1, 0), keyed(7, 2, 1), keyed(3, 9, 0)];
        let groups = group_records(&records);
        let tags: Vec<_> = groups.iter().map(|(t, _)| (t.key.raw(), t.source_id)).collect();
        assert_eq!(tags, vec![(3, 1), (3, 9), (7, 2)]);
        assert_eq!(groups[2].1, vec![records[0].observation, records[2].observation]);
    }

    #[test]
    fn test_rejected_batch_falls_back_to_rows() {
        let store = MemoryStore::new();
        let mut records: Vec<_> = (0..10).map(|m| keyed(5, 1, m)).collect();
        records[4].observation.mag = f64::NAN;

        let summary = IngestRouter::new(&store, params(4)).ingest(&records).unwrap();
        assert_eq!(summary.success, 9);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.groups, 1);
        assert_eq!(store.row_count(), 9);
    }

    #[test]
    fn test_write_chunk_states() {
        let store = MemoryStore::new();
        let tag = PartitionTag::new(PartitionKey::from_raw(1), 1);
        store.ensure_partition(&tag).unwrap();

        let rows = vec![obs(1, 1.0, 1.0, 0), obs(1, 1.0, 1.0, 1)];
        assert_eq!(
            write_chunk(&store, &tag, &rows).unwrap(),
            Tally {
                success: 2,
                errors: 0
            }
        );

        let mut bad = rows.clone();
        bad[0].ra = f64::INFINITY;
        bad[1].dec = f64::NAN;
        assert_eq!(
            write_chunk(&store, &tag, &bad).unwrap(),
            Tally {
                success: 0,
                errors: 2
            }
        );

        store.set_online(false);
        assert!(matches!(
            write_chunk(&store, &tag, &rows),
            Err(StoreError::Connection(_))
        ));
    }

    #[test]
    fn test_connection_loss_aborts() {
        let store = MemoryStore::new();
        store.set_online(false);
        let err = IngestRouter::new(&store, params(10))
            .ingest(&[keyed(1, 1, 0)])
            .unwrap_err();
        assert!(matches!(err, SkyPartError::StoreConnection(_)));
    }

    #[test]
    fn test_progress_is_published() {
        let store = MemoryStore::new();
        let records = vec![keyed(1, 1, 0), keyed(1, 2, 0), keyed(2, 1, 0)];
        let progress = IngestProgress::new();
        IngestRouter::new(&store, params(10))
            .ingest_with_progress(&records, &progress)
            .unwrap();
        let snap = progress.snapshot();
        assert_eq!(snap.total_groups, 3);
        assert_eq!(snap.groups_done, 3);
        assert_eq!(snap.success, 3);
    }
}
