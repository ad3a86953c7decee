//! # Time-series store interface
//!
//! The partitioned store is an external collaborator: this crate only depends on the
//! [`ObservationStore`] trait. Rows live in one logical table and are tagged with a
//! [`PartitionTag`], the pair *(partition key, source id)*. The physical layout behind a
//! tag (one sub-table per tag in the production deployment) is the store's business.
//!
//! Error model
//! -----------------
//! Store calls fail with a [`StoreError`]:
//!
//! * [`StoreError::Connection`] – the store is unreachable. Callers abort the whole
//!   operation.
//! * [`StoreError::Rejected`] – one statement was refused (malformed row, constraint).
//!   Callers isolate the failure and continue.
//!
//! Concurrency
//! -----------------
//! Implementations must be [`Sync`]: the ingest router shares one store reference between
//! its worker threads and calls it through `&self`. Timeouts and cancellation belong to the
//! implementation.
//!
//! See also
//! -----------------
//! * [`MemoryStore`] – thread-safe in-memory implementation.
//! * [`crate::ingest::IngestRouter`] – the writer side.
//! * [`crate::query::SkyQuery`] – the reader side.
use std::fmt;

use hifitime::{Epoch, Unit};
use itertools::{Itertools, MinMaxResult};
use serde::Deserialize;
use thiserror::Error;

use crate::constants::SourceId;
use crate::observations::{KeyedObservation, Observation};
use crate::partitioning::PartitionKey;
use crate::skypart_errors::SkyPartError;

mod memory;

pub use memory::MemoryStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("connection lost: {0}")]
    Connection(String),

    #[error("statement rejected: {0}")]
    Rejected(String),
}

/// Tag attached to every stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionTag {
    pub key: PartitionKey,
    pub source_id: SourceId,
}

impl PartitionTag {
    pub fn new(key: PartitionKey, source_id: SourceId) -> Self {
        PartitionTag { key, source_id }
    }

    /// Name of the physical sub-table holding the rows of this tag: `{prefix}_{key}_{id}`.
    pub fn sub_table_name(&self, prefix: &str) -> String {
        format!("{prefix}_{}_{}", self.key.raw(), self.source_id)
    }
}

impl fmt::Display for PartitionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(key={}, source_id={})", self.key, self.source_id)
    }
}

/// Closed time interval `[start, end]` on the primary timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: Epoch,
    pub end: Epoch,
}

impl TimeRange {
    /// Interval between two epochs.
    ///
    /// Errors
    /// -----------------
    /// * [`SkyPartError::InvalidConfiguration`] if `start > end`.
    pub fn between(start: Epoch, end: Epoch) -> Result<Self, SkyPartError> {
        if start > end {
            return Err(SkyPartError::InvalidConfiguration(format!(
                "time range starts after it ends ({start} > {end})"
            )));
        }
        Ok(TimeRange { start, end })
    }

    /// The `days` days ending at `end` (e.g. "last month" = `last_days(end, 30.0)`).
    pub fn last_days(end: Epoch, days: f64) -> Self {
        TimeRange {
            start: end - Unit::Day * days.abs(),
            end,
        }
    }

    #[inline]
    pub fn contains(&self, ts: Epoch) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Count and time span of a set of rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindowStats {
    pub count: usize,
    pub first: Option<Epoch>,
    pub last: Option<Epoch>,
}

impl TimeWindowStats {
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let stamps: Vec<Epoch> = rows.into_iter().map(|o| o.ts).collect();
        let (first, last) = match stamps.iter().copied().minmax() {
            MinMaxResult::NoElements => (None, None),
            MinMaxResult::OneElement(t) => (Some(t), Some(t)),
            MinMaxResult::MinMax(a, b) => (Some(a), Some(b)),
        };
        TimeWindowStats {
            count: stamps.len(),
            first,
            last,
        }
    }
}

/// Writer and reader interface of the partitioned time-series store.
pub trait ObservationStore: Sync {
    /// Make sure the physical partition for `tag` exists (idempotent).
    fn ensure_partition(&self, tag: &PartitionTag) -> Result<(), StoreError>;

    /// Insert `rows` under `tag` as one statement: either every row is written or none.
    fn insert(&self, tag: &PartitionTag, rows: &[Observation]) -> Result<(), StoreError>;

    /// Rows whose partition key is in `keys`, optionally restricted to a time range.
    fn select(
        &self,
        keys: &[PartitionKey],
        range: Option<&TimeRange>,
    ) -> Result<Vec<KeyedObservation>, StoreError>;

    /// Rows of one source stored under `key`, optionally restricted to a time range.
    fn select_entity(
        &self,
        source_id: SourceId,
        key: PartitionKey,
        range: Option<&TimeRange>,
    ) -> Result<Vec<Observation>, StoreError>;
}

/// Connection settings handed unchanged to a store implementation.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Logical table holding every row.
    pub table: String,
    /// Prefix of the per-tag sub-table names.
    pub sub_table_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            host: "localhost".into(),
            port: 6030,
            user: "root".into(),
            password: "taosdata".into(),
            database: "gaia_lightcurves".into(),
            table: "sensor_data".into(),
            sub_table_prefix: "sensor".into(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("table", &self.table)
            .field("sub_table_prefix", &self.sub_table_prefix)
            .finish()
    }
}
