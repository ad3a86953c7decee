//! In-memory [`ObservationStore`].
//!
//! Rows are kept per [`PartitionTag`] behind a single [`RwLock`]. The store enforces the
//! two behaviours the ingest protocol relies on:
//!
//! * a statement containing a row with a non-finite value is refused as a whole
//!   ([`StoreError::Rejected`]), like a typed column refusing `NaN`;
//! * writes into a tag whose partition was never created are refused.
//!
//! [`MemoryStore::set_online`] toggles a simulated connection loss: while offline every call
//! fails with [`StoreError::Connection`].
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::AHashSet;

use super::{ObservationStore, PartitionTag, StoreConfig, StoreError, TimeRange};
use crate::constants::SourceId;
use crate::observations::{KeyedObservation, Observation};
use crate::partitioning::PartitionKey;

#[derive(Debug)]
pub struct MemoryStore {
    config: StoreConfig,
    online: AtomicBool,
    tables: RwLock<BTreeMap<PartitionTag, Vec<Observation>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_config(StoreConfig::default())
    }

    pub fn from_config(config: StoreConfig) -> Self {
        MemoryStore {
            config,
            online: AtomicBool::new(true),
            tables: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Total number of stored rows.
    pub fn row_count(&self) -> usize {
        self.read()
            .map(|t| t.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Sorted names of the sub-tables created so far.
    pub fn sub_tables(&self) -> Vec<String> {
        let prefix = &self.config.sub_table_prefix;
        self.read()
            .map(|t| t.keys().map(|tag| tag.sub_table_name(prefix)).collect())
            .unwrap_or_default()
    }

    /// Distinct partition keys holding at least one sub-table.
    pub fn partition_keys(&self) -> BTreeSet<PartitionKey> {
        self.read()
            .map(|t| t.keys().map(|tag| tag.key).collect())
            .unwrap_or_default()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Connection(format!(
                "{}:{} is unreachable",
                self.config.host, self.config.port
            )))
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<PartitionTag, Vec<Observation>>>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Connection("store lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<PartitionTag, Vec<Observation>>>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Connection("store lock poisoned".into()))
    }
}

fn in_range(range: Option<&TimeRange>, obs: &Observation) -> bool {
    range.map_or(true, |r| r.contains(obs.ts))
}

impl ObservationStore for MemoryStore {
    fn ensure_partition(&self, tag: &PartitionTag) -> Result<(), StoreError> {
        self.check_online()?;
        self.write()?.entry(*tag).or_default();
        Ok(())
    }

    fn insert(&self, tag: &PartitionTag, rows: &[Observation]) -> Result<(), StoreError> {
        self.check_online()?;
        if let Some(bad) = rows.iter().find(|o| !o.has_finite_values()) {
            return Err(StoreError::Rejected(format!(
                "non-finite value in row of source {} at {}",
                bad.source_id, bad.ts
            )));
        }
        if let Some(bad) = rows.iter().find(|o| o.source_id != tag.source_id) {
            return Err(StoreError::Rejected(format!(
                "row of source {} written under tag {tag}",
                bad.source_id
            )));
        }
        let mut tables = self.write()?;
        let table = tables.get_mut(tag).ok_or_else(|| {
            StoreError::Rejected(format!(
                "table {} does not exist",
                tag.sub_table_name(&self.config.sub_table_prefix)
            ))
        })?;
        table.extend_from_slice(rows);
        Ok(())
    }

    fn select(
        &self,
        keys: &[PartitionKey],
        range: Option<&TimeRange>,
    ) -> Result<Vec<KeyedObservation>, StoreError> {
        self.check_online()?;
        let wanted: AHashSet<PartitionKey> = keys.iter().copied().collect();
        let tables = self.read()?;
        Ok(tables
            .iter()
            .filter(|(tag, _)| wanted.contains(&tag.key))
            .flat_map(|(tag, rows)| {
                rows.iter()
                    .filter(move |o| in_range(range, o))
                    .map(move |o| KeyedObservation::new(tag.key, *o))
            })
            .collect())
    }

    fn select_entity(
        &self,
        source_id: SourceId,
        key: PartitionKey,
        range: Option<&TimeRange>,
    ) -> Result<Vec<Observation>, StoreError> {
        self.check_online()?;
        let tables = self.read()?;
        Ok(tables
            .get(&PartitionTag::new(key, source_id))
            .map(|rows| rows.iter().filter(|o| in_range(range, o)).copied().collect())
            .unwrap_or_default())
    }
}
