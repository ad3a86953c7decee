//! Source → partition key map.
//!
//! A source normally lives in a single partition: all its observations are close on the
//! sky, and the store keeps the light curve of one source under one tag. When the records
//! of a source resolve to several keys (a source straddling a cell boundary, or bad
//! astrometry), the map keeps one of them according to its [`EntityPolicy`] and remembers
//! the others as an [`EntityConflict`].
//!
//! The map is persisted next to the store as a two-column CSV file
//! (`source_id,healpix_id`), sorted by source id. A conflicting source gets one row per
//! key, the kept key first, so a reader that stops at the first row of a source still
//! finds the kept key.
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::constants::SourceId;
use crate::partitioning::PartitionKey;
use crate::skypart_errors::SkyPartError;

/// Which key an entity keeps when its records disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityPolicy {
    /// The key of the first record in input order.
    #[default]
    FirstSeen,
    /// The key of the last record in input order.
    LastSeen,
}

/// A source whose records resolved to more than one partition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityConflict {
    pub source_id: SourceId,
    /// Key kept in the map.
    pub kept: PartitionKey,
    /// Other keys seen for this source, ascending.
    pub others: Vec<PartitionKey>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntityRow {
    source_id: SourceId,
    healpix_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityPartitionMap {
    policy: EntityPolicy,
    entries: BTreeMap<SourceId, PartitionKey>,
    others: BTreeMap<SourceId, BTreeSet<PartitionKey>>,
}

impl EntityPartitionMap {
    pub fn new(policy: EntityPolicy) -> Self {
        EntityPartitionMap {
            policy,
            ..Default::default()
        }
    }

    /// Build a map from `(source, key)` pairs given in input order.
    pub fn from_pairs<I>(policy: EntityPolicy, pairs: I) -> Self
    where
        I: IntoIterator<Item = (SourceId, PartitionKey)>,
    {
        let mut map = Self::new(policy);
        for (source_id, key) in pairs {
            map.record(source_id, key);
        }
        map
    }

    /// Register that a record of `source_id` was assigned `key`.
    ///
    /// Returns `false` when the source was already known under another key.
    pub fn record(&mut self, source_id: SourceId, key: PartitionKey) -> bool {
        let Some(current) = self.entries.get(&source_id).copied() else {
            self.entries.insert(source_id, key);
            return true;
        };
        if current == key {
            return true;
        }
        let others = self.others.entry(source_id).or_default();
        match self.policy {
            EntityPolicy::FirstSeen => {
                others.insert(key);
            }
            EntityPolicy::LastSeen => {
                others.remove(&key);
                others.insert(current);
                self.entries.insert(source_id, key);
            }
        }
        false
    }

    #[inline]
    pub fn get(&self, source_id: SourceId) -> Option<PartitionKey> {
        self.entries.get(&source_id).copied()
    }

    /// Every key `source_id` was seen under: the kept key first, then the others
    /// ascending. Empty for an unknown source.
    pub fn keys_of(&self, source_id: SourceId) -> Vec<PartitionKey> {
        let Some(kept) = self.get(source_id) else {
            return Vec::new();
        };
        let others = self.others.get(&source_id).into_iter().flatten().copied();
        std::iter::once(kept).chain(others).collect()
    }

    pub fn policy(&self) -> EntityPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending source order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceId, PartitionKey)> + '_ {
        self.entries.iter().map(|(&s, &k)| (s, k))
    }

    /// Sources seen under several keys, ascending by source id.
    pub fn conflicts(&self) -> Vec<EntityConflict> {
        self.others
            .iter()
            .filter(|(_, others)| !others.is_empty())
            .filter_map(|(&source_id, others)| {
                Some(EntityConflict {
                    source_id,
                    kept: self.get(source_id)?,
                    others: others.iter().copied().collect(),
                })
            })
            .collect()
    }

    /// Log the conflicts: the first `detailed` individually, then a total.
    pub fn log_conflicts(&self, detailed: usize) {
        let conflicts = self.conflicts();
        for c in conflicts.iter().take(detailed) {
            tracing::warn!(
                source_id = c.source_id,
                kept = %c.kept,
                others = ?c.others,
                "source spans several partitions"
            );
        }
        if !conflicts.is_empty() {
            tracing::warn!(
                sources = conflicts.len(),
                policy = ?self.policy,
                "sources resolved to more than one partition key"
            );
        }
    }

    /// Write the map as `source_id,healpix_id` rows.
    pub fn write_csv(&self, path: &Utf8Path) -> Result<(), SkyPartError> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for (source_id, _) in self.iter() {
            for key in self.keys_of(source_id) {
                writer.serialize(EntityRow {
                    source_id,
                    healpix_id: key.raw(),
                })?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a map written by [`EntityPartitionMap::write_csv`]. The first row of a source
    /// is its kept key ([`EntityPolicy::FirstSeen`]); further rows come back as conflicts.
    pub fn read_csv(path: &Utf8Path) -> Result<Self, SkyPartError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut map = Self::new(EntityPolicy::FirstSeen);
        for row in reader.deserialize::<EntityRow>() {
            let row = row?;
            map.record(row.source_id, PartitionKey::from_raw(row.healpix_id));
        }
        Ok(map)
    }
}
