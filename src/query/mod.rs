//! # Partition-aware sky queries
//!
//! Both planners work in two steps: a cheap, conservative selection of partition keys
//! from the [`PartitionLayout`], then an exact filter of the returned rows by angular
//! separation.
//!
//! * [`neighborhood`] – the cell of a point plus its adjacent cells (nearest-object search).
//! * [`disc`] – every cell intersecting a cap (cone search, no false negatives).
//!
//! [`SkyQuery`] runs them against an [`ObservationStore`].
//!
//! ## Example
//!
//! ```rust
//! use skypart::coordinates::SkyPoint;
//! use skypart::partitioning::{PartitionLayout, PartitionParams};
//! use skypart::query::SkyQuery;
//! use skypart::store::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let layout = PartitionLayout::new(PartitionParams::default(), std::iter::empty()).unwrap();
//! let query = SkyQuery::new(&store, layout);
//! let hits = query.cone(&SkyPoint::new(10.0, 20.0), 1f64.to_radians()).unwrap();
//! assert!(hits.is_empty());
//! ```
use std::cmp::Ordering;

use crate::constants::{Radian, SourceId};
use crate::coordinates::{angular_separation, SkyPoint};
use crate::observations::{KeyedObservation, Observation};
use crate::partitioning::{EntityPartitionMap, PartitionKey, PartitionLayout};
use crate::skypart_errors::SkyPartError;
use crate::store::{ObservationStore, TimeRange, TimeWindowStats};

pub mod disc;
pub mod neighborhood;

/// A stored row matched by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub observation: Observation,
    pub key: PartitionKey,
    /// Angular distance to the query point, radians.
    pub separation: Radian,
}

impl Match {
    pub fn separation_deg(&self) -> f64 {
        self.separation.to_degrees()
    }
}

fn by_separation(a: &Match, b: &Match) -> Ordering {
    a.separation
        .partial_cmp(&b.separation)
        .unwrap_or(Ordering::Equal)
}

/// Read side of a partitioned store.
pub struct SkyQuery<'s, S: ObservationStore> {
    store: &'s S,
    layout: PartitionLayout,
    entities: Option<EntityPartitionMap>,
}

impl<'s, S: ObservationStore> SkyQuery<'s, S> {
    pub fn new(store: &'s S, layout: PartitionLayout) -> Self {
        SkyQuery {
            store,
            layout,
            entities: None,
        }
    }

    /// Attach the source → key map used by [`SkyQuery::entity_time_stats`].
    pub fn with_entities(mut self, entities: EntityPartitionMap) -> Self {
        self.entities = Some(entities);
        self
    }

    pub fn layout(&self) -> &PartitionLayout {
        &self.layout
    }

    /// Closest stored row to `point` among the point's cell and its neighbours.
    ///
    /// The search is bounded by the neighbourhood: a closer row lying more than about one
    /// cell away is not seen. Use [`SkyQuery::cone`] with an explicit radius when that
    /// matters. Ties are broken by storage order.
    pub fn nearest(&self, point: &SkyPoint) -> Result<Option<Match>, SkyPartError> {
        check_point(point)?;
        let keys = self.layout.keys_for_nearest(point)?;
        let rows = self.store.select(&keys, None)?;
        tracing::debug!(
            ra = point.ra,
            dec = point.dec,
            keys = keys.len(),
            candidates = rows.len(),
            "nearest"
        );

        Ok(rows
            .into_iter()
            .map(|r| to_match(point, r))
            .min_by(by_separation))
    }

    /// Every stored row within `radius` radians of `point`, closest first.
    pub fn cone(&self, point: &SkyPoint, radius: Radian) -> Result<Vec<Match>, SkyPartError> {
        check_point(point)?;
        if radius.is_nan() || radius < 0.0 {
            return Err(SkyPartError::InvalidQuery(format!(
                "cone radius must be a non-negative number, got {radius}"
            )));
        }

        let keys = self.layout.keys_for_cone(point, radius)?;
        let rows = self.store.select(&keys, None)?;
        let candidates = rows.len();

        let mut results: Vec<Match> = rows
            .into_iter()
            .map(|r| to_match(point, r))
            .filter(|m| m.separation <= radius)
            .collect();
        results.sort_by(by_separation);

        tracing::debug!(
            radius_deg = radius.to_degrees(),
            keys = keys.len(),
            candidates,
            matches = results.len(),
            "cone"
        );
        Ok(results)
    }

    /// Number of rows stored in the partition of `point` within `range`.
    pub fn count_in_window(
        &self,
        point: &SkyPoint,
        range: &TimeRange,
    ) -> Result<usize, SkyPartError> {
        check_point(point)?;
        let key = self.layout.key_for(point);
        Ok(self.store.select(&[key], Some(range))?.len())
    }

    /// Count and time span of the rows of one source, optionally within `range`.
    ///
    /// The entity map sends the lookup straight to the partitions of the source: its kept
    /// key and any other key its records were written under. A source absent from the map
    /// has no rows.
    ///
    /// Errors
    /// -----------------
    /// * [`SkyPartError::InvalidQuery`] when no entity map was attached.
    pub fn entity_time_stats(
        &self,
        source_id: SourceId,
        range: Option<&TimeRange>,
    ) -> Result<TimeWindowStats, SkyPartError> {
        let entities = self.entities.as_ref().ok_or_else(|| {
            SkyPartError::InvalidQuery("entity lookups need an entity map".into())
        })?;
        let mut rows = Vec::new();
        for key in entities.keys_of(source_id) {
            rows.extend(self.store.select_entity(source_id, key, range)?);
        }
        Ok(TimeWindowStats::from_rows(&rows))
    }
}

fn check_point(point: &SkyPoint) -> Result<(), SkyPartError> {
    if point.is_finite() {
        Ok(())
    } else {
        Err(SkyPartError::InvalidQuery(format!(
            "query point must be finite, got ({}, {})",
            point.ra, point.dec
        )))
    }
}

fn to_match(point: &SkyPoint, row: KeyedObservation) -> Match {
    Match {
        separation: angular_separation(point, &row.observation.position()),
        observation: row.observation,
        key: row.key,
    }
}
