//! # Density-adaptive partitioning
//!
//! Assigns every point of a batch to a [`PartitionKey`] whose resolution adapts to the local
//! density: sparse regions are keyed by their cell at the coarse *base* resolution, dense
//! regions by their cell at the *fine* resolution.
//!
//! Algorithm
//! -----------------
//! 1. **Pass 1 – occupancy.** Every point is located at the fine resolution; its base cell is
//!    the nested parent of that fine cell. The base cells are counted into a
//!    [`PartitionOccupancy`].
//! 2. **Pass 2 – keying.** With the occupancy frozen, each point independently receives
//!    * `base` if its base cell holds at most `density_threshold` points,
//!    * `(base << 32) | fine` otherwise.
//!
//!    Pass 2 reads the occupancy only and runs in parallel (rayon); the output keeps the
//!    input order.
//!
//! Properties
//! -----------------
//! * The key of a point is a pure function of the point, the occupancy snapshot and the
//!   parameters: the same batch always yields the same keys.
//! * Adding points can only turn unrefined cells into refined ones.
//! * A threshold of 0 refines every occupied cell.
//! * Points with a non-finite coordinate are not counted and receive no key.
//!
//! Entities
//! -----------------
//! [`AdaptivePartitioner::assign_observations`] also builds the [`EntityPartitionMap`]
//! (source → key). Its [`EntityPolicy`] decides which key a source keeps when its records
//! disagree; disagreements are logged as warnings.
//!
//! ## Example
//!
//! ```rust
//! use skypart::coordinates::SkyPoint;
//! use skypart::partitioning::{AdaptivePartitioner, PartitionParams};
//!
//! let params = PartitionParams::builder().density_threshold(1).build().unwrap();
//! let points = vec![
//!     SkyPoint::new(10.0, 10.0),
//!     SkyPoint::new(10.0001, 10.0001),
//!     SkyPoint::new(250.0, -60.0),
//! ];
//! let keys: Vec<_> = AdaptivePartitioner::new(params)
//!     .assign(&points)
//!     .into_iter()
//!     .flatten()
//!     .collect();
//! assert!(keys[0].is_refined() && keys[1].is_refined());
//! assert!(!keys[2].is_refined());
//! ```
use rayon::prelude::*;

use crate::constants::PixelId;
use crate::coordinates::SkyPoint;
use crate::healpix::pixel_of;
use crate::observations::{KeyedObservation, Observation};

mod entity_map;
mod key;
mod layout;
mod occupancy;
mod params;

pub use entity_map::{EntityConflict, EntityPartitionMap, EntityPolicy};
pub use key::PartitionKey;
pub use layout::{DecodedKey, PartitionLayout};
pub use occupancy::{OccupancySummary, PartitionOccupancy};
pub use params::{PartitionParams, PartitionParamsBuilder};

/// Number of densest cells kept in the logged occupancy summary.
const SUMMARY_TOP_CELLS: usize = 10;

/// Number of entity conflicts logged individually.
const LOGGED_CONFLICTS: usize = 10;

/// Outcome of assigning a batch of points.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// One entry per input point, in input order. `None` for a point with a non-finite
    /// coordinate.
    pub keys: Vec<Option<PartitionKey>>,
    pub occupancy: PartitionOccupancy,
    pub layout: PartitionLayout,
}

impl Assignment {
    /// Number of points left without a key.
    pub fn skipped(&self) -> usize {
        self.keys.iter().filter(|k| k.is_none()).count()
    }
}

/// Outcome of assigning a batch of observations.
#[derive(Debug, Clone)]
pub struct ObservationAssignment {
    /// Input observations with their keys, in input order.
    pub records: Vec<KeyedObservation>,
    /// Observations with a non-finite position, left out of every other field.
    pub rejected: Vec<Observation>,
    pub entities: EntityPartitionMap,
    pub occupancy: PartitionOccupancy,
    pub layout: PartitionLayout,
}

#[derive(Debug, Clone, Copy)]
pub struct AdaptivePartitioner {
    params: PartitionParams,
    policy: EntityPolicy,
}

impl AdaptivePartitioner {
    pub fn new(params: PartitionParams) -> Self {
        AdaptivePartitioner {
            params,
            policy: EntityPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: EntityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn params(&self) -> &PartitionParams {
        &self.params
    }

    /// One key per point, in input order.
    pub fn assign(&self, points: &[SkyPoint]) -> Vec<Option<PartitionKey>> {
        self.assign_detailed(points).keys
    }

    /// Keys together with the occupancy and the layout they were derived from.
    pub fn assign_detailed(&self, points: &[SkyPoint]) -> Assignment {
        let fine = self.fine_cells(points);
        let occupancy = self.occupancy(&fine);
        let layout = PartitionLayout::from_occupancy(self.params, &occupancy);
        let keys = self.key_cells(&layout, &fine);
        let skipped = fine.iter().filter(|f| f.is_none()).count();
        if skipped > 0 {
            tracing::warn!(skipped, "points with a non-finite coordinate left unkeyed");
        }
        Assignment {
            keys,
            occupancy,
            layout,
        }
    }

    /// Key a batch of observations and build the source → key map.
    pub fn assign_observations(&self, observations: Vec<Observation>) -> ObservationAssignment {
        let points: Vec<SkyPoint> = observations.iter().map(Observation::position).collect();
        let Assignment {
            keys,
            occupancy,
            layout,
        } = self.assign_detailed(&points);

        let entities = EntityPartitionMap::from_pairs(
            self.policy,
            observations
                .iter()
                .zip(&keys)
                .filter_map(|(o, k)| k.map(|k| (o.source_id, k))),
        );
        entities.log_conflicts(LOGGED_CONFLICTS);
        let mut records = Vec::with_capacity(observations.len());
        let mut rejected = Vec::new();
        for (o, k) in observations.into_iter().zip(keys) {
            match k {
                Some(k) => records.push(KeyedObservation::new(k, o)),
                None => rejected.push(o),
            }
        }

        tracing::info!(
            records = records.len(),
            rejected = rejected.len(),
            entities = entities.len(),
            conflicts = entities.conflicts().len(),
            "entity map built"
        );

        ObservationAssignment {
            records,
            rejected,
            entities,
            occupancy,
            layout,
        }
    }

    fn fine_cells(&self, points: &[SkyPoint]) -> Vec<Option<PixelId>> {
        let fine_nside = self.params.fine_nside();
        points
            .par_iter()
            .map(|p| p.is_finite().then(|| pixel_of(p, fine_nside)))
            .collect()
    }

    /// Pass 1.
    fn occupancy(&self, fine: &[Option<PixelId>]) -> PartitionOccupancy {
        let shift = 2 * self.params.depth_delta();
        let occupancy = PartitionOccupancy::from_pixels(
            self.params.base_nside(),
            fine.iter().flatten().map(|f| f >> shift),
        );

        let summary = occupancy.summary(self.params.density_threshold(), SUMMARY_TOP_CELLS);
        tracing::info!(
            points = summary.total_points,
            occupied_cells = summary.occupied_cells,
            max_per_cell = summary.max_per_cell,
            mean_per_cell = summary.mean_per_cell,
            refined_cells = summary.refined_cells,
            threshold = summary.threshold,
            "occupancy computed"
        );
        tracing::debug!("\n{summary:#}");
        occupancy
    }

    /// Pass 2.
    fn key_cells(
        &self,
        layout: &PartitionLayout,
        fine: &[Option<PixelId>],
    ) -> Vec<Option<PartitionKey>> {
        let shift = 2 * self.params.depth_delta();
        fine.par_iter()
            .map(|f| f.map(|f| layout.key_of_cells(f >> shift, f)))
            .collect()
    }
}

/// Shorthand for `AdaptivePartitioner::new(params).assign(points)`.
pub fn assign(points: &[SkyPoint], params: PartitionParams) -> Vec<Option<PartitionKey>> {
    AdaptivePartitioner::new(params).assign(points)
}
