#![allow(dead_code)]

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use hifitime::{Epoch, Unit};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use skypart::constants::SourceId;
use skypart::coordinates::SkyPoint;
use skypart::observations::{KeyedObservation, Observation};
use skypart::partitioning::PartitionKey;
use skypart::store::{MemoryStore, ObservationStore, PartitionTag, StoreError, TimeRange};

pub fn t0() -> Epoch {
    Epoch::from_str("2024-01-01T00:00:00 UTC").unwrap()
}

/// `n` points uniformly distributed over the sphere.
pub fn uniform_points(n: usize, seed: u64) -> Vec<SkyPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let ra = rng.random_range(0.0..360.0);
            let z: f64 = rng.random_range(-1.0..1.0);
            SkyPoint::new(ra, z.asin().to_degrees())
        })
        .collect()
}

/// `n` points scattered in a `half_width`-degree box around `center`.
pub fn clustered_points(center: SkyPoint, half_width: f64, n: usize, seed: u64) -> Vec<SkyPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            SkyPoint::new(
                center.ra + rng.random_range(-half_width..half_width),
                center.dec + rng.random_range(-half_width..half_width),
            )
        })
        .collect()
}

/// One observation per point, source id = index, one minute apart.
pub fn observations_at(points: &[SkyPoint]) -> Vec<Observation> {
    let start = t0();
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            Observation::new(
                start + Unit::Minute * i as f64,
                p.ra,
                p.dec,
                15.0 + (i % 7) as f64 * 0.1,
                2_460_310.5 + i as f64 / 1440.0,
                i as SourceId,
            )
        })
        .collect()
}

/// `epochs` observations of each source, `days_apart` days apart, all at the same position.
pub fn light_curves(points: &[SkyPoint], epochs: usize, days_apart: f64) -> Vec<Observation> {
    let start = t0();
    let mut rows = Vec::with_capacity(points.len() * epochs);
    for (i, p) in points.iter().enumerate() {
        for e in 0..epochs {
            let offset = days_apart * e as f64;
            rows.push(Observation::new(
                start + Unit::Day * offset,
                p.ra,
                p.dec,
                16.0,
                2_460_310.5 + offset,
                i as SourceId,
            ));
        }
    }
    rows
}

/// [`MemoryStore`] with injected faults.
#[derive(Debug, Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    /// Sources whose partition creation is refused.
    pub refuse_partitions_of: BTreeSet<SourceId>,
    /// Number of successful inserts after which the connection drops.
    pub disconnect_after: Option<usize>,
    inserts: AtomicUsize,
}

impl FaultyStore {
    pub fn refusing(sources: impl IntoIterator<Item = SourceId>) -> Self {
        FaultyStore {
            refuse_partitions_of: sources.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn disconnecting_after(inserts: usize) -> Self {
        FaultyStore {
            disconnect_after: Some(inserts),
            ..Default::default()
        }
    }
}

impl ObservationStore for FaultyStore {
    fn ensure_partition(&self, tag: &PartitionTag) -> Result<(), StoreError> {
        if self.refuse_partitions_of.contains(&tag.source_id) {
            return Err(StoreError::Rejected(format!("cannot create {tag}")));
        }
        self.inner.ensure_partition(tag)
    }

    fn insert(&self, tag: &PartitionTag, rows: &[Observation]) -> Result<(), StoreError> {
        if let Some(limit) = self.disconnect_after {
            if self.inserts.fetch_add(1, Ordering::SeqCst) >= limit {
                return Err(StoreError::Connection("peer reset".into()));
            }
        }
        self.inner.insert(tag, rows)
    }

    fn select(
        &self,
        keys: &[PartitionKey],
        range: Option<&TimeRange>,
    ) -> Result<Vec<KeyedObservation>, StoreError> {
        self.inner.select(keys, range)
    }

    fn select_entity(
        &self,
        source_id: SourceId,
        key: PartitionKey,
        range: Option<&TimeRange>,
    ) -> Result<Vec<Observation>, StoreError> {
        self.inner.select_entity(source_id, key, range)
    }
}
