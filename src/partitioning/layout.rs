//! # Partition layout
//!
//! The layout is the persistent outcome of one adaptive assignment: the two resolutions
//! and the set of base cells that were refined. It is all a reader needs to turn a sky
//! region into the list of partition keys actually present in the store.
//!
//! Why a layout is needed at query time
//! -----------------
//! Query planners produce pixel ids at one resolution, while stored keys mix two: base ids
//! for sparse cells and composite `(base, fine)` ids for dense ones. Querying a fine pixel id
//! against an unrefined cell (or a base id against a refined one) silently matches nothing.
//! [`PartitionLayout::keys_for_cone`] and [`PartitionLayout::keys_for_nearest`] resolve
//! each candidate cell to the keys it is stored under.
//!
//! Key ambiguity
//! -----------------
//! When base cell 0 is refined, its composite keys have zero high bits and may equal the
//! key of an unrefined base cell. [`PartitionLayout::decode`] reports those keys as
//! [`DecodedKey::Ambiguous`]. Selecting such a key returns the rows of both cells; the
//! angular refinement of the query drops the extra ones.
use std::collections::BTreeSet;

use crate::constants::{PixelId, Radian};
use crate::coordinates::SkyPoint;
use crate::healpix::{children_range, disc_cover_within, pixel_of};
use crate::query::disc::candidate_partitions_for_radius;
use crate::query::neighborhood::pixel_neighbourhood;
use crate::partitioning::{PartitionKey, PartitionOccupancy, PartitionParams};
use crate::skypart_errors::SkyPartError;

/// Layout-aware reading of a [`PartitionKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedKey {
    /// Unrefined base cell.
    Base(PixelId),
    /// Fine cell of a refined base cell.
    Refined { base: PixelId, fine: PixelId },
    /// Either the unrefined base cell `id` or the fine cell `id` of the refined base cell 0.
    Ambiguous(PixelId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLayout {
    params: PartitionParams,
    refined: BTreeSet<PixelId>,
}

impl PartitionLayout {
    /// Layout with an explicit set of refined base cells (e.g. reloaded from disk).
    pub fn new<I>(params: PartitionParams, refined: I) -> Result<Self, SkyPartError>
    where
        I: IntoIterator<Item = PixelId>,
    {
        let npix = params.base_nside().npix();
        let refined: BTreeSet<PixelId> = refined.into_iter().collect();
        if let Some(&bad) = refined.iter().find(|&&p| p >= npix) {
            return Err(SkyPartError::PixelOutOfRange {
                pixel: bad,
                nside: params.base_nside().get(),
            });
        }
        Ok(PartitionLayout { params, refined })
    }

    /// Layout implied by an occupancy snapshot: every cell above the threshold is refined.
    pub fn from_occupancy(params: PartitionParams, occupancy: &PartitionOccupancy) -> Self {
        PartitionLayout {
            params,
            refined: occupancy
                .cells_above(params.density_threshold())
                .into_iter()
                .collect(),
        }
    }

    pub fn params(&self) -> &PartitionParams {
        &self.params
    }

    #[inline]
    pub fn is_refined(&self, base: PixelId) -> bool {
        self.refined.contains(&base)
    }

    /// Refined base cells, ascending.
    pub fn refined_cells(&self) -> Vec<PixelId> {
        self.refined.iter().copied().collect()
    }

    /// Fine and base cell of a point. The base cell is the nested parent of the fine cell,
    /// so both levels always agree.
    #[inline]
    pub(crate) fn cells_of(&self, point: &SkyPoint) -> (PixelId, PixelId) {
        let fine = pixel_of(point, self.params.fine_nside());
        (fine >> (2 * self.params.depth_delta()), fine)
    }

    /// Key a point falling at `point` is stored under.
    pub fn key_for(&self, point: &SkyPoint) -> PartitionKey {
        let (base, fine) = self.cells_of(point);
        self.key_of_cells(base, fine)
    }

    #[inline]
    pub(crate) fn key_of_cells(&self, base: PixelId, fine: PixelId) -> PartitionKey {
        if self.is_refined(base) {
            PartitionKey::compose(base, fine)
        } else {
            PartitionKey::base(base)
        }
    }

    /// Read a stored key using the knowledge of which cells are refined.
    pub fn decode(&self, key: PartitionKey) -> DecodedKey {
        if key.is_refined() {
            let (base, fine) = key.decode();
            return DecodedKey::Refined {
                base,
                fine: fine.unwrap_or(base),
            };
        }
        let id = key.raw();
        let zero_refined = self.is_refined(0) && id < self.params.children_per_cell();
        if !zero_refined {
            return DecodedKey::Base(id);
        }
        // A refined cell never stores rows under its base key.
        if id >= self.params.base_nside().npix() || self.is_refined(id) {
            DecodedKey::Refined { base: 0, fine: id }
        } else {
            DecodedKey::Ambiguous(id)
        }
    }

    /// Stored keys covering the cap of angular `radius` (radians) around `point`.
    ///
    /// Every stored key that may hold a point within `radius` is returned (no false
    /// negatives). Sorted, without duplicates.
    pub fn keys_for_cone(
        &self,
        point: &SkyPoint,
        radius: Radian,
    ) -> Result<Vec<PartitionKey>, SkyPartError> {
        let base_nside = self.params.base_nside();
        let fine_nside = self.params.fine_nside();
        let mut keys = Vec::new();
        for base in candidate_partitions_for_radius(point, radius, base_nside) {
            if self.is_refined(base) {
                keys.extend(
                    disc_cover_within(point, radius, fine_nside, base, base_nside)?
                        .into_iter()
                        .map(|fine| PartitionKey::compose(base, fine)),
                );
            } else {
                keys.push(PartitionKey::base(base));
            }
        }
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    /// Stored keys of the cell containing `point` and of its topological neighbours.
    ///
    /// The neighbourhood is taken at the fine resolution when the point's base cell is
    /// refined and at the base resolution otherwise. A refined neighbour reached at the
    /// base resolution contributes all its fine keys.
    pub fn keys_for_nearest(&self, point: &SkyPoint) -> Result<Vec<PartitionKey>, SkyPartError> {
        let base_nside = self.params.base_nside();
        let fine_nside = self.params.fine_nside();
        let shift = 2 * self.params.depth_delta();
        let (base, fine) = self.cells_of(point);

        let mut keys = Vec::new();
        if self.is_refined(base) {
            for n in pixel_neighbourhood(fine, fine_nside)? {
                keys.push(self.key_of_cells(n >> shift, n));
            }
        } else {
            for n in pixel_neighbourhood(base, base_nside)? {
                if self.is_refined(n) {
                    keys.extend(
                        children_range(n, base_nside, fine_nside)?
                            .map(|child| PartitionKey::compose(n, child)),
                    );
                } else {
                    keys.push(PartitionKey::base(n));
                }
            }
        }
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::healpix::{neighbours_of, Nside};

    fn params(threshold: u32) -> PartitionParams {
        PartitionParams::builder()
            .base_nside(16)
            .fine_nside(64)
            .density_threshold(threshold)
            .build()
            .unwrap()
    }

    #[test]
    fn test_key_for_follows_refinement() {
        let p = SkyPoint::new(150.0, 20.0);
        let base = pixel_of(&p, Nside::new(16).unwrap());
        let fine = pixel_of(&p, Nside::new(64).unwrap());

        let sparse = PartitionLayout::new(params(10), std::iter::empty()).unwrap();
        assert_eq!(sparse.key_for(&p), PartitionKey::base(base));

        let dense = PartitionLayout::new(params(10), [base]).unwrap();
        let key = dense.key_for(&p);
        assert_eq!(key.decode(), (base, Some(fine)));
        assert_eq!(dense.decode(key), DecodedKey::Refined { base, fine });
    }

    #[test]
    fn test_rejects_unknown_cells() {
        assert!(PartitionLayout::new(params(10), [16u64 * 16 * 12]).is_err());
    }

    #[test]
    fn test_decode_base_zero() {
        let layout = PartitionLayout::new(params(10), [0u64, 3]).unwrap();
        // 3 is refined: the raw value 3 can only be fine cell 3 of base 0.
        assert_eq!(
            layout.decode(PartitionKey::from_raw(3)),
            DecodedKey::Refined { base: 0, fine: 3 }
        );
        assert_eq!(
            layout.decode(PartitionKey::from_raw(5)),
            DecodedKey::Ambiguous(5)
        );
        // Beyond the 16 children of base 0 the value is a plain base key.
        assert_eq!(layout.decode(PartitionKey::from_raw(40)), DecodedKey::Base(40));

        let plain = PartitionLayout::new(params(10), [3u64]).unwrap();
        assert_eq!(plain.decode(PartitionKey::from_raw(5)), DecodedKey::Base(5));
    }

    #[test]
    fn test_nearest_keys_contain_own_key() {
        let p = SkyPoint::new(200.0, -40.0);
        let base = pixel_of(&p, Nside::new(16).unwrap());
        for refined in [vec![], vec![base]] {
            let layout = PartitionLayout::new(params(10), refined).unwrap();
            let keys = layout.keys_for_nearest(&p).unwrap();
            assert!(keys.contains(&layout.key_for(&p)));
            assert!(keys.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_refined_neighbour_expands_to_children() {
        let p = SkyPoint::new(200.0, -40.0);
        let b16 = Nside::new(16).unwrap();
        let base = pixel_of(&p, b16);
        let neighbour = neighbours_of(base, b16).unwrap()[0];
        let layout = PartitionLayout::new(params(10), [neighbour]).unwrap();
        let keys = layout.keys_for_nearest(&p).unwrap();
        let children = keys
            .iter()
            .filter(|k| k.is_refined() && k.base_id() == neighbour)
            .count();
        assert_eq!(children, 16);
        assert!(!keys.contains(&PartitionKey::base(neighbour)));
    }

    #[test]
    fn test_cone_keys_mix_levels() {
        let p = SkyPoint::new(10.0, 10.0);
        let b16 = Nside::new(16).unwrap();
        let base = pixel_of(&p, b16);
        let layout = PartitionLayout::new(params(10), [base]).unwrap();
        let keys = layout.keys_for_cone(&p, 5f64.to_radians()).unwrap();
        assert!(keys.contains(&layout.key_for(&p)));
        assert!(!keys.contains(&PartitionKey::base(base)));
        assert!(keys.iter().any(|k| !k.is_refined()));
    }
}
