//! Candidate cells for a nearest-neighbour query.
//!
//! The candidates are the cell containing the query point and its topological neighbours.
//! This is a heuristic: the true nearest record is covered only when it lies within about
//! one cell width of the query point. A query point near the corner of its cell may have
//! its nearest record two cells away, and an empty neighbourhood says nothing about the
//! rest of the sky. Callers needing certainty escalate to
//! [`candidate_partitions_for_radius`](super::disc::candidate_partitions_for_radius) with
//! an explicit radius bound.
use smallvec::SmallVec;

use crate::constants::PixelId;
use crate::coordinates::SkyPoint;
use crate::healpix::{neighbours_of, pixel_of, Nside};
use crate::skypart_errors::SkyPartError;

/// Own cell first, then its neighbours.
pub fn candidate_partitions_for_nearest(
    point: &SkyPoint,
    nside: Nside,
) -> SmallVec<[PixelId; 9]> {
    let own = pixel_of(point, nside);
    // `own` comes from `pixel_of`, so it always exists at `nside`.
    pixel_neighbourhood(own, nside).unwrap_or_else(|_| SmallVec::from_slice(&[own]))
}

/// `pixel` followed by its neighbours.
pub fn pixel_neighbourhood(
    pixel: PixelId,
    nside: Nside,
) -> Result<SmallVec<[PixelId; 9]>, SkyPartError> {
    let mut cells = SmallVec::new();
    cells.push(pixel);
    cells.extend(neighbours_of(pixel, nside)?);
    Ok(cells)
}
