//! # Pixel indexing on the HEALPix nested tessellation
//!
//! Stateless mapping between sky positions and cells of the **HEALPix** (Hierarchical Equal
//! Area isoLatitude Pixelisation) sphere tessellation, in the **nested** numbering scheme.
//!
//! Why nested ordering
//! -----------------
//! In the nested scheme the `4^k` children of a cell at resolution `nside` are the
//! contiguous range `[pix · 4^k, (pix + 1) · 4^k)` at resolution `nside · 2^k`. The composite
//! partition keys built by [`crate::partitioning`] rely on this: the fine id of a refined
//! cell always satisfies `fine >> 2k == base`, so a key can be validated and decoded with
//! shifts only.
//!
//! Operations
//! -----------------
//! * [`pixel_of`] – the cell containing a point (declination clamped first).
//! * [`neighbours_of`] – up to 8 topologically adjacent cells.
//! * [`disc_cover`] – every cell that may intersect a spherical cap (superset, never misses).
//!   [`disc_cover_within`] restricts the search to the descendants of one coarser cell.
//! * [`pixel_center`], [`max_pixel_radius`], [`parent_at`], [`children_range`] – hierarchy
//!   and geometry helpers.
//!
//! All functions are pure and may be called concurrently without coordination.
//!
//! Example
//! -----------------
//! ```rust
//! use skypart::coordinates::SkyPoint;
//! use skypart::healpix::{pixel_of, disc_cover, Nside};
//!
//! let nside = Nside::new(64).unwrap();
//! let p = SkyPoint::new(45.2579355828128, 0.458364992350643);
//! let pix = pixel_of(&p, nside);
//! assert!(disc_cover(&p, 0.01_f64.to_radians(), nside).contains(&pix));
//! ```
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::constants::{
    PixelId, Radian, DEFAULT_NSIDE_BASE, DEFAULT_NSIDE_FINE, MAX_DEPTH, RADEG,
};
use crate::coordinates::SkyPoint;
use crate::skypart_errors::SkyPartError;

mod disc;
mod nested;
mod neighbours;

/// HEALPix resolution parameter: a power of two between 1 and `2^14`.
///
/// The upper bound keeps `12 · nside²` below `2^32`, so that any pixel id fits in one half
/// of a composite key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Nside(u32);

impl Nside {
    /// Default coarse resolution of the partitioner.
    pub const DEFAULT_BASE: Nside = Nside(DEFAULT_NSIDE_BASE);
    /// Default refinement resolution of the partitioner.
    pub const DEFAULT_FINE: Nside = Nside(DEFAULT_NSIDE_FINE);

    /// Validate a raw `nside` value.
    ///
    /// Errors
    /// -----------------
    /// * [`SkyPartError::InvalidConfiguration`] if `nside` is zero, not a power of two, or
    ///   larger than `2^14`.
    pub fn new(nside: u32) -> Result<Self, SkyPartError> {
        if nside == 0 || !nside.is_power_of_two() {
            return Err(SkyPartError::InvalidConfiguration(format!(
                "nside must be a positive power of two, got {nside}"
            )));
        }
        if nside.trailing_zeros() > MAX_DEPTH as u32 {
            return Err(SkyPartError::InvalidConfiguration(format!(
                "nside {nside} exceeds 2^{MAX_DEPTH}: pixel ids would not fit in 32 bits"
            )));
        }
        Ok(Nside(nside))
    }

    /// Resolution of a given depth (`nside = 2^depth`).
    pub fn from_depth(depth: u8) -> Result<Self, SkyPartError> {
        if depth > MAX_DEPTH {
            return Err(SkyPartError::InvalidConfiguration(format!(
                "depth {depth} exceeds the maximum depth {MAX_DEPTH}"
            )));
        }
        Ok(Nside(1 << depth))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// `log2(nside)`.
    #[inline]
    pub fn depth(self) -> u8 {
        self.0.trailing_zeros() as u8
    }

    /// Number of cells on the sphere: `12 · nside²`.
    #[inline]
    pub fn npix(self) -> u64 {
        12 * (self.0 as u64) * (self.0 as u64)
    }

    /// Solid angle of one cell, in steradians.
    pub fn pixel_area(self) -> f64 {
        4.0 * std::f64::consts::PI / self.npix() as f64
    }

    /// Approximate side length of one cell, in radians.
    pub fn pixel_side(self) -> Radian {
        self.pixel_area().sqrt()
    }
}

impl TryFrom<u32> for Nside {
    type Error = SkyPartError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Nside::new(value)
    }
}

impl From<Nside> for u32 {
    fn from(value: Nside) -> Self {
        value.0
    }
}

impl fmt::Display for Nside {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cell containing `point` at resolution `nside`.
///
/// Right ascension is wrapped into `[0, 360)` and declination clamped into `[-90, 90]`
/// before the projection, so the function is total over finite inputs. The result is a
/// pure function of `(point, nside)`: identical across calls and processes.
pub fn pixel_of(point: &SkyPoint, nside: Nside) -> PixelId {
    let p = point.normalized();
    nested::lon_lat_to_nested(p.ra * RADEG, p.dec * RADEG, nside.depth())
}

/// Topologically adjacent cells of `pixel`.
///
/// Interior cells have 8 neighbours. At the eight points of the sphere where only three
/// base faces meet, the missing diagonal neighbour is omitted, so such cells have 7 (and
/// the 12 cells of `nside = 1` have 6).
///
/// Errors
/// -----------------
/// * [`SkyPartError::PixelOutOfRange`] if `pixel ≥ 12 · nside²`.
pub fn neighbours_of(pixel: PixelId, nside: Nside) -> Result<SmallVec<[PixelId; 8]>, SkyPartError> {
    check_pixel(pixel, nside)?;
    Ok(neighbours::nested_neighbours(pixel, nside.depth()))
}

/// Cells that may intersect the spherical cap of angular `radius` (radians) around `point`.
///
/// Guarantees
/// -----------------
/// * **No false negatives**: every cell containing a point at angular distance
///   `≤ radius` from `point` is returned.
/// * False positives near the cap boundary are expected; their number is bounded by the
///   cell size at `nside`.
/// * `radius = 0` returns at least the cell containing `point`; `radius ≥ π` returns every
///   cell. Negative or NaN radii are treated as zero.
/// * The output is sorted in ascending nested order, without duplicates.
pub fn disc_cover(point: &SkyPoint, radius: Radian, nside: Nside) -> Vec<PixelId> {
    disc::nested_disc_cover(&point.to_unit_vector(), radius, nside.depth())
}

/// [`disc_cover`] restricted to the descendants of `ancestor`, a cell given at the coarser
/// resolution `ancestor_nside`.
///
/// Errors
/// -----------------
/// * [`SkyPartError::InvalidConfiguration`] if `ancestor_nside > nside`.
/// * [`SkyPartError::PixelOutOfRange`] if `ancestor` does not exist at `ancestor_nside`.
pub fn disc_cover_within(
    point: &SkyPoint,
    radius: Radian,
    nside: Nside,
    ancestor: PixelId,
    ancestor_nside: Nside,
) -> Result<Vec<PixelId>, SkyPartError> {
    check_pixel(ancestor, ancestor_nside)?;
    depth_delta(nside, ancestor_nside)?;
    Ok(disc::nested_disc_cover_within(
        &point.to_unit_vector(),
        radius,
        nside.depth(),
        ancestor,
        ancestor_nside.depth(),
    ))
}

/// Position of the centre of `pixel`.
pub fn pixel_center(pixel: PixelId, nside: Nside) -> Result<SkyPoint, SkyPartError> {
    check_pixel(pixel, nside)?;
    let v = nested::nested_center_vector(pixel, nside.depth());
    Ok(SkyPoint::from_unit_vector(&v))
}

/// Upper bound (radians) on the angle between the centre of any cell at `nside` and any
/// point of that cell.
pub fn max_pixel_radius(nside: Nside) -> Radian {
    nested::max_pixel_radius(nside.depth())
}

/// Ancestor of `pixel` (given at `fine`) at the coarser resolution `coarse`.
///
/// Errors
/// -----------------
/// * [`SkyPartError::InvalidConfiguration`] if `coarse > fine`.
/// * [`SkyPartError::PixelOutOfRange`] if `pixel` does not exist at `fine`.
pub fn parent_at(pixel: PixelId, fine: Nside, coarse: Nside) -> Result<PixelId, SkyPartError> {
    check_pixel(pixel, fine)?;
    let delta = depth_delta(fine, coarse)?;
    Ok(pixel >> (2 * delta))
}

/// Range of the descendants of `pixel` (given at `coarse`) at the finer resolution `fine`.
pub fn children_range(
    pixel: PixelId,
    coarse: Nside,
    fine: Nside,
) -> Result<Range<PixelId>, SkyPartError> {
    check_pixel(pixel, coarse)?;
    let delta = depth_delta(fine, coarse)?;
    Ok((pixel << (2 * delta))..((pixel + 1) << (2 * delta)))
}

fn depth_delta(fine: Nside, coarse: Nside) -> Result<u8, SkyPartError> {
    fine.depth().checked_sub(coarse.depth()).ok_or_else(|| {
        SkyPartError::InvalidConfiguration(format!(
            "resolution {coarse} is finer than {fine}"
        ))
    })
}

fn check_pixel(pixel: PixelId, nside: Nside) -> Result<(), SkyPartError> {
    if pixel >= nside.npix() {
        return Err(SkyPartError::PixelOutOfRange {
            pixel,
            nside: nside.get(),
        });
    }
    Ok(())
}
