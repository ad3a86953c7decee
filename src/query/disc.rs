//! Candidate cells for a cone query.
use crate::constants::{PixelId, Radian};
use crate::coordinates::SkyPoint;
use crate::healpix::{disc_cover, Nside};

/// Cells at `nside` that may hold a point within `radius` (radians) of `point`.
///
/// No cell containing a qualifying point is ever omitted; boundary cells that hold no
/// qualifying point may be included, so callers filter rows by true angular separation.
/// `radius ≥ π` yields every cell.
pub fn candidate_partitions_for_radius(
    point: &SkyPoint,
    radius: Radian,
    nside: Nside,
) -> Vec<PixelId> {
    disc_cover(point, radius, nside)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::angular_separation;
    use crate::healpix::pixel_of;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_no_false_negatives() {
        let nside = Nside::new(64).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let center = SkyPoint::new(rng.random_range(0.0..360.0), rng.random_range(-90.0..90.0));
            let radius = rng.random_range(0.0..3.0f64).to_radians();
            let cells = candidate_partitions_for_radius(&center, radius, nside);
            for _ in 0..200 {
                let p = SkyPoint::new(
                    center.ra + rng.random_range(-4.0..4.0),
                    center.dec + rng.random_range(-4.0..4.0),
                );
                if angular_separation(&center, &p) <= radius {
                    assert!(cells.binary_search(&pixel_of(&p, nside)).is_ok());
                }
            }
        }
    }

    #[test]
    fn test_whole_sky() {
        let nside = Nside::new(8).unwrap();
        let cells = candidate_partitions_for_radius(&SkyPoint::new(0.0, 0.0), 4.0, nside);
        assert_eq!(cells.len() as u64, nside.npix());
    }
}
