//! # Sky coordinates
//!
//! Equatorial positions on the celestial sphere and the small amount of spherical
//! geometry needed around them.
//!
//! Conventions
//! -----------------
//! * [`SkyPoint`] stores right ascension and declination in **degrees**, the unit used by
//!   the observation catalogs and the store columns.
//! * Geometry is done on unit vectors ([`nalgebra::Vector3`]) to avoid the singularities of
//!   spherical formulas at the poles and at the RA wrap.
//! * Angular separations use the `atan2(|a×b|, a·b)` form, which stays accurate both for
//!   tiny and for near-antipodal separations.
use nalgebra::Vector3;

use crate::constants::{Degree, Radian, RADEG};

/// A position on the celestial sphere, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPoint {
    /// Right ascension, degrees, expected in `[0, 360)`.
    pub ra: Degree,
    /// Declination, degrees, expected in `[-90, 90]`.
    pub dec: Degree,
}

impl SkyPoint {
    pub fn new(ra: Degree, dec: Degree) -> Self {
        SkyPoint { ra, dec }
    }

    /// Copy of the point with right ascension wrapped into `[0, 360)` and declination
    /// clamped into `[-90, 90]`.
    ///
    /// This is the normalisation applied before any pixel computation: declinations
    /// slightly outside the valid band (rounding in upstream catalogs) land in the polar
    /// cells instead of producing an invalid pixel.
    pub fn normalized(&self) -> Self {
        let mut ra = self.ra.rem_euclid(360.0);
        // rem_euclid may round up to exactly 360.0 for tiny negative inputs
        if ra >= 360.0 {
            ra = 0.0;
        }
        SkyPoint {
            ra,
            dec: self.dec.clamp(-90.0, 90.0),
        }
    }

    /// Colatitude θ = π/2 − δ and longitude φ = α, both in radians, after normalisation.
    pub fn theta_phi(&self) -> (Radian, Radian) {
        let p = self.normalized();
        ((90.0 - p.dec) * RADEG, p.ra * RADEG)
    }

    /// Unit vector pointing at this position.
    pub fn to_unit_vector(&self) -> Vector3<f64> {
        let p = self.normalized();
        unit_vector(p.ra * RADEG, p.dec * RADEG)
    }

    /// Position of a unit vector (the inverse of [`SkyPoint::to_unit_vector`]).
    pub fn from_unit_vector(v: &Vector3<f64>) -> Self {
        let ra = v.y.atan2(v.x).rem_euclid(crate::constants::DPI);
        let dec = v.z.clamp(-1.0, 1.0).asin();
        SkyPoint::new(ra.to_degrees(), dec.to_degrees()).normalized()
    }

    /// `true` when both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.ra.is_finite() && self.dec.is_finite()
    }
}

/// Unit vector of a (lon, lat) pair given in radians.
#[inline]
pub fn unit_vector(lon: Radian, lat: Radian) -> Vector3<f64> {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
}

/// Great-circle angle between two unit vectors, in radians.
#[inline]
pub fn vector_angle(a: &Vector3<f64>, b: &Vector3<f64>) -> Radian {
    a.cross(b).norm().atan2(a.dot(b))
}

/// Angular separation between two sky positions, in radians.
///
/// This is the refinement step applied to the candidates returned by the partition
/// planners: a record belongs to a cone only if its true separation from the centre is
/// within the radius.
pub fn angular_separation(a: &SkyPoint, b: &SkyPoint) -> Radian {
    vector_angle(&a.to_unit_vector(), &b.to_unit_vector())
}

/// Angular separation between two sky positions, in degrees.
pub fn angular_separation_deg(a: &SkyPoint, b: &SkyPoint) -> Degree {
    angular_separation(a, b).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_normalized_wraps_and_clamps() {
        let p = SkyPoint::new(-10.0, 95.0).normalized();
        assert_abs_diff_eq!(p.ra, 350.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.dec, 90.0, epsilon = 1e-12);

        let q = SkyPoint::new(720.5, -91.0).normalized();
        assert_abs_diff_eq!(q.ra, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(q.dec, -90.0, epsilon = 1e-12);
    }

    #[test]
    fn test_separation_reference_values() {
        let origin = SkyPoint::new(0.0, 0.0);
        assert_abs_diff_eq!(angular_separation_deg(&origin, &origin), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            angular_separation_deg(&origin, &SkyPoint::new(90.0, 0.0)),
            90.0,
            epsilon = 1e-10
        );
        assert_abs_diff_eq!(
            angular_separation_deg(&SkyPoint::new(0.0, 90.0), &origin),
            90.0,
            epsilon = 1e-10
        );
        assert_abs_diff_eq!(
            angular_separation_deg(&origin, &SkyPoint::new(180.0, 0.0)),
            180.0,
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_separation_across_ra_wrap() {
        let a = SkyPoint::new(359.9, 10.0);
        let b = SkyPoint::new(0.1, 10.0);
        let expected = 0.2 * 10.0_f64.to_radians().cos();
        assert_abs_diff_eq!(angular_separation_deg(&a, &b), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_unit_vector_roundtrip() {
        let p = SkyPoint::new(123.456, -33.21);
        let back = SkyPoint::from_unit_vector(&p.to_unit_vector());
        assert_abs_diff_eq!(back.ra, p.ra, epsilon = 1e-9);
        assert_abs_diff_eq!(back.dec, p.dec, epsilon = 1e-9);
    }
}
