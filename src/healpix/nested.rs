//! Nested-scheme arithmetic: `(face, ix, iy)` ↔ pixel index, and the forward / inverse
//! sky projections.
//!
//! The 12 base faces are laid out as:
//! - 0–3: north polar cap
//! - 4–7: equatorial belt
//! - 8–11: south polar cap
//!
//! Within each face `ix` increases toward the north-east and `iy` toward the north-west;
//! the nested index interleaves the bits of `ix` (even positions) and `iy` (odd positions).
use std::f64::consts::{FRAC_2_PI, FRAC_PI_2, PI};

use nalgebra::Vector3;

/// Ring number (in units of nside) of the southernmost corner of each face.
const JRLL: [i64; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
/// Longitude index (in units of π/4) of the centre of each face.
const JPLL: [i64; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

/// Spread the low 32 bits of `v` onto the even bit positions.
#[inline]
pub(crate) fn spread_bits(v: u64) -> u64 {
    let mut x = v & 0xFFFF_FFFF;
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    (x | (x << 1)) & 0x5555_5555_5555_5555
}

/// Inverse of [`spread_bits`]: gather the even bit positions of `v`.
#[inline]
pub(crate) fn compress_bits(v: u64) -> u64 {
    let mut x = v & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x >> 8)) & 0x0000_FFFF_0000_FFFF;
    (x | (x >> 16)) & 0x0000_0000_FFFF_FFFF
}

#[inline]
pub(crate) fn xyf_to_nested(ix: u64, iy: u64, face: u64, depth: u8) -> u64 {
    (face << (2 * depth)) + spread_bits(ix) + (spread_bits(iy) << 1)
}

#[inline]
pub(crate) fn nested_to_xyf(pix: u64, depth: u8) -> (u64, u64, u64) {
    let face = pix >> (2 * depth);
    let sub = pix & ((1u64 << (2 * depth)) - 1);
    (compress_bits(sub), compress_bits(sub >> 1), face)
}

/// Nested pixel containing the direction (`lon`, `lat`), both in radians.
///
/// `lon` must lie in `[0, 2π)` and `lat` in `[-π/2, π/2]`; callers normalise first.
pub(crate) fn lon_lat_to_nested(lon: f64, lat: f64, depth: u8) -> u64 {
    let nside = 1u64 << depth;
    let ns = nside as f64;
    let z = lat.sin();
    let za = z.abs();

    let mut tt = (lon * FRAC_2_PI).rem_euclid(4.0);
    if tt >= 4.0 {
        tt = 0.0;
    }

    let (face, ix, iy) = if za <= 2.0 / 3.0 {
        // Equatorial belt: locate the pixel between the ascending / descending edge lines.
        let temp1 = ns * (0.5 + tt);
        let temp2 = ns * (z * 0.75);
        let jp = (temp1 - temp2) as u64;
        let jm = (temp1 + temp2) as u64;
        let ifp = jp >> depth;
        let ifm = jm >> depth;
        let face = if ifp == ifm {
            ifp | 4
        } else if ifp < ifm {
            ifp
        } else {
            ifm + 8
        };
        (face, jm & (nside - 1), nside - (jp & (nside - 1)) - 1)
    } else {
        // Polar caps. 1 - |z| is computed from the polar distance to keep precision
        // close to the poles.
        let ntt = (tt as u64).min(3);
        let tp = tt - ntt as f64;
        let half_polar = ((FRAC_PI_2 - lat.abs()) * 0.5).sin();
        let one_minus_za = 2.0 * half_polar * half_polar;
        let tmp = ns * (3.0 * one_minus_za).sqrt();
        let jp = ((tp * tmp) as u64).min(nside - 1);
        let jm = (((1.0 - tp) * tmp) as u64).min(nside - 1);
        if z >= 0.0 {
            (ntt, nside - jm - 1, nside - jp - 1)
        } else {
            (ntt + 8, jp, jm)
        }
    };

    xyf_to_nested(ix, iy, face, depth)
}

/// Centre of a nested pixel as `(z, sin θ, φ)`, with `z = cos θ`.
pub(crate) fn nested_to_z_phi(pix: u64, depth: u8) -> (f64, f64, f64) {
    let nside = 1i64 << depth;
    let ns = nside as f64;
    let nl4 = 4 * nside;
    let (ix, iy, face) = nested_to_xyf(pix, depth);
    let (ix, iy, face) = (ix as i64, iy as i64, face as usize);

    let jr = (JRLL[face] << depth) - ix - iy - 1;

    let (nr, z, sth, kshift) = if jr < nside {
        let nr = jr;
        let tmp = (nr * nr) as f64 / (3.0 * ns * ns);
        (nr, 1.0 - tmp, (tmp * (2.0 - tmp)).sqrt(), 0)
    } else if jr > 3 * nside {
        let nr = nl4 - jr;
        let tmp = (nr * nr) as f64 / (3.0 * ns * ns);
        (nr, tmp - 1.0, (tmp * (2.0 - tmp)).sqrt(), 0)
    } else {
        let z = (2 * nside - jr) as f64 * 2.0 / (3.0 * ns);
        (nside, z, ((1.0 - z) * (1.0 + z)).sqrt(), (jr - nside) & 1)
    };

    // The numerator is always even, so the integer division is exact.
    let mut jp = (JPLL[face] * nr + ix - iy + 1 + kshift) / 2;
    if jp > nl4 {
        jp -= nl4;
    }
    if jp < 1 {
        jp += nl4;
    }
    let phi = (jp as f64 - (kshift + 1) as f64 * 0.5) * (FRAC_PI_2 / nr as f64);

    (z, sth, phi)
}

/// Unit vector from `(z, sin θ, φ)`.
#[inline]
pub(crate) fn z_phi_to_vector(z: f64, sth: f64, phi: f64) -> Vector3<f64> {
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vector3::new(sth * cos_phi, sth * sin_phi, z)
}

/// Unit vector of the centre of a nested pixel.
#[inline]
pub(crate) fn nested_center_vector(pix: u64, depth: u8) -> Vector3<f64> {
    let (z, sth, phi) = nested_to_z_phi(pix, depth);
    z_phi_to_vector(z, sth, phi)
}

/// Upper bound on the angle between any pixel centre and the points of that pixel.
///
/// The extreme case is the pixel touching the north pole of face 0 whose far corner sits
/// on the polar / equatorial transition.
pub(crate) fn max_pixel_radius(depth: u8) -> f64 {
    let ns = (1u64 << depth) as f64;
    let za = 2.0 / 3.0;
    let va = z_phi_to_vector(za, ((1.0 - za) * (1.0 + za)).sqrt(), PI / (4.0 * ns));
    let t1 = (1.0 - 1.0 / ns).powi(2);
    let zb = 1.0 - t1 / 3.0;
    let vb = z_phi_to_vector(zb, ((1.0 - zb) * (1.0 + zb)).sqrt(), 0.0);
    crate::coordinates::vector_angle(&va, &vb)
}
