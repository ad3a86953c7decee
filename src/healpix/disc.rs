//! Covering set of a spherical cap.
//!
//! The cover is built top-down from the 12 base faces. A pixel at depth `d` is kept when the
//! angle between its centre and the cap centre is at most `radius + r_d`, where `r_d` is the
//! maximal centre-to-boundary distance of a depth-`d` pixel. Any pixel intersecting the cap
//! passes this test, and nested children are geometrically contained in their parent, so a
//! rejected pixel has no intersecting descendant: the cover has no false negatives.
//! A pixel lying entirely inside the cap (`angle + r_d ≤ radius`) contributes its whole
//! range of descendants without further tests.
use std::f64::consts::PI;

use nalgebra::Vector3;

use super::nested::{max_pixel_radius, nested_center_vector};
use crate::constants::ANGLE_EPS;
use crate::coordinates::vector_angle;

/// Sorted list of the pixels at `depth` that may intersect the cap of angular `radius`
/// (radians) around `center`.
pub(crate) fn nested_disc_cover(center: &Vector3<f64>, radius: f64, depth: u8) -> Vec<u64> {
    let roots: Vec<(u8, u64)> = (0..12u64).rev().map(|face| (0, face)).collect();
    cover_from(center, radius, depth, roots)
}

/// Same as [`nested_disc_cover`], restricted to the descendants of `ancestor` (a pixel at
/// `ancestor_depth ≤ depth`).
pub(crate) fn nested_disc_cover_within(
    center: &Vector3<f64>,
    radius: f64,
    depth: u8,
    ancestor: u64,
    ancestor_depth: u8,
) -> Vec<u64> {
    cover_from(center, radius, depth, vec![(ancestor_depth, ancestor)])
}

fn cover_from(center: &Vector3<f64>, radius: f64, depth: u8, roots: Vec<(u8, u64)>) -> Vec<u64> {
    let radius = if radius.is_nan() { 0.0 } else { radius.max(0.0) };

    if radius >= PI {
        return roots
            .into_iter()
            .rev()
            .flat_map(|(d, pix)| {
                let shift = 2 * (depth - d);
                (pix << shift)..((pix + 1) << shift)
            })
            .collect();
    }

    let pixel_radius: Vec<f64> = (0..=depth).map(max_pixel_radius).collect();

    let mut cover = Vec::new();
    let mut stack = roots;

    while let Some((d, pix)) = stack.pop() {
        let angle = vector_angle(center, &nested_center_vector(pix, d));
        let r_d = pixel_radius[d as usize];

        if angle > radius + r_d + ANGLE_EPS {
            continue;
        }

        if d == depth {
            cover.push(pix);
        } else if angle + r_d <= radius {
            let shift = 2 * (depth - d);
            cover.extend((pix << shift)..((pix + 1) << shift));
        } else {
            let first_child = pix << 2;
            stack.extend((first_child..first_child + 4).rev().map(|child| (d + 1, child)));
        }
    }

    cover.sort_unstable();
    cover
}
