//! Topological neighbours in the nested scheme.
//!
//! Neighbours inside a face are found by offsetting `(ix, iy)`. When the offset leaves the
//! face, the neighbouring face is read from [`FACE_ARRAY`] and the coordinates are
//! reflected / swapped according to [`SWAP_ARRAY`], because the faces of the polar caps are
//! rotated by 90° relative to each other.
use smallvec::SmallVec;

use super::nested::{nested_to_xyf, xyf_to_nested};

// Offsets in the order SW, W, NW, N, NE, E, SE, S.
const X_OFFSET: [i64; 8] = [-1, -1, 0, 1, 1, 1, 0, -1];
const Y_OFFSET: [i64; 8] = [0, 1, 1, 1, 0, -1, -1, -1];

/// Neighbouring face for each crossing (row) and source face (column); `-1` where three
/// faces meet and the diagonal neighbour does not exist.
///
/// Row index is `4 + dx + 3·dy` where `dx`, `dy` ∈ {-1, 0, 1} tell whether the offset left
/// the face through the low / high `ix` or `iy` edge.
const FACE_ARRAY: [[i8; 12]; 9] = [
    [8, 9, 10, 11, -1, -1, -1, -1, 10, 11, 8, 9], // S
    [5, 6, 7, 4, 8, 9, 10, 11, 9, 10, 11, 8],     // SE
    [-1, -1, -1, -1, 5, 6, 7, 4, -1, -1, -1, -1], // E
    [4, 5, 6, 7, 11, 8, 9, 10, 11, 8, 9, 10],     // SW
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],       // centre
    [1, 2, 3, 0, 0, 1, 2, 3, 5, 6, 7, 4],         // NE
    [-1, -1, -1, -1, 7, 4, 5, 6, -1, -1, -1, -1], // W
    [3, 0, 1, 2, 3, 0, 1, 2, 4, 5, 6, 7],         // NW
    [2, 3, 0, 1, -1, -1, -1, -1, 0, 1, 2, 3],     // N
];

/// Coordinate transform when entering the neighbouring face, per crossing and face row
/// (north / equatorial / south). Bit 0: flip x, bit 1: flip y, bit 2: swap x and y.
const SWAP_ARRAY: [[u8; 3]; 9] = [
    [0, 0, 3], // S
    [0, 0, 6], // SE
    [0, 0, 0], // E
    [0, 0, 5], // SW
    [0, 0, 0], // centre
    [5, 0, 0], // NE
    [0, 0, 0], // W
    [6, 0, 0], // NW
    [3, 0, 0], // N
];

/// Neighbours of `pix` at the given depth, in the fixed order
/// SW, W, NW, N, NE, E, SE, S. Missing neighbours (the E / W corners of the polar faces and
/// the N / S corners of the equatorial faces, where only three faces meet) are skipped.
pub(crate) fn nested_neighbours(pix: u64, depth: u8) -> SmallVec<[u64; 8]> {
    let nside = 1i64 << depth;
    let (ix, iy, face) = nested_to_xyf(pix, depth);
    let (ix, iy, face) = (ix as i64, iy as i64, face as usize);

    let mut result = SmallVec::new();

    if ix > 0 && ix < nside - 1 && iy > 0 && iy < nside - 1 {
        for m in 0..8 {
            let x = (ix + X_OFFSET[m]) as u64;
            let y = (iy + Y_OFFSET[m]) as u64;
            result.push(xyf_to_nested(x, y, face as u64, depth));
        }
        return result;
    }

    for m in 0..8 {
        let mut x = ix + X_OFFSET[m];
        let mut y = iy + Y_OFFSET[m];
        let mut row = 4usize;

        if x < 0 {
            x += nside;
            row -= 1;
        } else if x >= nside {
            x -= nside;
            row += 1;
        }
        if y < 0 {
            y += nside;
            row -= 3;
        } else if y >= nside {
            y -= nside;
            row += 3;
        }

        let target = FACE_ARRAY[row][face];
        if target < 0 {
            continue;
        }

        let bits = SWAP_ARRAY[row][face >> 2];
        if bits & 1 != 0 {
            x = nside - x - 1;
        }
        if bits & 2 != 0 {
            y = nside - y - 1;
        }
        if bits & 4 != 0 {
            std::mem::swap(&mut x, &mut y);
        }

        let candidate = xyf_to_nested(x as u64, y as u64, target as u64, depth);
        // At depth 0 two offsets can land on the same face.
        if candidate != pix && !result.contains(&candidate) {
            result.push(candidate);
        }
    }

    result
}
