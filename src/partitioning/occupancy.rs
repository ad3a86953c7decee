//! Per-cell point counts at the base resolution.
//!
//! The occupancy is built once per batch (pass 1 of the assignment) and is read-only
//! afterwards, so pass 2 can consult it from any number of threads.
use std::fmt;

use ahash::AHashMap;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Row, Table};
use itertools::Itertools;

use crate::constants::PixelId;
use crate::healpix::Nside;

/// Base pixel id → number of points observed in it.
#[derive(Debug, Clone)]
pub struct PartitionOccupancy {
    nside: Nside,
    counts: AHashMap<PixelId, u32>,
}

impl PartitionOccupancy {
    /// Count the pixels of `pixels`, all given at `nside`.
    pub fn from_pixels<I>(nside: Nside, pixels: I) -> Self
    where
        I: IntoIterator<Item = PixelId>,
    {
        let mut counts: AHashMap<PixelId, u32> = AHashMap::new();
        for pix in pixels {
            let c = counts.entry(pix).or_insert(0);
            *c = c.saturating_add(1);
        }
        PartitionOccupancy { nside, counts }
    }

    #[inline]
    pub fn nside(&self) -> Nside {
        self.nside
    }

    /// Points counted in `pixel` (0 for cells never seen).
    #[inline]
    pub fn count(&self, pixel: PixelId) -> u32 {
        self.counts.get(&pixel).copied().unwrap_or(0)
    }

    pub fn occupied_cells(&self) -> usize {
        self.counts.len()
    }

    pub fn total_points(&self) -> u64 {
        self.counts.values().map(|&c| c as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PixelId, u32)> + '_ {
        self.counts.iter().map(|(&p, &c)| (p, c))
    }

    /// Sorted list of the cells holding strictly more than `threshold` points.
    pub fn cells_above(&self, threshold: u32) -> Vec<PixelId> {
        self.iter()
            .filter(|&(_, c)| c > threshold)
            .map(|(p, _)| p)
            .sorted_unstable()
            .collect()
    }

    /// Statistics of the occupancy, keeping the `top` densest cells.
    pub fn summary(&self, threshold: u32, top: usize) -> OccupancySummary {
        let occupied = self.occupied_cells();
        let total = self.total_points();
        let densest: Vec<(PixelId, u32)> = self
            .iter()
            .sorted_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)))
            .take(top)
            .collect();

        OccupancySummary {
            nside: self.nside,
            occupied_cells: occupied,
            total_points: total,
            mean_per_cell: if occupied == 0 {
                0.0
            } else {
                total as f64 / occupied as f64
            },
            max_per_cell: densest.first().map_or(0, |&(_, c)| c),
            threshold,
            refined_cells: self.iter().filter(|&(_, c)| c > threshold).count(),
            densest,
        }
    }
}

/// Snapshot statistics of a [`PartitionOccupancy`].
///
/// `Display` renders a table; `{:#}` adds the densest cells.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancySummary {
    pub nside: Nside,
    pub occupied_cells: usize,
    pub total_points: u64,
    pub mean_per_cell: f64,
    pub max_per_cell: u32,
    pub threshold: u32,
    pub refined_cells: usize,
    /// Densest cells, most populated first.
    pub densest: Vec<(PixelId, u32)>,
}

impl fmt::Display for OccupancySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![Cell::new("Occupancy"), Cell::new("Value")]);

        let coverage = 100.0 * self.occupied_cells as f64 / self.nside.npix() as f64;
        let rows: [(&str, String); 7] = [
            ("nside", self.nside.to_string()),
            ("points", self.total_points.to_string()),
            (
                "occupied cells",
                format!("{} ({coverage:.2}%)", self.occupied_cells),
            ),
            ("mean / cell", format!("{:.1}", self.mean_per_cell)),
            ("max / cell", self.max_per_cell.to_string()),
            ("threshold", self.threshold.to_string()),
            ("refined cells", self.refined_cells.to_string()),
        ];
        for (name, value) in rows {
            table.add_row(Row::from(vec![
                Cell::new(name),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]));
        }
        if f.alternate() {
            for (pix, count) in &self.densest {
                table.add_row(Row::from(vec![
                    Cell::new(format!("cell {pix}")),
                    Cell::new(count).set_alignment(CellAlignment::Right),
                ]));
            }
        }
        write!(f, "{table}")
    }
}
