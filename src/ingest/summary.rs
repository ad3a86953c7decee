use std::fmt;
use std::time::Duration;

use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Row, Table};

use super::progress::fmt_dur;

/// Outcome of one ingestion.
///
/// `success + errors` equals the number of records handed to the router when the call
/// returns `Ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestSummary {
    /// Rows the store accepted.
    pub success: u64,
    /// Rows dropped: rejected individually, or part of a group whose partition could not
    /// be created.
    pub errors: u64,
    /// Number of `(key, source_id)` groups.
    pub groups: usize,
    /// Distinct partition keys.
    pub partitions: usize,
    /// Distinct source ids.
    pub entities: usize,
    pub elapsed: Duration,
}

impl IngestSummary {
    pub fn total(&self) -> u64 {
        self.success + self.errors
    }

    /// Share of accepted rows, in percent (0 for an empty ingestion).
    pub fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => 100.0 * self.success as f64 / n as f64,
        }
    }

    pub fn rows_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.success as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![Cell::new("Ingestion"), Cell::new("Value")]);

        let rows: [(&str, String); 8] = [
            ("rows written", self.success.to_string()),
            ("rows dropped", self.errors.to_string()),
            ("success rate", format!("{:.2}%", self.success_rate())),
            ("elapsed", fmt_dur(self.elapsed)),
            ("rows / s", format!("{:.0}", self.rows_per_second())),
            ("partitions", self.partitions.to_string()),
            ("sources", self.entities.to_string()),
            ("sub-tables", self.groups.to_string()),
        ];
        for (name, value) in rows {
            table.add_row(Row::from(vec![
                Cell::new(name),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]));
        }
        write!(f, "{table}")
    }
}
