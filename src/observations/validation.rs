//! Pre-ingestion checks on observation records.
//!
//! Findings are **not** fatal by default: they are counted in a [`ValidationReport`] and
//! logged once per category, and the records are ingested anyway (the store refuses what
//! it cannot hold, and the ingest router isolates those rows). With
//! [`ValidationRanges::strict`] set, any finding turns into
//! [`SkyPartError::StrictValidation`].
use std::fmt;

use ahash::{AHashMap, AHashSet};
use serde::Deserialize;

use crate::constants::SourceId;
use crate::observations::{KeyedObservation, Observation};
use crate::partitioning::PartitionKey;
use crate::skypart_errors::SkyPartError;

/// Accepted value ranges, bounds included.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidationRanges {
    pub ra_min: f64,
    pub ra_max: f64,
    pub dec_min: f64,
    pub dec_max: f64,
    pub mag_min: f64,
    pub mag_max: f64,
    /// Fail instead of warning.
    pub strict: bool,
}

impl Default for ValidationRanges {
    fn default() -> Self {
        ValidationRanges {
            ra_min: 0.0,
            ra_max: 360.0,
            dec_min: -90.0,
            dec_max: 90.0,
            mag_min: -5.0,
            mag_max: 30.0,
            strict: false,
        }
    }
}

impl ValidationRanges {
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Counts of the problems found in a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub total: usize,
    pub invalid_ra: usize,
    pub invalid_dec: usize,
    pub invalid_mag: usize,
    /// Rows holding a NaN or infinite value in any float column.
    pub non_finite: usize,
    /// Sources whose records were keyed to more than one partition.
    pub entity_conflicts: usize,
    /// Indices of the first offending rows.
    pub samples: Vec<usize>,
}

const MAX_SAMPLES: usize = 20;

impl ValidationReport {
    pub fn findings(&self) -> usize {
        self.invalid_ra + self.invalid_dec + self.invalid_mag + self.non_finite + self.entity_conflicts
    }

    pub fn is_clean(&self) -> bool {
        self.findings() == 0
    }

    fn log(&self) {
        let categories = [
            ("ra", self.invalid_ra),
            ("dec", self.invalid_dec),
            ("mag", self.invalid_mag),
            ("non-finite", self.non_finite),
            ("entity conflict", self.entity_conflicts),
        ];
        for (category, count) in categories.into_iter().filter(|&(_, c)| c > 0) {
            tracing::warn!(category, count, total = self.total, "invalid records");
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records: {} bad ra, {} bad dec, {} bad mag, {} non-finite, {} entity conflicts",
            self.total,
            self.invalid_ra,
            self.invalid_dec,
            self.invalid_mag,
            self.non_finite,
            self.entity_conflicts
        )
    }
}

fn outside(v: f64, min: f64, max: f64) -> bool {
    v.is_finite() && (v < min || v > max)
}

/// Range and finiteness checks on raw observations.
pub fn validate_observations(
    records: &[Observation],
    ranges: &ValidationRanges,
) -> Result<ValidationReport, SkyPartError> {
    let report = range_report(records.iter(), ranges);
    finish(report, ranges)
}

/// [`validate_observations`] plus the detection of sources keyed to several partitions.
pub fn validate(
    records: &[KeyedObservation],
    ranges: &ValidationRanges,
) -> Result<ValidationReport, SkyPartError> {
    let mut report = range_report(records.iter().map(|r| &r.observation), ranges);

    let mut first_key: AHashMap<SourceId, PartitionKey> = AHashMap::new();
    let mut conflicting: AHashSet<SourceId> = AHashSet::new();
    for r in records {
        let key = *first_key.entry(r.observation.source_id).or_insert(r.key);
        if key != r.key {
            conflicting.insert(r.observation.source_id);
        }
    }
    report.entity_conflicts = conflicting.len();

    finish(report, ranges)
}

fn range_report<'a, I>(records: I, ranges: &ValidationRanges) -> ValidationReport
where
    I: Iterator<Item = &'a Observation>,
{
    let mut report = ValidationReport::default();
    for (i, o) in records.enumerate() {
        report.total += 1;
        let bad_ra = outside(o.ra, ranges.ra_min, ranges.ra_max);
        let bad_dec = outside(o.dec, ranges.dec_min, ranges.dec_max);
        let bad_mag = outside(o.mag, ranges.mag_min, ranges.mag_max);
        let non_finite = !o.has_finite_values();

        report.invalid_ra += bad_ra as usize;
        report.invalid_dec += bad_dec as usize;
        report.invalid_mag += bad_mag as usize;
        report.non_finite += non_finite as usize;

        if (bad_ra || bad_dec || bad_mag || non_finite) && report.samples.len() < MAX_SAMPLES {
            report.samples.push(i);
        }
    }
    report
}

fn finish(
    report: ValidationReport,
    ranges: &ValidationRanges,
) -> Result<ValidationReport, SkyPartError> {
    report.log();
    if ranges.strict && !report.is_clean() {
        return Err(SkyPartError::StrictValidation(report.to_string()));
    }
    Ok(report)
}
