//! # Observation records
//!
//! One [`Observation`] is one photometric measurement of one source at one instant, the
//! row unit of the time-series store. After partition assignment it travels as a
//! [`KeyedObservation`], carrying the [`PartitionKey`] it is stored under.
//!
//! Submodules
//! -----------------
//! * [`csv_reader`] – header-driven CSV source of observations.
//! * [`validation`] – range checks and entity-consistency checks run before ingestion.
use hifitime::Epoch;

use crate::constants::{Degree, JulianDate, SourceId};
use crate::coordinates::SkyPoint;
use crate::partitioning::PartitionKey;

pub mod csv_reader;
pub mod validation;

/// A single measurement of a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Primary timestamp of the measurement.
    pub ts: Epoch,
    /// Right ascension, degrees.
    pub ra: Degree,
    /// Declination, degrees.
    pub dec: Degree,
    /// Apparent magnitude.
    pub mag: f64,
    /// Secondary time axis: Julian date in the TCB scale.
    pub jd_tcb: JulianDate,
    /// Identifier of the observed source.
    pub source_id: SourceId,
}

impl Observation {
    pub fn new(
        ts: Epoch,
        ra: Degree,
        dec: Degree,
        mag: f64,
        jd_tcb: JulianDate,
        source_id: SourceId,
    ) -> Self {
        Observation {
            ts,
            ra,
            dec,
            mag,
            jd_tcb,
            source_id,
        }
    }

    #[inline]
    pub fn position(&self) -> SkyPoint {
        SkyPoint::new(self.ra, self.dec)
    }

    /// `true` when every floating-point column holds a finite number.
    pub fn has_finite_values(&self) -> bool {
        self.ra.is_finite() && self.dec.is_finite() && self.mag.is_finite() && self.jd_tcb.is_finite()
    }
}

/// An observation together with the partition key it is routed to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyedObservation {
    pub key: PartitionKey,
    pub observation: Observation,
}

impl KeyedObservation {
    pub fn new(key: PartitionKey, observation: Observation) -> Self {
        KeyedObservation { key, observation }
    }
}
