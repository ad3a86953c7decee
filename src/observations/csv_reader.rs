//! Header-driven CSV source of [`Observation`]s.
//!
//! The file must contain the columns `ts, ra, dec, mag, jd_tcb, source_id`, in any order;
//! other columns are ignored. A missing column aborts the read before any row is parsed.
//!
//! Field formats
//! -----------------
//! * `ts` – ISO-8601 (`2024-01-01T12:00:00.250`, optional time scale suffix such as `UTC`
//!   or `TAI`; UTC is assumed without one), the same with a space instead of `T`, or an
//!   integer number of milliseconds since the Unix epoch.
//! * `ra`, `dec`, `mag`, `jd_tcb` – decimal numbers. An empty field reads as `NaN`: the row
//!   is kept and left to validation. A row without a finite position is later rejected by
//!   the partitioner; a `NaN` magnitude or date is refused by the store.
//! * `source_id` – signed integer.
use std::io;
use std::str::FromStr;

use ahash::AHashMap;
use camino::Utf8Path;
use hifitime::Epoch;

use crate::constants::REQUIRED_COLUMNS;
use crate::observations::Observation;
use crate::skypart_errors::SkyPartError;

/// Read every observation of a CSV file.
pub fn read_observations_csv(path: &Utf8Path) -> Result<Vec<Observation>, SkyPartError> {
    let reader = csv::Reader::from_path(path)?;
    let observations = read_from(reader)?;
    tracing::info!(path = %path, records = observations.len(), "observations loaded");
    Ok(observations)
}

/// Read every observation from any CSV byte stream (header row first).
pub fn read_observations<R: io::Read>(source: R) -> Result<Vec<Observation>, SkyPartError> {
    read_from(csv::Reader::from_reader(source))
}

/// Column index of each required field, in [`REQUIRED_COLUMNS`] order.
fn column_indices(headers: &csv::StringRecord) -> Result<[usize; 6], SkyPartError> {
    let by_name: AHashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim(), i))
        .collect();

    let mut indices = [0usize; 6];
    for (slot, name) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = *by_name
            .get(name)
            .ok_or_else(|| SkyPartError::MissingColumn(name.to_string()))?;
    }
    Ok(indices)
}

fn read_from<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<Observation>, SkyPartError> {
    let [ts, ra, dec, mag, jd_tcb, source_id] = column_indices(reader.headers()?)?;

    let mut observations = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();
        let row_error = |reason: String| SkyPartError::CsvRow { line, reason };

        let timestamp = parse_timestamp(field(ts)).map_err(|e| row_error(e.to_string()))?;
        let float = |idx: usize, name: &str| -> Result<f64, SkyPartError> {
            let raw = field(idx);
            if raw.is_empty() {
                return Ok(f64::NAN);
            }
            raw.parse::<f64>()
                .map_err(|e| row_error(format!("{name} = {raw:?}: {e}")))
        };
        let sid = field(source_id)
            .parse::<i64>()
            .map_err(|e| row_error(format!("source_id = {:?}: {e}", field(source_id))))?;

        observations.push(Observation::new(
            timestamp,
            float(ra, "ra")?,
            float(dec, "dec")?,
            float(mag, "mag")?,
            float(jd_tcb, "jd_tcb")?,
            sid,
        ));
    }
    Ok(observations)
}

/// Parse a timestamp field (see the module documentation for the accepted forms).
pub fn parse_timestamp(raw: &str) -> Result<Epoch, SkyPartError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SkyPartError::InvalidTimestamp("empty timestamp".into()));
    }

    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        let ms: i64 = raw
            .parse()
            .map_err(|e| SkyPartError::InvalidTimestamp(format!("{raw}: {e}")))?;
        return Ok(Epoch::from_unix_milliseconds(ms as f64));
    }

    // `YYYY-MM-DD HH:MM:SS` → `YYYY-MM-DDTHH:MM:SS`
    let normalized = if raw.len() > 10 && raw.as_bytes()[10] == b' ' {
        format!("{}T{}", &raw[..10], &raw[11..])
    } else {
        raw.to_string()
    };
    Epoch::from_str(&normalized).map_err(|e| SkyPartError::InvalidTimestamp(format!("{raw}: {e}")))
}
