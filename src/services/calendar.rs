// src/services/calendar.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;

use crate::models::{Observation, RawObservation};
use super::analysis::{AnalysisError, Result};

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Reduces a stored date or timestamp to the calendar day it falls on in `zone`.
///
/// Timestamps with an offset are converted into `zone` once. Timestamps without
/// one are already wall-clock time in `zone`, so only the date part is kept.
pub fn canonical_date(raw: &str, zone: Tz) -> Result<NaiveDate> {
    let s = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&zone).date_naive());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(s, fmt) {
            return Ok(ts.with_timezone(&zone).date_naive());
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts.date());
        }
    }

    Err(AnalysisError::InvalidInput(format!("unparseable date '{}'", raw)))
}

/// Normalizes every row; the first bad date fails the batch.
pub fn normalize(rows: Vec<RawObservation>, zone: Tz) -> Result<Vec<Observation>> {
    rows.into_iter()
        .map(|row| {
            let date = canonical_date(&row.date, zone).map_err(|e| {
                AnalysisError::InvalidInput(format!("{}: {}", row.index_name, e))
            })?;
            Ok(Observation {
                index_name: row.index_name,
                date,
                high: row.high,
                close: row.close,
            })
        })
        .collect()
}
