// src/services/csv_source.rs
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, Trim};

use crate::models::RawObservation;

/// Reads `index_name,date,high,close` rows (with a header line).
pub fn read_observations<R: io::Read>(reader: R) -> Result<Vec<RawObservation>, csv::Error> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    rdr.deserialize().collect()
}

pub fn read_observations_file<P: AsRef<Path>>(path: P) -> Result<Vec<RawObservation>, csv::Error> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
    rdr.deserialize().collect()
}
