//! CSV reader for the Pima table
//!
//! Rows are `Pregnancies,Glucose,BloodPressure,SkinThickness,Insulin,BMI,
//! DiabetesPedigreeFunction,Age,Outcome`. Blank lines and `#` comments are
//! skipped and a leading header row is detected and ignored.

use super::record::{
    DatasetOrigin, Outcome, PatientFeatures, PatientRecord, PimaDataset, N_FEATURES,
};
use crate::core::FetchError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Feature columns plus the outcome
const N_COLUMNS: usize = N_FEATURES + 1;

impl PimaDataset {
    /// Load the table from a CSV file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FetchError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let records = parse_records(BufReader::new(file))?;
        Ok(Self::new(records, DatasetOrigin::File(path.to_path_buf())))
    }

    /// Load the table from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R, origin: DatasetOrigin) -> Result<Self, FetchError> {
        let records = parse_records(reader)?;
        Ok(Self::new(records, origin))
    }
}

/// Parse every data row of a Pima CSV body
pub fn parse_records<R: BufRead>(reader: R) -> Result<Vec<PatientRecord>, FetchError> {
    let mut records = Vec::new();
    let mut seen_content = false;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        let line_number = index + 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if !seen_content {
            seen_content = true;
            if is_header_line(line) {
                continue;
            }
        }

        records.push(parse_data_line(line, line_number)?);
    }

    if records.is_empty() {
        return Err(FetchError::Empty);
    }

    Ok(records)
}

/// Check if a line appears to be a header
fn is_header_line(line: &str) -> bool {
    let fields: Vec<&str> = line.split(',').collect();
    let non_numeric = fields
        .iter()
        .filter(|field| field.trim().parse::<f64>().is_err())
        .count();

    non_numeric > fields.len() / 2
}

fn parse_data_line(line: &str, line_number: usize) -> Result<PatientRecord, FetchError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();

    if fields.len() != N_COLUMNS {
        return Err(FetchError::Parse {
            line: line_number,
            message: format!("expected {N_COLUMNS} fields, found {}", fields.len()),
        });
    }

    let mut features = [0.0; N_FEATURES];
    for (column, field) in fields.iter().take(N_FEATURES).enumerate() {
        let value = field.parse::<f64>().map_err(|_| FetchError::Parse {
            line: line_number,
            message: format!("invalid value in column {}: {field:?}", column + 1),
        })?;
        if !value.is_finite() {
            return Err(FetchError::Parse {
                line: line_number,
                message: format!("non-finite value in column {}", column + 1),
            });
        }
        features[column] = value;
    }

    let outcome_field = fields[N_FEATURES];
    let outcome = outcome_field
        .parse::<f64>()
        .ok()
        .filter(|v| *v == 0.0 || *v == 1.0)
        .and_then(|v| Outcome::from_code(v as u8))
        .ok_or_else(|| FetchError::Parse {
            line: line_number,
            message: format!("outcome must be 0 or 1, got {outcome_field:?}"),
        })?;

    Ok(PatientRecord::new(PatientFeatures::from_array(features), outcome))
}
