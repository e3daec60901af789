//! Plain-text matrix files.
//!
//! One matrix row per line, entries separated by whitespace. Blank lines are
//! skipped; every other line must hold the same number of entries.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Read a whitespace-separated matrix, one row per line.
///
/// # Errors
///
/// Returns [`Error::MatrixFile`] if the file cannot be read, an entry is not
/// a number, or the rows are ragged.
pub fn read_matrix(path: impl AsRef<Path>) -> Result<Vec<Vec<f64>>> {
    let path = path.as_ref();
    let fail = |reason: String| Error::MatrixFile {
        path: path.display().to_string(),
        reason,
    };
    let text = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<core::result::Result<Vec<f64>, _>>()
            .map_err(|e| fail(format!("line {}: {e}", line_no + 1)))?;
        let expected = rows.first().map_or(row.len(), Vec::len);
        if row.len() != expected {
            return Err(fail(format!(
                "line {}: expected {expected} entries, found {}",
                line_no + 1,
                row.len()
            )));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Columns of a row-major matrix as separate vectors.
#[must_use]
pub fn columns(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    (0..ncols)
        .map(|j| rows.iter().map(|row| row[j]).collect())
        .collect()
}
