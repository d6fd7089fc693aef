//! Work list loading and validation.
//!
//! The work list is a two-column CSV file (`schema,table`) with a header
//! row. It is validated in full before anything else happens: one bad row
//! rejects the whole file, so a run never starts on a partially understood
//! list.

use crate::error::ProbeError;
use crate::models::WorkItem;
use crate::Result;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of fields every data row must have.
pub const FIELDS_PER_ROW: usize = 2;

/// Loads and validates a work list file.
///
/// # Errors
/// Returns [`ProbeError::WorkList`] if the file does not exist, does not end
/// in `.csv`, or any data row does not consist of exactly two non-empty
/// fields. I/O and CSV decoding errors are propagated with the path as
/// context.
pub fn load_work_list(path: &Path) -> Result<Vec<WorkItem>> {
    if !path.exists() {
        return Err(ProbeError::work_list(format!(
            "file {} does not exist",
            path.display()
        )));
    }

    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(ProbeError::work_list(format!(
            "file must end in .csv, got {}",
            path.display()
        )));
    }

    let file = File::open(path).map_err(|e| ProbeError::Io {
        context: format!("Failed to open work list {}", path.display()),
        source: e,
    })?;

    let items = parse_work_list(file)?;
    tracing::debug!(
        "Loaded {} work items from {}",
        items.len(),
        path.display()
    );
    Ok(items)
}

/// Parses work list CSV content. The first row is treated as a header and
/// skipped.
///
/// Blank lines are ignored wherever they appear; they carry no table, so
/// they neither add work nor reject the file. Any other row must have
/// exactly two fields.
///
/// # Errors
/// See [`load_work_list`].
pub fn parse_work_list<R: Read>(reader: R) -> Result<Vec<WorkItem>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .quote(b'"')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut items = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| ProbeError::Csv {
            context: "Failed to read work list row".to_string(),
            source: e,
        })?;
        let line = record.position().map_or(0, csv::Position::line);

        if record.len() != FIELDS_PER_ROW {
            return Err(ProbeError::work_list(format!(
                "line {line} has {} field(s); every row must have exactly {FIELDS_PER_ROW} (schema,table)",
                record.len()
            )));
        }

        let (schema, table) = (&record[0], &record[1]);
        if schema.is_empty() || table.is_empty() {
            return Err(ProbeError::work_list(format!(
                "line {line} has an empty schema or table name"
            )));
        }

        items.push(WorkItem::new(schema, table));
    }

    Ok(items)
}
