//! Raw tabular file readers.
//!
//! CSV and Excel inputs are read into an untyped [`RawTable`] before
//! standardization. CSV cells arrive as text; Excel cells keep the types
//! the workbook stored (numbers, booleans, datetimes).

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::info;

/// Fatal load failure: the source file cannot be read, decoded, or parsed
/// as tabular data.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read workbook: {0}")]
    Excel(#[from] calamine::Error),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("input has no columns")]
    NoColumns,

    #[error("unparseable date value: {0:?}")]
    InvalidDate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single untyped cell from the source file.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

/// An untyped table straight from the source file: headers in file order
/// and one cell vector per row.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

/// Read a CSV file.
pub fn read_csv(path: &Path) -> Result<RawTable, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound(path.display().to_string()));
    }

    let file = File::open(path)?;
    let table = read_csv_from(BufReader::new(file))?;
    info!(
        path = %path.display(),
        rows = table.rows.len(),
        columns = table.headers.len(),
        "loaded CSV file"
    );
    Ok(table)
}

/// Read CSV data from any reader. A UTF-8 BOM before the first header is
/// stripped so exported files (written with a BOM) reload cleanly.
pub fn read_csv_from(reader: impl Read) -> Result<RawTable, LoadError> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    if headers.is_empty() {
        return Err(LoadError::NoColumns);
    }

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        RawCell::Empty
                    } else {
                        RawCell::Text(cell.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawTable { headers, rows })
}

/// Read an Excel workbook. `sheet` selects a worksheet by name; `None`
/// reads the first sheet.
pub fn read_excel(path: &Path, sheet: Option<&str>) -> Result<RawTable, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound(path.display().to_string()));
    }

    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(LoadError::NoSheets)?,
    };
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut row_iter = range.rows();
    let headers: Vec<String> = row_iter
        .next()
        .ok_or(LoadError::NoColumns)?
        .iter()
        .map(cell_text)
        .collect();

    if headers.is_empty() {
        return Err(LoadError::NoColumns);
    }

    let rows: Vec<Vec<RawCell>> = row_iter
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    info!(
        path = %path.display(),
        sheet = %sheet_name,
        rows = rows.len(),
        columns = headers.len(),
        "loaded Excel file"
    );

    Ok(RawTable { headers, rows })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn convert_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty | Data::Error(_) => RawCell::Empty,
        Data::String(s) if s.is_empty() => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Bool(b) => RawCell::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(RawCell::DateTime)
            .unwrap_or(RawCell::Empty),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv_from_bytes() {
        let data = "Date,Closed PnL,Side\n2025-01-01 10:00:00,10.5,Long\n2025-01-02 11:00:00,,Short\n";
        let table = read_csv_from(data.as_bytes()).unwrap();

        assert_eq!(table.headers, vec!["Date", "Closed PnL", "Side"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], RawCell::Text("10.5".to_string()));
        assert_eq!(table.rows[1][1], RawCell::Empty);
    }

    #[test]
    fn test_read_csv_strips_bom() {
        let data = "\u{feff}Date,Size\n2025-01-01,1\n";
        let table = read_csv_from(data.as_bytes()).unwrap();
        assert_eq!(table.headers[0], "Date");
    }

    #[test]
    fn test_ragged_rows_are_fatal() {
        let data = "a,b,c\n1,2,3\n1,2\n";
        assert!(matches!(
            read_csv_from(data.as_bytes()),
            Err(LoadError::Csv(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = read_csv(Path::new("/nonexistent/trades.csv")).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound(_)));
    }
}
