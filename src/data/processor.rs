//! Stateful data processor: owns the loaded table and provides summary,
//! filter, and export operations over it.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::models::{json, FilterSpec, TradeRecord, TradeTable};

use super::export::{write_csv, write_excel};
use super::raw::{read_csv, read_excel, LoadError};
use super::standardize::standardize;

/// Errors from operations on the processor's held table.
#[derive(Debug, Error)]
pub enum DataError {
    /// Summary, filter, or export was requested before a successful load.
    #[error("no data loaded")]
    NoData,

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Export file format, inferred from the destination extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Excel,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "xlsx" | "xls" => Some(ExportFormat::Excel),
            _ => None,
        }
    }
}

/// Overview of the loaded table: counts, totals, and data quality.
#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    pub total_trades: usize,

    pub data_time_range: TimeRange,

    /// Sum of realized P&L; absent without a `closed_pnl` column.
    #[serde(serialize_with = "json::float_opt")]
    pub total_pnl: Option<f64>,

    /// Sum of fees; absent without a `fee` column.
    #[serde(serialize_with = "json::float_opt")]
    pub total_fees: Option<f64>,

    /// Mean trade value; absent without a `trade_value` column.
    #[serde(serialize_with = "json::float_opt")]
    pub average_trade_value: Option<f64>,

    pub trade_type_distribution: BTreeMap<String, u64>,

    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataQuality {
    /// Missing-value count per column.
    pub missing_values: BTreeMap<String, u64>,

    /// Rows identical to an earlier row across all columns.
    pub duplicate_rows: u64,
}

/// Loads a trade history file and retains the standardized table for
/// summary, filter, and export operations.
#[derive(Debug, Default)]
pub struct TradeDataProcessor {
    data: Option<TradeTable>,
}

impl TradeDataProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and standardize a CSV file, retaining the result.
    pub fn load_csv(&mut self, path: &Path) -> Result<&TradeTable, LoadError> {
        let table = standardize(read_csv(path)?)?;
        Ok(self.data.insert(table))
    }

    /// Load and standardize an Excel file (first sheet unless named),
    /// retaining the result.
    pub fn load_excel(
        &mut self,
        path: &Path,
        sheet: Option<&str>,
    ) -> Result<&TradeTable, LoadError> {
        let table = standardize(read_excel(path, sheet)?)?;
        Ok(self.data.insert(table))
    }

    /// Load a file, dispatching on its extension (`.csv` vs `.xlsx`/`.xls`).
    pub fn load(&mut self, path: &Path, sheet: Option<&str>) -> Result<&TradeTable, LoadError> {
        let is_excel = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_lowercase().as_str(), "xlsx" | "xls"))
            .unwrap_or(false);

        if is_excel {
            self.load_excel(path, sheet)
        } else {
            self.load_csv(path)
        }
    }

    /// The held table, if a load has succeeded.
    pub fn data(&self) -> Option<&TradeTable> {
        self.data.as_ref()
    }

    fn require_data(&self) -> Result<&TradeTable, DataError> {
        self.data.as_ref().ok_or(DataError::NoData)
    }

    /// Summarize the held table.
    pub fn summary(&self) -> Result<DataSummary, DataError> {
        let table = self.require_data()?;

        let span = table.date_span();
        let format = |d: chrono::NaiveDateTime| d.format("%Y-%m-%d %H:%M:%S").to_string();

        let sum_of = |values: Vec<f64>| values.into_iter().sum::<f64>();

        let total_pnl = table
            .has_column("closed_pnl")
            .then(|| sum_of(table.rows().iter().filter_map(|r| r.closed_pnl).collect()));
        let total_fees = table
            .has_column("fee")
            .then(|| sum_of(table.rows().iter().filter_map(|r| r.fee).collect()));
        let average_trade_value = table.has_column("trade_value").then(|| {
            let values: Vec<f64> = table.rows().iter().filter_map(|r| r.trade_value).collect();
            let count = values.len();
            if count == 0 {
                f64::NAN
            } else {
                sum_of(values) / count as f64
            }
        });

        let mut trade_type_distribution = BTreeMap::new();
        if table.has_column("trade_type") {
            for row in table.rows() {
                *trade_type_distribution
                    .entry(row.trade_type.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }

        Ok(DataSummary {
            total_trades: table.len(),
            data_time_range: TimeRange {
                start: span.map(|(s, _)| format(s)),
                end: span.map(|(_, e)| format(e)),
            },
            total_pnl,
            total_fees,
            average_trade_value,
            trade_type_distribution,
            data_quality: DataQuality {
                missing_values: missing_values(table),
                duplicate_rows: duplicate_rows(table),
            },
        })
    }

    /// Filter the held table, returning a new table; the held one is
    /// untouched.
    pub fn filter(&self, spec: &FilterSpec) -> Result<TradeTable, DataError> {
        Ok(self.require_data()?.filter(spec))
    }

    /// Export the held table to `path` in the given format.
    pub fn export(&self, path: &Path, format: ExportFormat) -> Result<(), DataError> {
        export_table(self.require_data()?, path, format)
    }
}

/// Export a table to `path` in the given format.
pub fn export_table(table: &TradeTable, path: &Path, format: ExportFormat) -> Result<(), DataError> {
    match format {
        ExportFormat::Csv => {
            let file = File::create(path)?;
            write_csv(table, BufWriter::new(file))?;
        }
        ExportFormat::Excel => write_excel(table, path)?,
    }

    info!(path = %path.display(), rows = table.len(), "exported trade data");
    Ok(())
}

fn missing_values(table: &TradeTable) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for column in table.columns() {
        let count = table
            .rows()
            .iter()
            .filter(|r| is_missing(r, column))
            .count() as u64;
        counts.insert(column.clone(), count);
    }
    counts
}

fn is_missing(row: &TradeRecord, column: &str) -> bool {
    match column {
        "date" => row.date.is_none(),
        "side" => row.side.is_none(),
        "market" => row.market.is_none(),
        "size" => row.size.is_none(),
        "price" => row.price.is_none(),
        "trade_value" => row.trade_value.is_none(),
        "closed_pnl" => row.closed_pnl.is_none(),
        "fee" => row.fee.is_none(),
        "cumulative_pnl" => row.cumulative_pnl.is_none(),
        "hour" => row.hour.is_none(),
        "day_of_week" => row.day_of_week.is_none(),
        "is_weekend" => row.is_weekend.is_none(),
        "price_change" => row.price_change.is_none(),
        "price_ma_10" => row.price_ma_10.is_none(),
        // Categorical derivations always carry a value (Unknown at worst),
        // and unrecognized source columns carry none to count.
        _ => false,
    }
}

fn duplicate_rows(table: &TradeTable) -> u64 {
    let mut seen = HashSet::new();
    let mut duplicates = 0;
    for row in table.rows() {
        if !seen.insert(row_key(row)) {
            duplicates += 1;
        }
    }
    duplicates
}

type RowKey = (
    (Option<i64>, Option<String>, Option<String>, &'static str, &'static str),
    [Option<u64>; 8],
    (Option<u32>, Option<String>, Option<bool>),
);

/// Hashable identity of a row across every column, including derived ones:
/// two raw duplicates with different cumulative P&L are distinct rows.
fn row_key(row: &TradeRecord) -> RowKey {
    let bits = |v: Option<f64>| v.map(f64::to_bits);
    (
        (
            row.date.map(|d| d.and_utc().timestamp()),
            row.side.clone(),
            row.market.clone(),
            row.trade_type.as_str(),
            row.position_change.as_str(),
        ),
        [
            bits(row.size),
            bits(row.price),
            bits(row.trade_value),
            bits(row.closed_pnl),
            bits(row.fee),
            bits(row.cumulative_pnl),
            bits(row.price_change),
            bits(row.price_ma_10),
        ],
        (row.hour, row.day_of_week.clone(), row.is_weekend),
    )
}
