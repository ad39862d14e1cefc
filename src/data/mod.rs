//! Data loading, standardization, and export.

mod export;
mod processor;
mod raw;
mod standardize;

pub use processor::{export_table, DataError, DataSummary, ExportFormat, TradeDataProcessor};
pub use raw::{read_csv, read_csv_from, read_excel, LoadError, RawCell, RawTable};
pub use standardize::standardize;
