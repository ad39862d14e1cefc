//! Table export: CSV (UTF-8 with BOM) and Excel.
//!
//! Headers are written exactly as the table stores them, with no
//! transformation. Missing values export as empty cells.

use std::io::Write;
use std::path::Path;

use crate::models::{TradeRecord, TradeTable};

use super::processor::DataError;

/// A typed cell on its way out of the table.
enum ExportCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl ExportCell {
    fn into_text(self) -> String {
        match self {
            ExportCell::Empty => String::new(),
            ExportCell::Text(s) => s,
            ExportCell::Number(n) => n.to_string(),
            // Title-case booleans, matching upstream trade exports.
            ExportCell::Bool(true) => "True".to_string(),
            ExportCell::Bool(false) => "False".to_string(),
        }
    }
}

/// Write the table as CSV to any writer, prefixed with a UTF-8 BOM.
pub fn write_csv<W: Write>(table: &TradeTable, mut writer: W) -> Result<(), DataError> {
    writer.write_all("\u{feff}".as_bytes())?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.columns())?;

    for row in table.rows() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|column| cell_value(row, column).into_text())
            .collect();
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write the table as an Excel workbook.
pub fn write_excel(table: &TradeTable, path: &Path) -> Result<(), DataError> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, name) in table.columns().iter().enumerate() {
        worksheet.write_string(0, col as u16, name.as_str())?;
    }

    for (i, row) in table.rows().iter().enumerate() {
        let excel_row = (i + 1) as u32;
        for (col, name) in table.columns().iter().enumerate() {
            let excel_col = col as u16;
            match cell_value(row, name) {
                ExportCell::Empty => {}
                ExportCell::Text(s) => {
                    worksheet.write_string(excel_row, excel_col, s.as_str())?;
                }
                ExportCell::Number(n) => {
                    worksheet.write_number(excel_row, excel_col, n)?;
                }
                ExportCell::Bool(b) => {
                    worksheet.write_boolean(excel_row, excel_col, b)?;
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn cell_value(row: &TradeRecord, column: &str) -> ExportCell {
    fn num(value: Option<f64>) -> ExportCell {
        value.map_or(ExportCell::Empty, ExportCell::Number)
    }
    fn text(value: Option<&String>) -> ExportCell {
        value.map_or(ExportCell::Empty, |s| ExportCell::Text(s.clone()))
    }

    match column {
        "date" => row.date.map_or(ExportCell::Empty, |d| {
            ExportCell::Text(d.format("%Y-%m-%d %H:%M:%S").to_string())
        }),
        "side" => text(row.side.as_ref()),
        "market" => text(row.market.as_ref()),
        "size" => num(row.size),
        "price" => num(row.price),
        "trade_value" => num(row.trade_value),
        "closed_pnl" => num(row.closed_pnl),
        "fee" => num(row.fee),
        "trade_type" => ExportCell::Text(row.trade_type.as_str().to_string()),
        "position_change" => ExportCell::Text(row.position_change.as_str().to_string()),
        "cumulative_pnl" => num(row.cumulative_pnl),
        "hour" => row
            .hour
            .map_or(ExportCell::Empty, |h| ExportCell::Number(f64::from(h))),
        "day_of_week" => text(row.day_of_week.as_ref()),
        "is_weekend" => row.is_weekend.map_or(ExportCell::Empty, ExportCell::Bool),
        "price_change" => num(row.price_change),
        "price_ma_10" => num(row.price_ma_10),
        // Unrecognized source column: the name is preserved but no value
        // is carried through standardization.
        _ => ExportCell::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::super::raw::read_csv_from;
    use super::super::standardize::standardize;
    use super::*;

    fn sample_table() -> TradeTable {
        let csv = "Date,Side,Closed PnL,Size,Price\n\
                   2025-01-01 10:00:00,Long,10.5,1,100\n\
                   2025-01-02 11:00:00,Short,-5.25,2,98\n";
        standardize(read_csv_from(csv.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn test_csv_export_starts_with_bom() {
        let mut buf = Vec::new();
        write_csv(&sample_table(), &mut buf).unwrap();
        assert!(buf.starts_with("\u{feff}".as_bytes()));
    }

    #[test]
    fn test_csv_export_keeps_headers_untransformed() {
        let mut buf = Vec::new();
        write_csv(&sample_table(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let header_line = text.trim_start_matches('\u{feff}').lines().next().unwrap();
        assert_eq!(
            header_line,
            "date,side,closed_pnl,size,price,trade_type,position_change,\
             cumulative_pnl,hour,day_of_week,is_weekend,price_change,price_ma_10"
        );
    }

    #[test]
    fn test_export_reload_round_trip_preserves_pnl_total() {
        let table = sample_table();
        let total: f64 = table.rows().iter().filter_map(|r| r.closed_pnl).sum();

        let mut buf = Vec::new();
        write_csv(&table, &mut buf).unwrap();

        let reloaded = standardize(read_csv_from(buf.as_slice()).unwrap()).unwrap();
        let reloaded_total: f64 = reloaded.rows().iter().filter_map(|r| r.closed_pnl).sum();
        assert!((total - reloaded_total).abs() < 1e-9);
    }
}
