//! Data standardization: column normalization, type coercion, and derived
//! fields.
//!
//! Steps run in a fixed order:
//! 1. Lower-case headers and join words with underscores.
//! 2. Parse the `date` column and sort rows ascending by date.
//! 3. Coerce the numeric columns; failures become missing values.
//! 4. Derive `trade_type` and `position_change` from `side`.
//! 5. Compute cumulative, calendar, and price-derived columns.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use tracing::info;

use crate::models::{PositionChange, TradeRecord, TradeTable, TradeType};

use super::raw::{LoadError, RawCell, RawTable};

/// Textual date formats accepted in a `date` column, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date-only formats, promoted to midnight timestamps.
const DAY_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Standardize a raw table into a [`TradeTable`].
///
/// An unparseable non-empty date cell is fatal; every other coercion
/// failure degrades to a missing value.
pub fn standardize(raw: RawTable) -> Result<TradeTable, LoadError> {
    let mut columns: Vec<String> = Vec::with_capacity(raw.headers.len());
    for header in &raw.headers {
        let name = normalize_header(header);
        if !columns.contains(&name) {
            columns.push(name);
        }
    }

    let index_of = |name: &str| columns.iter().position(|c| c == name);
    let date_idx = index_of("date");
    let side_idx = index_of("side");
    let market_idx = index_of("market");
    let size_idx = index_of("size");
    let price_idx = index_of("price");
    let trade_value_idx = index_of("trade_value");
    let closed_pnl_idx = index_of("closed_pnl");
    let fee_idx = index_of("fee");

    let mut rows = Vec::with_capacity(raw.rows.len());
    for cells in &raw.rows {
        let cell = |idx: Option<usize>| idx.and_then(|i| cells.get(i)).unwrap_or(&RawCell::Empty);

        let record = TradeRecord {
            date: parse_date(cell(date_idx))?,
            side: text_value(cell(side_idx)),
            market: text_value(cell(market_idx)),
            size: numeric_value(cell(size_idx)),
            price: numeric_value(cell(price_idx)),
            trade_value: numeric_value(cell(trade_value_idx)),
            closed_pnl: numeric_value(cell(closed_pnl_idx)),
            fee: numeric_value(cell(fee_idx)),
            ..Default::default()
        };
        rows.push(record);
    }

    // Sort ascending by date, missing dates last; equal dates keep their
    // original order.
    if date_idx.is_some() {
        rows.sort_by(|a, b| match (a.date, b.date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
    }

    if side_idx.is_some() {
        for row in &mut rows {
            row.trade_type = TradeType::from_side(row.side.as_deref());
            row.position_change = PositionChange::from_side(row.side.as_deref());
        }
        columns.push("trade_type".to_string());
        columns.push("position_change".to_string());
    }

    if closed_pnl_idx.is_some() {
        let mut running = 0.0;
        for row in &mut rows {
            running += row.closed_pnl.unwrap_or(0.0);
            row.cumulative_pnl = Some(running);
        }
        columns.push("cumulative_pnl".to_string());
    }

    if date_idx.is_some() {
        for row in &mut rows {
            if let Some(date) = row.date {
                row.hour = Some(date.hour());
                row.day_of_week = Some(date.format("%A").to_string());
                row.is_weekend = Some(date.weekday().num_days_from_monday() >= 5);
            }
        }
        columns.push("hour".to_string());
        columns.push("day_of_week".to_string());
        columns.push("is_weekend".to_string());
    }

    if price_idx.is_some() {
        compute_price_fields(&mut rows);
        columns.push("price_change".to_string());
        columns.push("price_ma_10".to_string());
    }

    info!(
        rows = rows.len(),
        columns = columns.len(),
        "standardized trade data"
    );

    Ok(TradeTable::new(columns, rows))
}

/// Lower-case a header and join words with underscores ("Closed PnL" ->
/// "closed_pnl").
fn normalize_header(header: &str) -> String {
    header.to_lowercase().replace(' ', "_")
}

fn parse_date(cell: &RawCell) -> Result<Option<NaiveDateTime>, LoadError> {
    match cell {
        RawCell::Empty => Ok(None),
        RawCell::DateTime(dt) => Ok(Some(*dt)),
        RawCell::Text(s) => parse_date_text(s.trim())
            .map(Some)
            .ok_or_else(|| LoadError::InvalidDate(s.clone())),
        RawCell::Number(n) => Err(LoadError::InvalidDate(n.to_string())),
        RawCell::Bool(b) => Err(LoadError::InvalidDate(b.to_string())),
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDateTime> {
    for format in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DAY_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn text_value(cell: &RawCell) -> Option<String> {
    match cell {
        RawCell::Empty => None,
        RawCell::Text(s) => Some(s.clone()),
        RawCell::Number(n) => Some(n.to_string()),
        RawCell::Bool(b) => Some(b.to_string()),
        RawCell::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

fn numeric_value(cell: &RawCell) -> Option<f64> {
    // A NaN is a missing value, not an observation.
    match cell {
        RawCell::Number(n) => Some(*n).filter(|v| !v.is_nan()),
        RawCell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
        RawCell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        RawCell::Empty | RawCell::DateTime(_) => None,
    }
}

/// Percent change pads over missing prices (a gap is compared against the
/// last observed price); the trailing mean requires a full window of ten
/// observed prices.
fn compute_price_fields(rows: &mut [TradeRecord]) {
    let mut prev: Option<f64> = None;
    for row in rows.iter_mut() {
        let current = row.price.or(prev);
        row.price_change = match (prev, current) {
            (Some(p), Some(c)) => Some((c - p) / p),
            _ => None,
        };
        prev = current;
    }

    let prices: Vec<Option<f64>> = rows.iter().map(|r| r.price).collect();
    for (i, row) in rows.iter_mut().enumerate() {
        if i + 1 >= 10 {
            let window = &prices[i + 1 - 10..=i];
            if window.iter().all(|p| p.is_some()) {
                let sum: f64 = window.iter().map(|p| p.unwrap_or(0.0)).sum();
                row.price_ma_10 = Some(sum / 10.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::raw::read_csv_from;
    use super::*;

    fn load(csv: &str) -> TradeTable {
        standardize(read_csv_from(csv.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn test_headers_are_normalized() {
        let table = load("Date,Closed PnL,Trade Value\n2025-01-01,1,2\n");
        assert!(table.has_column("date"));
        assert!(table.has_column("closed_pnl"));
        assert!(table.has_column("trade_value"));
    }

    #[test]
    fn test_rows_sorted_by_date() {
        let table = load(
            "Date,Closed PnL\n2025-01-03 10:00:00,3\n2025-01-01 10:00:00,1\n2025-01-02 10:00:00,2\n",
        );
        let pnl: Vec<f64> = table.rows().iter().filter_map(|r| r.closed_pnl).collect();
        assert_eq!(pnl, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_cumulative_pnl_is_prefix_sum() {
        let table = load(
            "Date,Closed PnL\n2025-01-01,10\n2025-01-02,-5\n2025-01-03,15\n2025-01-04,-8\n2025-01-05,12\n",
        );
        let cumulative: Vec<f64> = table
            .rows()
            .iter()
            .filter_map(|r| r.cumulative_pnl)
            .collect();
        assert_eq!(cumulative, vec![10.0, 5.0, 20.0, 12.0, 24.0]);

        // Last cumulative value equals the sum of non-missing P&L.
        let total: f64 = table.rows().iter().filter_map(|r| r.closed_pnl).sum();
        assert_eq!(cumulative.last().copied(), Some(total));
    }

    #[test]
    fn test_missing_pnl_counts_as_zero_in_cumulative() {
        let table = load("Date,Closed PnL\n2025-01-01,10\n2025-01-02,\n2025-01-03,5\n");
        let cumulative: Vec<f64> = table
            .rows()
            .iter()
            .filter_map(|r| r.cumulative_pnl)
            .collect();
        assert_eq!(cumulative, vec![10.0, 10.0, 15.0]);
    }

    #[test]
    fn test_numeric_coercion_failure_becomes_missing() {
        let table = load("Date,Size,Price\n2025-01-01,abc,100\n2025-01-02,2.5,n/a\n");
        assert_eq!(table.rows()[0].size, None);
        assert_eq!(table.rows()[0].price, Some(100.0));
        assert_eq!(table.rows()[1].size, Some(2.5));
        assert_eq!(table.rows()[1].price, None);
    }

    #[test]
    fn test_unparseable_date_is_fatal() {
        let raw = read_csv_from("Date,Closed PnL\nnot-a-date,1\n".as_bytes()).unwrap();
        assert!(matches!(standardize(raw), Err(LoadError::InvalidDate(_))));
    }

    #[test]
    fn test_empty_date_is_missing_and_sorts_last() {
        let table = load("Date,Closed PnL\n,5\n2025-01-01,1\n");
        assert_eq!(table.rows()[0].closed_pnl, Some(1.0));
        assert!(table.rows()[1].date.is_none());
    }

    #[test]
    fn test_calendar_fields() {
        // 2025-01-04 was a Saturday, 2025-01-06 a Monday.
        let table = load("Date,Closed PnL\n2025-01-04 13:30:00,1\n2025-01-06 09:15:00,2\n");
        let saturday = &table.rows()[0];
        assert_eq!(saturday.hour, Some(13));
        assert_eq!(saturday.day_of_week.as_deref(), Some("Saturday"));
        assert_eq!(saturday.is_weekend, Some(true));

        let monday = &table.rows()[1];
        assert_eq!(monday.day_of_week.as_deref(), Some("Monday"));
        assert_eq!(monday.is_weekend, Some(false));
    }

    #[test]
    fn test_side_categories_derived() {
        let table = load("Date,Side\n2025-01-01,Open Long\n2025-01-02,Short > Long\n2025-01-03,\n");
        assert_eq!(table.rows()[0].trade_type, TradeType::Open);
        assert_eq!(table.rows()[0].position_change, PositionChange::Long);
        assert_eq!(table.rows()[1].trade_type, TradeType::Flip);
        assert_eq!(table.rows()[1].position_change, PositionChange::ShortToLong);
        assert_eq!(table.rows()[2].trade_type, TradeType::Unknown);
        assert_eq!(table.rows()[2].position_change, PositionChange::Unknown);
    }

    #[test]
    fn test_price_change_pads_over_gaps() {
        let table = load("Date,Price\n2025-01-01,100\n2025-01-02,\n2025-01-03,110\n");
        assert_eq!(table.rows()[0].price_change, None);
        // Missing price padded with the previous one: zero change.
        assert_eq!(table.rows()[1].price_change, Some(0.0));
        let change = table.rows()[2].price_change.unwrap();
        assert!((change - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_price_ma_requires_full_window() {
        let mut csv = String::from("Date,Price\n");
        for day in 1..=12 {
            csv.push_str(&format!("2025-01-{day:02},{}\n", day as f64));
        }
        let table = load(&csv);

        assert_eq!(table.rows()[8].price_ma_10, None);
        // Mean of 1..=10 is 5.5, of 2..=11 is 6.5.
        assert_eq!(table.rows()[9].price_ma_10, Some(5.5));
        assert_eq!(table.rows()[10].price_ma_10, Some(6.5));
    }

    #[test]
    fn test_derived_columns_registered_only_when_source_present() {
        let table = load("Closed PnL,Size\n5,1\n");
        assert!(table.has_column("cumulative_pnl"));
        assert!(!table.has_column("trade_type"));
        assert!(!table.has_column("hour"));
        assert!(!table.has_column("price_change"));
    }
}
