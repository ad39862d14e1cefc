//! Standardized trade table: rows plus the set of columns present in the
//! source file.

use chrono::NaiveDateTime;

use super::record::{TradeRecord, TradeType};

/// Row filter used by the export path. All criteria are optional and
/// combined with AND; a row with a missing value fails the corresponding
/// comparison and is dropped, matching the source semantics.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    /// Keep rows with `date >= start_date`.
    pub start_date: Option<NaiveDateTime>,

    /// Keep rows with `date <= end_date`.
    pub end_date: Option<NaiveDateTime>,

    /// Keep rows with this derived trade type.
    pub trade_type: Option<TradeType>,

    /// Keep rows with `size >= min_size`.
    pub min_size: Option<f64>,

    /// Keep rows with `size <= max_size`.
    pub max_size: Option<f64>,
}

/// An immutable standardized trade table.
///
/// `columns` lists the normalized source column names in file order, with
/// derived columns appended in computation order. Metrics check column
/// presence here before reading row values: a column that never existed in
/// the source is a soft "no data" condition, not an error.
#[derive(Debug, Clone)]
pub struct TradeTable {
    columns: Vec<String>,
    rows: Vec<TradeRecord>,
}

impl TradeTable {
    pub fn new(columns: Vec<String>, rows: Vec<TradeRecord>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TradeRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Earliest and latest trade timestamps, skipping rows without a date.
    pub fn date_span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut dates = self.rows.iter().filter_map(|r| r.date);
        let first = dates.next()?;
        let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some((min, max))
    }

    /// Apply a filter and return a new table with the same columns.
    ///
    /// Date criteria only apply when the table has a `date` column, and the
    /// trade-type criterion when it has `trade_type`; an inapplicable
    /// criterion is skipped rather than matching nothing.
    pub fn filter(&self, spec: &FilterSpec) -> TradeTable {
        let has_date = self.has_column("date");
        let has_trade_type = self.has_column("trade_type");
        let has_size = self.has_column("size");

        let rows = self
            .rows
            .iter()
            .filter(|r| {
                if let (Some(start), true) = (spec.start_date, has_date) {
                    if !r.date.map_or(false, |d| d >= start) {
                        return false;
                    }
                }
                if let (Some(end), true) = (spec.end_date, has_date) {
                    if !r.date.map_or(false, |d| d <= end) {
                        return false;
                    }
                }
                if let (Some(tt), true) = (spec.trade_type, has_trade_type) {
                    if r.trade_type != tt {
                        return false;
                    }
                }
                if let (Some(min), true) = (spec.min_size, has_size) {
                    if !r.size.map_or(false, |s| s >= min) {
                        return false;
                    }
                }
                if let (Some(max), true) = (spec.max_size, has_size) {
                    if !r.size.map_or(false, |s| s <= max) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        TradeTable {
            columns: self.columns.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn sample_table() -> TradeTable {
        let rows = vec![
            TradeRecord {
                date: Some(ts(1, 10)),
                size: Some(1.0),
                trade_type: TradeType::Open,
                ..Default::default()
            },
            TradeRecord {
                date: Some(ts(2, 11)),
                size: Some(5.0),
                trade_type: TradeType::Close,
                ..Default::default()
            },
            TradeRecord {
                date: None,
                size: None,
                trade_type: TradeType::Unknown,
                ..Default::default()
            },
        ];
        TradeTable::new(
            vec!["date".into(), "size".into(), "trade_type".into()],
            rows,
        )
    }

    #[test]
    fn test_filter_by_date_drops_missing_dates() {
        let table = sample_table();
        let filtered = table.filter(&FilterSpec {
            start_date: Some(ts(1, 0)),
            ..Default::default()
        });
        // The undated row fails the comparison and is dropped.
        assert_eq!(filtered.len(), 2);

        let filtered = table.filter(&FilterSpec {
            start_date: Some(ts(2, 0)),
            ..Default::default()
        });
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_filter_by_trade_type_and_size() {
        let table = sample_table();
        let filtered = table.filter(&FilterSpec {
            trade_type: Some(TradeType::Close),
            ..Default::default()
        });
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.rows()[0].size, Some(5.0));

        let filtered = table.filter(&FilterSpec {
            min_size: Some(0.5),
            max_size: Some(2.0),
            ..Default::default()
        });
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.rows()[0].size, Some(1.0));
    }

    #[test]
    fn test_filter_keeps_columns() {
        let table = sample_table();
        let filtered = table.filter(&FilterSpec::default());
        assert_eq!(filtered.columns(), table.columns());
        assert_eq!(filtered.len(), table.len());
    }

    #[test]
    fn test_date_span_skips_missing() {
        let table = sample_table();
        let (start, end) = table.date_span().unwrap();
        assert_eq!(start, ts(1, 10));
        assert_eq!(end, ts(2, 11));

        let empty = TradeTable::new(vec!["size".into()], vec![TradeRecord::default()]);
        assert!(empty.date_span().is_none());
    }
}
