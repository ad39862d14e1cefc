//! Trade record model: one standardized row of a trade history export.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Trade type derived from the free-text `side` column.
///
/// Classification is substring-based and case-insensitive, first match wins:
/// "open" -> Open, "close" -> Close, ">" -> Flip, anything else -> Other.
/// A missing side is Unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    Open,
    Close,
    Flip,
    Other,
    #[default]
    Unknown,
}

impl TradeType {
    /// Classify a raw side string.
    pub fn from_side(side: Option<&str>) -> Self {
        let Some(side) = side else {
            return TradeType::Unknown;
        };

        let side = side.to_lowercase();
        if side.contains("open") {
            TradeType::Open
        } else if side.contains("close") {
            TradeType::Close
        } else if side.contains('>') {
            TradeType::Flip
        } else {
            TradeType::Other
        }
    }

    /// Parse a user-supplied category name (used by export filters).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(TradeType::Open),
            "close" => Some(TradeType::Close),
            "flip" => Some(TradeType::Flip),
            "other" => Some(TradeType::Other),
            "unknown" => Some(TradeType::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Open => "Open",
            TradeType::Close => "Close",
            TradeType::Flip => "Flip",
            TradeType::Other => "Other",
            TradeType::Unknown => "Unknown",
        }
    }
}

/// Directional transition derived from the free-text `side` column.
///
/// Derived independently of [`TradeType`]: the two classifiers apply their
/// own substring rules to the same string and may disagree about what a
/// side "means". That mirrors the upstream data source, where e.g.
/// "Close Long" is a Close trade and a Long position change at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionChange {
    Long,
    Short,
    #[serde(rename = "Short_to_Long")]
    ShortToLong,
    #[serde(rename = "Long_to_Short")]
    LongToShort,
    Other,
    #[default]
    Unknown,
}

impl PositionChange {
    /// Classify a raw side string.
    pub fn from_side(side: Option<&str>) -> Self {
        let Some(side) = side else {
            return PositionChange::Unknown;
        };

        let side = side.to_lowercase();
        if side.contains("long") && !side.contains("short") {
            PositionChange::Long
        } else if side.contains("short") && !side.contains("long") {
            PositionChange::Short
        } else if side.contains("short > long") {
            PositionChange::ShortToLong
        } else if side.contains("long > short") {
            PositionChange::LongToShort
        } else {
            PositionChange::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionChange::Long => "Long",
            PositionChange::Short => "Short",
            PositionChange::ShortToLong => "Short_to_Long",
            PositionChange::LongToShort => "Long_to_Short",
            PositionChange::Other => "Other",
            PositionChange::Unknown => "Unknown",
        }
    }
}

/// One standardized trade row.
///
/// Base columns are `None` when the source cell was empty or failed numeric
/// coercion. Derived columns are computed once by the standardizer, in
/// date-sorted order, and are never recomputed afterwards.
#[derive(Debug, Clone, Default)]
pub struct TradeRecord {
    /// Trade timestamp. Missing when the source cell was empty.
    pub date: Option<NaiveDateTime>,

    /// Free-text direction string, e.g. "Open Long" or "Short > Long".
    pub side: Option<String>,

    /// Market / instrument identifier.
    pub market: Option<String>,

    /// Number of units traded.
    pub size: Option<f64>,

    /// Execution price.
    pub price: Option<f64>,

    /// Total value of the trade.
    pub trade_value: Option<f64>,

    /// Realized P&L of the trade.
    pub closed_pnl: Option<f64>,

    /// Fee paid.
    pub fee: Option<f64>,

    // === Derived columns ===
    /// Categorical trade type from `side`.
    pub trade_type: TradeType,

    /// Categorical position change from `side`.
    pub position_change: PositionChange,

    /// Running sum of `closed_pnl` (missing treated as 0) in date order.
    pub cumulative_pnl: Option<f64>,

    /// Hour of day (0-23) of the trade timestamp.
    pub hour: Option<u32>,

    /// English weekday name of the trade timestamp.
    pub day_of_week: Option<String>,

    /// True for Saturday and Sunday trades.
    pub is_weekend: Option<bool>,

    /// Percent change of `price` against the previous observed price.
    pub price_change: Option<f64>,

    /// Trailing 10-row mean of `price`; present once 10 prices accumulate.
    pub price_ma_10: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_type_from_side() {
        assert_eq!(TradeType::from_side(Some("Open Long")), TradeType::Open);
        assert_eq!(TradeType::from_side(Some("Close Short")), TradeType::Close);
        assert_eq!(TradeType::from_side(Some("Short > Long")), TradeType::Flip);
        assert_eq!(TradeType::from_side(Some("Long")), TradeType::Other);
        assert_eq!(TradeType::from_side(None), TradeType::Unknown);
    }

    #[test]
    fn test_trade_type_first_match_wins() {
        // "open" is checked before "close" and ">".
        assert_eq!(TradeType::from_side(Some("Open > Close")), TradeType::Open);
        assert_eq!(TradeType::from_side(Some("Close Long > Short")), TradeType::Close);
    }

    #[test]
    fn test_position_change_from_side() {
        assert_eq!(PositionChange::from_side(Some("Long")), PositionChange::Long);
        assert_eq!(PositionChange::from_side(Some("Open Short")), PositionChange::Short);
        assert_eq!(
            PositionChange::from_side(Some("Short > Long")),
            PositionChange::ShortToLong
        );
        assert_eq!(
            PositionChange::from_side(Some("Long > Short")),
            PositionChange::LongToShort
        );
        assert_eq!(PositionChange::from_side(Some("Buy")), PositionChange::Other);
        assert_eq!(PositionChange::from_side(None), PositionChange::Unknown);
    }

    #[test]
    fn test_classifiers_are_independent() {
        // One side string feeds both classifiers with different rules.
        let side = Some("Close Long");
        assert_eq!(TradeType::from_side(side), TradeType::Close);
        assert_eq!(PositionChange::from_side(side), PositionChange::Long);
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(PositionChange::ShortToLong.as_str(), "Short_to_Long");
        assert_eq!(PositionChange::LongToShort.as_str(), "Long_to_Short");
        assert_eq!(TradeType::Flip.as_str(), "Flip");
    }
}
