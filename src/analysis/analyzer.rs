//! Trade performance analysis over a standardized table.
//!
//! Every operation is a pure function of the table: P&L statistics,
//! drawdown, trading frequency, position changes, risk ratios, trade
//! sizes, best/worst trades, and monthly performance. A metric whose
//! required column is absent (or empty after dropping missing values)
//! reports a soft [`MetricError`] rather than failing the analysis.

use std::collections::BTreeMap;

use serde::Serialize;
use statrs::statistics::Statistics;
use thiserror::Error;

use crate::models::{json, TradeTable};

/// Annualization basis in days.
const DAYS_PER_YEAR: f64 = 365.25;

/// Assumed risk-free rate for the Sharpe ratio.
const RISK_FREE_RATE: f64 = 0.03;

/// Weekday names in calendar order, used to resolve the most active day.
const WEEKDAY_ORDER: &[&str] = &[
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Soft per-metric condition: the data needed for one metric family is
/// absent. Carries the human-readable marker reported in its place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error("No P&L data available")]
    NoPnl,

    #[error("No valid P&L data available")]
    NoValidPnl,

    #[error("No cumulative P&L data available")]
    NoCumulativePnl,

    #[error("No valid cumulative P&L data available")]
    NoValidCumulativePnl,

    #[error("No date data available")]
    NoDates,

    #[error("No position change data available")]
    NoPositionChanges,

    #[error("No trade size data available")]
    NoTradeSizes,
}

/// P&L distribution statistics.
#[derive(Debug, Clone, Serialize)]
pub struct PnlStatistics {
    #[serde(serialize_with = "json::float")]
    pub total_pnl: f64,
    #[serde(serialize_with = "json::float")]
    pub average_pnl: f64,
    #[serde(serialize_with = "json::float")]
    pub pnl_std: f64,
    #[serde(serialize_with = "json::float")]
    pub max_profit: f64,
    #[serde(serialize_with = "json::float")]
    pub max_loss: f64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub breakeven_trades: u64,
    pub total_trades: u64,
    /// Percentage of winning trades, 0 to 100.
    #[serde(serialize_with = "json::float")]
    pub win_rate: f64,
    #[serde(serialize_with = "json::float")]
    pub average_win: f64,
    /// Mean of the losing subset; keeps its negative sign.
    #[serde(serialize_with = "json::float")]
    pub average_loss: f64,
    /// |average win / average loss|; +inf when there are wins but no
    /// losses, 0 when there are neither.
    #[serde(serialize_with = "json::float")]
    pub profit_factor: f64,
}

/// Drawdown of the cumulative P&L curve from its running peak.
#[derive(Debug, Clone, Serialize)]
pub struct DrawdownStats {
    /// Most negative drawdown amount (the maximum drawdown).
    #[serde(serialize_with = "json::float")]
    pub max_drawdown_amount: f64,
    #[serde(serialize_with = "json::float")]
    pub max_drawdown_percentage: f64,
    #[serde(serialize_with = "json::float")]
    pub current_drawdown: f64,
    #[serde(serialize_with = "json::float")]
    pub current_drawdown_percentage: f64,
    #[serde(serialize_with = "json::float")]
    pub peak_value: f64,
    #[serde(serialize_with = "json::float")]
    pub current_value: f64,
    /// Number of rows below the running peak.
    pub drawdown_periods: u64,
    /// Longest contiguous run of rows below the running peak; a run still
    /// open at the end of the table counts.
    pub longest_drawdown_period: u64,
}

/// Trade counts by day, hour, and weekday.
#[derive(Debug, Clone, Serialize)]
pub struct TradingFrequency {
    pub total_trading_days: u64,
    #[serde(serialize_with = "json::float")]
    pub average_daily_trades: f64,
    pub max_daily_trades: u64,
    pub daily_trade_distribution: BTreeMap<String, u64>,
    pub hourly_trade_distribution: BTreeMap<u32, u64>,
    pub weekly_trade_distribution: BTreeMap<String, u64>,
    /// Busiest hour; ties resolve to the smallest hour.
    pub most_active_hour: Option<u32>,
    /// Busiest weekday; ties resolve to the earliest weekday.
    pub most_active_day: Option<String>,
}

/// Distribution of directional transitions.
#[derive(Debug, Clone, Serialize)]
pub struct PositionChangeStats {
    pub position_change_distribution: BTreeMap<String, u64>,
    pub total_operations: u64,
    /// Long plus short-to-long trades.
    pub long_operations: u64,
    /// Short plus long-to-short trades.
    pub short_operations: u64,
    /// Trades that flipped direction either way.
    pub direction_changes: u64,
}

/// Annualized risk and tail-risk metrics.
#[derive(Debug, Clone, Serialize)]
pub struct RiskMetrics {
    #[serde(serialize_with = "json::float")]
    pub annualized_return: f64,
    #[serde(serialize_with = "json::float")]
    pub annualized_volatility: f64,
    #[serde(serialize_with = "json::float")]
    pub sharpe_ratio: f64,
    #[serde(serialize_with = "json::float")]
    pub calmar_ratio: f64,
    /// 5th percentile of the P&L distribution.
    #[serde(serialize_with = "json::float")]
    pub var_95: f64,
    /// Mean of P&L values at or below the VaR.
    #[serde(serialize_with = "json::float")]
    pub cvar_95: f64,
    pub analysis_period_days: Option<i64>,
    #[serde(serialize_with = "json::float")]
    pub analysis_period_years: f64,
}

/// Distribution statistics for `size`.
#[derive(Debug, Clone, Serialize)]
pub struct SizeStats {
    #[serde(serialize_with = "json::float")]
    pub average_trade_size: f64,
    #[serde(serialize_with = "json::float")]
    pub trade_size_std: f64,
    #[serde(serialize_with = "json::float")]
    pub max_trade_size: f64,
    #[serde(serialize_with = "json::float")]
    pub min_trade_size: f64,
    #[serde(serialize_with = "json::float")]
    pub trade_size_median: f64,
}

/// Distribution statistics for `trade_value`.
#[derive(Debug, Clone, Serialize)]
pub struct TradeValueStats {
    #[serde(serialize_with = "json::float")]
    pub average_trade_value: f64,
    #[serde(serialize_with = "json::float")]
    pub trade_value_std: f64,
    #[serde(serialize_with = "json::float")]
    pub max_trade_value: f64,
    #[serde(serialize_with = "json::float")]
    pub min_trade_value: f64,
    #[serde(serialize_with = "json::float")]
    pub trade_value_median: f64,
    #[serde(serialize_with = "json::float")]
    pub total_trade_value: f64,
}

/// Combined size statistics; either block may be absent when its column is.
#[derive(Debug, Clone, Serialize)]
pub struct TradeSizeStats {
    #[serde(flatten)]
    pub size: Option<SizeStats>,
    #[serde(flatten)]
    pub trade_value: Option<TradeValueStats>,
}

/// A trade projected for the best/worst listing.
#[derive(Debug, Clone, Serialize)]
pub struct TradeSnapshot {
    pub date: Option<String>,
    pub side: Option<String>,
    #[serde(serialize_with = "json::float")]
    pub closed_pnl: f64,
    #[serde(serialize_with = "json::float_opt")]
    pub size: Option<f64>,
    #[serde(serialize_with = "json::float_opt")]
    pub price: Option<f64>,
}

/// Top and bottom trades by realized P&L.
#[derive(Debug, Clone, Serialize)]
pub struct BestWorstTrades {
    pub best_trades: Vec<TradeSnapshot>,
    pub worst_trades: Vec<TradeSnapshot>,
}

/// One calendar month of aggregated performance.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyPerformance {
    /// Month key, `YYYY-MM`.
    pub month: String,
    #[serde(serialize_with = "json::float")]
    pub pnl_sum: f64,
    pub trade_count: u64,
    #[serde(serialize_with = "json::float")]
    pub pnl_mean: f64,
    #[serde(serialize_with = "json::float")]
    pub trade_value_sum: f64,
    /// Running sum of the monthly P&L sums, chronological.
    #[serde(serialize_with = "json::float")]
    pub cumulative_pnl: f64,
}

/// Stateless analyzer over a borrowed standardized table.
pub struct TradeAnalyzer<'a> {
    table: &'a TradeTable,
}

impl<'a> TradeAnalyzer<'a> {
    pub fn new(table: &'a TradeTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TradeTable {
        self.table
    }

    /// P&L aggregates, win/loss counts, and the profit factor.
    pub fn pnl_statistics(&self) -> Result<PnlStatistics, MetricError> {
        if !self.table.has_column("closed_pnl") {
            return Err(MetricError::NoPnl);
        }

        let pnl: Vec<f64> = self
            .table
            .rows()
            .iter()
            .filter_map(|r| r.closed_pnl)
            .collect();
        if pnl.is_empty() {
            return Err(MetricError::NoValidPnl);
        }

        let winning = pnl.iter().filter(|&&v| v > 0.0).count() as u64;
        let losing = pnl.iter().filter(|&&v| v < 0.0).count() as u64;
        let breakeven = pnl.iter().filter(|&&v| v == 0.0).count() as u64;
        let total = pnl.len() as u64;

        let wins: Vec<f64> = pnl.iter().copied().filter(|&v| v > 0.0).collect();
        let losses: Vec<f64> = pnl.iter().copied().filter(|&v| v < 0.0).collect();
        let average_win = if wins.is_empty() { 0.0 } else { wins.clone().mean() };
        let average_loss = if losses.is_empty() {
            0.0
        } else {
            losses.clone().mean()
        };

        let profit_factor = if average_loss != 0.0 {
            (average_win / average_loss).abs()
        } else if average_win > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Ok(PnlStatistics {
            total_pnl: pnl.iter().sum(),
            average_pnl: pnl.clone().mean(),
            pnl_std: pnl.clone().std_dev(),
            max_profit: pnl.clone().max(),
            max_loss: pnl.clone().min(),
            winning_trades: winning,
            losing_trades: losing,
            breakeven_trades: breakeven,
            total_trades: total,
            win_rate: winning as f64 / total as f64 * 100.0,
            average_win,
            average_loss,
            profit_factor,
        })
    }

    /// Drawdown of the cumulative P&L curve.
    pub fn drawdown(&self) -> Result<DrawdownStats, MetricError> {
        if !self.table.has_column("cumulative_pnl") {
            return Err(MetricError::NoCumulativePnl);
        }

        let cumulative: Vec<f64> = self
            .table
            .rows()
            .iter()
            .filter_map(|r| r.cumulative_pnl)
            .collect();
        if cumulative.is_empty() {
            return Err(MetricError::NoValidCumulativePnl);
        }

        let mut peak = f64::NEG_INFINITY;
        let mut drawdown = Vec::with_capacity(cumulative.len());
        let mut drawdown_pct = Vec::with_capacity(cumulative.len());
        for &value in &cumulative {
            peak = peak.max(value);
            let dd = value - peak;
            drawdown.push(dd);
            // Percentage is undefined against a zero peak.
            drawdown_pct.push(if peak != 0.0 {
                dd / peak * 100.0
            } else {
                f64::NAN
            });
        }

        // NaN-skipping minima, like the source aggregation.
        let max_drawdown_amount = drawdown.iter().copied().fold(f64::NAN, f64::min);
        let max_drawdown_percentage = drawdown_pct.iter().copied().fold(f64::NAN, f64::min);

        let mut longest = 0u64;
        let mut current_run = 0u64;
        for &dd in &drawdown {
            if dd < 0.0 {
                current_run += 1;
                longest = longest.max(current_run);
            } else {
                current_run = 0;
            }
        }

        Ok(DrawdownStats {
            max_drawdown_amount,
            max_drawdown_percentage,
            current_drawdown: *drawdown.last().unwrap_or(&0.0),
            current_drawdown_percentage: *drawdown_pct.last().unwrap_or(&f64::NAN),
            peak_value: peak,
            current_value: *cumulative.last().unwrap_or(&0.0),
            drawdown_periods: drawdown.iter().filter(|&&dd| dd < 0.0).count() as u64,
            longest_drawdown_period: longest,
        })
    }

    /// Trade counts per day, hour, and weekday.
    pub fn trading_frequency(&self) -> Result<TradingFrequency, MetricError> {
        if !self.table.has_column("date") {
            return Err(MetricError::NoDates);
        }

        let mut daily: BTreeMap<String, u64> = BTreeMap::new();
        let mut hourly: BTreeMap<u32, u64> = BTreeMap::new();
        let mut weekly: BTreeMap<String, u64> = BTreeMap::new();
        for row in self.table.rows() {
            if let Some(date) = row.date {
                *daily.entry(date.date().to_string()).or_insert(0) += 1;
            }
            if let Some(hour) = row.hour {
                *hourly.entry(hour).or_insert(0) += 1;
            }
            if let Some(day) = &row.day_of_week {
                *weekly.entry(day.clone()).or_insert(0) += 1;
            }
        }

        let counts: Vec<f64> = daily.values().map(|&c| c as f64).collect();
        let most_active_hour = hourly
            .iter()
            .fold(None, |best: Option<(u32, u64)>, (&hour, &count)| {
                match best {
                    Some((_, best_count)) if best_count >= count => best,
                    _ => Some((hour, count)),
                }
            })
            .map(|(hour, _)| hour);
        let most_active_day = WEEKDAY_ORDER
            .iter()
            .filter_map(|day| weekly.get(*day).map(|&count| (*day, count)))
            .fold(None, |best: Option<(&str, u64)>, (day, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((day, count)),
            })
            .map(|(day, _)| day.to_string());

        Ok(TradingFrequency {
            total_trading_days: daily.len() as u64,
            average_daily_trades: counts.mean(),
            max_daily_trades: daily.values().copied().max().unwrap_or(0),
            daily_trade_distribution: daily,
            hourly_trade_distribution: hourly,
            weekly_trade_distribution: weekly,
            most_active_hour,
            most_active_day,
        })
    }

    /// Distribution and aggregates of directional transitions.
    pub fn position_changes(&self) -> Result<PositionChangeStats, MetricError> {
        if !self.table.has_column("position_change") {
            return Err(MetricError::NoPositionChanges);
        }

        let mut distribution: BTreeMap<String, u64> = BTreeMap::new();
        for row in self.table.rows() {
            *distribution
                .entry(row.position_change.as_str().to_string())
                .or_insert(0) += 1;
        }

        let count = |key: &str| distribution.get(key).copied().unwrap_or(0);
        Ok(PositionChangeStats {
            total_operations: self.table.len() as u64,
            long_operations: count("Long") + count("Short_to_Long"),
            short_operations: count("Short") + count("Long_to_Short"),
            direction_changes: count("Short_to_Long") + count("Long_to_Short"),
            position_change_distribution: distribution,
        })
    }

    /// Annualized return/volatility, Sharpe, Calmar, and tail risk.
    pub fn risk_metrics(&self) -> Result<RiskMetrics, MetricError> {
        if !self.table.has_column("closed_pnl") {
            return Err(MetricError::NoPnl);
        }

        let pnl: Vec<f64> = self
            .table
            .rows()
            .iter()
            .filter_map(|r| r.closed_pnl)
            .collect();
        if pnl.is_empty() {
            return Err(MetricError::NoValidPnl);
        }

        let (analysis_period_days, years) = if self.table.has_column("date") {
            match self.table.date_span() {
                Some((start, end)) => {
                    let days = (end - start).num_days();
                    (Some(days), days as f64 / DAYS_PER_YEAR)
                }
                None => (None, f64::NAN),
            }
        } else {
            // No date column: assume a one-year span.
            (None, 1.0)
        };

        let total_pnl: f64 = pnl.iter().sum();
        let annualized_return = if years > 0.0 { total_pnl / years } else { 0.0 };
        let annualized_volatility = pnl.clone().std_dev() * DAYS_PER_YEAR.sqrt();

        let sharpe_ratio = if annualized_volatility != 0.0 {
            (annualized_return - RISK_FREE_RATE) / annualized_volatility
        } else {
            0.0
        };

        // Absent drawdown stats default the denominator to 1; the guard
        // below only checks for an exact zero.
        let max_drawdown = self
            .drawdown()
            .map(|d| d.max_drawdown_amount.abs())
            .unwrap_or(1.0);
        let calmar_ratio = if max_drawdown != 0.0 {
            annualized_return / max_drawdown
        } else {
            0.0
        };

        let mut sorted = pnl.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let var_95 = percentile(&sorted, 5.0);
        let tail: Vec<f64> = pnl.iter().copied().filter(|&v| v <= var_95).collect();

        Ok(RiskMetrics {
            annualized_return,
            annualized_volatility,
            sharpe_ratio,
            calmar_ratio,
            var_95,
            cvar_95: tail.mean(),
            analysis_period_days,
            analysis_period_years: years,
        })
    }

    /// Distribution statistics for trade sizes and values.
    pub fn trade_size_stats(&self) -> Result<TradeSizeStats, MetricError> {
        let has_size = self.table.has_column("size");
        let has_value = self.table.has_column("trade_value");
        if !has_size && !has_value {
            return Err(MetricError::NoTradeSizes);
        }

        let size = has_size.then(|| {
            let values: Vec<f64> = self.table.rows().iter().filter_map(|r| r.size).collect();
            SizeStats {
                average_trade_size: values.clone().mean(),
                trade_size_std: values.clone().std_dev(),
                max_trade_size: values.clone().max(),
                min_trade_size: values.clone().min(),
                trade_size_median: median(&values),
            }
        });

        let trade_value = has_value.then(|| {
            let values: Vec<f64> = self
                .table
                .rows()
                .iter()
                .filter_map(|r| r.trade_value)
                .collect();
            TradeValueStats {
                average_trade_value: values.clone().mean(),
                trade_value_std: values.clone().std_dev(),
                max_trade_value: values.clone().max(),
                min_trade_value: values.clone().min(),
                trade_value_median: median(&values),
                total_trade_value: values.iter().sum(),
            }
        });

        Ok(TradeSizeStats { size, trade_value })
    }

    /// The `n` largest and `n` smallest trades by realized P&L. Ties keep
    /// their original row order.
    pub fn best_worst_trades(&self, n: usize) -> Result<BestWorstTrades, MetricError> {
        if !self.table.has_column("closed_pnl") {
            return Err(MetricError::NoPnl);
        }

        let ranked: Vec<(usize, f64)> = self
            .table
            .rows()
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.closed_pnl.map(|pnl| (i, pnl)))
            .collect();

        let snapshot = |&(i, pnl): &(usize, f64)| {
            let row = &self.table.rows()[i];
            TradeSnapshot {
                date: row.date.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
                side: row.side.clone(),
                closed_pnl: pnl,
                size: row.size,
                price: row.price,
            }
        };

        let mut best = ranked.clone();
        best.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut worst = ranked;
        worst.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(BestWorstTrades {
            best_trades: best.iter().take(n).map(snapshot).collect(),
            worst_trades: worst.iter().take(n).map(snapshot).collect(),
        })
    }

    /// Performance aggregated by calendar month, chronological. Empty when
    /// the date or P&L column is absent.
    pub fn monthly_performance(&self) -> Vec<MonthlyPerformance> {
        if !self.table.has_column("date") || !self.table.has_column("closed_pnl") {
            return Vec::new();
        }

        let has_value = self.table.has_column("trade_value");
        let mut months: BTreeMap<String, (Vec<f64>, f64)> = BTreeMap::new();
        for row in self.table.rows() {
            let Some(date) = row.date else { continue };
            let key = date.format("%Y-%m").to_string();
            let entry = months.entry(key).or_default();
            if let Some(pnl) = row.closed_pnl {
                entry.0.push(pnl);
            }
            if has_value {
                entry.1 += row.trade_value.unwrap_or(0.0);
            }
        }

        let mut cumulative = 0.0;
        months
            .into_iter()
            .map(|(month, (pnl, value_sum))| {
                let pnl_sum = round4(pnl.iter().sum());
                cumulative += pnl_sum;
                MonthlyPerformance {
                    month,
                    pnl_sum,
                    trade_count: pnl.len() as u64,
                    pnl_mean: round4(pnl.mean()),
                    trade_value_sum: round4(value_sum),
                    cumulative_pnl: cumulative,
                }
            })
            .collect()
    }
}

/// Linear-interpolation percentile over a sorted slice, NaN when empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted {
        [] => f64::NAN,
        [only] => *only,
        _ => {
            let rank = p / 100.0 * (sorted.len() - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            if lo == hi {
                sorted[lo]
            } else {
                sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
            }
        }
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    percentile(&sorted, 50.0)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
