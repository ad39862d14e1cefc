//! Report assembly: composes the metric outputs into a single JSON
//! document.
//!
//! The report is pure aggregation; every number comes from the analyzer.
//! Sections appear in a fixed order, metric failures serialize as
//! `{"error": "..."}` markers, and non-finite floats are encoded as text
//! so the document always parses.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::analysis::{
    DrawdownStats, MetricError, PnlStatistics, PositionChangeStats, RiskMetrics, TradeAnalyzer,
    TradeSizeStats, TradingFrequency,
};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// A metric section: either the computed statistics or the "no data"
/// marker for the column that was missing.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetricBlock<T> {
    Ready(T),
    Unavailable { error: String },
}

impl<T> From<Result<T, MetricError>> for MetricBlock<T> {
    fn from(result: Result<T, MetricError>) -> Self {
        match result {
            Ok(value) => MetricBlock::Ready(value),
            Err(e) => MetricBlock::Unavailable {
                error: e.to_string(),
            },
        }
    }
}

impl<T> MetricBlock<T> {
    pub fn as_ready(&self) -> Option<&T> {
        match self {
            MetricBlock::Ready(value) => Some(value),
            MetricBlock::Unavailable { .. } => None,
        }
    }
}

/// Row count and date span of the analyzed table.
#[derive(Debug, Clone, Serialize)]
pub struct DataOverview {
    pub total_trades: usize,

    /// "start to end", or "N/A" without a date column.
    pub data_time_range: String,
}

/// The assembled performance report. Field order is the serialization
/// order.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub report_generation_time: String,
    pub data_overview: DataOverview,
    pub pnl_statistics: MetricBlock<PnlStatistics>,
    pub drawdown: MetricBlock<DrawdownStats>,
    pub trading_frequency: MetricBlock<TradingFrequency>,
    pub position_changes: MetricBlock<PositionChangeStats>,
    pub risk_metrics: MetricBlock<RiskMetrics>,
    pub trade_size_stats: MetricBlock<TradeSizeStats>,
}

impl Report {
    /// Assemble a report from the analyzer's outputs.
    pub fn generate(analyzer: &TradeAnalyzer) -> Self {
        let table = analyzer.table();
        let data_time_range = match table.date_span() {
            Some((start, end)) => format!(
                "{} to {}",
                start.format("%Y-%m-%d %H:%M:%S"),
                end.format("%Y-%m-%d %H:%M:%S")
            ),
            None => "N/A".to_string(),
        };

        Report {
            report_generation_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            data_overview: DataOverview {
                total_trades: table.len(),
                data_time_range,
            },
            pnl_statistics: analyzer.pnl_statistics().into(),
            drawdown: analyzer.drawdown().into(),
            trading_frequency: analyzer.trading_frequency().into(),
            position_changes: analyzer.position_changes().into(),
            risk_metrics: analyzer.risk_metrics().into(),
            trade_size_stats: analyzer.trade_size_stats().into(),
        }
    }

    /// Serialize with 2-space indentation; non-ASCII stays unescaped.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report into `dir` under a timestamped filename and return
    /// the path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        let filename = format!(
            "trade_analysis_report_{}.json",
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(filename);
        fs::write(&path, self.to_json()?)?;
        info!(path = %path.display(), "saved analysis report");
        Ok(path)
    }
}
