//! Trading performance analysis.

mod analyzer;

pub use analyzer::{
    BestWorstTrades, DrawdownStats, MetricError, MonthlyPerformance, PnlStatistics,
    PositionChangeStats, RiskMetrics, SizeStats, TradeAnalyzer, TradeSizeStats, TradeSnapshot,
    TradeValueStats, TradingFrequency,
};
