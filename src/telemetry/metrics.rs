//! Counter and gauge instrumentation

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Signals assessed by the risk engine
    SignalsAssessed,
    /// Decisions approved for execution
    DecisionsApproved,
    /// Decisions rejected, any reason
    DecisionsRejected,
    /// Entry orders filled
    EntriesFilled,
    /// Positions fully closed
    PositionsClosed,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Current equity
    Equity,
    /// Realized P&L for the session
    DailyPnl,
    /// Open position count
    OpenPositions,
    /// Pending entry intent count
    PendingIntents,
}

/// Increment a counter
pub fn increment(metric: CounterMetric, value: u64) {
    let metric_name = match metric {
        CounterMetric::SignalsAssessed => "intraday_signals_assessed_total",
        CounterMetric::DecisionsApproved => "intraday_decisions_approved_total",
        CounterMetric::DecisionsRejected => "intraday_decisions_rejected_total",
        CounterMetric::EntriesFilled => "intraday_entries_filled_total",
        CounterMetric::PositionsClosed => "intraday_positions_closed_total",
    };
    metrics::counter!(metric_name).increment(value);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::Equity => "intraday_equity_usd",
        GaugeMetric::DailyPnl => "intraday_daily_pnl_usd",
        GaugeMetric::OpenPositions => "intraday_open_positions",
        GaugeMetric::PendingIntents => "intraday_pending_intents",
    };
    metrics::gauge!(metric_name).set(value);
}
