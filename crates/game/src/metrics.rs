use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

/// Prometheus metrics collected by the game service.
pub struct GameMetrics {
    pub registry: Registry,
    pub clicks_total: IntCounter,
    pub clicks_rate_limited: IntCounter,
    pub connections_rejected: IntCounter,
    pub active_connections: IntGauge,
    pub save_failures: IntCounter,
    pub backups_created: IntCounter,
    pub achievements_unlocked: IntCounter,
}

impl GameMetrics {
    /// Create every counter and register it against a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let clicks_total = IntCounter::with_opts(Opts::new(
            "clickrush_clicks_total",
            "Total number of accepted button clicks",
        ))?;
        let clicks_rate_limited = IntCounter::with_opts(Opts::new(
            "clickrush_clicks_rate_limited_total",
            "Total number of clicks rejected by the rate limiter",
        ))?;
        let connections_rejected = IntCounter::with_opts(Opts::new(
            "clickrush_connections_rejected_total",
            "Total number of connections rejected at capacity",
        ))?;
        let active_connections = IntGauge::with_opts(Opts::new(
            "clickrush_active_connections",
            "Number of currently connected clients",
        ))?;
        let save_failures = IntCounter::with_opts(Opts::new(
            "clickrush_save_failures_total",
            "Total number of failed document saves",
        ))?;
        let backups_created = IntCounter::with_opts(Opts::new(
            "clickrush_backups_created_total",
            "Total number of backup snapshots written",
        ))?;
        let achievements_unlocked = IntCounter::with_opts(Opts::new(
            "clickrush_achievements_unlocked_total",
            "Total number of achievement unlock events recorded",
        ))?;

        registry.register(Box::new(clicks_total.clone()))?;
        registry.register(Box::new(clicks_rate_limited.clone()))?;
        registry.register(Box::new(connections_rejected.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(save_failures.clone()))?;
        registry.register(Box::new(backups_created.clone()))?;
        registry.register(Box::new(achievements_unlocked.clone()))?;

        Ok(Self {
            registry,
            clicks_total,
            clicks_rate_limited,
            connections_rejected,
            active_connections,
            save_failures,
            backups_created,
            achievements_unlocked,
        })
    }

    /// Every `clickrush_*` family in the text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
