use ractor::concurrency::{Duration, Instant};

/// Default restart allowance: 3 restarts per 5 seconds.
pub const DEFAULT_MAX_RESTARTS: usize = 3;
/// Default restart window.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Sliding-window cap on restart churn.
///
/// `max_restarts == 0` disables restarts entirely: the first restart
/// attempt escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartLimit {
    /// How many restarts the window tolerates.
    pub max_restarts: usize,
    /// The width of the rolling window.
    pub interval: Duration,
}

impl RestartLimit {
    /// A limit of `max_restarts` per `interval`.
    pub fn new(max_restarts: usize, interval: Duration) -> Self {
        Self {
            max_restarts,
            interval,
        }
    }
}

impl Default for RestartLimit {
    fn default() -> Self {
        Self {
            max_restarts: DEFAULT_MAX_RESTARTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Instants of recent restarts, pruned to the configured window.
#[derive(Debug, Default)]
pub(crate) struct RestartHistory {
    marks: Vec<Instant>,
}

impl RestartHistory {
    /// Charge one restart at `now` and report whether the limit still
    /// permits it. Marks older than the window are dropped first, so the
    /// `(max_restarts + 1)`-th charge within any rolling interval denies.
    pub fn record(&mut self, now: Instant, limit: RestartLimit) -> bool {
        self.marks
            .retain(|mark| now.saturating_duration_since(*mark) < limit.interval);
        self.marks.push(now);
        self.marks.len() <= limit.max_restarts
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.marks.len()
    }
}
