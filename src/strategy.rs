use crate::window::RestartLimit;

/// Which way the restart engine walks the sibling list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Insertion order.
    LeftToRight,
    /// Reverse insertion order.
    RightToLeft,
}

impl Direction {
    pub(crate) fn order<T>(self, mut items: Vec<T>) -> Vec<T> {
        if self == Direction::RightToLeft {
            items.reverse();
        }
        items
    }
}

/// How a group of siblings is cycled during a group restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartMode {
    /// Walk the group in the given direction; for each sibling terminate
    /// it and immediately restart it before touching the next one.
    RestartEach(Direction),
    /// First terminate the whole group in the given direction, then start
    /// the whole group in the same direction.
    RestartInOrder(Direction),
}

impl RestartMode {
    /// The direction this mode walks in.
    pub fn direction(&self) -> Direction {
        match self {
            RestartMode::RestartEach(dir) | RestartMode::RestartInOrder(dir) => *dir,
        }
    }
}

/// Which siblings a child failure drags into a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartStrategy {
    /// Restart only the failed child.
    RestartOne {
        /// Intensity cap for this supervisor.
        limit: RestartLimit,
    },
    /// Restart the failed child and every sibling inserted after it.
    RestartRest {
        /// Intensity cap for this supervisor.
        limit: RestartLimit,
        /// How the affected group is cycled.
        mode: RestartMode,
    },
    /// Restart every non-temporary sibling.
    RestartAll {
        /// Intensity cap for this supervisor.
        limit: RestartLimit,
        /// How the affected group is cycled.
        mode: RestartMode,
    },
}

impl RestartStrategy {
    /// The intensity cap carried by this strategy.
    pub fn limit(&self) -> RestartLimit {
        match self {
            RestartStrategy::RestartOne { limit }
            | RestartStrategy::RestartRest { limit, .. }
            | RestartStrategy::RestartAll { limit, .. } => *limit,
        }
    }
}

impl Default for RestartStrategy {
    fn default() -> Self {
        RestartStrategy::RestartOne {
            limit: RestartLimit::default(),
        }
    }
}
