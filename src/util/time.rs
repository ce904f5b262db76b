//! Time utilities for the match clock and reports

use std::time::Instant;

use serde::Serialize;

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default timer cadence (1 Hz)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// Remaining time split for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemainingTime {
    pub minutes: u32,
    pub seconds: u32,
}

impl RemainingTime {
    pub fn from_secs(total: u32) -> Self {
        Self {
            minutes: total / 60,
            seconds: total % 60,
        }
    }

    pub fn zero() -> Self {
        Self::from_secs(0)
    }
}

impl std::fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

/// Format a survival duration as `XmYs`, or `Ys` under a minute
pub fn format_survival(total_secs: u64) -> String {
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_time_splits_minutes() {
        let t = RemainingTime::from_secs(125);
        assert_eq!(t.minutes, 2);
        assert_eq!(t.seconds, 5);
        assert_eq!(t.to_string(), "2:05");
    }

    #[test]
    fn survival_format_drops_zero_minutes() {
        assert_eq!(format_survival(42), "42s");
        assert_eq!(format_survival(61), "1m1s");
        assert_eq!(format_survival(0), "0s");
    }
}
