//! Timeline tuning knobs.

use adreel_core::RationalTime;
use serde::{Deserialize, Serialize};

/// Settings for edit validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Tolerance when checking that merged clips touch, in milliseconds.
    pub adjacency_epsilon_ms: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            adjacency_epsilon_ms: 1.0,
        }
    }
}

impl TimelineConfig {
    /// Adjacency tolerance as a time value. Negative or non-finite
    /// settings collapse to exact comparison.
    pub fn adjacency_epsilon(&self) -> RationalTime {
        RationalTime::try_from_seconds_f64(self.adjacency_epsilon_ms / 1000.0)
            .map(|e| e.max(RationalTime::ZERO))
            .unwrap_or(RationalTime::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_epsilon_is_one_millisecond() {
        assert_eq!(
            TimelineConfig::default().adjacency_epsilon(),
            RationalTime::from_millis(1)
        );
    }

    #[test]
    fn test_bad_epsilon_is_exact() {
        for ms in [-3.0, f64::NAN, f64::INFINITY] {
            let cfg = TimelineConfig {
                adjacency_epsilon_ms: ms,
            };
            assert_eq!(cfg.adjacency_epsilon(), RationalTime::ZERO);
        }
    }
}
