//! Per-file complexity history over a trailing time window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexitySample {
    pub timestamp: DateTime<Utc>,
    pub complexity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone)]
pub struct ComplexityHistory {
    window: Duration,
    samples: HashMap<String, VecDeque<ComplexitySample>>,
}

impl ComplexityHistory {
    pub fn new(window_days: u32) -> Self {
        Self {
            window: Duration::days(i64::from(window_days)),
            samples: HashMap::new(),
        }
    }

    /// Append a sample, then drop samples older than the window measured
    /// back from the newest one.
    pub fn record(&mut self, path: &str, complexity: u32, timestamp: DateTime<Utc>) {
        let samples = self.samples.entry(path.to_string()).or_default();
        samples.push_back(ComplexitySample {
            timestamp,
            complexity,
        });

        let newest = samples
            .iter()
            .map(|s| s.timestamp)
            .max()
            .unwrap_or(timestamp);
        let cutoff = newest - self.window;
        samples.retain(|s| s.timestamp >= cutoff);
    }

    pub fn samples(&self, path: &str) -> Vec<ComplexitySample> {
        self.samples
            .get(path)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.samples.keys().map(String::as_str)
    }

    /// Direction of change between the oldest and newest sample in the
    /// window. Moves smaller than a tenth of the starting value (minimum 1)
    /// count as stable.
    pub fn trend(&self, path: &str) -> Trend {
        let Some(samples) = self.samples.get(path) else {
            return Trend::Stable;
        };
        let (Some(first), Some(last)) = (samples.front(), samples.back()) else {
            return Trend::Stable;
        };
        if samples.len() < 2 {
            return Trend::Stable;
        }

        let delta = i64::from(last.complexity) - i64::from(first.complexity);
        let tolerance = (i64::from(first.complexity) / 10).max(1);
        if delta >= tolerance {
            Trend::Increasing
        } else if delta <= -tolerance {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }

    pub fn remove(&mut self, path: &str) {
        self.samples.remove(path);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(days: i64) -> DateTime<Utc> {
        DateTime::<Utc>::default() + Duration::days(days)
    }

    #[test]
    fn test_prunes_to_window() {
        let mut history = ComplexityHistory::new(30);
        history.record("a.rs", 5, at(0));
        history.record("a.rs", 6, at(10));
        history.record("a.rs", 7, at(45));

        let samples = history.samples("a.rs");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].complexity, 7);
    }

    #[test]
    fn test_trend() {
        let mut history = ComplexityHistory::new(30);
        history.record("up.rs", 10, at(0));
        history.record("up.rs", 14, at(1));
        history.record("flat.rs", 10, at(0));
        history.record("flat.rs", 10, at(1));
        history.record("down.rs", 40, at(0));
        history.record("down.rs", 20, at(1));

        assert_eq!(history.trend("up.rs"), Trend::Increasing);
        assert_eq!(history.trend("flat.rs"), Trend::Stable);
        assert_eq!(history.trend("down.rs"), Trend::Decreasing);
        assert_eq!(history.trend("missing.rs"), Trend::Stable);
    }
}
