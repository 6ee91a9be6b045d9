// Bounded per-channel history backing trend charts
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 20;

/// Most recent values with their timestamps, index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct History {
    window: usize,
    values: VecDeque<f64>,
    timestamps: VecDeque<DateTime<Utc>>,
}

impl History {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            values: VecDeque::with_capacity(window),
            timestamps: VecDeque::with_capacity(window),
        }
    }

    pub fn append(&mut self, value: f64, at: DateTime<Utc>) {
        self.values.push_back(value);
        self.timestamps.push_back(at);
        while self.values.len() > self.window {
            self.values.pop_front();
            self.timestamps.pop_front();
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.timestamps.iter().copied()
    }

    pub fn points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.timestamps().zip(self.values())
    }

    pub fn latest(&self) -> Option<(DateTime<Utc>, f64)> {
        self.timestamps.back().copied().zip(self.values.back().copied())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(i)
    }

    #[test]
    fn test_keeps_last_window_values() {
        let mut history = History::new(20);
        for i in 0..25 {
            history.append(i as f64, at(i));
        }
        assert_eq!(history.len(), 20);
        let values: Vec<f64> = history.values().collect();
        let expected: Vec<f64> = (5..25).map(|i| i as f64).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_alignment_preserved() {
        let mut history = History::new(3);
        for i in 0..10 {
            history.append(i as f64 * 10.0, at(i));
            assert_eq!(history.values().count(), history.timestamps().count());
            assert!(history.len() <= 3);
            for (ts, value) in history.points() {
                let offset = (ts - at(0)).num_seconds();
                assert_eq!(value, offset as f64 * 10.0);
            }
        }
        assert_eq!(history.latest(), Some((at(9), 90.0)));
    }

    #[test]
    fn test_zero_window_clamped() {
        let mut history = History::new(0);
        history.append(1.0, at(0));
        history.append(2.0, at(1));
        assert_eq!(history.window(), 1);
        assert_eq!(history.values().collect::<Vec<_>>(), vec![2.0]);
    }

    #[test]
    fn test_empty() {
        let history = History::default();
        assert!(history.is_empty());
        assert_eq!(history.window(), DEFAULT_WINDOW);
        assert_eq!(history.latest(), None);
    }
}
