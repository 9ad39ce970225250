//! Bounded memory of processed Telegram update keys.

use std::collections::{HashSet, VecDeque};

/// Size above which the memory is trimmed.
pub const DEFAULT_HIGH_WATER: usize = 1000;

/// Number of most recent keys kept after a trim.
pub const DEFAULT_RETAIN: usize = 500;

/// Insertion-ordered set of update keys.
///
/// When more than `high_water` keys are held, the oldest are dropped until
/// `retain` remain.
#[derive(Debug)]
pub struct ProcessedUpdates {
    order: VecDeque<String>,
    seen: HashSet<String>,
    high_water: usize,
    retain: usize,
}

impl Default for ProcessedUpdates {
    fn default() -> Self {
        Self::with_limits(DEFAULT_HIGH_WATER, DEFAULT_RETAIN)
    }
}

impl ProcessedUpdates {
    pub fn with_limits(high_water: usize, retain: usize) -> Self {
        Self {
            order: VecDeque::new(),
            seen: HashSet::new(),
            high_water,
            retain: retain.min(high_water),
        }
    }

    /// Records `key`.  Returns `false` if it was already recorded.
    pub fn insert(&mut self, key: String) -> bool {
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);

        if self.order.len() > self.high_water {
            while self.order.len() > self.retain {
                if let Some(old) = self.order.pop_front() {
                    self.seen.remove(&old);
                }
            }
        }
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_insert_of_same_key_is_rejected() {
        let mut seen = ProcessedUpdates::default();
        assert!(seen.insert("msg_1".to_string()));
        assert!(!seen.insert("msg_1".to_string()));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_trim_keeps_most_recent_keys() {
        // Arrange
        let mut seen = ProcessedUpdates::with_limits(4, 2);
        for i in 1..=4 {
            seen.insert(format!("msg_{i}"));
        }

        // Act: the fifth key crosses the high-water mark
        seen.insert("msg_5".to_string());

        // Assert
        assert_eq!(seen.len(), 2);
        assert!(seen.contains("msg_4"));
        assert!(seen.contains("msg_5"));
        assert!(!seen.contains("msg_1"));
    }

    #[test]
    fn test_default_limits_trim_at_one_thousand() {
        let mut seen = ProcessedUpdates::default();
        for i in 0..=DEFAULT_HIGH_WATER {
            seen.insert(format!("cbq_{i}"));
        }
        assert_eq!(seen.len(), DEFAULT_RETAIN);
    }
}
