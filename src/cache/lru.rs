//! LRU Tracker Module
//!
//! Keeps cache keys in recency order so the store can pick eviction victims.

use std::collections::VecDeque;

// == LRU Tracker ==
/// Recency order of cached keys.
///
/// - Front = most recently used
/// - Back = least recently used
#[derive(Debug, Default)]
pub struct LruTracker {
    order: VecDeque<String>,
}

impl LruTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Moves `key` to the most-recent position, inserting it if unknown.
    pub fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if pos == 0 {
                return;
            }
            if let Some(existing) = self.order.remove(pos) {
                self.order.push_front(existing);
            }
        } else {
            self.order.push_front(key.to_string());
        }
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Evict Oldest ==
    /// Pops the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    // == Keys ==
    /// Iterates tracked keys from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_orders_by_recency() {
        let mut lru = LruTracker::new();

        lru.touch("projects:select:{}");
        lru.touch("stakeholders:select:{}");
        lru.touch("users:select:{}");

        assert_eq!(lru.len(), 3);
        assert_eq!(
            lru.iter().collect::<Vec<_>>(),
            vec!["users:select:{}", "stakeholders:select:{}", "projects:select:{}"]
        );
    }

    #[test]
    fn test_touch_existing_key_moves_to_front() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("b");
        lru.touch("c");
        lru.touch("a");

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.evict_oldest(), Some("b".to_string()));
        assert_eq!(lru.evict_oldest(), Some("c".to_string()));
        assert_eq!(lru.evict_oldest(), Some("a".to_string()));
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_touch_same_key_repeatedly() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("a");
        lru.touch("a");

        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut lru = LruTracker::new();

        lru.touch("a");
        lru.touch("b");
        lru.remove("a");
        lru.remove("missing");

        assert_eq!(lru.iter().collect::<Vec<_>>(), vec!["b"]);

        lru.clear();
        assert!(lru.is_empty());
        assert_eq!(lru.evict_oldest(), None);
    }
}
