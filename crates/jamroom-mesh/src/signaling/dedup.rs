use std::collections::{HashSet, VecDeque};

/// Bounded set of recently delivered message keys; the oldest key is
/// evicted once capacity is reached.
#[derive(Debug)]
pub(crate) struct RecentlySeen {
    capacity: usize,
    order: VecDeque<String>,
    keys: HashSet<String>,
}

impl RecentlySeen {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            keys: HashSet::with_capacity(capacity),
        }
    }

    /// Record `key`. Returns `false` if it was already present.
    pub(crate) fn insert(&mut self, key: String) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        self.keys.insert(key.clone());
        self.order.push_back(key);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.keys.clear();
    }
}
