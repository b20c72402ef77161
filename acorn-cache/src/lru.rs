use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime};

use acorn_core::Nut;

struct Entry<T> {
    nut: Nut<T>,
    inserted_at: SystemTime,
}

/// Bounded, insertion/access-ordered map used as the near tier in
/// [`crate::NearFarTrunk`]. Not a general-purpose cache: eviction order
/// is recency of `touch`, capacity is fixed at construction.
pub(crate) struct LruMap<T> {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, Entry<T>>,
}

impl<T: Clone> LruMap<T> {
    pub fn new(capacity: usize) -> Self {
        LruMap {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn touch(&mut self, id: &str) {
        if let Some(pos) = self.order.iter().position(|existing| existing == id) {
            self.order.remove(pos);
        }
        self.order.push_back(id.to_string());
    }

    /// Returns the live value if present and not older than `ttl`
    /// (when set). Expired entries are evicted on read.
    pub fn get(&mut self, id: &str, now: SystemTime, ttl: Option<Duration>) -> Option<Nut<T>> {
        let expired = match (self.entries.get(id), ttl) {
            (Some(entry), Some(ttl)) => now.duration_since(entry.inserted_at).unwrap_or_default() > ttl,
            _ => false,
        };
        if expired {
            self.remove(id);
            return None;
        }
        if self.entries.contains_key(id) {
            self.touch(id);
        }
        self.entries.get(id).map(|e| e.nut.clone())
    }

    /// Inserts `nut`, returning an evicted `(id, nut)` pair if this
    /// push went over capacity.
    pub fn insert(&mut self, id: &str, nut: Nut<T>, now: SystemTime) -> Option<(String, Nut<T>)> {
        self.entries.insert(
            id.to_string(),
            Entry {
                nut,
                inserted_at: now,
            },
        );
        self.touch(id);

        if self.entries.len() > self.capacity {
            if let Some(evict_id) = self.order.pop_front() {
                if let Some(evicted) = self.entries.remove(&evict_id) {
                    return Some((evict_id, evicted.nut));
                }
            }
        }
        None
    }

    pub fn remove(&mut self, id: &str) {
        self.entries.remove(id);
        if let Some(pos) = self.order.iter().position(|existing| existing == id) {
            self.order.remove(pos);
        }
    }
}
