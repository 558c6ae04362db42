// onboard-service/src/utils/usage_tracker.rs
use log::debug;
use std::collections::BTreeMap;

// Invitation code -> last observed use count. This is the baseline the attribution
// engine diffs live platform state against. Iteration follows code order.
#[derive(Debug, Default)]
pub struct UsageTracker {
    snapshots: BTreeMap<String, u64>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, code: &str, uses: u64) {
        debug!("Tracking invite {} at {} uses", code, uses);
        self.snapshots.insert(code.to_string(), uses);
    }

    // Records a higher count; returns false (and keeps the old value) otherwise
    pub fn observe(&mut self, code: &str, uses: u64) -> bool {
        match self.snapshots.get_mut(code) {
            Some(tracked) if uses > *tracked => {
                *tracked = uses;
                true
            }
            Some(_) => false,
            None => {
                self.snapshots.insert(code.to_string(), uses);
                true
            }
        }
    }

    pub fn uses(&self, code: &str) -> Option<u64> {
        self.snapshots.get(code).copied()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.snapshots.contains_key(code)
    }

    pub fn remove(&mut self, code: &str) -> Option<u64> {
        self.snapshots.remove(code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &String> {
        self.snapshots.keys()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
