use std::sync::Mutex;

use super::{CategorySnapshot, FallbackStore};

/// In-process fallback store for embedding and tests.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<CategorySnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: CategorySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }
}

impl FallbackStore for MemoryStore {
    fn save(&self, snapshot: &CategorySnapshot) {
        if let Ok(mut slot) = self.snapshot.lock() {
            *slot = Some(snapshot.clone());
        }
    }

    fn load(&self) -> Option<CategorySnapshot> {
        self.snapshot.lock().ok().and_then(|slot| slot.clone())
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.snapshot.lock() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().is_none());

        let snapshot = CategorySnapshot::new(vec![], Utc::now());
        store.save(&snapshot);
        assert_eq!(store.load(), Some(snapshot));

        store.purge();
        assert!(store.load().is_none());
    }
}
