//! Run-scoped record of structural validation failures.

use std::collections::BTreeSet;
use std::sync::Mutex;

/// Paths that failed Layer 2 during one funnel invocation.
///
/// Shared by the partitions of a run behind a mutex; never persisted.
#[derive(Debug, Default)]
pub struct RejectionCache {
    rejected: Mutex<BTreeSet<String>>,
}

impl RejectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        // A panicking partition cannot leave the set half-updated
        self.rejected.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a failure. Returns `false` if the path was already present.
    pub fn insert(&self, path: &str) -> bool {
        self.lock().insert(path.to_string())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sorted copy of the rejected paths.
    pub fn paths(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_insert_and_contains() {
        let cache = RejectionCache::new();
        assert!(cache.is_empty());
        assert!(cache.insert("notes.txt"));
        assert!(!cache.insert("notes.txt"));
        assert!(cache.contains("notes.txt"));
        assert!(!cache.contains("other.txt"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(RejectionCache::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.insert(&format!("file-{}.txt", i));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(
            cache.paths(),
            vec!["file-0.txt", "file-1.txt", "file-2.txt", "file-3.txt"]
        );
    }
}
