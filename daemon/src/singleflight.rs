//! Collapse concurrent lookups for the same key into one call.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

pub struct SingleFlight<K, V> {
    calls: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

/// Removes the in-flight entry when the first caller finishes or is dropped,
/// so later calls always start a fresh lookup.
struct Leader<'a, K: Eq + Hash, V> {
    flights: &'a SingleFlight<K, V>,
    key: K,
    cell: Arc<OnceCell<V>>,
}

impl<K: Eq + Hash, V> Drop for Leader<'_, K, V> {
    fn drop(&mut self) {
        let mut calls = self.flights.calls.lock();
        if calls
            .get(&self.key)
            .is_some_and(|cell| Arc::ptr_eq(cell, &self.cell))
        {
            calls.remove(&self.key);
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` for `key` unless a call for the same key is already in flight,
    /// in which case wait for and share its result.
    pub async fn run<F, Fut>(&self, key: K, f: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let (cell, leader) = {
            let mut calls = self.calls.lock();
            match calls.get(&key) {
                Some(cell) => (cell.clone(), None),
                None => {
                    let cell = Arc::new(OnceCell::new());
                    calls.insert(key.clone(), cell.clone());
                    let leader = Leader {
                        flights: self,
                        key,
                        cell: cell.clone(),
                    };
                    (cell, Some(leader))
                }
            }
        };

        let value = cell.get_or_init(f).await.clone();
        drop(leader);
        value
    }

    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}
