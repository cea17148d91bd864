//! Connection registry.
//!
//! Maps each endpoint address to its current [`ConnectionState`]. Workers
//! write their own entry; health reporters read copies. Every operation holds
//! the lock only for a single field update or a snapshot copy, never across
//! network I/O.
//!
//! Writes carry the generation the worker was spawned in. A restart bumps
//! the generation, so workers from an older set that have not noticed their
//! cancellation yet cannot resurrect or overwrite entries of the new set.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gotray_core::{ConnectionState, Health, aggregate_states};

/// Identifies one worker set. Bumped on every registry reset.
pub type Generation = u64;

#[derive(Debug, Default)]
struct Inner {
    generation: Generation,
    states: BTreeMap<String, ConnectionState>,
}

impl Inner {
    /// Returns the entry for `address` if `generation` is current.
    fn entry(&mut self, generation: Generation, address: &str) -> Option<&mut ConnectionState> {
        if generation != self.generation {
            return None;
        }
        Some(
            self.states
                .entry(address.to_string())
                .or_insert_with(|| ConnectionState::offline(address)),
        )
    }
}

/// Shared, lock-guarded map of address to connection state.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<Inner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section is a single assignment, so a poisoned lock
    // still guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks an address offline and clears any stale error.
    ///
    /// Called when a worker starts a new connection attempt. Returns false if
    /// the write was dropped because `generation` is stale.
    pub fn mark_connecting(&self, generation: Generation, address: &str) -> bool {
        let mut inner = self.lock();
        match inner.entry(generation, address) {
            Some(entry) => {
                entry.online = false;
                entry.last_error = None;
                true
            }
            None => false,
        }
    }

    /// Marks an address online.
    pub fn mark_online(&self, generation: Generation, address: &str) -> bool {
        let mut inner = self.lock();
        match inner.entry(generation, address) {
            Some(entry) => {
                entry.online = true;
                true
            }
            None => false,
        }
    }

    /// Marks an address offline, recording the error if one is given.
    ///
    /// A `None` error keeps the previous error, so a close that follows an
    /// error does not erase the reason.
    pub fn mark_offline(
        &self,
        generation: Generation,
        address: &str,
        error: Option<String>,
    ) -> bool {
        let mut inner = self.lock();
        match inner.entry(generation, address) {
            Some(entry) => {
                entry.online = false;
                if error.is_some() {
                    entry.last_error = error;
                }
                true
            }
            None => false,
        }
    }

    /// Starts a new generation whose entries are exactly `addresses`, each
    /// offline with no error. Returns the new generation.
    pub fn reset<I, S>(&self, addresses: I) -> Generation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let states: BTreeMap<String, ConnectionState> = addresses
            .into_iter()
            .map(|a| {
                let a = a.as_ref();
                (a.to_string(), ConnectionState::offline(a))
            })
            .collect();
        let mut inner = self.lock();
        inner.generation += 1;
        inner.states = states;
        inner.generation
    }

    /// Marks every entry offline without touching errors.
    pub fn mark_all_offline(&self) {
        for state in self.lock().states.values_mut() {
            state.online = false;
        }
    }

    /// Returns a copy of one entry.
    pub fn get(&self, address: &str) -> Option<ConnectionState> {
        self.lock().states.get(address).cloned()
    }

    /// Returns a copy of every entry, ordered by address.
    pub fn snapshot(&self) -> Vec<ConnectionState> {
        self.lock().states.values().cloned().collect()
    }

    /// Aggregate health of the current snapshot.
    pub fn health(&self) -> Health {
        aggregate_states(&self.snapshot())
    }

    pub fn len(&self) -> usize {
        self.lock().states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_updates() {
        let registry = Registry::new();
        let generation = registry.reset(["ws://a"]);
        assert!(registry.mark_connecting(generation, "ws://a"));
        assert_eq!(registry.get("ws://a"), Some(ConnectionState::offline("ws://a")));

        registry.mark_online(generation, "ws://a");
        assert!(registry.get("ws://a").unwrap().online);

        registry.mark_offline(generation, "ws://a", Some("status=none error=reset".into()));
        let state = registry.get("ws://a").unwrap();
        assert!(!state.online);
        assert_eq!(state.last_error.as_deref(), Some("status=none error=reset"));
    }

    #[test]
    fn close_without_error_keeps_previous_error() {
        let registry = Registry::new();
        let generation = registry.reset(["ws://a"]);
        registry.mark_offline(generation, "ws://a", Some("boom".into()));
        registry.mark_offline(generation, "ws://a", None);
        assert_eq!(registry.get("ws://a").unwrap().last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn connecting_clears_stale_error() {
        let registry = Registry::new();
        let generation = registry.reset(["ws://a"]);
        registry.mark_offline(generation, "ws://a", Some("boom".into()));
        registry.mark_connecting(generation, "ws://a");
        assert!(registry.get("ws://a").unwrap().last_error.is_none());
    }

    #[test]
    fn health_aggregation() {
        let registry = Registry::new();
        assert_eq!(registry.health(), Health::Down);

        let generation = registry.reset(["ws://a", "ws://b"]);
        assert_eq!(registry.health(), Health::Down);

        registry.mark_online(generation, "ws://a");
        assert_eq!(registry.health(), Health::Partial);

        registry.mark_online(generation, "ws://b");
        assert_eq!(registry.health(), Health::Ok);
    }

    #[test]
    fn reset_replaces_keys() {
        let registry = Registry::new();
        let generation = registry.reset(["ws://a", "ws://b"]);
        registry.mark_online(generation, "ws://a");

        registry.reset(["ws://b", "ws://c"]);
        let addresses: Vec<_> = registry.snapshot().into_iter().map(|s| s.address).collect();
        assert_eq!(addresses, vec!["ws://b", "ws://c"]);
        assert!(registry.snapshot().iter().all(|s| !s.online));
    }

    #[test]
    fn stale_generation_writes_are_dropped() {
        let registry = Registry::new();
        let old = registry.reset(["ws://a", "ws://b"]);
        let new = registry.reset(["ws://b"]);
        assert_ne!(old, new);

        assert!(!registry.mark_online(old, "ws://a"));
        assert!(!registry.mark_online(old, "ws://b"));
        assert!(registry.get("ws://a").is_none());
        assert!(!registry.get("ws://b").unwrap().online);

        assert!(registry.mark_online(new, "ws://b"));
        assert!(registry.get("ws://b").unwrap().online);
    }

    #[test]
    fn mark_all_offline_keeps_errors() {
        let registry = Registry::new();
        let generation = registry.reset(["ws://a", "ws://b"]);
        registry.mark_online(generation, "ws://a");
        registry.mark_offline(generation, "ws://b", Some("refused".into()));

        registry.mark_all_offline();
        assert_eq!(registry.health(), Health::Down);
        assert_eq!(registry.get("ws://b").unwrap().last_error.as_deref(), Some("refused"));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let registry = Registry::new();
        let generation = registry.reset(["ws://a"]);
        registry.mark_online(generation, "ws://a");
        let snapshot = registry.snapshot();
        registry.mark_offline(generation, "ws://a", None);
        assert!(snapshot[0].online);
        assert!(!registry.get("ws://a").unwrap().online);
    }

    #[test]
    fn concurrent_writers_never_tear() {
        let registry = Registry::new();
        let addresses: Vec<String> = (0..8).map(|i| format!("ws://h{}", i)).collect();
        let generation = registry.reset(&addresses);
        let handles: Vec<_> = addresses
            .into_iter()
            .map(|address| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for n in 0..200 {
                        if n % 2 == 0 {
                            registry.mark_online(generation, &address);
                        } else {
                            registry.mark_offline(generation, &address, Some(format!("err {}", n)));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 8);
        for state in snapshot {
            assert!(!state.online);
            assert_eq!(state.last_error.as_deref(), Some("err 199"));
        }
    }
}
