use crate::key::EventKey;
use crate::poller::RawFd;

use std::collections::HashMap;
use std::collections::hash_map::{Entry, Values};

/// Mapping from file descriptor to its live [`EventKey`].
///
/// This is the selector's single source of truth for what is currently
/// monitored. Keys are unique per descriptor and iteration order is
/// unspecified.
pub(crate) struct RegistrationTable<T> {
    keys: HashMap<RawFd, EventKey<T>>,
}

impl<T> RegistrationTable<T> {
    /// Creates an empty table.
    pub(crate) fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Returns `true` if `fd` has a live key.
    pub(crate) fn contains(&self, fd: RawFd) -> bool {
        self.keys.contains_key(&fd)
    }

    /// Inserts a key and returns a reference to the stored copy.
    ///
    /// Returns `None`, leaving the table untouched, if the descriptor is
    /// already present.
    pub(crate) fn insert(&mut self, key: EventKey<T>) -> Option<&EventKey<T>> {
        match self.keys.entry(key.fd()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => Some(slot.insert(key)),
        }
    }

    /// Removes and returns the key for `fd`.
    pub(crate) fn remove(&mut self, fd: RawFd) -> Option<EventKey<T>> {
        self.keys.remove(&fd)
    }

    /// Returns the key for `fd`, if any.
    pub(crate) fn get(&self, fd: RawFd) -> Option<&EventKey<T>> {
        self.keys.get(&fd)
    }

    /// Number of live keys.
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    /// Iterates over the live keys.
    pub(crate) fn iter(&self) -> Values<'_, RawFd, EventKey<T>> {
        self.keys.values()
    }

    /// Drops every key.
    pub(crate) fn clear(&mut self) {
        self.keys.clear();
    }
}
