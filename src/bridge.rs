// src/bridge.rs

//! Handing Rust values to C code that calls back into Rust.
//!
//! Native libraries only carry an opaque `void *` through to their callbacks. Rather than pass a
//! pointer to a Rust object (which the native side could outlive, or which could move), we pass a
//! small integer key and look the value up again on the way back in:
//!
//! - [`Registry::next_id`] hands out keys, starting at 1 so a key never looks like a null pointer
//! - [`Registry::register`] stores a value and returns a guard that removes it on drop
//! - [`Registry::get`] is what the callback uses; a missing key means the owner is already gone
//!
//! Lookups clone the stored value, so `T` is normally an `Arc`.

use std::collections::HashMap;
use std::os::raw::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// A process-wide key/value table shared with native callbacks.
pub struct Registry<T: Clone> {
    next: AtomicUsize,
    entries: Mutex<HashMap<usize, T>>,
}

impl<T: Clone> Registry<T> {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A key that has never been handed out before.
    pub fn next_id(&self) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Store `value` under `id` until the returned guard is dropped.
    pub fn register(&self, id: usize, value: T) -> Registration<'_, T> {
        let prev = self.entries.lock().insert(id, value);
        debug_assert!(prev.is_none(), "registry key {id} reused");
        Registration { registry: self, id }
    }

    pub fn get(&self, id: usize) -> Option<T> {
        self.entries.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one registry entry alive. Dropping it unregisters the value.
pub struct Registration<'a, T: Clone> {
    registry: &'a Registry<T>,
    id: usize,
}

impl<T: Clone> Registration<'_, T> {
    pub fn id(&self) -> usize {
        self.id
    }

    /// The key in the shape native code passes around.
    pub fn token(&self) -> *mut c_void {
        self.id as *mut c_void
    }
}

impl<T: Clone> Drop for Registration<'_, T> {
    fn drop(&mut self) {
        self.registry.entries.lock().remove(&self.id);
    }
}

/// Recover a key from a token produced by [`Registration::token`].
pub fn id_from_token(token: *mut c_void) -> usize {
    token as usize
}
