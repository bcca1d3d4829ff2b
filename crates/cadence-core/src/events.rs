//! Typed observer registry.
//!
//! Replaces ad-hoc listener arrays with a registry keyed by event kind.
//! Subscriptions are named, so subscribing the same key twice keeps exactly
//! one listener and re-wiring is idempotent. Emission clones the callback list
//! out of the lock before invoking, so listeners are free to call back into
//! the emitting object.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

pub struct EventRegistry<K, A> {
    listeners: Mutex<HashMap<K, Vec<(&'static str, Callback<A>)>>>,
}

impl<K: Eq + Hash + Copy, A> EventRegistry<K, A> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Register `callback` under `key` for `kind`, replacing any listener
    /// previously registered under the same key.
    pub fn subscribe(&self, kind: K, key: &'static str, callback: impl Fn(&A) + Send + Sync + 'static) {
        let mut map = self.listeners.lock();
        let stack = map.entry(kind).or_default();
        stack.retain(|(k, _)| *k != key);
        stack.push((key, Arc::new(callback)));
    }

    /// Remove the listener registered under `key`, if any.
    pub fn unsubscribe(&self, kind: K, key: &'static str) {
        if let Some(stack) = self.listeners.lock().get_mut(&kind) {
            stack.retain(|(k, _)| *k != key);
        }
    }

    /// Invoke all listeners for `kind` in subscription order.
    pub fn emit(&self, kind: K, arg: &A) {
        let callbacks: Vec<Callback<A>> = self
            .listeners
            .lock()
            .get(&kind)
            .map(|stack| stack.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        for callback in callbacks {
            callback(arg);
        }
    }
}

impl<K: Eq + Hash + Copy, A> Default for EventRegistry<K, A> {
    fn default() -> Self {
        Self::new()
    }
}
