//! Time markers fired against actually-played time.
//!
//! Markers compare against played time, not the playback position, so a
//! listener who seeks around cannot accidentally skip one. The set keeps two
//! lists: the permanent registrations and the pending subset for the current
//! play cycle. Firing drains pending; stop and a genuine finish re-arm it.

use std::sync::Arc;

use crate::track::Track;

/// Callback bound to the track it was registered on.
pub type MarkerCallback = Arc<dyn Fn(&Track) + Send + Sync>;

#[derive(Clone)]
struct Marker {
    at: f64,
    callback: MarkerCallback,
}

/// Registered markers plus the pending subset for the current play cycle.
pub(crate) struct MarkerSet {
    registered: Vec<Marker>,
    pending: Vec<Marker>,
}

impl MarkerSet {
    pub(crate) fn new() -> Self {
        Self {
            registered: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Add a marker to both the permanent and the pending list.
    pub(crate) fn add(&mut self, at: f64, callback: MarkerCallback) {
        let marker = Marker { at, callback };
        self.pending.push(marker.clone());
        self.registered.push(marker);
    }

    /// Remove and return the first pending marker due at `played` seconds.
    ///
    /// At most one marker per tick; a backlog of due markers drains over
    /// subsequent ticks.
    pub(crate) fn first_due(&mut self, played: f64) -> Option<MarkerCallback> {
        let index = self.pending.iter().position(|m| m.at <= played)?;
        Some(self.pending.remove(index).callback)
    }

    /// Reset pending to the full registered set, so a new play cycle fires
    /// everything again.
    pub(crate) fn rearm(&mut self) {
        self.pending = self.registered.clone();
    }
}
