//! Top-level player hub.
//!
//! A `Player` owns the shared collaborators (clock, sink, resolver,
//! settings), hands out tracks wired to them, broadcasts ticks to every live
//! track, and persists the audio settings. Tracks are held weakly: dropping
//! the last handle to a track removes it from the tick fan-out on the next
//! beat.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::{AudioSink, Decoder, Fetcher};
use crate::clock::Clock;
use crate::error::{PlayerError, Result};
use crate::playlist::Playlist;
use crate::resolver::SourceResolver;
use crate::settings::SettingsStore;
use crate::track::{Track, WeakTrack};

const SETTINGS_KEY: &str = "audio";
pub const EQ_BANDS: usize = 10;

/// Persisted audio preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Output gain, 0.0 to 1.0.
    pub volume: f32,
    /// Per-band equalizer gains in dB, low to high frequencies.
    pub eq: [f32; EQ_BANDS],
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            eq: [0.0; EQ_BANDS],
        }
    }
}

struct PlayerInner {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn AudioSink>,
    resolver: Arc<SourceResolver>,
    settings: Arc<dyn SettingsStore>,
    tracks: Mutex<Vec<WeakTrack>>,
    audio: Mutex<AudioSettings>,
    heartbeat_stop: AtomicBool,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

/// Entry point for hosts. Cloning the handle shares the underlying player.
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

impl Player {
    pub fn new(
        clock: Arc<dyn Clock>,
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn Decoder>,
        sink: Arc<dyn AudioSink>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let audio = restore_settings(&*settings);
        sink.set_gain(audio.volume);

        Self {
            inner: Arc::new(PlayerInner {
                clock,
                sink,
                resolver: Arc::new(SourceResolver::new(fetcher, decoder)),
                settings,
                tracks: Mutex::new(Vec::new()),
                audio: Mutex::new(audio),
                heartbeat_stop: AtomicBool::new(false),
                heartbeat: Mutex::new(None),
            }),
        }
    }

    /// Create a track over `urls`, registered for tick broadcast. The track
    /// is not loaded yet.
    pub fn track(&self, urls: Vec<String>) -> Track {
        let track = Track::new(
            urls,
            Arc::clone(&self.inner.clock),
            Arc::clone(&self.inner.sink),
            Arc::clone(&self.inner.resolver),
        );
        self.inner.tracks.lock().push(track.downgrade());
        track
    }

    /// Create and load a track in one step.
    pub fn load_url(&self, urls: Vec<String>) -> Result<Track> {
        let track = self.track(urls);
        track.load()?;
        Ok(track)
    }

    /// Create a playlist of one track per URL set. The tracks are not
    /// loaded yet; the playlist loads them on demand.
    pub fn playlist(&self, sources: Vec<Vec<String>>) -> Playlist {
        Playlist::new(sources.into_iter().map(|urls| self.track(urls)).collect())
    }

    /// Broadcast one tick to every live track, pruning dropped ones.
    pub fn tick(&self) {
        let live: Vec<Track> = {
            let mut tracks = self.inner.tracks.lock();
            tracks.retain(|weak| weak.upgrade().is_some());
            tracks.iter().filter_map(|weak| weak.upgrade()).collect()
        };
        // Ticks run outside the registry lock; a marker callback may create
        // new tracks.
        for track in live {
            track.tick();
        }
    }

    /// Start the heartbeat thread ticking every `interval`. No-op if the
    /// heartbeat is already running.
    pub fn start(&self, interval: Duration) {
        let mut slot = self.inner.heartbeat.lock();
        if slot.is_some() {
            return;
        }

        self.inner.heartbeat_stop.store(false, Ordering::SeqCst);
        let weak = Arc::downgrade(&self.inner);
        let handle = thread::spawn(move || loop {
            let inner = match weak.upgrade() {
                Some(inner) => inner,
                None => return,
            };
            if inner.heartbeat_stop.load(Ordering::SeqCst) {
                return;
            }
            Player { inner }.tick();
            thread::sleep(interval);
        });
        *slot = Some(handle);
    }

    /// Stop the heartbeat thread and wait for it to exit.
    pub fn shutdown(&self) {
        self.inner.heartbeat_stop.store(true, Ordering::SeqCst);
        let handle = self.inner.heartbeat.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    /// Set the output gain, clamped to 0.0..=1.0, and persist it.
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.inner.sink.set_gain(volume);
        let snapshot = {
            let mut audio = self.inner.audio.lock();
            audio.volume = volume;
            audio.clone()
        };
        persist_settings(&*self.inner.settings, &snapshot);
    }

    pub fn volume(&self) -> f32 {
        self.inner.audio.lock().volume
    }

    /// Set one equalizer band's gain in dB and persist the whole curve.
    pub fn set_eq(&self, band: usize, gain: f32) -> Result<()> {
        if band >= EQ_BANDS {
            return Err(PlayerError::IndexNotFound(band));
        }
        if !gain.is_finite() {
            return Err(PlayerError::InvalidArgument(format!(
                "eq gain must be a finite number, got {}",
                gain
            )));
        }
        let snapshot = {
            let mut audio = self.inner.audio.lock();
            audio.eq[band] = gain;
            audio.clone()
        };
        persist_settings(&*self.inner.settings, &snapshot);
        Ok(())
    }

    pub fn eq(&self) -> [f32; EQ_BANDS] {
        self.inner.audio.lock().eq
    }
}

impl Drop for PlayerInner {
    fn drop(&mut self) {
        self.heartbeat_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.heartbeat.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn restore_settings(store: &dyn SettingsStore) -> AudioSettings {
    let Some(value) = store.read(SETTINGS_KEY) else {
        return AudioSettings::default();
    };
    match serde_json::from_value(value) {
        Ok(audio) => audio,
        Err(err) => {
            log::warn!("cadence: ignoring malformed audio settings: {}", err);
            AudioSettings::default()
        }
    }
}

fn persist_settings(store: &dyn SettingsStore, audio: &AudioSettings) {
    match serde_json::to_value(audio) {
        Ok(value) => store.write(SETTINGS_KEY, &value),
        Err(err) => log::warn!("cadence: cannot serialize audio settings: {}", err),
    }
}
