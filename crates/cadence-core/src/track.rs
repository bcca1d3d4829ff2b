//! Per-track playback state machine.
//!
//! A `Track` reconciles a monotonically advancing clock with user-driven
//! pause/seek/stop. Three numbers carry the whole model:
//!
//! - `offset`: seconds into the buffer where the current play segment began;
//!   mutated only while not playing, so every derived time is computed
//!   against a frozen reference.
//! - `skipped`: net seconds jumped by seeks (can be negative).
//! - `played_time`: `current_time - skipped`, updated only on ticks while
//!   playing. Pauses and seeks leave it untouched, which is what makes
//!   markers immune to skipping around.
//!
//! Completion signals from the underlying source arrive asynchronously, so a
//! generation counter decides whether the signalling source is still the
//! current one. A completion from a superseded source is a no-op.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::backend::{AudioData, AudioSink, PlayableSource};
use crate::clock::Clock;
use crate::error::{PlayerError, Result};
use crate::events::EventRegistry;
use crate::markers::MarkerSet;
use crate::resolver::SourceResolver;

/// Events a track emits over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackEvent {
    /// A play segment began (fresh play, resume, or seek-restart).
    Play,
    /// Fired on every tick while playing.
    Playing,
    /// Playback genuinely reached the end of the buffer.
    Finished,
}

struct PlayState {
    playing: bool,
    offset: f64,
    skipped: f64,
    played_time: f64,
    play_started_at: f64,
    /// Bumped on every new source; completion signals carry the generation
    /// they were issued for.
    generation: u64,
    source: Option<Box<dyn PlayableSource>>,
}

impl PlayState {
    fn current_time(&self, clock: &dyn Clock) -> f64 {
        if self.playing {
            clock.now() - self.play_started_at + self.offset
        } else {
            self.offset
        }
    }
}

pub(crate) struct TrackInner {
    sources: Vec<String>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn AudioSink>,
    resolver: Arc<SourceResolver>,
    /// Decoded audio, set at most once.
    data: OnceLock<Arc<AudioData>>,
    /// Memoized load outcome; holding this lock during resolution is what
    /// gives every concurrent `load()` the same shared result.
    load_outcome: Mutex<Option<Result<()>>>,
    state: Mutex<PlayState>,
    markers: Mutex<MarkerSet>,
    events: EventRegistry<TrackEvent, Track>,
}

/// One audio item with its own playback timing state. Cloning the handle is
/// cheap and shares the underlying track.
#[derive(Clone)]
pub struct Track {
    inner: Arc<TrackInner>,
}

impl fmt::Debug for Track {
    // Lock-free on purpose, so a track can be formatted from inside any
    // callback.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("sources", &self.inner.sources)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Non-owning track reference for tick fan-out lists.
pub(crate) struct WeakTrack(Weak<TrackInner>);

impl WeakTrack {
    pub(crate) fn upgrade(&self) -> Option<Track> {
        self.0.upgrade().map(|inner| Track { inner })
    }
}

impl Track {
    pub(crate) fn new(
        sources: Vec<String>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn AudioSink>,
        resolver: Arc<SourceResolver>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                sources,
                clock,
                sink,
                resolver,
                data: OnceLock::new(),
                load_outcome: Mutex::new(None),
                state: Mutex::new(PlayState {
                    playing: false,
                    offset: 0.0,
                    skipped: 0.0,
                    played_time: 0.0,
                    play_started_at: 0.0,
                    generation: 0,
                    source: None,
                }),
                markers: Mutex::new(MarkerSet::new()),
                events: EventRegistry::new(),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakTrack {
        WeakTrack(Arc::downgrade(&self.inner))
    }

    /// Whether two handles refer to the same track.
    pub fn ptr_eq(&self, other: &Track) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The mirror URLs this track was created with.
    pub fn sources(&self) -> &[String] {
        &self.inner.sources
    }

    /// Resolve this track's mirrors into decoded audio data.
    ///
    /// Idempotent: the first call performs the resolution and every later or
    /// concurrent call receives the same memoized outcome, success or
    /// failure.
    pub fn load(&self) -> Result<()> {
        let mut memo = self.inner.load_outcome.lock();
        if let Some(outcome) = &*memo {
            return outcome.clone();
        }

        let outcome = self
            .inner
            .resolver
            .resolve(&self.inner.sources)
            .map(|data| {
                let _ = self.inner.data.set(data);
            });
        *memo = Some(outcome.clone());
        outcome
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.data.get().is_some()
    }

    /// Start or resume playback from the current offset.
    ///
    /// No-op when already playing or when the offset has reached the end of
    /// the buffer. Fails with `NotLoaded` before `load()` succeeds.
    pub fn play(&self) -> Result<()> {
        let data = self
            .inner
            .data
            .get()
            .cloned()
            .ok_or(PlayerError::NotLoaded)?;

        let (generation, offset, remaining) = {
            let mut st = self.inner.state.lock();
            if st.playing || st.offset >= data.duration() {
                return Ok(());
            }
            st.playing = true;
            st.offset = st.offset.max(0.0);
            st.generation += 1;
            st.play_started_at = self.inner.clock.now();
            (
                st.generation,
                st.offset,
                (data.duration() - st.offset).max(0.0),
            )
        };

        // The source is created and started outside the state lock except
        // for the final handover, so a completion racing in can only ever
        // observe consistent state.
        let mut source = self.inner.sink.create_source(&data);
        let weak = Arc::downgrade(&self.inner);
        source.set_on_ended(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                Track { inner }.on_source_ended(generation);
            }
        }));

        let started = {
            let mut st = self.inner.state.lock();
            // A pause/stop/seek may have superseded this segment already.
            if st.generation == generation && st.playing {
                source.start(offset, remaining);
                st.source = Some(source);
                true
            } else {
                false
            }
        };

        if started {
            self.inner.events.emit(TrackEvent::Play, self);
        }
        Ok(())
    }

    /// Pause playback, folding the elapsed segment into the offset.
    /// No-op when already paused or stopped.
    pub fn pause(&self) {
        let mut st = self.inner.state.lock();
        let was_playing = st.playing;
        st.playing = false;
        if let Some(mut source) = st.source.take() {
            source.stop();
        }
        if was_playing {
            st.offset += self.inner.clock.now() - st.play_started_at;
        }
    }

    /// Stop playback and reset the track state, so the next `play()` counts
    /// played time from zero and re-fires every marker.
    pub fn stop(&self) {
        {
            let mut st = self.inner.state.lock();
            st.playing = false;
            if let Some(mut source) = st.source.take() {
                source.stop();
            }
            st.offset = 0.0;
            st.skipped = 0.0;
            st.played_time = 0.0;
        }
        self.inner.markers.lock().rearm();
    }

    /// Jump to `new_offset` seconds, keeping played-time continuity across
    /// the jump. Restarts playback from the new position when playing.
    pub fn seek(&self, new_offset: f64) -> Result<()> {
        if !new_offset.is_finite() || new_offset < 0.0 {
            return Err(PlayerError::InvalidArgument(format!(
                "seek offset must be a non-negative number, got {}",
                new_offset
            )));
        }

        let restart = {
            let mut st = self.inner.state.lock();
            let current = st.current_time(&*self.inner.clock);
            st.skipped += new_offset - current;

            if st.playing {
                st.playing = false;
                if let Some(mut source) = st.source.take() {
                    source.stop();
                }
                st.offset = new_offset;
                true
            } else {
                st.offset = new_offset;
                false
            }
        };

        if restart {
            self.play()?;
        }
        Ok(())
    }

    /// Register `callback` to fire once actual played time passes `marker`
    /// seconds.
    pub fn when(
        &self,
        marker: f64,
        callback: impl Fn(&Track) + Send + Sync + 'static,
    ) -> Result<()> {
        if !marker.is_finite() || marker < 0.0 {
            return Err(PlayerError::InvalidArgument(format!(
                "marker must be a non-negative number, got {}",
                marker
            )));
        }
        self.inner.markers.lock().add(marker, Arc::new(callback));
        Ok(())
    }

    /// Played-time update; drives marker firing. Call periodically while the
    /// host's clock advances. No-op unless playing.
    pub fn tick(&self) {
        let due = {
            let played = {
                let mut st = self.inner.state.lock();
                if !st.playing {
                    return;
                }
                st.played_time = st.current_time(&*self.inner.clock) - st.skipped;
                st.played_time
            };
            self.inner.markers.lock().first_due(played)
        };

        // Marker callbacks run outside every lock and may call back in.
        if let Some(callback) = due {
            callback(self);
        }
        self.inner.events.emit(TrackEvent::Playing, self);
    }

    /// Completion signal from the underlying source. Transitions to finished
    /// only when the signalling source is still current and the track is
    /// still playing; anything else means the source was superseded.
    fn on_source_ended(&self, generation: u64) {
        let finished = {
            let mut st = self.inner.state.lock();
            if !st.playing || st.generation != generation {
                false
            } else {
                st.playing = false;
                st.source = None;
                let duration = self.duration();
                st.offset = duration;
                st.skipped = duration;
                true
            }
        };

        if finished {
            self.inner.markers.lock().rearm();
            self.inner.events.emit(TrackEvent::Finished, self);
        }
    }

    /// Current playback position in seconds from the start of the buffer.
    pub fn current_time(&self) -> f64 {
        self.inner.state.lock().current_time(&*self.inner.clock)
    }

    /// Seconds actually played since the first play-from-stop, excluding
    /// pauses and skips.
    pub fn played_time(&self) -> f64 {
        self.inner.state.lock().played_time
    }

    /// Duration of the decoded buffer, or 0 before load.
    pub fn duration(&self) -> f64 {
        self.inner
            .data
            .get()
            .map(|data| data.duration())
            .unwrap_or(0.0)
    }

    pub fn is_playing(&self) -> bool {
        self.inner.state.lock().playing
    }

    /// Register a keyed event listener. Re-registering the same key replaces
    /// the previous listener.
    pub fn on(
        &self,
        event: TrackEvent,
        key: &'static str,
        callback: impl Fn(&Track) + Send + Sync + 'static,
    ) {
        self.inner.events.subscribe(event, key, callback);
    }

    /// Remove the listener registered under `key`.
    pub fn off(&self, event: TrackEvent, key: &'static str) {
        self.inner.events.unsubscribe(event, key);
    }
}
