//! Ordered track list with one current pointer and auto-advance.
//!
//! The playlist never drives tracks directly; it reacts to their events.
//! When a track it loaded begins playing, it becomes current and the
//! previous current track is paused. When the current track finishes, the
//! playlist skips to the next one. A zero-second marker on every ready track
//! preloads its successor in the background.
//!
//! Load failures are recovered by walking forward: a track whose mirrors are
//! all dead is skipped, and only when every remaining track has failed does
//! the playlist give up with `PlaylistExhausted`.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::error::{PlayerError, Result};
use crate::events::EventRegistry;
use crate::track::{Track, TrackEvent};

/// Events a playlist emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaylistEvent {
    /// A track in the list finished loading, emitted once per track. The
    /// argument is the ready track.
    TrackReady,
    /// Every track from the requested position to the end of the list failed
    /// to load. The argument is the last track that failed.
    Exhausted,
}

struct Entry {
    track: Track,
    /// Whether `TrackReady` fired (and the auto-advance listeners were
    /// attached) for this track.
    ready: bool,
}

struct PlaylistState {
    entries: Vec<Entry>,
    /// Index of the current track. Tracks are append-only, so indices are
    /// stable.
    current: Option<usize>,
}

pub(crate) struct PlaylistInner {
    state: Mutex<PlaylistState>,
    events: EventRegistry<PlaylistEvent, Track>,
}

/// Ordered collection of tracks with auto-advance behavior. Cloning the
/// handle is cheap and shares the underlying list.
#[derive(Clone)]
pub struct Playlist {
    inner: Arc<PlaylistInner>,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            inner: Arc::new(PlaylistInner {
                state: Mutex::new(PlaylistState {
                    entries: tracks
                        .into_iter()
                        .map(|track| Entry {
                            track,
                            ready: false,
                        })
                        .collect(),
                    current: None,
                }),
                events: EventRegistry::new(),
            }),
        }
    }

    /// Append a track to the end of the list.
    pub fn push(&self, track: Track) {
        self.inner.state.lock().entries.push(Entry {
            track,
            ready: false,
        });
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().entries.is_empty()
    }

    /// Index of the current track. The first track becomes current lazily.
    /// Fails with `NoCurrentTrack` when the list is empty.
    pub fn current_index(&self) -> Result<usize> {
        let mut st = self.inner.state.lock();
        if st.entries.is_empty() {
            return Err(PlayerError::NoCurrentTrack);
        }
        Ok(*st.current.get_or_insert(0))
    }

    /// The track at `index`, or the current track when `index` is `None`.
    pub fn get(&self, index: Option<usize>) -> Option<Track> {
        let resolved = match index {
            Some(i) => i,
            None => self.current_index().ok()?,
        };
        self.inner
            .state
            .lock()
            .entries
            .get(resolved)
            .map(|entry| entry.track.clone())
    }

    /// Make the track at `index` current. Fails with `InvalidState` while
    /// the current track is playing (otherwise the playing track could never
    /// be paused when its successor starts), and with `IndexNotFound` when
    /// `index` is out of range.
    pub fn set_current_by_index(&self, index: usize) -> Result<()> {
        let mut st = self.inner.state.lock();
        if let Some(current) = st.current {
            if st.entries[current].track.is_playing() {
                return Err(PlayerError::InvalidState(
                    "cannot change the current track while playing".into(),
                ));
            }
        }
        if index >= st.entries.len() {
            return Err(PlayerError::IndexNotFound(index));
        }
        st.current = Some(index);
        Ok(())
    }

    /// Load the track at `index` (or the current one), skipping forward over
    /// tracks that fail.
    ///
    /// Returns the first track from that position on that loads. When a
    /// failed track was current and a successor exists, current moves to the
    /// successor. When every remaining track fails, emits `Exhausted` and
    /// returns `PlaylistExhausted`.
    pub fn load(&self, index: Option<usize>) -> Result<Track> {
        let start = match index {
            Some(i) => i,
            None => self.current_index()?,
        };
        if self.get(Some(start)).is_none() {
            return Err(PlayerError::NotFound);
        }
        self.load_walk(start)
    }

    fn load_walk(&self, start: usize) -> Result<Track> {
        let mut index = start;
        loop {
            let track = match self.get(Some(index)) {
                Some(track) => track,
                // Walked past the end without a single loadable track.
                None => return Err(PlayerError::PlaylistExhausted),
            };

            match track.load() {
                Ok(()) => {
                    self.mark_ready(&track, index);
                    return Ok(track);
                }
                Err(err) => {
                    log::warn!("cadence: track {} failed to load: {}", index, err);
                    let has_next = {
                        let mut st = self.inner.state.lock();
                        let has_next = index + 1 < st.entries.len();
                        // An unread pointer lazily means index 0, and the
                        // handoff has to honor that too.
                        let current = *st.current.get_or_insert(0);
                        if current == index && has_next {
                            st.current = Some(index + 1);
                        }
                        has_next
                    };
                    if !has_next {
                        self.inner.events.emit(PlaylistEvent::Exhausted, &track);
                        return Err(PlayerError::PlaylistExhausted);
                    }
                    index += 1;
                }
            }
        }
    }

    /// Fire `TrackReady` once per track and attach the auto-advance wiring.
    fn mark_ready(&self, track: &Track, index: usize) {
        {
            let mut st = self.inner.state.lock();
            let entry = &mut st.entries[index];
            if entry.ready {
                return;
            }
            entry.ready = true;
        }

        let weak = Arc::downgrade(&self.inner);
        track.on(TrackEvent::Play, "playlist-current", move |track| {
            if let Some(inner) = weak.upgrade() {
                set_as_current(&inner, track);
            }
        });

        // Preload the successor as soon as this track actually plays. The
        // resolution runs off-thread so a marker tick never blocks on the
        // network.
        let weak = Arc::downgrade(&self.inner);
        let _ = track.when(0.0, move |_| {
            if let Some(inner) = weak.upgrade() {
                let playlist = Playlist { inner };
                if let Ok(index) = playlist.current_index() {
                    let next = index + 1;
                    if playlist.get(Some(next)).is_some() {
                        thread::spawn(move || {
                            if let Err(err) = playlist.load(Some(next)) {
                                log::debug!("cadence: preload stopped: {}", err);
                            }
                        });
                    }
                }
            }
        });

        let weak = Arc::downgrade(&self.inner);
        track.on(TrackEvent::Finished, "playlist-advance", move |_| {
            if let Some(inner) = weak.upgrade() {
                let playlist = Playlist { inner };
                if let Err(err) = playlist.next() {
                    log::warn!("cadence: auto-advance failed: {}", err);
                }
            }
        });

        self.inner.events.emit(PlaylistEvent::TrackReady, track);
    }

    /// Play the track at `index`, or the current one. A track whose position
    /// already reached its duration is reset first, so replaying a finished
    /// track starts from the beginning.
    pub fn play(&self, index: Option<usize>) -> Result<()> {
        let track = self.get(index).ok_or(PlayerError::NotFound)?;
        if track.duration() > 0.0 && track.current_time() >= track.duration() {
            track.stop();
        }
        track.play()
    }

    /// Pause the current track, if any.
    pub fn pause(&self) {
        if let Some(track) = self.get(None) {
            track.pause();
        }
    }

    /// Skip to the start of the next track, if one exists. Fails with
    /// `NoCurrentTrack` on an empty list; a missing successor is a no-op.
    pub fn next(&self) -> Result<()> {
        let index = self.current_index()?;
        self.skip_to(index + 1)
    }

    /// Skip to the start of the previous track, if one exists. Fails with
    /// `NoCurrentTrack` on an empty list; a missing predecessor is a no-op.
    pub fn previous(&self) -> Result<()> {
        let index = self.current_index()?;
        match index.checked_sub(1) {
            Some(previous) => self.skip_to(previous),
            None => Ok(()),
        }
    }

    fn skip_to(&self, index: usize) -> Result<()> {
        if self.get(Some(index)).is_none() {
            return Ok(());
        }
        let track = self.load(Some(index))?;
        // Reset in case the track was played earlier.
        track.stop();
        track.play()
    }

    /// Whether the current track is playing.
    pub fn is_playing(&self) -> bool {
        self.get(None).map(|track| track.is_playing()).unwrap_or(false)
    }

    /// Register a keyed event listener. Re-registering the same key replaces
    /// the previous listener.
    pub fn on(
        &self,
        event: PlaylistEvent,
        key: &'static str,
        callback: impl Fn(&Track) + Send + Sync + 'static,
    ) {
        self.inner.events.subscribe(event, key, callback);
    }

    /// Remove the listener registered under `key`.
    pub fn off(&self, event: PlaylistEvent, key: &'static str) {
        self.inner.events.unsubscribe(event, key);
    }
}

/// When a loaded track begins playing it becomes current; a different,
/// previously current track is paused so only one track plays at a time.
fn set_as_current(inner: &Arc<PlaylistInner>, track: &Track) {
    let previous = {
        let mut st = inner.state.lock();
        let index = match st.entries.iter().position(|e| e.track.ptr_eq(track)) {
            Some(index) => index,
            None => return,
        };
        let previous = match st.current {
            Some(current) if current != index => Some(st.entries[current].track.clone()),
            _ => None,
        };
        st.current = Some(index);
        previous
    };
    if let Some(previous) = previous {
        previous.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{CountingFetcher, Rig};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn three_track_rig() -> (Playlist, Rig) {
        let rig = Rig::new(
            CountingFetcher::new()
                .serving("a", 10)
                .serving("b", 20)
                .serving("c", 30),
        );
        let playlist = Playlist::new(vec![
            rig.track(&["a"]),
            rig.track(&["b"]),
            rig.track(&["c"]),
        ]);
        (playlist, rig)
    }

    #[test]
    fn empty_list_has_no_current_track() {
        let playlist = Playlist::new(vec![]);
        assert!(playlist.is_empty());
        assert_eq!(playlist.current_index().unwrap_err(), PlayerError::NoCurrentTrack);
        assert_eq!(playlist.next().unwrap_err(), PlayerError::NoCurrentTrack);
        assert_eq!(playlist.previous().unwrap_err(), PlayerError::NoCurrentTrack);
        assert!(playlist.get(None).is_none());
        assert!(!playlist.is_playing());
    }

    #[test]
    fn first_track_becomes_current_lazily() {
        let (playlist, _rig) = three_track_rig();
        assert_eq!(playlist.current_index().expect("index"), 0);
        let current = playlist.get(None).expect("current");
        assert_eq!(current.sources(), &["a".to_string()]);
        assert!(current.ptr_eq(&playlist.get(Some(0)).expect("track")));
    }

    #[test]
    fn set_current_by_index_validates() {
        let (playlist, _rig) = three_track_rig();
        assert_eq!(
            playlist.set_current_by_index(7).unwrap_err(),
            PlayerError::IndexNotFound(7)
        );
        playlist.set_current_by_index(2).expect("set");
        assert_eq!(playlist.current_index().expect("index"), 2);
    }

    #[test]
    fn current_cannot_change_while_playing() {
        let (playlist, _rig) = three_track_rig();
        playlist.load(None).expect("load");
        playlist.play(None).expect("play");
        assert!(matches!(
            playlist.set_current_by_index(1).unwrap_err(),
            PlayerError::InvalidState(_)
        ));
    }

    #[test]
    fn track_ready_fires_once_per_track() {
        let (playlist, _rig) = three_track_rig();
        let readies = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&readies);
        playlist.on(PlaylistEvent::TrackReady, "test", move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        playlist.load(Some(0)).expect("load");
        playlist.load(Some(0)).expect("reload");
        assert_eq!(readies.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn load_of_nonexistent_index_is_not_found() {
        let (playlist, _rig) = three_track_rig();
        assert_eq!(playlist.load(Some(9)).unwrap_err(), PlayerError::NotFound);
        assert_eq!(playlist.play(Some(9)).unwrap_err(), PlayerError::NotFound);
    }

    #[test]
    fn load_skips_over_failing_tracks() {
        let rig = Rig::new(
            CountingFetcher::new()
                .serving("a", 10)
                .failing("b")
                .serving("c", 30),
        );
        let playlist = Playlist::new(vec![
            rig.track(&["a"]),
            rig.track(&["b"]),
            rig.track(&["c"]),
        ]);

        let track = playlist.load(Some(1)).expect("load walks forward");
        assert_eq!(track.sources(), &["c".to_string()]);
    }

    #[test]
    fn failing_current_track_hands_current_to_successor() {
        let rig = Rig::new(CountingFetcher::new().failing("a").serving("b", 20));
        let playlist = Playlist::new(vec![rig.track(&["a"]), rig.track(&["b"])]);

        let track = playlist.load(None).expect("load");
        assert_eq!(track.sources(), &["b".to_string()]);
        assert_eq!(playlist.current_index().expect("index"), 1);
    }

    #[test]
    fn handoff_applies_before_the_pointer_was_ever_read() {
        let rig = Rig::new(CountingFetcher::new().failing("a").serving("b", 20));
        let playlist = Playlist::new(vec![rig.track(&["a"]), rig.track(&["b"])]);

        // Load by explicit index without touching the current pointer first;
        // the dead track 0 must still hand current over to track 1.
        let track = playlist.load(Some(0)).expect("load walks forward");
        assert_eq!(track.sources(), &["b".to_string()]);
        assert_eq!(playlist.current_index().expect("index"), 1);
    }

    #[test]
    fn exhaustion_surfaces_and_notifies() {
        let rig = Rig::new(CountingFetcher::new().failing("a").failing("b"));
        let playlist = Playlist::new(vec![rig.track(&["a"]), rig.track(&["b"])]);
        let exhausted = Arc::new(AtomicUsize::new(0));

        let e = Arc::clone(&exhausted);
        playlist.on(PlaylistEvent::Exhausted, "test", move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(
            playlist.load(None).unwrap_err(),
            PlayerError::PlaylistExhausted
        );
        assert_eq!(exhausted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finished_track_auto_advances_skipping_failures() {
        let rig = Rig::new(
            CountingFetcher::new()
                .serving("a", 10)
                .failing("b")
                .serving("c", 30),
        );
        let playlist = Playlist::new(vec![
            rig.track(&["a"]),
            rig.track(&["b"]),
            rig.track(&["c"]),
        ]);

        playlist.load(None).expect("load");
        playlist.play(None).expect("play");
        rig.clock.advance(10.0);
        // The first track's source runs out.
        rig.sink.last().finish();

        // Auto-advance skipped the dead second track and landed on the third.
        assert_eq!(playlist.current_index().expect("index"), 2);
        assert!(playlist.is_playing());
        let current = playlist.get(None).expect("current");
        assert_eq!(current.sources(), &["c".to_string()]);
        assert_eq!(current.current_time(), 0.0);
    }

    #[test]
    fn playing_a_track_pauses_the_previous_current() {
        let (playlist, rig) = three_track_rig();

        playlist.load(Some(0)).expect("load a");
        playlist.play(Some(0)).expect("play a");
        rig.clock.advance(3.0);
        let first_source = rig.sink.last();
        assert!(playlist.is_playing());

        playlist.load(Some(1)).expect("load b");
        playlist.play(Some(1)).expect("play b");

        assert_eq!(playlist.current_index().expect("index"), 1);
        assert!(first_source.was_stopped());
        // The first track was paused, not stopped: its position survives.
        let first = playlist.get(Some(0)).expect("track a");
        assert!(!first.is_playing());
        assert_eq!(first.current_time(), 3.0);
    }

    #[test]
    fn play_resets_a_finished_track() {
        let (playlist, rig) = three_track_rig();

        playlist.load(Some(0)).expect("load");
        let track = playlist.get(Some(0)).expect("track");
        track.off(crate::track::TrackEvent::Finished, "playlist-advance");

        playlist.play(Some(0)).expect("play");
        rig.clock.advance(10.0);
        rig.sink.last().finish();
        assert!(!track.is_playing());
        assert_eq!(track.current_time(), track.duration());

        playlist.play(Some(0)).expect("replay");
        assert!(track.is_playing());
        assert_eq!(track.current_time(), 0.0);
        assert_eq!(rig.sink.last().started_at(), Some((0.0, 10.0)));
    }

    #[test]
    fn next_and_previous_navigate_and_restart() {
        let (playlist, rig) = three_track_rig();

        playlist.load(None).expect("load");
        playlist.next().expect("next");
        assert_eq!(playlist.current_index().expect("index"), 1);
        assert!(playlist.is_playing());
        assert_eq!(rig.sink.last().started_at(), Some((0.0, 20.0)));

        playlist.previous().expect("previous");
        assert_eq!(playlist.current_index().expect("index"), 0);
        assert_eq!(rig.sink.last().started_at(), Some((0.0, 10.0)));
    }

    #[test]
    fn navigation_off_the_ends_is_a_noop() {
        let (playlist, _rig) = three_track_rig();

        playlist.previous().expect("previous at start");
        assert_eq!(playlist.current_index().expect("index"), 0);

        playlist.set_current_by_index(2).expect("set");
        playlist.next().expect("next at end");
        assert_eq!(playlist.current_index().expect("index"), 2);
    }

    #[test]
    fn playing_track_preloads_its_successor() {
        let (playlist, rig) = three_track_rig();

        playlist.load(None).expect("load");
        playlist.play(None).expect("play");
        rig.clock.advance(0.1);
        // The zero-second marker fires on the first tick and kicks off a
        // background load of track b.
        playlist.get(None).expect("current").tick();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while rig.fetcher.hits("b") == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(rig.fetcher.hits("b"), 1);
        // Preload does not touch the track after next.
        assert_eq!(rig.fetcher.hits("c"), 0);
    }

    #[test]
    fn pushed_track_extends_the_list() {
        let (playlist, rig) = three_track_rig();
        assert_eq!(playlist.len(), 3);
        playlist.push(rig.track(&["a"]));
        assert_eq!(playlist.len(), 4);
    }
}
