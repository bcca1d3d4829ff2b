//! Shared test doubles: a scripted fetcher, a length-based decoder, a
//! recording sink and a wired-up rig around them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::backend::{AudioData, AudioSink, Decoder, Fetcher, PlayableSource};
use crate::clock::ManualClock;
use crate::error::{PlayerError, Result};
use crate::resolver::SourceResolver;
use crate::track::Track;

/// Fetcher with scripted per-URL responses and hit counting.
///
/// Unscripted URLs fail with a network error. `serving(url, n)` responds
/// with `n` bytes, which [`LenDecoder`] turns into `n` seconds of audio.
pub(crate) struct CountingFetcher {
    responses: HashMap<String, Result<Vec<u8>>>,
    hits: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl CountingFetcher {
    pub(crate) fn new() -> Self {
        Self {
            responses: HashMap::new(),
            hits: Mutex::new(HashMap::new()),
            delay: None,
        }
    }

    pub(crate) fn serving(mut self, url: &str, bytes: usize) -> Self {
        self.responses.insert(url.to_string(), Ok(vec![0; bytes]));
        self
    }

    pub(crate) fn failing(mut self, url: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Err(PlayerError::Network(format!("scripted failure: {}", url))),
        );
        self
    }

    /// Delay every fetch, for exercising concurrent resolutions.
    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn hits(&self, url: &str) -> usize {
        self.hits.lock().get(url).copied().unwrap_or(0)
    }
}

impl Fetcher for CountingFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        *self.hits.lock().entry(url.to_string()).or_insert(0) += 1;
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(PlayerError::Network(format!("no route: {}", url))))
    }
}

/// Decoder that turns `n` bytes into `n` frames of mono audio at 1 Hz, so a
/// payload's byte length doubles as its duration in seconds. Empty payloads
/// are a decode error.
pub(crate) struct LenDecoder;

impl Decoder for LenDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioData> {
        if bytes.is_empty() {
            return Err(PlayerError::Decode("empty payload".into()));
        }
        Ok(AudioData::new(vec![0.0; bytes.len()], 1, 1))
    }
}

/// Everything observable about one created source.
pub(crate) struct MockSourceState {
    started: Mutex<Option<(f64, f64)>>,
    stopped: AtomicBool,
    on_ended: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl MockSourceState {
    /// The `(offset, duration)` passed to `start()`, if it ran.
    pub(crate) fn started_at(&self) -> Option<(f64, f64)> {
        *self.started.lock()
    }

    pub(crate) fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Deliver the completion callback, as a real backend would after the
    /// window ran out or stop took effect.
    pub(crate) fn finish(&self) {
        let callback = self.on_ended.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// Sink that records every source it creates and plays nothing.
pub(crate) struct MockSink {
    sources: Mutex<Vec<Arc<MockSourceState>>>,
}

impl MockSink {
    pub(crate) fn new() -> Self {
        Self {
            sources: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.sources.lock().len()
    }

    /// The most recently created source. Panics when none exists.
    pub(crate) fn last(&self) -> Arc<MockSourceState> {
        let sources = self.sources.lock();
        Arc::clone(sources.last().expect("no source was created"))
    }
}

impl AudioSink for MockSink {
    fn create_source(&self, _data: &Arc<AudioData>) -> Box<dyn PlayableSource> {
        let state = Arc::new(MockSourceState {
            started: Mutex::new(None),
            stopped: AtomicBool::new(false),
            on_ended: Mutex::new(None),
        });
        self.sources.lock().push(Arc::clone(&state));
        Box::new(MockSource { state })
    }
}

struct MockSource {
    state: Arc<MockSourceState>,
}

impl PlayableSource for MockSource {
    fn start(&mut self, offset: f64, duration: f64) {
        *self.state.started.lock() = Some((offset, duration));
    }

    fn stop(&mut self) {
        self.state.stopped.store(true, Ordering::SeqCst);
    }

    fn set_on_ended(&mut self, callback: Box<dyn FnOnce() + Send>) {
        *self.state.on_ended.lock() = Some(callback);
    }
}

/// A manual clock, recording sink and resolver wired together.
pub(crate) struct Rig {
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) sink: Arc<MockSink>,
    pub(crate) fetcher: Arc<CountingFetcher>,
    pub(crate) resolver: Arc<SourceResolver>,
}

impl Rig {
    pub(crate) fn new(fetcher: CountingFetcher) -> Self {
        let fetcher = Arc::new(fetcher);
        let resolver = Arc::new(SourceResolver::new(
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            Arc::new(LenDecoder),
        ));
        Self {
            clock: Arc::new(ManualClock::new()),
            sink: Arc::new(MockSink::new()),
            fetcher,
            resolver,
        }
    }

    pub(crate) fn track(&self, urls: &[&str]) -> Track {
        Track::new(
            urls.iter().map(|s| s.to_string()).collect(),
            Arc::clone(&self.clock) as Arc<dyn crate::clock::Clock>,
            Arc::clone(&self.sink) as Arc<dyn AudioSink>,
            Arc::clone(&self.resolver),
        )
    }

    pub(crate) fn loaded_track(&self, urls: &[&str]) -> Track {
        let track = self.track(urls);
        track.load().expect("test track failed to load");
        track
    }
}

/// A single loaded track of `duration` whole seconds, with its rig.
pub(crate) fn loaded_track(duration: f64) -> (Track, Rig) {
    let rig = Rig::new(CountingFetcher::new().serving("t", duration.round() as usize));
    let track = rig.loaded_track(&["t"]);
    (track, rig)
}
