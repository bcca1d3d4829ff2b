//! Collaborator traits for the platform audio primitives.
//!
//! The engine abstracts over fetch, decode and output so it can run against
//! the native backends (ureq / symphonia / cpal) or against whatever a host
//! supplies. All trait objects are `Send + Sync`; backends manage their own
//! concurrency.

use std::sync::Arc;

use crate::error::Result;

/// Decoded, playable audio: interleaved f32 samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Fetches raw bytes from a URL.
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the response body. Non-success statuses are
    /// reported as `PlayerError::Network`.
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// Decodes raw bytes into playable audio data.
pub trait Decoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<AudioData>;
}

/// Creates playable sources and owns the output gain.
pub trait AudioSink: Send + Sync {
    fn create_source(&self, data: &Arc<AudioData>) -> Box<dyn PlayableSource>;

    /// Output gain, 0.0 to 1.0. Default implementation ignores it.
    fn set_gain(&self, _gain: f32) {}
}

/// One playback of one audio buffer window.
///
/// Contract: the completion callback is delivered asynchronously (never from
/// inside `start()`), exactly once, after the source stops for any reason:
/// natural end of the window, an explicit `stop()`, or an output error. The
/// engine decides what the completion means; a superseded source's callback
/// is filtered out there.
pub trait PlayableSource: Send {
    /// Begin playback `offset` seconds into the buffer, for `duration`
    /// seconds.
    fn start(&mut self, offset: f64, duration: f64);

    /// Request the source to stop. Must not block on playback shutdown.
    fn stop(&mut self);

    /// Install the completion callback. Must be called before `start()`.
    fn set_on_ended(&mut self, callback: Box<dyn FnOnce() + Send>);
}

/// Sink that produces silent, never-completing sources.
///
/// Use for headless operation where only the data and timing side of the
/// engine matters and no audio output exists.
pub struct NullSink;

impl AudioSink for NullSink {
    fn create_source(&self, _data: &Arc<AudioData>) -> Box<dyn PlayableSource> {
        Box::new(NullSource)
    }
}

struct NullSource;

impl PlayableSource for NullSource {
    fn start(&mut self, _offset: f64, _duration: f64) {}
    fn stop(&mut self) {}
    fn set_on_ended(&mut self, _callback: Box<dyn FnOnce() + Send>) {}
}

pub mod decode;
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "native")]
pub mod sink;
