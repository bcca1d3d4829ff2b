//! Native output sink — plays decoded buffers through cpal.
//!
//! Each source plays one window of one `AudioData` on the default output
//! device. The output callback walks the source frames at the rate ratio
//! with linear interpolation, so tracks play at the right speed even when
//! the device cannot be opened at the track's sample rate.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

use crate::backend::{AudioData, AudioSink, PlayableSource};

/// Sink backed by the default cpal output device.
pub struct CpalSink {
    /// Gain 0-100 mapped to 0.0-1.0.
    gain: Arc<AtomicU32>,
}

impl CpalSink {
    pub fn new() -> Self {
        Self {
            gain: Arc::new(AtomicU32::new(100)),
        }
    }
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for CpalSink {
    fn create_source(&self, data: &Arc<AudioData>) -> Box<dyn PlayableSource> {
        Box::new(CpalSource {
            data: Arc::clone(data),
            gain: Arc::clone(&self.gain),
            shared: Arc::new(SourceShared {
                stop: AtomicBool::new(false),
                on_ended: Mutex::new(None),
            }),
        })
    }

    fn set_gain(&self, gain: f32) {
        let v = (gain.clamp(0.0, 1.0) * 100.0) as u32;
        self.gain.store(v, Ordering::SeqCst);
    }
}

struct SourceShared {
    stop: AtomicBool,
    on_ended: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

struct CpalSource {
    data: Arc<AudioData>,
    gain: Arc<AtomicU32>,
    shared: Arc<SourceShared>,
}

impl PlayableSource for CpalSource {
    fn start(&mut self, offset: f64, duration: f64) {
        let data = Arc::clone(&self.data);
        let gain = Arc::clone(&self.gain);
        let shared = Arc::clone(&self.shared);

        // The stream lives on its own thread; completion is delivered from
        // there, never from start().
        thread::spawn(move || {
            if let Err(err) = run_window(&data, &gain, &shared, offset, duration) {
                log::error!("cadence: output error: {}", err);
            }
            if let Some(callback) = shared.on_ended.lock().take() {
                callback();
            }
        });
    }

    fn stop(&mut self) {
        // Non-blocking by contract: the playback thread notices the flag,
        // winds down and delivers the completion callback itself.
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    fn set_on_ended(&mut self, callback: Box<dyn FnOnce() + Send>) {
        *self.shared.on_ended.lock() = Some(callback);
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }
}

fn run_window(
    data: &Arc<AudioData>,
    gain: &Arc<AtomicU32>,
    shared: &Arc<SourceShared>,
    offset: f64,
    duration: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("no output device available")?;

    let track_rate = data.sample_rate();
    let track_channels = data.channels();

    // Prefer opening the device at the track's own rate and channel count.
    let device_supports_track = device
        .supported_output_configs()
        .map(|configs| {
            configs.into_iter().any(|range| {
                range.sample_format() == cpal::SampleFormat::F32
                    && range.channels() >= track_channels
                    && range.min_sample_rate().0 <= track_rate
                    && range.max_sample_rate().0 >= track_rate
            })
        })
        .unwrap_or(false);

    let config: cpal::StreamConfig = if device_supports_track {
        cpal::StreamConfig {
            channels: track_channels,
            sample_rate: cpal::SampleRate(track_rate),
            buffer_size: cpal::BufferSize::Default,
        }
    } else {
        let default_cfg = device.default_output_config()?;
        if default_cfg.sample_format() != cpal::SampleFormat::F32 {
            return Err(format!(
                "device does not support f32 output (got {:?})",
                default_cfg.sample_format()
            )
            .into());
        }
        default_cfg.into()
    };

    let out_channels = config.channels as usize;
    let src_channels = track_channels as usize;
    // Source frames consumed per output frame.
    let step = track_rate as f64 / config.sample_rate.0 as f64;

    let start_frame = offset * track_rate as f64;
    let end_frame = ((offset + duration) * track_rate as f64).min(data.frames() as f64);

    let done = Arc::new(AtomicBool::new(false));
    let cb_done = Arc::clone(&done);
    let cb_data = Arc::clone(data);
    let cb_gain = Arc::clone(gain);
    let mut position = start_frame;

    let stream = device.build_output_stream(
        &config,
        move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let vol = cb_gain.load(Ordering::SeqCst) as f32 / 100.0;
            let samples = cb_data.samples();
            let frames = cb_data.frames();

            for frame in out.chunks_mut(out_channels) {
                if position >= end_frame {
                    frame.fill(0.0);
                    cb_done.store(true, Ordering::SeqCst);
                    continue;
                }

                let base = position.floor() as usize;
                let frac = (position - base as f64) as f32;
                let next = if base + 1 < frames { base + 1 } else { base };

                // Interpolated source frame, then channel adaptation.
                let sample_at = |ch: usize| -> f32 {
                    let a = samples[base * src_channels + ch];
                    let b = samples[next * src_channels + ch];
                    a + (b - a) * frac
                };

                if src_channels == 1 {
                    // Mono: duplicate to all output channels.
                    let s = sample_at(0) * vol;
                    frame.fill(s);
                } else if out_channels == 1 {
                    // Downmix: average all source channels.
                    let sum: f32 = (0..src_channels).map(sample_at).sum();
                    frame[0] = sum / src_channels as f32 * vol;
                } else {
                    for (ch, slot) in frame.iter_mut().enumerate() {
                        *slot = if ch < src_channels {
                            sample_at(ch) * vol
                        } else {
                            0.0
                        };
                    }
                }

                position += step;
            }
        },
        move |err| {
            log::error!("cadence: cpal stream error: {}", err);
        },
        None,
    )?;

    stream.play()?;

    // Keep the stream alive until the window finished or stop was requested.
    while !done.load(Ordering::SeqCst) && !shared.stop.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(25));
    }

    Ok(())
}
