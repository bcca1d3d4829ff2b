//! cadence-core: playback timing engine for mirrored audio sources.
//!
//! The crate models audio playback the way a browser audio pipeline does,
//! but with every collaborator explicit: a [`Clock`] supplies monotonic
//! seconds, a [`Fetcher`](backend::Fetcher) downloads bytes, a
//! [`Decoder`](backend::Decoder) turns them into PCM, an
//! [`AudioSink`](backend::AudioSink) plays buffers, and a [`SettingsStore`]
//! remembers preferences. Everything above those seams is deterministic and
//! testable without a sound card.
//!
//! The moving parts:
//!
//! - [`Track`]: one audio item with its own play/pause/seek/stop timing
//!   state, mirror list and time markers.
//! - [`Playlist`]: an ordered track list with a current pointer,
//!   auto-advance on finish and skip-on-load-failure.
//! - [`SourceResolver`]: turns a mirror URL list into one decoded buffer,
//!   collapsing overlapping concurrent loads into one fetch.
//! - [`Player`]: the hub that owns the collaborators, hands out wired
//!   tracks, drives ticks and persists volume and equalizer settings.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cadence_core::{Player, SystemClock};
//! use cadence_core::backend::decode::SymphoniaDecoder;
//! use cadence_core::backend::NullSink;
//! use cadence_core::settings::NoopStore;
//! # use cadence_core::backend::Fetcher;
//! # fn fetcher() -> Arc<dyn Fetcher> { unimplemented!() }
//!
//! let player = Player::new(
//!     Arc::new(SystemClock::new()),
//!     fetcher(),
//!     Arc::new(SymphoniaDecoder::new()),
//!     Arc::new(NullSink),
//!     Arc::new(NoopStore),
//! );
//! let track = player.load_url(vec!["https://example.com/song.mp3".into()])?;
//! track.when(30.0, |t| println!("30s actually listened of {:?}", t.sources()))?;
//! track.play()?;
//! player.start(Duration::from_millis(250));
//! # Ok::<(), cadence_core::PlayerError>(())
//! ```

pub mod backend;
pub mod clock;
pub mod error;
pub mod events;
mod markers;
pub mod player;
pub mod playlist;
pub mod resolver;
pub mod settings;
pub mod track;

#[cfg(test)]
pub(crate) mod test_util;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{PlayerError, Result};
pub use player::{AudioSettings, Player, EQ_BANDS};
pub use playlist::{Playlist, PlaylistEvent};
pub use resolver::SourceResolver;
pub use settings::SettingsStore;
pub use track::{Track, TrackEvent};
