//! Error types for the cadence engine.

use thiserror::Error;

/// Result type for cadence operations.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors surfaced by tracks, playlists and source resolution.
///
/// The enum is `Clone` because a single resolution outcome is shared with
/// every caller waiting on the same in-flight URL set.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// Negative or non-finite seek offset / marker threshold.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Playback was requested before the track's audio data was loaded.
    #[error("Track is not loaded")]
    NotLoaded,

    /// Every mirror URL of a track failed to fetch or decode.
    #[error("No valid audio sources provided")]
    NoValidSource,

    /// No track at the requested playlist position.
    #[error("No such track in the list")]
    NotFound,

    /// Playlist index out of range.
    #[error("Index not found: {0}")]
    IndexNotFound(usize),

    /// Operation not allowed in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The playlist is empty, so there is no current track to navigate from.
    #[error("Cannot determine the current track")]
    NoCurrentTrack,

    /// Every remaining track in the playlist failed to load.
    #[error("All remaining playlist tracks failed to load")]
    PlaylistExhausted,

    /// Transport-level fetch failure, including non-2xx responses.
    #[error("Network error: {0}")]
    Network(String),

    /// The fetched bytes could not be decoded into playable audio.
    #[error("Decode error: {0}")]
    Decode(String),
}
