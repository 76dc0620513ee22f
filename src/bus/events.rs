//! Event types published by the follower

use serde::{Deserialize, Serialize};

/// Display-level playback state derived once per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing is playing. A normal condition, not an error.
    Stopped,
    /// The selected player is playing.
    Playing,
    /// The CLI connection is gone; the caller should reconnect.
    Fail,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Playing => write!(f, "playing"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Event types that can be published on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BusEvent {
    // LMS CLI connection
    LmsConnected { host: String },
    LmsDisconnected { host: String },

    // Display drivers (LED, tones, panel) follow these
    PlaybackStateChanged { state: PlaybackState },
    /// The selected player changed or started a new track: fetch its artwork
    CoverArtChanged { player_id: String, url: String },

    // Lifecycle
    ShuttingDown,
    AdapterStopped { adapter: String },
}
