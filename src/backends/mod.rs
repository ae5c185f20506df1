//! Remote collaborator abstractions and concrete implementations.

#[cfg(test)]
pub mod fake;
pub mod http;

use std::time::Duration;

use crate::error::PlayerError;

/// Title shown when the remote payload carries none.
pub const UNKNOWN_TITLE: &str = "Unknown Title";
/// Artist shown when the remote payload carries none.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Playlist entry returned by the booth REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct SongEntry {
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Playable media reference understood by the booth listener.
    pub path: Option<String>,
    /// Length in seconds when the catalog knows it.
    pub duration_secs: Option<f64>,
}

impl SongEntry {
    /// Returns the catalog duration when it is usable for the progress timer.
    pub fn known_duration(&self) -> Option<Duration> {
        self.duration_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Booth playlist snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoothPlaylist {
    pub songs: Vec<SongEntry>,
    pub current_index: Option<usize>,
}

/// Playlist cursor movement requested from the booth API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongDirection {
    Next,
    Prev,
    Set(usize),
}

impl SongDirection {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Prev => "prev",
            Self::Set(_) => "set",
        }
    }
}

/// Result of moving the booth playlist cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSongUpdate {
    pub current_index: Option<usize>,
    pub current_song: Option<SongEntry>,
    pub next_song: Option<SongEntry>,
}

/// Transport verbs understood by the booth listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Play,
    Pause,
    Stop,
    Next,
    Prev,
}

impl TransportCommand {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Next => "next",
            Self::Prev => "prev",
        }
    }
}

/// Optional fields attached to a transport command.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandExtras {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_title: Option<String>,
}

impl CommandExtras {
    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = Some(volume);
        self
    }
}

// Older call sites pass just the media path.
impl From<&str> for CommandExtras {
    fn from(path: &str) -> Self {
        Self {
            path: Some(path.to_string()),
            ..Self::default()
        }
    }
}

impl From<String> for CommandExtras {
    fn from(path: String) -> Self {
        Self {
            path: Some(path),
            ..Self::default()
        }
    }
}

/// Transport state reported by the listener status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteTransportState {
    Playing,
    Paused,
    Stopped,
    Unknown,
}

impl RemoteTransportState {
    pub fn from_command(command: Option<&str>) -> Self {
        match command.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("play" | "playing" | "next" | "prev") => Self::Playing,
            Some("pause" | "paused") => Self::Paused,
            Some("stop" | "stopped" | "idle") => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

/// Authoritative listener status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenerStatus {
    pub duration_secs: Option<f64>,
    pub volume: Option<u8>,
    pub path: Option<String>,
    pub command: Option<String>,
}

impl ListenerStatus {
    pub fn known_duration(&self) -> Option<Duration> {
        self.duration_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn transport_state(&self) -> RemoteTransportState {
        RemoteTransportState::from_command(self.command.as_deref())
    }
}

/// Ping answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingReport {
    pub volume: Option<u8>,
}

/// Booth playlist REST collaborator.
pub trait BoothApi: Send {
    fn fetch_playlist(&self, booth_id: &str) -> Result<BoothPlaylist, PlayerError>;
    fn change_current_song(
        &self,
        booth_id: &str,
        direction: SongDirection,
    ) -> Result<CurrentSongUpdate, PlayerError>;
    fn add_song(&self, booth_id: &str, song_id: &str) -> Result<(), PlayerError>;
    fn remove_song(&self, booth_id: &str, song_id: &str) -> Result<(), PlayerError>;
}

/// Active-listener command channel.
pub trait ListenerTransport: Send {
    fn send_command(
        &self,
        listener_id: &str,
        command: TransportCommand,
        extras: &CommandExtras,
    ) -> Result<(), PlayerError>;
    fn set_volume(&self, listener_id: &str, volume: u8) -> Result<(), PlayerError>;
    fn ping(&self, listener_id: &str) -> Result<PingReport, PlayerError>;
    fn status(&self, listener_id: &str) -> Result<ListenerStatus, PlayerError>;
}
