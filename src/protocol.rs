//! Event-bus protocol shared by the console, the player manager and observers.

use crate::backends::SongEntry;
use crate::error::PlayerError;

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Player(PlayerIntent),
    Notification(PlayerNotification),
}

/// Inbound intents accepted by the player manager.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerIntent {
    /// Establishes the booth session; other intents fail until this succeeds.
    Connect {
        booth_id: String,
        listener_id: String,
    },
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    /// Moves the playlist cursor to an explicit entry and plays it.
    PlayIndex(usize),
    /// Plays a catalog song without moving the playlist cursor.
    PlaySong(SongEntry),
    VolumeUp,
    VolumeDown,
    SetVolume(i32),
    RefreshPlaylist,
    AddSong(String),
    RemoveSong(String),
    Shutdown,
}

impl PlayerIntent {
    /// Short label used in logs and failure notifications.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::PlayIndex(_) => "play_index",
            Self::PlaySong(_) => "play_song",
            Self::VolumeUp => "volume_up",
            Self::VolumeDown => "volume_down",
            Self::SetVolume(_) => "set_volume",
            Self::RefreshPlaylist => "refresh_playlist",
            Self::AddSong(_) => "add_song",
            Self::RemoveSong(_) => "remove_song",
            Self::Shutdown => "shutdown",
        }
    }

    /// Transport intents are serialized; only one may be in flight.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Play
                | Self::Pause
                | Self::Stop
                | Self::Next
                | Self::Previous
                | Self::PlayIndex(_)
                | Self::PlaySong(_)
        )
    }
}

/// Orchestrator state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// No song selected.
    #[default]
    Idle,
    /// Waiting on a song transition or a duration lookup.
    Loading,
    Playing,
    Paused,
    Stopped,
}

/// Observable player state rendered by the screen layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub state: TransportState,
    pub current_song: Option<SongEntry>,
    pub current_index: Option<usize>,
    pub next_song_title: Option<String>,
    pub is_playing: bool,
    pub elapsed_secs: f64,
    /// Zero while the duration is unknown.
    pub duration_secs: f64,
    pub volume: u8,
    pub is_busy: bool,
    pub playlist_len: usize,
}

/// Outbound notifications published by the player manager.
#[derive(Debug, Clone)]
pub enum PlayerNotification {
    SnapshotUpdated(PlayerSnapshot),
    PlaylistUpdated(Vec<SongEntry>),
    ActionFailed {
        action: String,
        error: PlayerError,
        retryable: bool,
    },
}
