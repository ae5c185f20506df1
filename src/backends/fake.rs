//! Scriptable in-memory collaborators for manager and client tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backends::{
    BoothApi, BoothPlaylist, CommandExtras, CurrentSongUpdate, ListenerStatus, ListenerTransport,
    PingReport, SongDirection, SongEntry, TransportCommand,
};
use crate::error::PlayerError;

pub fn song(id: &str, duration_secs: Option<f64>) -> SongEntry {
    SongEntry {
        id: id.to_string(),
        title: format!("Song {id}"),
        artist: "Artist".to_string(),
        path: Some(format!("{id}.mp4")),
        duration_secs,
    }
}

pub fn unreachable(command: &str) -> PlayerError {
    PlayerError::Unreachable {
        command: command.to_string(),
        message: "connection refused".to_string(),
    }
}

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct BoothScript {
    pub playlist: BoothPlaylist,
    pub calls: Vec<String>,
    pub fetch_failure: Option<PlayerError>,
    pub change_failure: Option<PlayerError>,
}

/// Booth API whose playlist cursor moves like the real backend.
#[derive(Debug, Clone, Default)]
pub struct FakeBoothApi {
    pub script: Arc<Mutex<BoothScript>>,
}

impl FakeBoothApi {
    pub fn with_songs(songs: Vec<SongEntry>) -> Self {
        let current_index = if songs.is_empty() { None } else { Some(0) };
        let api = Self::default();
        lock(&api.script).playlist = BoothPlaylist {
            songs,
            current_index,
        };
        api
    }

    pub fn script(&self) -> MutexGuard<'_, BoothScript> {
        lock(&self.script)
    }
}

impl BoothApi for FakeBoothApi {
    fn fetch_playlist(&self, booth_id: &str) -> Result<BoothPlaylist, PlayerError> {
        let mut script = self.script();
        script.calls.push(format!("fetch:{booth_id}"));
        if let Some(err) = script.fetch_failure.clone() {
            return Err(err);
        }
        Ok(script.playlist.clone())
    }

    fn change_current_song(
        &self,
        booth_id: &str,
        direction: SongDirection,
    ) -> Result<CurrentSongUpdate, PlayerError> {
        let mut script = self.script();
        script
            .calls
            .push(format!("change:{booth_id}:{}", direction.wire_name()));
        if let Some(err) = script.change_failure.clone() {
            return Err(err);
        }
        let len = script.playlist.songs.len();
        if len == 0 {
            return Err(PlayerError::CommandRejected {
                command: "current-song".to_string(),
                status: 400,
                message: "playlist is empty".to_string(),
            });
        }
        let current = script.playlist.current_index.unwrap_or(0);
        let target = match direction {
            SongDirection::Next => (current + 1).min(len - 1),
            SongDirection::Prev => current.saturating_sub(1),
            SongDirection::Set(index) if index < len => index,
            SongDirection::Set(_) => {
                return Err(PlayerError::CommandRejected {
                    command: "current-song".to_string(),
                    status: 400,
                    message: "index out of range".to_string(),
                })
            }
        };
        script.playlist.current_index = Some(target);
        Ok(CurrentSongUpdate {
            current_index: Some(target),
            current_song: script.playlist.songs.get(target).cloned(),
            next_song: script.playlist.songs.get(target + 1).cloned(),
        })
    }

    fn add_song(&self, booth_id: &str, song_id: &str) -> Result<(), PlayerError> {
        let mut script = self.script();
        script.calls.push(format!("add:{booth_id}:{song_id}"));
        script.playlist.songs.push(song(song_id, None));
        if script.playlist.current_index.is_none() {
            script.playlist.current_index = Some(0);
        }
        Ok(())
    }

    fn remove_song(&self, booth_id: &str, song_id: &str) -> Result<(), PlayerError> {
        let mut script = self.script();
        script.calls.push(format!("remove:{booth_id}:{song_id}"));
        script.playlist.songs.retain(|entry| entry.id != song_id);
        let len = script.playlist.songs.len();
        script.playlist.current_index = match script.playlist.current_index {
            _ if len == 0 => None,
            Some(index) => Some(index.min(len - 1)),
            None => Some(0),
        };
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ListenerScript {
    pub sent: Vec<(TransportCommand, CommandExtras)>,
    pub volume_calls: Vec<u8>,
    pub status_calls: u32,
    pub ping_calls: u32,
    /// Popped once per `send_command`; empty means success.
    pub command_failures: VecDeque<PlayerError>,
    /// Popped once per `status`; empty falls back to `default_status`.
    pub status_responses: VecDeque<Result<ListenerStatus, PlayerError>>,
    pub default_status: ListenerStatus,
    pub ping_volume: Option<u8>,
    pub ping_failure: Option<PlayerError>,
    pub volume_failure: Option<PlayerError>,
}

/// Active listener that records every call.
#[derive(Debug, Clone, Default)]
pub struct FakeListener {
    pub script: Arc<Mutex<ListenerScript>>,
}

impl FakeListener {
    pub fn script(&self) -> MutexGuard<'_, ListenerScript> {
        lock(&self.script)
    }

    pub fn sent_commands(&self) -> Vec<TransportCommand> {
        self.script().sent.iter().map(|(command, _)| *command).collect()
    }
}

impl ListenerTransport for FakeListener {
    fn send_command(
        &self,
        _listener_id: &str,
        command: TransportCommand,
        extras: &CommandExtras,
    ) -> Result<(), PlayerError> {
        let mut script = self.script();
        script.sent.push((command, extras.clone()));
        match script.command_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn set_volume(&self, _listener_id: &str, volume: u8) -> Result<(), PlayerError> {
        let mut script = self.script();
        script.volume_calls.push(volume);
        match script.volume_failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn ping(&self, _listener_id: &str) -> Result<PingReport, PlayerError> {
        let mut script = self.script();
        script.ping_calls += 1;
        if let Some(err) = script.ping_failure.clone() {
            return Err(err);
        }
        Ok(PingReport {
            volume: script.ping_volume,
        })
    }

    fn status(&self, _listener_id: &str) -> Result<ListenerStatus, PlayerError> {
        let mut script = self.script();
        script.status_calls += 1;
        match script.status_responses.pop_front() {
            Some(response) => response,
            None => Ok(script.default_status.clone()),
        }
    }
}
