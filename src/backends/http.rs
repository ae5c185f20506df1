//! Booth REST API and active-listener adapter backed by `ureq`.

use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::backends::{
    BoothApi, BoothPlaylist, CommandExtras, CurrentSongUpdate, ListenerStatus, ListenerTransport,
    PingReport, SongDirection, SongEntry, TransportCommand, UNKNOWN_ARTIST, UNKNOWN_TITLE,
};
use crate::config::ApiConfig;
use crate::error::PlayerError;

/// HTTP adapter for the booth backend.
pub struct BoothHttpAdapter {
    http_client: ureq::Agent,
    base_url: String,
    auth_token: String,
}

impl BoothHttpAdapter {
    /// Creates an adapter from API settings.
    pub fn new(config: &ApiConfig) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(config.connect_timeout_ms))
            .timeout_read(Duration::from_millis(config.request_timeout_ms))
            .timeout_write(Duration::from_millis(config.request_timeout_ms))
            .build();
        Self {
            http_client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            auth_token: config.auth_token.trim().to_string(),
        }
    }

    fn url(&self, segments: &[&str]) -> String {
        let path: Vec<String> = segments
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.base_url, path.join("/"))
    }

    fn request_json(
        &self,
        action: &str,
        method: &str,
        url: &str,
        body: Option<Value>,
    ) -> Result<Value, PlayerError> {
        debug!("BoothHttpAdapter: {} {} ({})", method, url, action);
        let mut request = self.http_client.request(method, url);
        if !self.auth_token.is_empty() {
            request = request.set("Authorization", &format!("Bearer {}", self.auth_token));
        }
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        match result {
            Ok(response) => {
                let text = response.into_string().map_err(|err| PlayerError::Unreachable {
                    command: action.to_string(),
                    message: format!("failed to read response body: {err}"),
                })?;
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                serde_json::from_str(&text)
                    .map_err(|err| PlayerError::Decode(format!("{action}: {err}")))
            }
            Err(ureq::Error::Status(status, response)) => {
                let status_text = response.status_text().to_string();
                let message = response
                    .into_string()
                    .ok()
                    .and_then(|text| serde_json::from_str::<Value>(&text).ok())
                    .and_then(|payload| {
                        payload
                            .get("message")
                            .and_then(Value::as_str)
                            .map(ToOwned::to_owned)
                    })
                    .unwrap_or(status_text);
                Err(PlayerError::CommandRejected {
                    command: action.to_string(),
                    status,
                    message,
                })
            }
            Err(ureq::Error::Transport(transport)) => Err(PlayerError::Unreachable {
                command: action.to_string(),
                message: transport.to_string(),
            }),
        }
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn value_to_index(value: &Value) -> Option<usize> {
    value_to_f64(value)
        .filter(|number| number.is_finite() && *number >= 0.0)
        .map(|number| number as usize)
}

fn value_to_volume(value: &Value) -> Option<u8> {
    value_to_f64(value)
        .filter(|number| number.is_finite())
        .map(|number| number.round().clamp(0.0, 100.0) as u8)
}

/// Picks the first present field, preferring the nested `Song` relation.
fn pick_song_field<'a>(song: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let nested = song.get("Song");
    for key in keys {
        if let Some(found) = nested
            .and_then(|relation| relation.get(*key))
            .filter(|value| !value.is_null())
        {
            return Some(found);
        }
    }
    keys.iter()
        .find_map(|key| song.get(*key).filter(|value| !value.is_null()))
}

pub(crate) fn parse_song(song: &Value) -> Option<SongEntry> {
    if !song.is_object() {
        return None;
    }
    // Entry id first: removal addresses the playlist entry, not the catalog song.
    let id = ["id", "songId"]
        .iter()
        .find_map(|key| song.get(*key).and_then(value_to_string))
        .or_else(|| pick_song_field(song, &["id"]).and_then(value_to_string))
        .unwrap_or_default();
    let title = pick_song_field(song, &["title", "judul", "name"])
        .and_then(value_to_string)
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let artist = pick_song_field(song, &["artist"])
        .and_then(value_to_string)
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let path = pick_song_field(song, &["path"]).and_then(value_to_string);
    let duration_secs = pick_song_field(song, &["duration", "durationSec"])
        .and_then(value_to_f64)
        .filter(|secs| *secs > 0.0);
    Some(SongEntry {
        id,
        title,
        artist,
        path,
        duration_secs,
    })
}

pub(crate) fn parse_playlist(payload: &Value) -> BoothPlaylist {
    let Some(data) = payload.get("data").filter(|data| data.is_object()) else {
        return BoothPlaylist::default();
    };
    let songs: Vec<SongEntry> = data
        .get("songs")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_song).collect())
        .unwrap_or_default();
    let current_index = if songs.is_empty() {
        None
    } else {
        let index = data
            .get("currentSongIndex")
            .and_then(value_to_index)
            .unwrap_or(0);
        Some(index.min(songs.len() - 1))
    };
    BoothPlaylist {
        songs,
        current_index,
    }
}

pub(crate) fn parse_current_song_update(payload: &Value) -> Result<CurrentSongUpdate, PlayerError> {
    let data = payload
        .get("data")
        .filter(|data| data.is_object())
        .ok_or_else(|| PlayerError::Decode("current-song response missing data".to_string()))?;
    Ok(CurrentSongUpdate {
        current_index: data.get("currentSongIndex").and_then(value_to_index),
        current_song: data.get("currentSong").and_then(parse_song),
        next_song: data.get("nextSong").and_then(parse_song),
    })
}

pub(crate) fn parse_status(payload: &Value) -> ListenerStatus {
    let Some(data) = payload.get("data") else {
        return ListenerStatus::default();
    };
    ListenerStatus {
        duration_secs: data.get("duration").and_then(value_to_f64),
        volume: data.get("volume").and_then(value_to_volume),
        path: data.get("path").and_then(value_to_string),
        command: data.get("command").and_then(value_to_string),
    }
}

pub(crate) fn parse_ping(payload: &Value) -> PingReport {
    PingReport {
        volume: payload
            .get("listener")
            .and_then(|listener| listener.get("volume"))
            .and_then(value_to_volume),
    }
}

impl BoothApi for BoothHttpAdapter {
    fn fetch_playlist(&self, booth_id: &str) -> Result<BoothPlaylist, PlayerError> {
        let url = self.url(&["playlists", "booth", booth_id]);
        let payload = self.request_json("fetch playlist", "GET", &url, None)?;
        Ok(parse_playlist(&payload))
    }

    fn change_current_song(
        &self,
        booth_id: &str,
        direction: SongDirection,
    ) -> Result<CurrentSongUpdate, PlayerError> {
        let url = self.url(&["playlists", "booth", booth_id, "current-song"]);
        let mut body = serde_json::json!({ "direction": direction.wire_name() });
        if let SongDirection::Set(index) = direction {
            body["songIndex"] = serde_json::json!(index);
        }
        let payload = self.request_json("change current song", "PUT", &url, Some(body))?;
        parse_current_song_update(&payload)
    }

    fn add_song(&self, booth_id: &str, song_id: &str) -> Result<(), PlayerError> {
        let url = self.url(&["playlists", "booth", booth_id, "add-song"]);
        let _ = self.request_json(
            "add song",
            "POST",
            &url,
            Some(serde_json::json!({ "songId": song_id })),
        )?;
        Ok(())
    }

    fn remove_song(&self, booth_id: &str, song_id: &str) -> Result<(), PlayerError> {
        let url = self.url(&["playlists", "booth", booth_id, "songs", song_id]);
        let _ = self.request_json("remove song", "DELETE", &url, None)?;
        Ok(())
    }
}

impl ListenerTransport for BoothHttpAdapter {
    fn send_command(
        &self,
        listener_id: &str,
        command: TransportCommand,
        extras: &CommandExtras,
    ) -> Result<(), PlayerError> {
        let url = self.url(&["active-listeners", "unique", listener_id, "send-command"]);
        let mut body = serde_json::to_value(extras)
            .map_err(|err| PlayerError::Decode(format!("failed to encode extras: {err}")))?;
        body["command"] = Value::String(command.wire_name().to_string());
        let _ = self.request_json(command.wire_name(), "POST", &url, Some(body))?;
        Ok(())
    }

    fn set_volume(&self, listener_id: &str, volume: u8) -> Result<(), PlayerError> {
        let url = self.url(&["active-listeners", "unique", listener_id, "command"]);
        let _ = self.request_json(
            "volume",
            "PUT",
            &url,
            Some(serde_json::json!({ "volume": volume })),
        )?;
        Ok(())
    }

    fn ping(&self, listener_id: &str) -> Result<PingReport, PlayerError> {
        let url = self.url(&["active-listeners", "unique", listener_id, "ping"]);
        let payload = self.request_json("ping", "POST", &url, None)?;
        Ok(parse_ping(&payload))
    }

    fn status(&self, listener_id: &str) -> Result<ListenerStatus, PlayerError> {
        let url = self.url(&["active-listeners", "unique", listener_id, "status"]);
        let payload = self.request_json("status", "GET", &url, None)?;
        Ok(parse_status(&payload))
    }
}
