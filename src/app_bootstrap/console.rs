//! Line-oriented console driver standing in for the player screen.

use crate::backends::{SongEntry, UNKNOWN_ARTIST, UNKNOWN_TITLE};
use crate::progress_timer::format_time;
use crate::protocol::{PlayerIntent, PlayerSnapshot, TransportState};

pub const HELP_TEXT: &str = "commands: connect <booth> <listener> | play | pause | stop | next | prev | \
pick <index> | song <path> [title] | vol+ | vol- | vol <0-100> | refresh | add <song id> | \
remove <song id> | help | quit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Intent(PlayerIntent),
    Help,
    Quit,
    Empty,
}

pub fn parse_console_line(line: &str) -> Result<ConsoleInput, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(ConsoleInput::Empty);
    };
    let rest: Vec<&str> = words.collect();
    let intent = match command.to_ascii_lowercase().as_str() {
        "help" | "?" => return Ok(ConsoleInput::Help),
        "quit" | "exit" => return Ok(ConsoleInput::Quit),
        "connect" => match rest.as_slice() {
            [booth_id, listener_id] => PlayerIntent::Connect {
                booth_id: booth_id.to_string(),
                listener_id: listener_id.to_string(),
            },
            _ => return Err("usage: connect <booth> <listener>".to_string()),
        },
        "play" => PlayerIntent::Play,
        "pause" => PlayerIntent::Pause,
        "stop" => PlayerIntent::Stop,
        "next" => PlayerIntent::Next,
        "prev" | "previous" => PlayerIntent::Previous,
        "pick" => {
            let index = rest
                .first()
                .and_then(|value| value.parse::<usize>().ok())
                .ok_or_else(|| "usage: pick <index>".to_string())?;
            PlayerIntent::PlayIndex(index)
        }
        "song" => {
            let path = rest
                .first()
                .ok_or_else(|| "usage: song <path> [title]".to_string())?;
            let title = if rest.len() > 1 {
                rest[1..].join(" ")
            } else {
                UNKNOWN_TITLE.to_string()
            };
            PlayerIntent::PlaySong(SongEntry {
                id: path.to_string(),
                title,
                artist: UNKNOWN_ARTIST.to_string(),
                path: Some(path.to_string()),
                duration_secs: None,
            })
        }
        "vol+" => PlayerIntent::VolumeUp,
        "vol-" => PlayerIntent::VolumeDown,
        "vol" => {
            let volume = rest
                .first()
                .and_then(|value| value.parse::<i32>().ok())
                .ok_or_else(|| "usage: vol <0-100>".to_string())?;
            PlayerIntent::SetVolume(volume)
        }
        "refresh" => PlayerIntent::RefreshPlaylist,
        "add" | "remove" => {
            let song_id = rest
                .first()
                .ok_or_else(|| format!("usage: {command} <song id>"))?
                .to_string();
            if command.eq_ignore_ascii_case("add") {
                PlayerIntent::AddSong(song_id)
            } else {
                PlayerIntent::RemoveSong(song_id)
            }
        }
        other => return Err(format!("unknown command '{other}', type 'help'")),
    };
    Ok(ConsoleInput::Intent(intent))
}

fn state_label(state: TransportState) -> &'static str {
    match state {
        TransportState::Idle => "idle",
        TransportState::Loading => "loading",
        TransportState::Playing => "playing",
        TransportState::Paused => "paused",
        TransportState::Stopped => "stopped",
    }
}

/// Single status line for the terminal.
pub fn render_snapshot(snapshot: &PlayerSnapshot) -> String {
    let song = snapshot
        .current_song
        .as_ref()
        .map(|song| format!("{} - {}", song.title, song.artist))
        .unwrap_or_else(|| "no song".to_string());
    let progress = if snapshot.duration_secs > 0.0 {
        format!(
            "{} / {}",
            format_time(snapshot.elapsed_secs),
            format_time(snapshot.duration_secs)
        )
    } else {
        "--:--".to_string()
    };
    let label = match (snapshot.state, snapshot.is_playing) {
        (TransportState::Loading, true) => "loading, playing",
        (state, _) => state_label(state),
    };
    let position = snapshot
        .current_index
        .map(|index| format!("#{}/{} ", index + 1, snapshot.playlist_len))
        .unwrap_or_default();
    let mut line = format!(
        "[{}] {}{} {} vol {}",
        label, position, song, progress, snapshot.volume
    );
    if let Some(next) = snapshot.next_song_title.as_deref() {
        line.push_str(&format!(" | next: {next}"));
    }
    if snapshot.is_busy {
        line.push_str(" (busy)");
    }
    line
}
