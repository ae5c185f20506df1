//! Authoritative "what is playing" state for one booth session.

use crate::backends::{BoothPlaylist, SongEntry};

/// Playlist plus transport state rendered by observers.
pub struct PlaybackSession {
    playlist: Vec<SongEntry>,
    current_index: Option<usize>,
    current_song: Option<SongEntry>,
    is_playing: bool,
    volume: u8,
}

impl PlaybackSession {
    pub fn new(initial_volume: u8) -> Self {
        Self {
            playlist: Vec::new(),
            current_index: None,
            current_song: None,
            is_playing: false,
            volume: initial_volume.min(100),
        }
    }

    pub fn set_playing(&mut self, is_playing: bool) {
        self.is_playing = is_playing;
    }

    /// Returns `true` when the song identity changed.
    pub fn set_current_song(&mut self, song: Option<SongEntry>, index: Option<usize>) -> bool {
        let index = index.filter(|_| song.is_some());
        let changed = self.current_song.as_ref().map(song_identity)
            != song.as_ref().map(song_identity);
        self.current_song = song;
        self.current_index = index;
        changed
    }

    /// Clamps into `0..=100` and returns the stored value.
    pub fn set_volume(&mut self, volume: i32) -> u8 {
        self.volume = volume.clamp(0, 100) as u8;
        self.volume
    }

    /// Adopts a fetched playlist and realigns the current song with its index.
    pub fn replace_playlist(&mut self, playlist: BoothPlaylist) -> bool {
        self.playlist = playlist.songs;
        let index = playlist
            .current_index
            .filter(|index| *index < self.playlist.len());
        let song = index.and_then(|index| self.playlist.get(index).cloned());
        let song = match (song, self.current_song.as_ref()) {
            // Keep a duration learned from the listener when the catalog has none.
            (Some(mut fresh), Some(previous)) if song_identity(&fresh) == song_identity(previous) => {
                if fresh.duration_secs.is_none() {
                    fresh.duration_secs = previous.duration_secs;
                }
                Some(fresh)
            }
            (song, _) => song,
        };
        self.set_current_song(song, index)
    }

    /// Replaces the list but keeps a song that was played outside of it.
    pub fn replace_songs(&mut self, songs: Vec<SongEntry>) {
        self.playlist = songs;
        if self
            .current_index
            .is_some_and(|index| index >= self.playlist.len())
        {
            self.current_index = None;
        }
    }

    /// Back-fills a duration learned from the listener.
    pub fn backfill_duration(&mut self, duration_secs: f64) {
        let Some(current) = self.current_song.as_mut() else {
            return;
        };
        if current.duration_secs.is_some() {
            return;
        }
        current.duration_secs = Some(duration_secs);
        let identity = song_identity(current);
        if let Some(entry) = self
            .current_index
            .and_then(|index| self.playlist.get_mut(index))
            .filter(|entry| song_identity(entry) == identity)
        {
            entry.duration_secs = Some(duration_secs);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn current_song(&self) -> Option<&SongEntry> {
        self.current_song.as_ref()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn playlist(&self) -> &[SongEntry] {
        &self.playlist
    }

    pub fn is_index_valid(&self, index: usize) -> bool {
        index < self.playlist.len()
    }

    pub fn next_song(&self) -> Option<&SongEntry> {
        self.current_index
            .and_then(|index| self.playlist.get(index.saturating_add(1)))
    }
}

fn song_identity(song: &SongEntry) -> (&str, Option<&str>) {
    (song.id.as_str(), song.path.as_deref())
}

#[cfg(test)]
mod tests {
    use super::PlaybackSession;
    use crate::backends::{BoothPlaylist, SongEntry};

    fn song(id: &str, duration_secs: Option<f64>) -> SongEntry {
        SongEntry {
            id: id.to_string(),
            title: format!("Song {id}"),
            artist: "Artist".to_string(),
            path: Some(format!("{id}.mp4")),
            duration_secs,
        }
    }

    #[test]
    fn test_volume_is_always_clamped() {
        let mut session = PlaybackSession::new(70);
        assert_eq!(session.set_volume(130), 100);
        assert_eq!(session.set_volume(-5), 0);
        assert_eq!(session.set_volume(55), 55);
        assert_eq!(PlaybackSession::new(200).volume(), 100);
    }

    #[test]
    fn test_replace_playlist_selects_current_entry() {
        let mut session = PlaybackSession::new(70);
        let changed = session.replace_playlist(BoothPlaylist {
            songs: vec![song("a", None), song("b", Some(30.0))],
            current_index: Some(1),
        });
        assert!(changed);
        assert_eq!(session.current_index(), Some(1));
        assert_eq!(session.current_song().map(|song| song.id.as_str()), Some("b"));
        assert!(session.next_song().is_none());
    }

    #[test]
    fn test_empty_playlist_has_no_current_song() {
        let mut session = PlaybackSession::new(70);
        session.replace_playlist(BoothPlaylist {
            songs: vec![song("a", None)],
            current_index: Some(0),
        });
        session.replace_playlist(BoothPlaylist::default());
        assert!(session.current_song().is_none());
        assert_eq!(session.current_index(), None);
    }

    #[test]
    fn test_same_song_is_not_reported_as_change() {
        let mut session = PlaybackSession::new(70);
        assert!(session.set_current_song(Some(song("a", None)), None));
        assert!(!session.set_current_song(Some(song("a", Some(12.0))), None));
        assert!(session.set_current_song(Some(song("b", None)), None));
    }

    #[test]
    fn test_backfilled_duration_survives_playlist_refresh() {
        let mut session = PlaybackSession::new(70);
        session.replace_playlist(BoothPlaylist {
            songs: vec![song("a", None), song("b", None)],
            current_index: Some(0),
        });
        session.backfill_duration(42.0);
        assert_eq!(session.playlist()[0].duration_secs, Some(42.0));

        let changed = session.replace_playlist(BoothPlaylist {
            songs: vec![song("a", None), song("b", None)],
            current_index: Some(0),
        });
        assert!(!changed);
        assert_eq!(
            session.current_song().and_then(|song| song.duration_secs),
            Some(42.0)
        );
        assert_eq!(session.next_song().map(|song| song.id.as_str()), Some("b"));
    }
}
