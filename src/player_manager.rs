//! Transport orchestrator for remote booth playback.
//!
//! The manager owns the playback session, the local progress timer and the
//! transport client, and runs every timed activity (progress tick, status
//! poll, post-navigation debounce, duration lookup retries and playlist
//! refresh) as a deadline checked from one loop. Intents arrive on the bus;
//! observable state leaves it as [`PlayerSnapshot`] notifications.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::{debug, info, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::backends::{
    BoothApi, CommandExtras, ListenerStatus, RemoteTransportState, SongDirection, SongEntry,
};
use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::playback_session::PlaybackSession;
use crate::progress_timer::{Clock, ProgressTimer, TimerTick};
use crate::protocol::{Message, PlayerIntent, PlayerNotification, PlayerSnapshot, TransportState};
use crate::retry::{RetryPolicy, RetrySchedule};
use crate::transport_client::RemoteTransportClient;

const IDLE_LOOP_SLEEP: Duration = Duration::from_millis(10);

/// Identifiers of an established booth connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoothSession {
    pub booth_id: String,
    pub listener_id: String,
}

impl BoothSession {
    /// Validates identifiers before the manager is allowed to initialize.
    pub fn ready(booth_id: &str, listener_id: &str) -> Result<Self, PlayerError> {
        let booth_id = booth_id.trim();
        let listener_id = listener_id.trim();
        if booth_id.is_empty() {
            return Err(PlayerError::NotReady("booth id is missing".to_string()));
        }
        if listener_id.is_empty() {
            return Err(PlayerError::NotReady(
                "active listener id is missing".to_string(),
            ));
        }
        Ok(Self {
            booth_id: booth_id.to_string(),
            listener_id: listener_id.to_string(),
        })
    }
}

/// Follow-up scheduled after a next/prev command.
struct PendingTransition {
    due_at: Instant,
    resume_playback: bool,
    timer_generation: u64,
}

/// Bounded status lookups for a song whose length is unknown.
struct DurationResolution {
    schedule: RetrySchedule,
    start_timer: bool,
    timer_generation: u64,
}

type SnapshotLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Coordinates user intents, the remote listener and the local timeline.
pub struct PlayerManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    booth_api: Box<dyn BoothApi>,
    transport: RemoteTransportClient,
    clock: Arc<dyn Clock>,
    config: PlayerConfig,
    session: Option<BoothSession>,
    playback: PlaybackSession,
    timer: ProgressTimer,
    state: TransportState,
    pending_transition: Option<PendingTransition>,
    duration_resolution: Option<DurationResolution>,
    playlist_refresh_at: Option<Instant>,
    /// Song that ran to its end locally; cleared by the next play or song change.
    completed_song: Option<SongEntry>,
    last_status_poll_at: Instant,
    last_tick_at: Instant,
    snapshot_limiter: SnapshotLimiter,
    shut_down: bool,
}

impl PlayerManager {
    /// Creates a manager bound to the shared bus. Nothing is fetched until a session connects.
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        booth_api: Box<dyn BoothApi>,
        transport: RemoteTransportClient,
        clock: Arc<dyn Clock>,
        config: PlayerConfig,
    ) -> Self {
        let now = clock.now();
        let emit_rate =
            NonZeroU32::new(config.progress_emit_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            bus_consumer,
            bus_producer,
            booth_api,
            transport,
            timer: ProgressTimer::new(Arc::clone(&clock)),
            clock,
            playback: PlaybackSession::new(config.default_volume),
            config,
            session: None,
            state: TransportState::Idle,
            pending_transition: None,
            duration_resolution: None,
            playlist_refresh_at: None,
            completed_song: None,
            last_status_poll_at: now,
            last_tick_at: now,
            snapshot_limiter: RateLimiter::direct(Quota::per_second(emit_rate)),
            shut_down: false,
        }
    }

    /// Current observable state.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state,
            current_song: self.playback.current_song().cloned(),
            current_index: self.playback.current_index(),
            next_song_title: self.playback.next_song().map(|song| song.title.clone()),
            is_playing: self.playback.is_playing(),
            elapsed_secs: self.timer.elapsed().as_secs_f64(),
            duration_secs: self.timer.duration().as_secs_f64(),
            volume: self.playback.volume(),
            is_busy: self.transport_locked(),
            playlist_len: self.playback.playlist().len(),
        }
    }

    fn emit_snapshot(&mut self, force: bool) {
        if !force && self.snapshot_limiter.check().is_err() {
            return;
        }
        let _ = self
            .bus_producer
            .send(Message::Notification(PlayerNotification::SnapshotUpdated(
                self.snapshot(),
            )));
    }

    fn emit_playlist(&self) {
        let _ = self
            .bus_producer
            .send(Message::Notification(PlayerNotification::PlaylistUpdated(
                self.playback.playlist().to_vec(),
            )));
    }

    fn notify_failure(&self, action: &str, error: PlayerError) {
        warn!("PlayerManager: {} failed: {}", action, error);
        if let Some(record) = self.transport.last_command() {
            debug!(
                "PlayerManager: last command {} request_id={} path={:?} at {:?} succeeded={}",
                record.command.wire_name(),
                record.request_id,
                record.extras.path,
                record.attempted_at,
                record.succeeded
            );
        }
        let retryable = error.is_retryable();
        let _ = self
            .bus_producer
            .send(Message::Notification(PlayerNotification::ActionFailed {
                action: action.to_string(),
                error,
                retryable,
            }));
    }

    fn transport_locked(&self) -> bool {
        self.transport.is_busy() || self.state == TransportState::Loading
    }

    fn song_extras(&self, song: &SongEntry) -> CommandExtras {
        CommandExtras {
            path: song.path.clone(),
            volume: Some(self.playback.volume()),
            duration: song.known_duration().map(|duration| duration.as_secs_f64()),
            song_title: Some(song.title.clone()),
        }
    }

    /// State to fall back to once nothing is pending.
    fn settle_state(&mut self) {
        self.state = if self.playback.current_song().is_none() {
            TransportState::Idle
        } else if self.playback.is_playing() {
            TransportState::Playing
        } else if self.timer.elapsed().is_zero() {
            TransportState::Stopped
        } else {
            TransportState::Paused
        };
    }

    fn cancel_pending(&mut self) {
        self.pending_transition = None;
        self.duration_resolution = None;
    }

    /// Continues or restarts progress when the duration is already known.
    /// Returns `false` when there is nothing to count against.
    fn resume_progress(&mut self) -> bool {
        let total = self.timer.duration();
        if total.is_zero() {
            return false;
        }
        let elapsed = self.timer.elapsed();
        if !elapsed.is_zero() && elapsed < total {
            debug!(
                "PlayerManager: resuming progress at {:.1}s of {:.1}s",
                elapsed.as_secs_f64(),
                total.as_secs_f64()
            );
            self.timer.resume(self.timer.remaining(), total);
        } else {
            self.timer.start(total);
        }
        true
    }

    /// Applies one intent and reports any failure on the bus.
    pub fn handle_intent(&mut self, intent: PlayerIntent) {
        if self.shut_down {
            debug!("PlayerManager: ignoring {} after shutdown", intent.name());
            return;
        }
        let action = intent.name();
        if let Err(err) = self.apply_intent(intent) {
            self.notify_failure(action, err);
        }
        if !self.shut_down {
            self.emit_snapshot(true);
        }
    }

    fn apply_intent(&mut self, intent: PlayerIntent) -> Result<(), PlayerError> {
        match intent {
            PlayerIntent::Connect {
                booth_id,
                listener_id,
            } => {
                let session = BoothSession::ready(&booth_id, &listener_id)?;
                self.connect(session);
                return Ok(());
            }
            PlayerIntent::Shutdown => {
                self.shutdown();
                return Ok(());
            }
            _ => {}
        }

        let session = self
            .session
            .clone()
            .ok_or_else(|| PlayerError::NotReady("connect to a booth first".to_string()))?;
        if intent.is_transport() && self.transport_locked() {
            return Err(PlayerError::Busy);
        }

        let was_playing = self.playback.is_playing();
        let volume_step = i32::from(self.config.volume_step);
        match intent {
            PlayerIntent::Play => self.play(&session),
            PlayerIntent::Pause => self.pause(&session),
            PlayerIntent::Stop => self.stop(&session),
            PlayerIntent::Next => self.navigate(&session, SongDirection::Next, was_playing),
            PlayerIntent::Previous => self.navigate(&session, SongDirection::Prev, was_playing),
            PlayerIntent::PlayIndex(index) => self.play_index(&session, index),
            PlayerIntent::PlaySong(song) => self.play_song(&session, song),
            PlayerIntent::VolumeUp => self.step_volume(&session, volume_step),
            PlayerIntent::VolumeDown => self.step_volume(&session, -volume_step),
            PlayerIntent::SetVolume(volume) => self.set_volume(&session, volume),
            PlayerIntent::RefreshPlaylist => self.refresh_playlist(&session),
            PlayerIntent::AddSong(song_id) => self.add_song(&session, &song_id),
            PlayerIntent::RemoveSong(song_id) => self.remove_song(&session, &song_id),
            PlayerIntent::Connect { .. } | PlayerIntent::Shutdown => Ok(()),
        }
    }

    /// Loads the booth playlist and the listener volume. Failures are reported
    /// but the player stays usable.
    pub fn connect(&mut self, session: BoothSession) {
        info!(
            "PlayerManager: connecting booth={} listener={}",
            session.booth_id, session.listener_id
        );
        self.cancel_pending();
        self.playlist_refresh_at = None;
        self.completed_song = None;
        self.timer.stop();
        self.playback = PlaybackSession::new(self.config.default_volume);
        self.session = Some(session.clone());

        if let Err(err) = self.refresh_playlist(&session) {
            self.notify_failure("connect", err);
        }
        if let Err(err) = self.sync_volume(&session) {
            self.notify_failure("connect", err);
        }
        self.settle_state();
    }

    fn sync_volume(&mut self, session: &BoothSession) -> Result<(), PlayerError> {
        if let Err(err) = self.transport.ping(&session.listener_id) {
            debug!(
                "PlayerManager: ping failed, reading volume from status: {}",
                err
            );
            self.transport.status(&session.listener_id)?;
        }
        if let Some(volume) = self.transport.cached_volume() {
            self.playback.set_volume(i32::from(volume));
        }
        Ok(())
    }

    fn refresh_playlist(&mut self, session: &BoothSession) -> Result<(), PlayerError> {
        self.playlist_refresh_at = None;
        let playlist = self.booth_api.fetch_playlist(&session.booth_id)?;
        debug!(
            "PlayerManager: playlist refreshed, {} songs, current={:?}",
            playlist.songs.len(),
            playlist.current_index
        );
        let played_outside_playlist =
            self.playback.current_index().is_none() && self.playback.current_song().is_some();
        let song_changed = if played_outside_playlist {
            self.playback.replace_songs(playlist.songs);
            false
        } else {
            self.playback.replace_playlist(playlist)
        };
        if song_changed {
            info!("PlayerManager: current song changed remotely, resetting progress");
            self.cancel_pending();
            self.timer.stop();
            self.settle_state();
        }
        self.emit_playlist();
        Ok(())
    }

    fn play(&mut self, session: &BoothSession) -> Result<(), PlayerError> {
        let song = self
            .playback
            .current_song()
            .cloned()
            .ok_or_else(|| PlayerError::Validation("no song selected".to_string()))?;
        let extras = self.song_extras(&song);
        self.transport.play(&session.listener_id, extras)?;
        self.completed_song = None;
        self.playback.set_playing(true);
        self.state = TransportState::Playing;

        if self.timer.is_running() || self.resume_progress() {
            return Ok(());
        }
        match song.known_duration() {
            Some(duration) => {
                self.timer.start(duration);
            }
            None => self.begin_duration_resolution(true),
        }
        Ok(())
    }

    fn pause(&mut self, session: &BoothSession) -> Result<(), PlayerError> {
        if !self.playback.is_playing() {
            return Err(PlayerError::Validation("nothing is playing".to_string()));
        }
        let extras = CommandExtras::default().with_volume(self.playback.volume());
        self.transport.pause(&session.listener_id, extras)?;
        self.timer.pause();
        self.playback.set_playing(false);
        self.state = TransportState::Paused;
        Ok(())
    }

    fn stop(&mut self, session: &BoothSession) -> Result<(), PlayerError> {
        let extras = CommandExtras::default().with_volume(self.playback.volume());
        self.transport.stop(&session.listener_id, extras)?;
        self.completed_song = None;
        self.cancel_pending();
        self.timer.stop();
        self.playback.set_playing(false);
        self.settle_state();
        Ok(())
    }

    /// Swaps the current song, fully stopping the previous timeline first.
    fn load_song(&mut self, song: SongEntry, index: Option<usize>) {
        self.completed_song = None;
        self.cancel_pending();
        self.timer.stop();
        self.playback.set_current_song(Some(song), index);
    }

    /// Starts progress for a song whose play command just succeeded.
    fn start_song_timer(&mut self, song: &SongEntry) {
        self.playback.set_playing(true);
        match song.known_duration() {
            Some(duration) => {
                self.timer.start(duration);
                self.state = TransportState::Playing;
            }
            None => self.begin_duration_resolution(true),
        }
    }

    fn navigate(
        &mut self,
        session: &BoothSession,
        direction: SongDirection,
        resume_playback: bool,
    ) -> Result<(), PlayerError> {
        if self.playback.playlist().is_empty() {
            return Err(PlayerError::Validation("playlist is empty".to_string()));
        }
        let update = self
            .booth_api
            .change_current_song(&session.booth_id, direction)?;
        let song = update.current_song.ok_or_else(|| {
            PlayerError::Decode(format!(
                "{} returned no current song",
                direction.wire_name()
            ))
        })?;
        let extras = self.song_extras(&song);
        match direction {
            SongDirection::Prev => self.transport.prev(&session.listener_id, extras)?,
            SongDirection::Next | SongDirection::Set(_) => {
                self.transport.next(&session.listener_id, extras)?
            }
        }

        info!(
            "PlayerManager: moved {} to '{}' (index {:?}, next {:?})",
            direction.wire_name(),
            song.title,
            update.current_index,
            update.next_song.as_ref().map(|next| next.title.as_str())
        );
        self.load_song(song, update.current_index);
        self.state = TransportState::Loading;
        let now = self.clock.now();
        self.pending_transition = Some(PendingTransition {
            due_at: now + self.config.transition_debounce(),
            resume_playback,
            timer_generation: self.timer.generation(),
        });
        self.playlist_refresh_at = Some(now + self.config.playlist_refresh_delay());
        Ok(())
    }

    fn play_index(&mut self, session: &BoothSession, index: usize) -> Result<(), PlayerError> {
        if !self.playback.is_index_valid(index) {
            return Err(PlayerError::Validation(format!(
                "song index {index} is out of range"
            )));
        }
        let update = self
            .booth_api
            .change_current_song(&session.booth_id, SongDirection::Set(index))?;
        let song = update.current_song.ok_or_else(|| {
            PlayerError::Decode("set returned no current song".to_string())
        })?;
        let extras = self.song_extras(&song);
        self.transport.play(&session.listener_id, extras)?;

        info!("PlayerManager: playing '{}' at index {}", song.title, index);
        self.load_song(song.clone(), update.current_index.or(Some(index)));
        self.start_song_timer(&song);
        Ok(())
    }

    fn play_song(&mut self, session: &BoothSession, song: SongEntry) -> Result<(), PlayerError> {
        let mut extras = self.song_extras(&song);
        if extras.path.is_none() {
            extras.path = Some(song.id.clone());
        }
        self.transport.play(&session.listener_id, extras)?;

        info!("PlayerManager: playing catalog song '{}'", song.title);
        self.load_song(song.clone(), None);
        self.start_song_timer(&song);
        Ok(())
    }

    fn step_volume(&mut self, session: &BoothSession, delta: i32) -> Result<(), PlayerError> {
        let target = (i32::from(self.playback.volume()) + delta).clamp(0, 100);
        self.set_volume(session, target)
    }

    fn set_volume(&mut self, session: &BoothSession, volume: i32) -> Result<(), PlayerError> {
        let applied = self.transport.set_volume(&session.listener_id, volume)?;
        self.playback.set_volume(i32::from(applied));
        Ok(())
    }

    fn add_song(&mut self, session: &BoothSession, song_id: &str) -> Result<(), PlayerError> {
        let song_id = song_id.trim();
        if song_id.is_empty() {
            return Err(PlayerError::Validation("song id is empty".to_string()));
        }
        self.booth_api.add_song(&session.booth_id, song_id)?;
        info!("PlayerManager: added song {} to playlist", song_id);
        self.refresh_playlist(session)
    }

    fn remove_song(&mut self, session: &BoothSession, song_id: &str) -> Result<(), PlayerError> {
        let song_id = song_id.trim();
        if song_id.is_empty() {
            return Err(PlayerError::Validation("song id is empty".to_string()));
        }
        self.booth_api.remove_song(&session.booth_id, song_id)?;
        info!("PlayerManager: removed song {} from playlist", song_id);
        self.refresh_playlist(session)
    }

    fn begin_duration_resolution(&mut self, start_timer: bool) {
        let policy = RetryPolicy::new(
            self.config.duration_retry_attempts,
            self.config.duration_retry_delay(),
        );
        self.state = TransportState::Loading;
        self.duration_resolution = Some(DurationResolution {
            schedule: RetrySchedule::new(policy, self.clock.now()),
            start_timer,
            timer_generation: self.timer.generation(),
        });
    }

    fn drive_duration_resolution(&mut self, now: Instant) {
        let Some(mut resolution) = self.duration_resolution.take() else {
            return;
        };
        if !resolution.schedule.is_due(now) {
            self.duration_resolution = Some(resolution);
            return;
        }
        if resolution.timer_generation != self.timer.generation() {
            return;
        }
        let Some(session) = self.session.clone() else {
            return;
        };

        let resolved = match self.transport.status(&session.listener_id) {
            Ok(status) => status.known_duration(),
            Err(err) => {
                debug!("PlayerManager: duration lookup failed: {}", err);
                None
            }
        };
        match resolved {
            Some(duration) => {
                info!(
                    "PlayerManager: resolved duration {:.1}s after {} attempt(s)",
                    duration.as_secs_f64(),
                    resolution.schedule.attempts_made() + 1
                );
                self.playback.backfill_duration(duration.as_secs_f64());
                if resolution.start_timer {
                    self.timer.start(duration);
                } else {
                    self.timer.prime(duration);
                }
                self.settle_state();
            }
            None => {
                resolution.schedule.record_failure(now);
                if resolution.schedule.exhausted() {
                    info!(
                        "PlayerManager: duration unresolved after {} attempts, progress is indeterminate",
                        resolution.schedule.max_attempts()
                    );
                    self.settle_state();
                } else {
                    self.duration_resolution = Some(resolution);
                    return;
                }
            }
        }
        self.emit_snapshot(true);
    }

    fn run_pending_transition(&mut self, now: Instant) {
        match &self.pending_transition {
            Some(transition) if now >= transition.due_at => {}
            _ => return,
        }
        let Some(transition) = self.pending_transition.take() else {
            return;
        };
        if transition.timer_generation != self.timer.generation() {
            debug!("PlayerManager: dropping stale transition");
            return;
        }
        let (Some(session), Some(song)) =
            (self.session.clone(), self.playback.current_song().cloned())
        else {
            self.settle_state();
            return;
        };

        if transition.resume_playback {
            let extras = self.song_extras(&song);
            match self.transport.play(&session.listener_id, extras) {
                Ok(()) => self.start_song_timer(&song),
                Err(err) => {
                    self.playback.set_playing(false);
                    self.settle_state();
                    self.notify_failure("play", err);
                }
            }
        } else {
            match song.known_duration() {
                Some(duration) => {
                    self.timer.prime(duration);
                    self.settle_state();
                }
                None => self.begin_duration_resolution(false),
            }
        }
        self.emit_snapshot(true);
    }

    fn on_song_completed(&mut self) {
        info!("PlayerManager: song completed");
        self.completed_song = self.playback.current_song().cloned();
        self.playback.set_playing(false);
        self.state = TransportState::Stopped;
        self.emit_snapshot(true);

        if !self.config.auto_advance || self.playback.next_song().is_none() {
            return;
        }
        let Some(session) = self.session.clone() else {
            return;
        };
        if let Err(err) = self.navigate(&session, SongDirection::Next, true) {
            self.notify_failure("next", err);
        }
        self.emit_snapshot(true);
    }

    /// Applies listener status. Time fields are ignored while the local timer runs.
    pub fn apply_listener_status(&mut self, status: &ListenerStatus) {
        if let Some(volume) = status.volume {
            self.playback.set_volume(i32::from(volume));
        }
        if self.timer.is_running() {
            return;
        }

        let has_song = self.playback.current_song().is_some();
        // A listener still reporting the song that just finished is not a new playback.
        let reports_completed_song = self.completed_song.as_ref().is_some_and(|song| {
            status.path.is_none() || status.path.as_deref() == song.path.as_deref()
        });
        match status.transport_state() {
            RemoteTransportState::Playing if reports_completed_song => {
                debug!("PlayerManager: ignoring play status for completed song");
            }
            RemoteTransportState::Playing if has_song && !self.playback.is_playing() => {
                info!("PlayerManager: listener started playback out of band");
                self.completed_song = None;
                self.playback.set_playing(true);
                self.resume_progress();
                self.state = TransportState::Playing;
            }
            RemoteTransportState::Paused | RemoteTransportState::Stopped
                if self.playback.is_playing() =>
            {
                info!("PlayerManager: listener stopped playback out of band");
                self.playback.set_playing(false);
                self.settle_state();
            }
            _ => {}
        }

        let Some(duration) = status.known_duration() else {
            return;
        };
        let same_song = self.playback.current_song().is_some_and(|song| {
            status.path.is_none() || status.path.as_deref() == song.path.as_deref()
        });
        if !same_song || !self.timer.duration().is_zero() {
            return;
        }
        self.playback.backfill_duration(duration.as_secs_f64());
        // Progress of a song already playing stays indeterminate; its elapsed time is unknown.
        if !self.playback.is_playing() {
            self.timer.prime(duration);
        }
    }

    fn poll_status_if_needed(&mut self, now: Instant) {
        let Some(session) = self.session.clone() else {
            return;
        };
        if now.saturating_duration_since(self.last_status_poll_at)
            < self.config.status_poll_interval()
        {
            return;
        }
        self.last_status_poll_at = now;
        if self.timer.is_running() {
            debug!("PlayerManager: skipping status poll, progress timer running");
            return;
        }
        if self.state == TransportState::Loading {
            debug!("PlayerManager: skipping status poll, transition pending");
            return;
        }

        match self.transport.status(&session.listener_id) {
            Ok(mut status) => {
                if status.volume.is_none() {
                    status.volume = self
                        .transport
                        .ping(&session.listener_id)
                        .ok()
                        .and_then(|report| report.volume);
                }
                self.apply_listener_status(&status);
                self.emit_snapshot(true);
            }
            Err(err) => debug!("PlayerManager: status poll failed: {}", err),
        }
    }

    fn tick(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_tick_at) < self.config.tick_interval() {
            return;
        }
        self.last_tick_at = now;
        match self.timer.tick() {
            TimerTick::Idle => {}
            TimerTick::Advanced => self.emit_snapshot(false),
            TimerTick::Completed => self.on_song_completed(),
        }
    }

    /// Runs every timed activity that is due.
    pub fn drive_timers(&mut self) {
        if self.shut_down {
            return;
        }
        let now = self.clock.now();
        self.tick(now);
        self.run_pending_transition(now);
        self.drive_duration_resolution(now);
        if self.playlist_refresh_at.is_some_and(|due_at| now >= due_at) {
            if let Some(session) = self.session.clone() {
                if let Err(err) = self.refresh_playlist(&session) {
                    self.notify_failure("refresh_playlist", err);
                }
                self.emit_snapshot(true);
            }
        }
        self.poll_status_if_needed(now);
    }

    /// Cancels every pending activity. No state changes after this.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        info!("PlayerManager: shutting down");
        self.cancel_pending();
        self.playlist_refresh_at = None;
        self.timer.stop();
        self.shut_down = true;
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Player(intent) => self.handle_intent(intent),
            Message::Notification(_) => {}
        }
    }

    fn process_pending_bus_messages(&mut self) -> bool {
        loop {
            match self.bus_consumer.try_recv() {
                Ok(message) => {
                    self.handle_message(message);
                    if self.shut_down {
                        return true;
                    }
                }
                Err(tokio::sync::broadcast::error::TryRecvError::Empty) => return false,
                Err(tokio::sync::broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("PlayerManager: bus lagged by {} messages", skipped);
                }
                Err(tokio::sync::broadcast::error::TryRecvError::Closed) => return true,
            }
        }
    }

    /// Starts the blocking player manager loop.
    pub fn run(&mut self) {
        info!("PlayerManager: started");
        loop {
            if self.process_pending_bus_messages() {
                break;
            }
            self.drive_timers();
            if self.process_pending_bus_messages() {
                break;
            }
            thread::sleep(IDLE_LOOP_SLEEP);
        }
        self.shutdown();
        info!("PlayerManager: stopped");
    }
}
