//! Remote transport command client for the booth's active listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use log::{debug, warn};
use uuid::Uuid;

use crate::backends::{
    CommandExtras, ListenerStatus, ListenerTransport, PingReport, TransportCommand,
};
use crate::error::PlayerError;

/// Diagnostics record of the most recent transport command.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCommandRecord {
    pub request_id: Uuid,
    pub command: TransportCommand,
    pub extras: CommandExtras,
    pub attempted_at: SystemTime,
    pub succeeded: bool,
}

/// Clears the busy flag when the in-flight command finishes, even on early return.
struct InFlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Sends transport commands one at a time and caches listener volume.
pub struct RemoteTransportClient {
    transport: Box<dyn ListenerTransport>,
    busy: Arc<AtomicBool>,
    cached_volume: Option<u8>,
    last_command: Option<RemoteCommandRecord>,
}

impl RemoteTransportClient {
    pub fn new(transport: Box<dyn ListenerTransport>) -> Self {
        Self {
            transport,
            busy: Arc::new(AtomicBool::new(false)),
            cached_volume: None,
            last_command: None,
        }
    }

    /// Shared handle other threads can read to disable transport controls.
    pub fn busy_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.busy)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn cached_volume(&self) -> Option<u8> {
        self.cached_volume
    }

    pub fn last_command(&self) -> Option<&RemoteCommandRecord> {
        self.last_command.as_ref()
    }

    /// Sends one transport command. Rejected with `Busy` while another is outstanding.
    pub fn send_command(
        &mut self,
        listener_id: &str,
        command: TransportCommand,
        extras: CommandExtras,
    ) -> Result<(), PlayerError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(
                "TransportClient: {} rejected, previous command still in flight",
                command.wire_name()
            );
            return Err(PlayerError::Busy);
        }
        let _in_flight = InFlightGuard { busy: &self.busy };

        let request_id = Uuid::new_v4();
        debug!(
            "TransportClient: sending {} request_id={} path={:?}",
            command.wire_name(),
            request_id,
            extras.path
        );
        let result = self.transport.send_command(listener_id, command, &extras);
        if let Err(err) = &result {
            warn!(
                "TransportClient: {} failed request_id={}: {}",
                command.wire_name(),
                request_id,
                err
            );
        }
        self.last_command = Some(RemoteCommandRecord {
            request_id,
            command,
            extras,
            attempted_at: SystemTime::now(),
            succeeded: result.is_ok(),
        });
        result
    }

    pub fn play(
        &mut self,
        listener_id: &str,
        extras: impl Into<CommandExtras>,
    ) -> Result<(), PlayerError> {
        self.send_command(listener_id, TransportCommand::Play, extras.into())
    }

    pub fn pause(
        &mut self,
        listener_id: &str,
        extras: impl Into<CommandExtras>,
    ) -> Result<(), PlayerError> {
        self.send_command(listener_id, TransportCommand::Pause, extras.into())
    }

    pub fn stop(
        &mut self,
        listener_id: &str,
        extras: impl Into<CommandExtras>,
    ) -> Result<(), PlayerError> {
        self.send_command(listener_id, TransportCommand::Stop, extras.into())
    }

    pub fn next(
        &mut self,
        listener_id: &str,
        extras: impl Into<CommandExtras>,
    ) -> Result<(), PlayerError> {
        self.send_command(listener_id, TransportCommand::Next, extras.into())
    }

    pub fn prev(
        &mut self,
        listener_id: &str,
        extras: impl Into<CommandExtras>,
    ) -> Result<(), PlayerError> {
        self.send_command(listener_id, TransportCommand::Prev, extras.into())
    }

    /// Volume fast path. Out-of-range values fail before any network call.
    pub fn set_volume(&mut self, listener_id: &str, volume: i32) -> Result<u8, PlayerError> {
        let volume = u8::try_from(volume)
            .ok()
            .filter(|volume| *volume <= 100)
            .ok_or_else(|| {
                PlayerError::Validation(format!("volume {volume} is outside 0..=100"))
            })?;
        debug!("TransportClient: setting volume to {}", volume);
        self.transport.set_volume(listener_id, volume)?;
        self.cached_volume = Some(volume);
        Ok(volume)
    }

    pub fn ping(&mut self, listener_id: &str) -> Result<PingReport, PlayerError> {
        let report = self.transport.ping(listener_id)?;
        if let Some(volume) = report.volume {
            self.cached_volume = Some(volume);
        }
        Ok(report)
    }

    pub fn status(&mut self, listener_id: &str) -> Result<ListenerStatus, PlayerError> {
        let status = self.transport.status(listener_id)?;
        if let Some(volume) = status.volume {
            self.cached_volume = Some(volume);
        }
        Ok(status)
    }
}
