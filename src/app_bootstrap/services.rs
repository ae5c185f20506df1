use std::{
    any::Any,
    sync::{atomic::AtomicBool, Arc},
    thread,
};

use log::{error, info, warn};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    app_bootstrap::console::render_snapshot,
    backends::http::BoothHttpAdapter,
    config::{ApiConfig, PlayerConfig},
    player_manager::PlayerManager,
    progress_timer::SystemClock,
    protocol::{Message, PlayerNotification},
    transport_client::RemoteTransportClient,
};

pub struct BackgroundServicesConfig {
    pub bus_sender: broadcast::Sender<Message>,
    pub api: ApiConfig,
    pub player: PlayerConfig,
}

/// Handles the console keeps after spawning.
pub struct BackgroundServices {
    pub player_thread: thread::JoinHandle<()>,
    /// Set while a transport command is in flight.
    pub transport_busy: Arc<AtomicBool>,
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

/// Spawns the player manager and the console observer.
pub fn spawn_background_services(
    config: BackgroundServicesConfig,
) -> std::io::Result<BackgroundServices> {
    let BackgroundServicesConfig {
        bus_sender,
        api,
        player,
    } = config;

    let observer_bus_receiver = bus_sender.subscribe();
    thread::Builder::new()
        .name("snapshot-observer".to_string())
        .spawn(move || run_snapshot_observer(observer_bus_receiver))?;

    let transport = RemoteTransportClient::new(Box::new(BoothHttpAdapter::new(&api)));
    let transport_busy = transport.busy_flag();
    let player_manager_bus_receiver = bus_sender.subscribe();
    let player_manager_bus_sender = bus_sender.clone();
    let player_thread = thread::Builder::new()
        .name("player-manager".to_string())
        .spawn(move || {
            let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let mut player_manager = PlayerManager::new(
                    player_manager_bus_receiver,
                    player_manager_bus_sender,
                    Box::new(BoothHttpAdapter::new(&api)),
                    transport,
                    Arc::new(SystemClock),
                    player,
                );
                player_manager.run();
            }));
            if let Err(payload) = run_result {
                error!(
                    "PlayerManager thread terminated due to panic: {}",
                    panic_payload_to_string(payload.as_ref())
                );
            }
        })?;

    Ok(BackgroundServices {
        player_thread,
        transport_busy,
    })
}

fn run_snapshot_observer(mut bus_receiver: broadcast::Receiver<Message>) {
    let mut last_line = String::new();
    loop {
        match bus_receiver.blocking_recv() {
            Ok(Message::Notification(PlayerNotification::SnapshotUpdated(snapshot))) => {
                let line = render_snapshot(&snapshot);
                if line != last_line {
                    info!("{}", line);
                    last_line = line;
                }
            }
            Ok(Message::Notification(PlayerNotification::PlaylistUpdated(songs))) => {
                info!("Playlist: {} songs", songs.len());
                for (index, song) in songs.iter().enumerate() {
                    info!("  {:>2}. {} - {}", index, song.title, song.artist);
                }
            }
            Ok(Message::Notification(PlayerNotification::ActionFailed {
                action,
                error,
                retryable,
            })) => {
                if retryable {
                    warn!("{} failed: {} (retry with the same command)", action, error);
                } else {
                    warn!("{} failed: {}", action, error);
                }
            }
            Ok(Message::Player(_)) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("SnapshotObserver: bus lagged by {} messages", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
