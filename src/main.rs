mod app_bootstrap;
mod backends;
mod config;
mod error;
mod playback_session;
mod player_manager;
mod progress_timer;
mod protocol;
mod retry;
mod transport_client;

use std::io::BufRead;
use std::sync::atomic::Ordering;

use log::{info, warn};
use tokio::sync::broadcast;

use app_bootstrap::console::{parse_console_line, ConsoleInput, HELP_TEXT};
use app_bootstrap::services::{spawn_background_services, BackgroundServicesConfig};
use config::{config_file_path, load_or_create_config, Config};
use protocol::{Message, PlayerIntent};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Accept every level here; `logging.level` sets the effective cap below.
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Trace);
    clog.init();
    log::set_max_level(log::LevelFilter::Debug);

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config = match config_file_path() {
        Some(path) => load_or_create_config(&path)?,
        None => {
            warn!("No config directory available. Using defaults");
            Config::default()
        }
    };
    log::set_max_level(config.logging.level.as_filter());

    // Bus for communication between components
    let (bus_sender, _) = broadcast::channel(1024);

    let services = spawn_background_services(BackgroundServicesConfig {
        bus_sender: bus_sender.clone(),
        api: config.api.clone(),
        player: config.player.clone(),
    })?;

    if config.booth.booth_id.is_empty() || config.booth.listener_id.is_empty() {
        info!("No booth configured. Use 'connect <booth> <listener>'");
    } else {
        let _ = bus_sender.send(Message::Player(PlayerIntent::Connect {
            booth_id: config.booth.booth_id.clone(),
            listener_id: config.booth.listener_id.clone(),
        }));
    }
    info!("{}", HELP_TEXT);

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match parse_console_line(&line?) {
            Ok(ConsoleInput::Intent(intent)) => {
                if intent.is_transport() && services.transport_busy.load(Ordering::Acquire) {
                    warn!("Previous command still in flight, try again");
                    continue;
                }
                let _ = bus_sender.send(Message::Player(intent));
            }
            Ok(ConsoleInput::Help) => info!("{}", HELP_TEXT),
            Ok(ConsoleInput::Quit) => break,
            Ok(ConsoleInput::Empty) => {}
            Err(err) => warn!("{}", err),
        }
    }

    let _ = bus_sender.send(Message::Player(PlayerIntent::Shutdown));
    if services.player_thread.join().is_err() {
        log::error!("player manager thread panicked during shutdown");
    }
    Ok(())
}
