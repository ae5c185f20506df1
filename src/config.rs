//! Persistent application configuration model and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "BOOTH_REMOTE_CONFIG";

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Booth backend connection settings.
    pub api: ApiConfig,
    #[serde(default)]
    /// Booth and listener identity.
    pub booth: BoothConfig,
    #[serde(default)]
    /// Transport orchestration policy.
    pub player: PlayerConfig,
    #[serde(default)]
    /// Logger settings.
    pub logging: LoggingConfig,
}

/// Booth REST API connection settings.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token from the authentication layer; empty sends no header.
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Booth session identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct BoothConfig {
    #[serde(default)]
    pub booth_id: String,
    /// Unique id of the active listener running inside the booth.
    #[serde(default)]
    pub listener_id: String,
}

/// Timing and retry policy for the transport orchestrator.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,
    /// Delay after next/prev before the follow-up play is sent.
    #[serde(default = "default_transition_debounce_ms")]
    pub transition_debounce_ms: u64,
    #[serde(default = "default_duration_retry_attempts")]
    pub duration_retry_attempts: u32,
    #[serde(default = "default_duration_retry_delay_ms")]
    pub duration_retry_delay_ms: u64,
    #[serde(default = "default_playlist_refresh_delay_ms")]
    pub playlist_refresh_delay_ms: u64,
    #[serde(default = "default_volume_step")]
    pub volume_step: u8,
    #[serde(default = "default_volume")]
    pub default_volume: u8,
    /// Issue `next` automatically when the local timer reaches the end.
    #[serde(default)]
    pub auto_advance: bool,
    #[serde(default = "default_progress_emit_per_second")]
    pub progress_emit_per_second: u32,
}

impl PlayerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn transition_debounce(&self) -> Duration {
        Duration::from_millis(self.transition_debounce_ms)
    }

    pub fn duration_retry_delay(&self) -> Duration {
        Duration::from_millis(self.duration_retry_delay_ms)
    }

    pub fn playlist_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.playlist_refresh_delay_ms)
    }
}

/// Logger verbosity persisted in config.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    #[default]
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Logger settings.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: String::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            status_poll_interval_ms: default_status_poll_interval_ms(),
            transition_debounce_ms: default_transition_debounce_ms(),
            duration_retry_attempts: default_duration_retry_attempts(),
            duration_retry_delay_ms: default_duration_retry_delay_ms(),
            playlist_refresh_delay_ms: default_playlist_refresh_delay_ms(),
            volume_step: default_volume_step(),
            default_volume: default_volume(),
            auto_advance: false,
            progress_emit_per_second: default_progress_emit_per_second(),
        }
    }
}

fn default_base_url() -> String {
    "http://10.0.2.2:3000".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_status_poll_interval_ms() -> u64 {
    5_000
}

fn default_transition_debounce_ms() -> u64 {
    300
}

fn default_duration_retry_attempts() -> u32 {
    3
}

fn default_duration_retry_delay_ms() -> u64 {
    200
}

fn default_playlist_refresh_delay_ms() -> u64 {
    500
}

fn default_volume_step() -> u8 {
    10
}

fn default_volume() -> u8 {
    70
}

fn default_progress_emit_per_second() -> u32 {
    5
}

/// Clamps user-edited values into ranges the orchestrator can work with.
pub fn sanitize_config(config: Config) -> Config {
    let player = &config.player;
    Config {
        api: ApiConfig {
            base_url: config.api.base_url.trim().trim_end_matches('/').to_string(),
            auth_token: config.api.auth_token.trim().to_string(),
            connect_timeout_ms: config.api.connect_timeout_ms.clamp(500, 60_000),
            request_timeout_ms: config.api.request_timeout_ms.clamp(1_000, 120_000),
        },
        booth: BoothConfig {
            booth_id: config.booth.booth_id.trim().to_string(),
            listener_id: config.booth.listener_id.trim().to_string(),
        },
        player: PlayerConfig {
            tick_interval_ms: player.tick_interval_ms.clamp(20, 1_000),
            status_poll_interval_ms: player.status_poll_interval_ms.max(1_000),
            transition_debounce_ms: player.transition_debounce_ms.min(5_000),
            duration_retry_attempts: player.duration_retry_attempts.clamp(1, 10),
            duration_retry_delay_ms: player.duration_retry_delay_ms.min(5_000),
            playlist_refresh_delay_ms: player.playlist_refresh_delay_ms.min(10_000),
            volume_step: player.volume_step.clamp(1, 50),
            default_volume: player.default_volume.min(100),
            auto_advance: player.auto_advance,
            progress_emit_per_second: player.progress_emit_per_second.clamp(1, 30),
        },
        logging: config.logging,
    }
}

/// Resolves the config file path, honoring `BOOTH_REMOTE_CONFIG`.
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(explicit));
    }
    dirs::config_dir().map(|dir| dir.join("booth_remote").join("config.toml"))
}

/// Loads config from `path`, writing defaults first when the file is missing.
pub fn load_or_create_config(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create config directory: {err}"))?;
        }
        let default_text = toml::to_string(&Config::default())
            .map_err(|err| format!("failed to serialize default config: {err}"))?;
        std::fs::write(path, default_text)
            .map_err(|err| format!("failed to write default config: {err}"))?;
    }
    let content = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {err}", path.display()))?;
    let parsed = toml::from_str::<Config>(&content)
        .map_err(|err| format!("failed to parse config {}: {err}", path.display()))?;
    Ok(sanitize_config(parsed))
}

#[cfg(test)]
mod tests {
    use super::{load_or_create_config, sanitize_config, Config, LogLevel};

    #[test]
    fn test_default_config_has_expected_values() {
        let config = Config::default();

        assert_eq!(config.api.base_url, "http://10.0.2.2:3000");
        assert!(config.api.auth_token.is_empty());
        assert_eq!(config.api.connect_timeout_ms, 5_000);
        assert_eq!(config.api.request_timeout_ms, 15_000);
        assert!(config.booth.booth_id.is_empty());
        assert!(config.booth.listener_id.is_empty());
        assert_eq!(config.player.tick_interval_ms, 100);
        assert_eq!(config.player.status_poll_interval_ms, 5_000);
        assert_eq!(config.player.transition_debounce_ms, 300);
        assert_eq!(config.player.duration_retry_attempts, 3);
        assert_eq!(config.player.duration_retry_delay_ms, 200);
        assert_eq!(config.player.playlist_refresh_delay_ms, 500);
        assert_eq!(config.player.volume_step, 10);
        assert_eq!(config.player.default_volume, 70);
        assert!(!config.player.auto_advance);
        assert_eq!(config.player.progress_emit_per_second, 5);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_trace_level_is_parsed_and_not_capped() {
        let config = toml::from_str::<Config>("[logging]\nlevel = \"trace\"\n")
            .expect("logging section should parse");
        assert_eq!(config.logging.level, LogLevel::Trace);
        assert_eq!(config.logging.level.as_filter(), log::LevelFilter::Trace);
        assert_eq!(LogLevel::Error.as_filter(), log::LevelFilter::Error);
    }

    #[test]
    fn test_partial_config_fills_missing_sections_with_defaults() {
        let partial = r#"
[booth]
booth_id = "12"
listener_id = "LSTN-1"

[player]
duration_retry_attempts = 2
"#;
        let config: Config = toml::from_str(partial).expect("partial config should parse");
        assert_eq!(config.booth.booth_id, "12");
        assert_eq!(config.booth.listener_id, "LSTN-1");
        assert_eq!(config.player.duration_retry_attempts, 2);
        assert_eq!(config.player.transition_debounce_ms, 300);
        assert_eq!(config.api.base_url, "http://10.0.2.2:3000");
    }

    #[test]
    fn test_sanitize_clamps_out_of_range_values() {
        let mut config = Config::default();
        config.api.base_url = " http://host:3000/ ".to_string();
        config.booth.listener_id = "  abc ".to_string();
        config.player.tick_interval_ms = 1;
        config.player.status_poll_interval_ms = 10;
        config.player.duration_retry_attempts = 0;
        config.player.volume_step = 0;
        config.player.default_volume = 250;
        config.player.progress_emit_per_second = 1_000;

        let sanitized = sanitize_config(config);
        assert_eq!(sanitized.api.base_url, "http://host:3000");
        assert_eq!(sanitized.booth.listener_id, "abc");
        assert_eq!(sanitized.player.tick_interval_ms, 20);
        assert_eq!(sanitized.player.status_poll_interval_ms, 1_000);
        assert_eq!(sanitized.player.duration_retry_attempts, 1);
        assert_eq!(sanitized.player.volume_step, 1);
        assert_eq!(sanitized.player.default_volume, 100);
        assert_eq!(sanitized.player.progress_emit_per_second, 30);
    }

    #[test]
    fn test_load_or_create_writes_defaults_when_missing() {
        let dir = std::env::temp_dir().join(format!("booth_remote_cfg_{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let config = load_or_create_config(&path).expect("default config should load");
        assert!(path.exists());
        assert_eq!(config, sanitize_config(Config::default()));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
