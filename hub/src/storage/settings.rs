//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Hub settings, read from `settings.json` in the data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Also write logs to `<data-dir>/logs`
    #[serde(default)]
    pub log_to_file: bool,

    /// Emit JSON-formatted log lines
    #[serde(default)]
    pub log_json: bool,

    /// Backend configuration
    #[serde(default)]
    pub backend: BackendSettings,

    /// Local HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Suggestion polling configuration
    #[serde(default)]
    pub suggestions: SuggestionSettings,

    /// Offset from UTC used to align chart buckets, in minutes
    #[serde(default)]
    pub timezone_offset_minutes: i32,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_to_file: false,
            log_json: false,
            backend: BackendSettings::default(),
            server: ServerSettings::default(),
            suggestions: SuggestionSettings::default(),
            timezone_offset_minutes: 0,
        }
    }
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL for the backend API
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_backend_timeout() -> u64 {
    30
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Suggestion notifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionSettings {
    /// Enable background polling
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Polling interval in seconds
    #[serde(default = "default_polling_interval")]
    pub interval_secs: u64,

    /// Seconds before an undismissed alert disappears on its own
    #[serde(default = "default_alert_ttl")]
    pub alert_ttl_secs: u64,
}

fn default_polling_interval() -> u64 {
    300
}

fn default_alert_ttl() -> u64 {
    30
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_polling_interval(),
            alert_ttl_secs: default_alert_ttl(),
        }
    }
}
