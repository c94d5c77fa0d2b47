//! Application configuration options

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::errors::HubError;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::utils::CooldownOptions;
use crate::workers::suggestions;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Backend API base URL
    pub backend_base_url: String,

    /// Backend request timeout
    pub backend_timeout: Duration,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Enable local HTTP server
    pub enable_server: bool,

    /// Enable background suggestion polling
    pub enable_suggestions: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Suggestion worker options
    pub suggestions_worker: suggestions::Options,

    /// How long a suggestion alert stays up; `None` keeps it until dismissed
    pub alert_ttl: Option<Duration>,

    /// Offset used to align chart buckets
    pub chart_offset: FixedOffset,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            backend_base_url: "http://localhost:8000".to_string(),
            backend_timeout: Duration::from_secs(30),
            layout: StorageLayout::default(),
            enable_server: true,
            enable_suggestions: true,
            server: ServerOptions::default(),
            suggestions_worker: suggestions::Options::default(),
            alert_ttl: Some(Duration::from_secs(30)),
            chart_offset: Utc.fix(),
        }
    }
}

impl AppOptions {
    /// Build runtime options from the settings file
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Result<Self, HubError> {
        let chart_offset = settings
            .timezone_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                HubError::ConfigError(format!(
                    "timezone_offset_minutes out of range: {}",
                    settings.timezone_offset_minutes
                ))
            })?;

        if settings.suggestions.interval_secs == 0 {
            return Err(HubError::ConfigError(
                "suggestions.interval_secs must be positive".to_string(),
            ));
        }

        Ok(Self {
            lifecycle: LifecycleOptions::default(),
            backend_base_url: settings.backend.base_url.clone(),
            backend_timeout: Duration::from_secs(settings.backend.timeout_secs),
            layout,
            enable_server: true,
            enable_suggestions: settings.suggestions.enabled,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            suggestions_worker: suggestions::Options {
                interval: Duration::from_secs(settings.suggestions.interval_secs),
                cooldown: CooldownOptions::default(),
            },
            alert_ttl: match settings.suggestions.alert_ttl_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            chart_offset,
        })
    }
}

/// Lifecycle options for the hub
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}
