//! # Storefront Configuration
//!
//! Configuration for the cart engine and its collaborators.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOREFRONT_API_URL=https://shop.example                            │
//! │     STOREFRONT_ACCESS_TOKEN=...                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/storefront/storefront.toml (Linux)                       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     no endpoint, platform data dir, key "storefront.cart_id"           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [api]
//! endpoint = "https://shop.example"
//! access_token = "public-storefront-token"
//! version = "2024-07"
//! timeout_secs = 10
//!
//! [storage]
//! dir = "/var/lib/storefront"
//! cart_key = "storefront.cart_id"
//!
//! [signals]
//! capacity = 16
//!
//! [telemetry]
//! enabled = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::signal::DEFAULT_SIGNAL_CAPACITY;

/// Key under which the cart identifier is persisted.
pub const DEFAULT_CART_KEY: &str = "storefront.cart_id";

/// Storefront API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "2024-07";

// =============================================================================
// API Settings
// =============================================================================

/// Commerce backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Shop base URL (http or https). `None` means no HTTP transport.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Public storefront access token.
    #[serde(default)]
    pub access_token: Option<String>,

    /// API version segment of the GraphQL path.
    #[serde(default = "default_api_version")]
    pub version: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            endpoint: None,
            access_token: None,
            version: default_api_version(),
            timeout_secs: default_timeout(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Durable client store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory of the file store. Defaults to the platform data dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Fixed key holding the cart identifier.
    #[serde(default = "default_cart_key")]
    pub cart_key: String,
}

fn default_cart_key() -> String {
    DEFAULT_CART_KEY.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            dir: None,
            cart_key: default_cart_key(),
        }
    }
}

// =============================================================================
// Signal / Telemetry Settings
// =============================================================================

/// Signal bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSettings {
    /// Signals a subscriber may fall behind by before lagging.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_SIGNAL_CAPACITY
}

impl Default for SignalSettings {
    fn default() -> Self {
        SignalSettings {
            capacity: default_capacity(),
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Forward action events to the tracing log.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        TelemetrySettings { enabled: true }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete storefront configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorefrontConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub signals: SignalSettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl StorefrontConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (storefront.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading storefront config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load storefront config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> Result<(), ConfigError> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Storefront config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref endpoint) = self.api.endpoint {
            let parsed = url::Url::parse(endpoint)?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "API endpoint must start with http:// or https://, got: {}",
                    endpoint
                )));
            }
        }

        if self.api.version.trim().is_empty() {
            return Err(ConfigError::Invalid("api.version must not be empty".into()));
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.storage.cart_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.cart_key must not be empty".into(),
            ));
        }

        if self.signals.capacity == 0 {
            return Err(ConfigError::Invalid(
                "signals.capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("STOREFRONT_API_URL") {
            debug!(url = %url, "Overriding API endpoint from environment");
            self.api.endpoint = Some(url);
        }

        if let Ok(token) = std::env::var("STOREFRONT_ACCESS_TOKEN") {
            self.api.access_token = Some(token);
        }

        if let Ok(version) = std::env::var("STOREFRONT_API_VERSION") {
            self.api.version = version;
        }

        if let Ok(dir) = std::env::var("STOREFRONT_STORAGE_DIR") {
            debug!(dir = %dir, "Overriding storage dir from environment");
            self.storage.dir = Some(PathBuf::from(dir));
        }

        if let Ok(key) = std::env::var("STOREFRONT_CART_KEY") {
            self.storage.cart_key = key;
        }

        if let Ok(flag) = std::env::var("STOREFRONT_TELEMETRY") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "on" => self.telemetry.enabled = true,
                "0" | "false" | "off" => self.telemetry.enabled = false,
                _ => warn!(value = %flag, "Unknown STOREFRONT_TELEMETRY value"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "storefront", "storefront")
            .map(|dirs| dirs.config_dir().join("storefront.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the API endpoint if configured.
    pub fn endpoint(&self) -> Option<&str> {
        self.api.endpoint.as_deref()
    }

    /// Returns the persisted cart key.
    pub fn cart_key(&self) -> &str {
        &self.storage.cart_key
    }
}
