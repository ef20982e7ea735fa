//! # Configuration Management
//!
//! Centralized configuration for the server, the interactive client and the
//! account tool.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - `AUTHWIRE_*` environment overrides via `from_env()`
//!
//! ## Security Considerations
//! - Argon2 defaults (64 MiB, 2 passes) make offline guessing expensive
//! - The attempt limit bounds online guessing per connection
//! - Command-line flags in the binaries take precedence over every source here

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Default listen/connect address
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:9000";

/// Pending-connection queue length requested for the listener
pub const DEFAULT_BACKLOG: u32 = 32;

/// Bytes requested per read
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Failed password attempts before the session is dropped
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AppConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Credential and whitelist files
    #[serde(default)]
    pub store: StoreConfig,

    /// Password hashing and lockout
    #[serde(default)]
    pub security: SecurityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults with `AUTHWIRE_*` environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Apply `AUTHWIRE_*` environment overrides on top of the current values
    pub fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("AUTHWIRE_SERVER_ADDRESS") {
            self.server.address = addr;
        }

        if let Ok(addr) = std::env::var("AUTHWIRE_CLIENT_ADDRESS") {
            self.client.address = addr;
        }

        if let Ok(limit) = std::env::var("AUTHWIRE_MAX_CONNECTIONS") {
            if let Ok(val) = limit.parse::<usize>() {
                self.server.max_connections = val;
            }
        }

        if let Ok(path) = std::env::var("AUTHWIRE_PASSWD_PATH") {
            self.store.passwd_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("AUTHWIRE_WHITELIST_PATH") {
            self.store.whitelist_path = Some(PathBuf::from(path));
        }

        if let Ok(timeout) = std::env::var("AUTHWIRE_CONNECT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                self.client.connect_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(path) = std::env::var("AUTHWIRE_LOG_FILE") {
            self.logging.log_to_file = true;
            self.logging.log_file_path = Some(path);
        }
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.store.validate());
        errors.extend(self.security.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:9000")
    pub address: String,

    /// Requested pending-connection queue length
    pub backlog: u32,

    /// Bytes requested per read system call
    pub read_chunk: usize,

    /// Maximum number of registered descriptors, listener included
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from(DEFAULT_ADDRESS),
            backlog: DEFAULT_BACKLOG,
            read_chunk: DEFAULT_READ_CHUNK,
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:9000')",
                self.address
            ));
        }

        if self.backlog == 0 {
            errors.push("Listen backlog must be greater than 0".to_string());
        }

        if self.read_chunk < 16 {
            errors.push("Read chunk too small (minimum: 16 bytes)".to_string());
        } else if self.read_chunk > 1024 * 1024 {
            errors.push("Read chunk too large (maximum: 1 MB)".to_string());
        }

        if self.max_connections < 2 {
            errors.push("Max connections must leave room for the listener and one peer".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure descriptor limits can support this)",
                self.max_connections
            ));
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Target server address
    pub address: String,

    /// Timeout for connection attempts
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Timeout for waiting for a reply (async client only)
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::from(DEFAULT_ADDRESS),
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid client address format: '{}' (expected format: '127.0.0.1:9000')",
                self.address
            ));
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        }

        if self.response_timeout.as_millis() < 100 {
            errors.push("Response timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Credential and whitelist file locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Credential file (`username,salt,hash`)
    pub passwd_path: PathBuf,

    /// Optional peer whitelist; absent means every peer is accepted
    #[serde(default)]
    pub whitelist_path: Option<PathBuf>,

    /// Field delimiter
    pub delimiter: char,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            passwd_path: PathBuf::from("passwd"),
            whitelist_path: None,
            delimiter: ',',
        }
    }
}

impl StoreConfig {
    /// Validate store configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.passwd_path.as_os_str().is_empty() {
            errors.push("Credential file path cannot be empty".to_string());
        }

        if !self.delimiter.is_ascii() || self.delimiter == '\\' || self.delimiter == '\n' || self.delimiter == '\r' {
            errors.push(format!(
                "Invalid delimiter {:?} (must be ASCII and not a backslash or line break)",
                self.delimiter
            ));
        }

        errors
    }

    /// Delimiter as the byte the row store expects
    pub fn delimiter_byte(&self) -> u8 {
        if self.delimiter.is_ascii() {
            self.delimiter as u8
        } else {
            crate::store::DEFAULT_DELIMITER
        }
    }
}

/// Password hashing parameters and lockout policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityConfig {
    /// Argon2 passes
    pub t_cost: u32,

    /// Argon2 memory in KiB
    pub m_cost_kib: u32,

    /// Argon2 lanes
    pub lanes: u32,

    /// Raw hash length in bytes
    pub output_len: usize,

    /// Raw salt length in bytes
    pub salt_len: usize,

    /// Failed password attempts before disconnect
    pub max_attempts: u8,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            t_cost: 2,
            m_cost_kib: 1 << 16,
            lanes: 1,
            output_len: 32,
            salt_len: 16,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SecurityConfig {
    /// Validate security configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.t_cost == 0 {
            errors.push("Argon2 t_cost must be at least 1".to_string());
        }

        if self.lanes == 0 {
            errors.push("Argon2 lanes must be at least 1".to_string());
        }

        if self.m_cost_kib < 8 * self.lanes.max(1) {
            errors.push(format!(
                "Argon2 memory too small: {} KiB (minimum: 8 KiB per lane)",
                self.m_cost_kib
            ));
        }

        if self.output_len < 16 {
            errors.push("Hash output too short (minimum: 16 bytes)".to_string());
        }

        // Salts are stored base64 encoded; 6 raw bytes already exceed Argon2's 8-byte minimum
        if self.salt_len < 8 {
            errors.push("Salt too short (minimum: 8 bytes)".to_string());
        }

        if self.max_attempts == 0 {
            errors.push("Max attempts must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Name recorded on the root `app` span of every log line
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("authwire"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_ascii_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
