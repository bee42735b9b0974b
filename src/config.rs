//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `zone-ingest.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - IngestConfig: UDP bind address, datagram size, record store path.
//!     - SerialConfig: Port name, baud rate, read timeout for the serial reader.
//!     - ApiConfig: Optional read-only HTTP view of the record store.
//!     - LoggingConfig: Default log filter.
//!
//! ==============================================================================

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    pub host: String,
    pub port: u16,
    pub max_datagram_bytes: usize,
    pub store_path: PathBuf,
}

impl IngestConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_datagram_bytes: 4096,
            store_path: PathBuf::from("ui").join("sensor_data.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        let port = if cfg!(windows) { "COM3" } else { "/dev/ttyUSB0" };
        Self {
            port: port.to_string(),
            baud_rate: 9600,
            timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    /// Load with default fallback
    ///
    /// Returns the config plus the path it came from, so the caller can log it
    /// once logging is set up from the config itself.
    pub fn load_or_default() -> (Self, Option<PathBuf>) {
        let paths = [
            PathBuf::from("config").join("zone-ingest.toml"),
            PathBuf::from("..").join("config").join("zone-ingest.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => return (config, Some(path.clone())),
                    Err(e) => {
                        // logging is not up yet, so this one goes straight to stderr
                        eprintln!("[CONFIG] Warning: Failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        (Self::default(), None)
    }

    /// Log configuration summary
    pub fn log_summary(&self, source: Option<&Path>) {
        match source {
            Some(path) => tracing::info!("[CONFIG] Loaded from {}", path.display()),
            None => tracing::warn!("[CONFIG] No config file found - using defaults"),
        }
        tracing::info!(
            udp = %self.ingest.bind_addr(),
            store = %self.ingest.store_path.display(),
            max_datagram = self.ingest.max_datagram_bytes,
            serial_port = %self.serial.port,
            baud = self.serial.baud_rate,
            api = self.api.enabled,
            log_level = %self.logging.level,
            "[CONFIG] effective configuration"
        );
    }
}
