//! Serial port configuration management

use anyhow::{Context, Result, anyhow};
use protocol::LineSettings;
use protocol::cdc::{CONTROL_TIMEOUT, WRITE_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest accepted `read_error_budget`; reads clamp larger values to it
pub const MAX_READ_ERROR_BUDGET: u32 = 64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortConfig {
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Line parameters used when the caller does not supply its own
    #[serde(default)]
    pub line: LineSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_level(),
        }
    }
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

/// How `open()` treats interface claim and control transfer failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenPolicy {
    /// Report problems in the open report and keep the session
    #[default]
    BestEffort,
    /// Any problem fails the open and releases the device
    Strict,
}

/// Which fields of the caller's line settings reach the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMode {
    /// Baud rate only; framing is sent as 8N1
    #[default]
    Fixed,
    /// Baud rate, stop bits, parity and data bits
    FromSettings,
}

/// Per-session transfer behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Bulk IN timeout in milliseconds (0 = block indefinitely)
    #[serde(default)]
    pub timeout_ms: u32,
    /// Bulk OUT timeout in milliseconds
    #[serde(default = "SessionSettings::default_write_timeout")]
    pub write_timeout_ms: u32,
    /// Class control transfer timeout in milliseconds
    #[serde(default = "SessionSettings::default_control_timeout")]
    pub control_timeout_ms: u32,
    #[serde(default)]
    pub open_policy: OpenPolicy,
    #[serde(default)]
    pub framing: FramingMode,
    /// Non-timeout bulk IN errors tolerated within one read call
    #[serde(default = "SessionSettings::default_read_error_budget")]
    pub read_error_budget: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            write_timeout_ms: Self::default_write_timeout(),
            control_timeout_ms: Self::default_control_timeout(),
            open_policy: OpenPolicy::default(),
            framing: FramingMode::default(),
            read_error_budget: Self::default_read_error_budget(),
        }
    }
}

impl SessionSettings {
    fn default_write_timeout() -> u32 {
        WRITE_TIMEOUT.as_millis() as u32
    }

    fn default_control_timeout() -> u32 {
        CONTROL_TIMEOUT.as_millis() as u32
    }

    fn default_read_error_budget() -> u32 {
        3
    }

    /// Initial bulk IN timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// Bulk OUT timeout
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.write_timeout_ms))
    }

    /// Control transfer timeout
    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.control_timeout_ms))
    }
}

impl PortConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/usb-serial/port.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: PortConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb-serial").join("port.toml")
        } else {
            PathBuf::from(".config/usb-serial/port.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.log_level,
                valid_levels.join(", ")
            ));
        }

        self.line
            .validate()
            .context("Invalid [line] settings")?;

        if self.session.write_timeout_ms == 0 {
            return Err(anyhow!("write_timeout_ms must be greater than 0"));
        }
        if self.session.control_timeout_ms == 0 {
            return Err(anyhow!("control_timeout_ms must be greater than 0"));
        }
        if self.session.read_error_budget > MAX_READ_ERROR_BUDGET {
            return Err(anyhow!(
                "read_error_budget must be at most {}, got {}",
                MAX_READ_ERROR_BUDGET,
                self.session.read_error_budget
            ));
        }

        Ok(())
    }
}

/// Load a configuration file, expanding a leading `~`
pub fn load_config(path: &str) -> Result<PortConfig> {
    let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
    PortConfig::load(Some(path_buf))
}
