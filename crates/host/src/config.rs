//! Host configuration management

use crate::accessory::MAX_TRANSFER_LENGTH;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default upper bound on a single `bulkTransferIn` buffer (1 MiB)
pub const DEFAULT_MAX_TRANSFER_LENGTH: usize = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub usb: UsbSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Address of the command server
    #[serde(default = "HostSettings::default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "HostSettings::default_log_level")]
    pub log_level: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            bind_addr: Self::default_bind_addr(),
            log_level: Self::default_log_level(),
        }
    }
}

impl HostSettings {
    fn default_bind_addr() -> String {
        "127.0.0.1:7531".to_string()
    }

    fn default_log_level() -> String {
        "info".to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsbSettings {
    /// VID:PID patterns of devices to expose (empty = all)
    #[serde(default)]
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Largest `maxLength` accepted by `bulkTransferIn`
    #[serde(default = "TransferSettings::default_max_transfer_length")]
    pub max_transfer_length: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            max_transfer_length: Self::default_max_transfer_length(),
        }
    }
}

impl TransferSettings {
    fn default_max_transfer_length() -> usize {
        DEFAULT_MAX_TRANSFER_LENGTH
    }
}

impl HostConfig {
    /// Load configuration from `path`, or from the default location
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => expand_path(&p),
            None => {
                let default = Self::default_path();
                if !default.exists() {
                    return Err(anyhow!("No configuration file found, using defaults"));
                }
                default
            }
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: HostConfig = toml::from_str(&content)
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
            config_dir.join("quick-usb").join("host.toml")
        } else {
            PathBuf::from(".config/quick-usb/host.toml")
        }
    }

    /// Parsed command server address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.host
            .bind_addr
            .parse()
            .map_err(|e| anyhow!("Invalid bind address '{}': {}", self.host.bind_addr, e))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_log_level(&self.host.log_level)?;

        self.bind_addr()?;

        for filter in &self.usb.filters {
            Self::validate_filter(filter)?;
        }

        if !(1..=MAX_TRANSFER_LENGTH).contains(&self.transfer.max_transfer_length) {
            return Err(anyhow!(
                "max_transfer_length {} outside 1..={}",
                self.transfer.max_transfer_length,
                MAX_TRANSFER_LENGTH
            ));
        }

        Ok(())
    }

    /// Validate a USB device filter pattern (VID:PID)
    pub fn validate_filter(filter: &str) -> Result<()> {
        let Some((vid, pid)) = filter.split_once(':') else {
            return Err(anyhow!(
                "Invalid filter format '{}', expected VID:PID (e.g., '0x1234:0x5678' or '0x1234:*')",
                filter
            ));
        };
        if pid.contains(':') {
            return Err(anyhow!("Invalid filter format '{}', too many ':'", filter));
        }

        if vid != "*" {
            Self::validate_hex_id(vid, "VID")?;
        }
        if pid != "*" {
            Self::validate_hex_id(pid, "PID")?;
        }

        Ok(())
    }

    fn validate_hex_id(id: &str, name: &str) -> Result<()> {
        let hex_part = id
            .strip_prefix("0x")
            .or_else(|| id.strip_prefix("0X"))
            .ok_or_else(|| {
                anyhow!(
                    "Invalid {} '{}', must start with '0x' (e.g., '0x1234')",
                    name,
                    id
                )
            })?;

        if hex_part.is_empty() || hex_part.len() > 4 {
            return Err(anyhow!(
                "Invalid {} '{}', hex part must be 1-4 digits",
                name,
                id
            ));
        }

        u16::from_str_radix(hex_part, 16)
            .map_err(|_| anyhow!("Invalid {} '{}', not a valid hex number", name, id))?;

        Ok(())
    }
}

/// Check a log level name from the config file or the command line
pub fn validate_log_level(level: &str) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&level) {
        return Err(anyhow!(
            "Invalid log level '{}', must be one of: {}",
            level,
            valid_levels.join(", ")
        ));
    }
    Ok(())
}

/// Expand a leading `~` in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}
