//! Server configuration management

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server: ServerSettings,
    /// Identity of the exported device on the emulated bus
    #[serde(default)]
    pub export: ExportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Listen address; the USB/IP default is all interfaces
    pub bind_addr: String,
    /// USB/IP well-known port
    pub port: u16,
    pub log_level: String,
}

/// Bus-level identity reported in the handshake replies.
///
/// These values describe where the emulated device pretends to live on
/// the exporting host's bus; the importing kernel echoes them back when
/// attaching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Device profile to register (`storage` or `loopback`)
    #[serde(default = "ExportSettings::default_profile")]
    pub profile: String,
    #[serde(default = "ExportSettings::default_usb_path")]
    pub usb_path: String,
    #[serde(default = "ExportSettings::default_bus_id")]
    pub bus_id: String,
    #[serde(default = "ExportSettings::default_busnum")]
    pub busnum: u32,
    #[serde(default = "ExportSettings::default_devnum")]
    pub devnum: u32,
    /// USB/IP speed code; 2 = full speed
    #[serde(default = "ExportSettings::default_speed")]
    pub speed: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            profile: Self::default_profile(),
            usb_path: Self::default_usb_path(),
            bus_id: Self::default_bus_id(),
            busnum: Self::default_busnum(),
            devnum: Self::default_devnum(),
            speed: Self::default_speed(),
        }
    }
}

impl ExportSettings {
    fn default_profile() -> String {
        "storage".to_string()
    }

    fn default_usb_path() -> String {
        "/sys/devices/pci0000:00/0000:00:01.2/usb1/1-1".to_string()
    }

    fn default_bus_id() -> String {
        "1-1".to_string()
    }

    fn default_busnum() -> u32 {
        1
    }

    fn default_devnum() -> u32 {
        2
    }

    fn default_speed() -> u32 {
        2
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_addr: "0.0.0.0".to_string(),
                port: 3240,
                log_level: "info".to_string(),
            },
            export: ExportSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/usbip-emu/server.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: ServerConfig = toml::from_str(&content)
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

    /// Default config file location (XDG config dir, then /etc)
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usbip-emu").join("server.toml")
        } else {
            PathBuf::from("/etc/usbip-emu/server.toml")
        }
    }

    fn validate(&self) -> Result<()> {
        if self.export.bus_id.is_empty() {
            return Err(anyhow!("export.bus_id must not be empty"));
        }
        if self.export.bus_id.len() > protocol::BUS_ID_LEN {
            return Err(anyhow!(
                "export.bus_id exceeds {} bytes",
                protocol::BUS_ID_LEN
            ));
        }
        if self.export.usb_path.len() > protocol::SYSFS_PATH_LEN {
            return Err(anyhow!(
                "export.usb_path exceeds {} bytes",
                protocol::SYSFS_PATH_LEN
            ));
        }
        Ok(())
    }
}
