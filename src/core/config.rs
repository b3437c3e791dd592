// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Device and bus configuration
//!
//! Configuration is read from a TOML file (conventionally `zuluide.toml`).
//! Every field has a default so an empty file is a valid configuration.
//!
//! ```toml
//! [ide]
//! max_pio = 3
//! max_udma = 0
//!
//! [[device]]
//! kind = "cdrom"
//! image = "games/disc.bin"
//!
//! [[device]]
//! kind = "rigid"
//! image = "hdd.img"
//! model = "Generic HDD"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{IdeError, Result};
use crate::core::phy::PhyCapabilities;

/// Default image streaming buffer
pub const DEFAULT_BUFFER_SIZE: usize = 65536;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Bus-wide settings
    pub ide: IdeConfig,

    /// Attached devices, index 0 is the master
    #[serde(rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

/// Bus-wide settings, all clamped against the PHY capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeConfig {
    pub max_pio: u8,

    /// Highest UDMA mode offered, -1 disables DMA
    pub max_udma: i8,

    /// Largest DRQ block in bytes, 0 uses the PHY maximum
    pub max_blocksize: usize,

    pub transfer_timeout_ms: u64,

    /// Ring buffer size of the image streaming engine
    pub buffer_size: usize,

    /// Artificial delay before each media access
    pub access_delay_ms: u64,

    /// Keep executing a command when the host starts another one
    pub ignore_command_interrupt: bool,

    /// Answer register reads for an absent slave with zeros
    pub enable_dev1_zeros: bool,

    /// Assert INTRQ between PACKET and the command transfer
    pub atapi_intrq: bool,
}

impl Default for IdeConfig {
    fn default() -> Self {
        Self {
            max_pio: 3,
            max_udma: 0,
            max_blocksize: 0,
            transfer_timeout_ms: 10_000,
            buffer_size: DEFAULT_BUFFER_SIZE,
            access_delay_ms: 0,
            ignore_command_interrupt: true,
            enable_dev1_zeros: false,
            atapi_intrq: false,
        }
    }
}

/// Emulated device family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cdrom,
    Removable,
    Zip100,
    Zip250,
    Rigid,
}

impl DeviceKind {
    pub fn is_atapi(self) -> bool {
        !matches!(self, DeviceKind::Rigid)
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceKind::Cdrom => "cdrom",
            DeviceKind::Removable => "removable",
            DeviceKind::Zip100 => "zip100",
            DeviceKind::Zip250 => "zip250",
            DeviceKind::Rigid => "rigid",
        }
    }
}

impl std::str::FromStr for DeviceKind {
    type Err = IdeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cdrom" | "cd" => Ok(DeviceKind::Cdrom),
            "removable" => Ok(DeviceKind::Removable),
            "zip" | "zip100" => Ok(DeviceKind::Zip100),
            "zip250" => Ok(DeviceKind::Zip250),
            "rigid" | "hdd" => Ok(DeviceKind::Rigid),
            other => Err(IdeError::Config(format!("unknown device kind '{}'", other))),
        }
    }
}

/// Per-device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub kind: DeviceKind,

    /// Image bound at startup
    pub image: Option<PathBuf>,

    pub read_only: bool,

    /// Rigid disk CHS override, zero derives geometry from capacity
    pub cylinders: u16,
    pub heads: u8,
    pub sectors: u8,

    /// INQUIRY overrides
    pub vendor: Option<String>,
    pub product: Option<String>,
    pub revision: Option<String>,

    /// IDENTIFY overrides
    pub model: Option<String>,
    pub serial: Option<String>,
    pub firmware: Option<String>,

    /// A load request from the host brings back an ejected cartridge
    pub reinsert_media_after_eject: bool,

    /// INQUIRY brings back an ejected cartridge
    pub reinsert_media_on_inquiry: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: DeviceKind::Cdrom,
            image: None,
            read_only: false,
            cylinders: 0,
            heads: 0,
            sectors: 0,
            vendor: None,
            product: None,
            revision: None,
            model: None,
            serial: None,
            firmware: None,
            reinsert_media_after_eject: true,
            reinsert_media_on_inquiry: true,
        }
    }
}

impl DeviceConfig {
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image = Some(path.into());
        self
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        log::info!("Loading configuration from {}", path.display());
        Self::from_toml(&contents)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.devices.len() > 2 {
            return Err(IdeError::Config(format!(
                "at most two devices per bus, {} configured",
                self.devices.len()
            )));
        }
        if self.ide.max_udma < -1 || self.ide.max_udma > 6 {
            return Err(IdeError::Config(format!(
                "max_udma {} outside -1..=6",
                self.ide.max_udma
            )));
        }
        if self.ide.max_pio > 4 {
            return Err(IdeError::Config(format!(
                "max_pio {} outside 0..=4",
                self.ide.max_pio
            )));
        }
        for (idx, dev) in self.devices.iter().enumerate() {
            if dev.heads > 16 || dev.sectors > 63 {
                return Err(IdeError::Config(format!(
                    "device {}: CHS override {}/{}/{} exceeds 16 heads or 63 sectors",
                    idx, dev.cylinders, dev.heads, dev.sectors
                )));
            }
        }
        Ok(())
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.ide.transfer_timeout_ms)
    }

    /// Limit PHY capabilities to what the configuration allows
    pub fn clamp_capabilities(&self, caps: PhyCapabilities) -> PhyCapabilities {
        let max_udma_mode = match (caps.max_udma_mode, self.ide.max_udma) {
            (Some(phy_max), cfg) if cfg >= 0 => Some(phy_max.min(cfg as u8)),
            _ => None,
        };
        let max_blocksize = match self.ide.max_blocksize {
            0 => caps.max_blocksize,
            cfg => caps.max_blocksize.min(cfg),
        };

        log::info!(
            "Transfer limits: PIO {} (phy {}), UDMA {:?} (phy {:?}), blocksize {} (phy {})",
            caps.max_pio_mode.min(self.ide.max_pio),
            caps.max_pio_mode,
            max_udma_mode,
            caps.max_udma_mode,
            max_blocksize,
            caps.max_blocksize
        );

        PhyCapabilities {
            max_pio_mode: caps.max_pio_mode.min(self.ide.max_pio),
            max_udma_mode,
            max_blocksize,
            ..caps
        }
    }
}
