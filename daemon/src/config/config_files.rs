// This file is part of icapd, an application to stream partial bitstreams into Xilinx FPGA configuration ports.
//
// Copyright 2025 Canonical Ltd.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// icapd is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// icapd is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

use crate::config::{DaemonConfig, PollingConfig};
use crate::error::IcapdError;
use crate::poll::PollPolicy;
use crate::system_io::fs_read;
use log::trace;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// This is the top level struct which holds all sections
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TomlConfig {
    polling: Option<PollingToml>,
    #[serde(default)]
    device: Vec<DeviceEntry>,
}

/// This is the "polling" section struct
#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct PollingToml {
    dma_max_retries: Option<u32>,
    port_max_retries: Option<u32>,
    interval_us: Option<u64>,
}

/// Where a device's registers come from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Physical memory mapped from the memory device.
    #[default]
    Mmio,
    /// In-process models from [`crate::sim`], for testing without hardware.
    Simulated,
}

/// A physical address window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Window {
    pub base: u64,
    pub size: usize,
}

/// The DMA staging buffer of a device.
///
/// When `device` is unset the buffer is mapped from the memory device at `phys_addr`.
/// When it is set (a `u-dma-buf` node for instance) the buffer is mapped from `offset`
/// of that device, and the physical address is either given directly or read from
/// `phys_addr_file`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StagingEntry {
    pub device: Option<PathBuf>,
    pub offset: Option<u64>,
    pub phys_addr: Option<u64>,
    pub phys_addr_file: Option<PathBuf>,
    pub size: Option<usize>,
}

/// One `[[device]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceEntry {
    pub handle: String,
    pub compatible: String,
    #[serde(default)]
    pub backend: Backend,
    pub memory_device: Option<PathBuf>,
    pub control: Option<Window>,
    pub data: Option<Window>,
    pub dma: Option<Window>,
    pub staging: Option<StagingEntry>,
}

impl TomlConfig {
    pub(crate) fn merge(self, fallback: TomlConfig) -> TomlConfig {
        let polling = match (self.polling, fallback.polling) {
            (Some(primary), Some(fallback)) => Some(primary.merge(fallback)),
            (primary, fallback) => primary.or(fallback),
        };
        let device = if self.device.is_empty() {
            fallback.device
        } else {
            self.device
        };
        TomlConfig { polling, device }
    }
}

impl PollingToml {
    pub(crate) fn merge(self, fallback: PollingToml) -> PollingToml {
        PollingToml {
            dma_max_retries: self.dma_max_retries.or(fallback.dma_max_retries),
            port_max_retries: self.port_max_retries.or(fallback.port_max_retries),
            interval_us: self.interval_us.or(fallback.interval_us),
        }
    }
}

impl From<PollingToml> for PollingConfig {
    fn from(value: PollingToml) -> Self {
        let defaults = PollingConfig::default();
        let interval = value
            .interval_us
            .map(Duration::from_micros)
            .unwrap_or(defaults.dma.interval);
        PollingConfig {
            dma: PollPolicy::new(
                value.dma_max_retries.unwrap_or_else(|| {
                    trace!("No dma_max_retries provided. Using hardcoded value.");
                    defaults.dma.max_attempts
                }),
                interval,
            ),
            port: PollPolicy::new(
                value.port_max_retries.unwrap_or_else(|| {
                    trace!("No port_max_retries provided. Using hardcoded value.");
                    defaults.port.max_attempts
                }),
                interval,
            ),
        }
    }
}

impl From<TomlConfig> for DaemonConfig {
    fn from(value: TomlConfig) -> Self {
        DaemonConfig {
            polling: value.polling.unwrap_or_default().into(),
            devices: value.device,
        }
    }
}

pub(crate) fn toml_str_to_config(toml_string: &str, file: &Path) -> Result<TomlConfig, IcapdError> {
    toml::from_str(toml_string).map_err(|e| IcapdError::Config {
        file: file.into(),
        e,
    })
}

pub(crate) fn config_from_file(file_path: &Path) -> Result<TomlConfig, IcapdError> {
    if !file_path.is_file() {
        return Err(IcapdError::Internal(format!(
            "Config file not found in {file_path:?}"
        )));
    }
    toml_str_to_config(&fs_read(file_path)?, file_path)
}
