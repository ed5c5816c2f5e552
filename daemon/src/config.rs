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

//! Daemon configuration.
//!
//! Hardcoded defaults live here as constants. They can be overridden by two optional TOML
//! files: the vendor file at [`VENDOR_CONFIG_PATH`] and the user file at
//! [`USER_CONFIG_PATH`]. The user file overrides the vendor file, which overrides the
//! hardcoded values.
//!
//! ```toml
//! [polling]
//! dma_max_retries = 10000
//! port_max_retries = 5000
//! interval_us = 0
//!
//! [[device]]
//! handle = "icap0"
//! compatible = "xlnx,hbicap-fpga"
//! control = { base = 0xA0000000, size = 0x1000 }
//! data = { base = 0xB0000000, size = 0x1000 }
//! dma = { base = 0xA0010000, size = 0x1000 }
//! staging = { device = "/dev/udmabuf0", phys_addr_file = "/sys/class/u-dma-buf/udmabuf0/phys_addr", size = 4096 }
//! ```

mod config_files;

pub use config_files::{Backend, DeviceEntry, StagingEntry, Window};

use crate::poll::PollPolicy;
use config_files::{TomlConfig, config_from_file};
use log::{trace, warn};
use std::path::Path;
use std::time::Duration;

/// Vendor provided configuration, overridden by [`USER_CONFIG_PATH`].
pub static VENDOR_CONFIG_PATH: &str = "/usr/lib/icapd/config.toml";

/// Administrator provided configuration.
pub static USER_CONFIG_PATH: &str = "/etc/icapd/config.toml";

/// Memory device mapped for register windows when a device entry does not name one.
pub static DEFAULT_MEMORY_DEVICE: &str = "/dev/mem";

/// Status polls allowed while waiting for one DMA transfer to complete.
pub const DMA_MAX_RETRIES: u32 = 10_000;

/// Status polls allowed while waiting for the configuration port to go idle.
pub const PORT_MAX_RETRIES: u32 = 5_000;

/// Size of the DMA staging buffer, and so the largest chunk of one DMA transfer.
pub const STAGING_CAPACITY: usize = 4096;

/// Size of the scratch buffer the FIFO path assembles words in.
pub const FIFO_SCRATCH_BYTES: usize = 4096;

/// Largest number of words the port can read back in one transaction.
pub const MAX_READ_TRANSACTION_WORDS: usize = 0xFFF;

/// Staging buffers above this physical address may not be reachable by the DMA engine.
pub const STAGING_ADDRESS_LIMIT: u64 = 0x8000_0000;

/// Retry budgets for the two kinds of status polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub dma: PollPolicy,
    pub port: PollPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            dma: PollPolicy::new(DMA_MAX_RETRIES, Duration::ZERO),
            port: PollPolicy::new(PORT_MAX_RETRIES, Duration::ZERO),
        }
    }
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaemonConfig {
    pub polling: PollingConfig,
    pub devices: Vec<DeviceEntry>,
}

/// Load the configuration from the standard vendor and user locations.
///
/// Missing or unreadable files are logged and skipped; this never fails.
pub fn load_config() -> DaemonConfig {
    load_config_from(Path::new(VENDOR_CONFIG_PATH), Path::new(USER_CONFIG_PATH))
}

/// Load the configuration from an explicit pair of files.
///
/// # Arguments
///
/// * `vendor` - lower-priority file
/// * `user` - higher-priority file
///
/// # Returns: `DaemonConfig`
/// Polling keys are merged field by field. The user file's `[[device]]` list replaces the
/// vendor list when it is non-empty.
pub fn load_config_from(vendor: &Path, user: &Path) -> DaemonConfig {
    let vendor_config = config_from_file(vendor).unwrap_or_else(|e| {
        warn!("Using hardcoded values for vendor config because loading config failed: {e}");
        TomlConfig::default()
    });
    let user_config = config_from_file(user).unwrap_or_else(|e| {
        warn!("Using hardcoded values for user config because loading config failed: {e}");
        TomlConfig::default()
    });
    trace!("Merging user_config: {user_config:?} with vendor_config {vendor_config:?}");
    let merged = user_config.merge(vendor_config);
    let config = merged.into();
    trace!("Resulting config: {config:?}");
    config
}
