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

//! Turning `[[device]]` entries into bound devices.
//!
//! For the `mmio` backend every window of an entry is mapped from the memory device and
//! wrapped in an [`MmioPort`] sized for the register map it carries. The staging buffer
//! is mapped either from the memory device at its physical address or from its own
//! device node (a `u-dma-buf` for instance). The `simulated` backend uses the models in
//! [`crate::sim`] instead.
//!
//! The resulting [`DeviceResources`] are handed to the variant matching the entry's
//! compatible string, and the variant is wrapped in an [`IcapManager`].

use crate::config::{
    Backend, DEFAULT_MEMORY_DEVICE, DaemonConfig, DeviceEntry, PollingConfig, STAGING_CAPACITY,
    StagingEntry, Window,
};
use crate::error::IcapdError;
use crate::icap::registers::{cdma, port};
use crate::manager::IcapManager;
use crate::mmio::{MappedRegion, MmioPort};
use crate::sim::simulated_resources;
use crate::staging::StagingBuffer;
use crate::system_io::read_phys_addr;
use crate::variants::{DeviceResources, bind_variant};
use log::{error, info, trace};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Bound devices by handle.
#[derive(Debug, Default)]
pub struct DeviceTable {
    devices: BTreeMap<String, Arc<IcapManager>>,
}

impl DeviceTable {
    pub fn new() -> Self {
        DeviceTable::default()
    }

    /// Bind every device entry of `config`.
    ///
    /// An entry that fails to bind is logged and left out, so one broken entry does not
    /// keep the daemon from serving the others.
    pub fn bind_all(config: &DaemonConfig) -> Self {
        let mut table = DeviceTable::new();
        for entry in &config.devices {
            let bound = bind_device(entry, config.polling).and_then(|m| table.insert(m));
            if let Err(e) = bound {
                error!("Failed to bind device '{}': {e}", entry.handle);
            }
        }
        info!("{} device(s) bound", table.devices.len());
        table
    }

    /// # Returns: `Result<(), IcapdError>`
    /// * `Ok(())` - device added
    /// * `Err(IcapdError::Binding)` - a device with the same handle is already bound
    pub fn insert(&mut self, manager: IcapManager) -> Result<(), IcapdError> {
        if self.devices.contains_key(manager.handle()) {
            return Err(IcapdError::Binding(format!(
                "handle '{}' is bound twice",
                manager.handle()
            )));
        }
        self.devices
            .insert(manager.handle().to_string(), Arc::new(manager));
        Ok(())
    }

    pub fn get(&self, handle: &str) -> Result<Arc<IcapManager>, IcapdError> {
        self.devices
            .get(handle)
            .cloned()
            .ok_or_else(|| IcapdError::UnknownDevice(handle.to_string()))
    }

    /// Bound devices in handle order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<IcapManager>> {
        self.devices.values()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Map the hardware of one entry and bind the matching variant.
pub fn bind_device(entry: &DeviceEntry, polling: PollingConfig) -> Result<IcapManager, IcapdError> {
    trace!("Binding {entry:?}");
    let resources = match entry.backend {
        Backend::Mmio => mapped_resources(entry, polling)?,
        Backend::Simulated => simulated_resources(&entry.handle, &entry.compatible, polling)?,
    };
    let variant = bind_variant(&entry.compatible, resources)?;
    Ok(IcapManager::new(entry.handle.clone(), variant))
}

fn map_window(
    name: &'static str,
    file: &Path,
    window: Window,
    span: usize,
) -> Result<MmioPort, IcapdError> {
    let region = MappedRegion::map(file, window.base, window.size)?;
    MmioPort::new(name, Box::new(region), span)
}

fn mapped_resources(
    entry: &DeviceEntry,
    polling: PollingConfig,
) -> Result<DeviceResources, IcapdError> {
    let memory_device = entry
        .memory_device
        .as_deref()
        .unwrap_or(Path::new(DEFAULT_MEMORY_DEVICE));
    let control = entry.control.ok_or_else(|| {
        IcapdError::Binding(format!("{}: no control window configured", entry.handle))
    })?;
    let control = map_window("icap", memory_device, control, port::SPAN)?;
    let dma = entry
        .dma
        .map(|window| map_window("cdma", memory_device, window, cdma::SPAN))
        .transpose()?;
    let staging = entry
        .staging
        .as_ref()
        .map(|staging| map_staging(&entry.handle, staging, memory_device))
        .transpose()?;

    Ok(DeviceResources {
        handle: entry.handle.clone(),
        control,
        data: entry.data,
        dma,
        staging,
        polling,
    })
}

fn map_staging(
    handle: &str,
    entry: &StagingEntry,
    memory_device: &Path,
) -> Result<StagingBuffer, IcapdError> {
    let size = entry.size.unwrap_or(STAGING_CAPACITY);
    let phys_addr = match (entry.phys_addr, &entry.phys_addr_file) {
        (Some(phys_addr), _) => phys_addr,
        (None, Some(file)) => read_phys_addr(file)?,
        (None, None) => {
            return Err(IcapdError::Binding(format!(
                "{handle}: staging buffer needs phys_addr or phys_addr_file"
            )));
        }
    };
    let region = match &entry.device {
        Some(device) => MappedRegion::map(device, entry.offset.unwrap_or(0), size)?,
        None => MappedRegion::map(memory_device, phys_addr, size)?,
    };
    Ok(StagingBuffer::new(Box::new(region), phys_addr))
}
