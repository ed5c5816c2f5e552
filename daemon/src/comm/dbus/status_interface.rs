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

use crate::binding::DeviceTable;
use crate::comm::dbus::validate_device_handle;
use log::info;
use std::sync::Arc;
use zbus::{fdo, interface};

pub struct StatusInterface {
    devices: Arc<DeviceTable>,
}

impl StatusInterface {
    pub fn new(devices: Arc<DeviceTable>) -> Self {
        StatusInterface { devices }
    }
}

#[interface(name = "com.canonical.icapd.status")]
impl StatusInterface {
    async fn get_state(&self, device_handle: &str) -> Result<String, fdo::Error> {
        info!("get_state called with name: {device_handle}");
        validate_device_handle(device_handle)?;
        Ok(self.devices.get(device_handle)?.state().to_string())
    }

    /// One `handle:compatible` line per bound device.
    async fn get_devices(&self) -> Result<String, fdo::Error> {
        info!("get_devices called");
        let lines: Vec<String> = self
            .devices
            .iter()
            .map(|manager| format!("{}:{}", manager.handle(), manager.compatible()))
            .collect();
        Ok(lines.join("\n"))
    }

    async fn get_supported_flags(&self, device_handle: &str) -> Result<String, fdo::Error> {
        info!("get_supported_flags called with name: {device_handle}");
        validate_device_handle(device_handle)?;
        let supported = self.devices.get(device_handle)?.supported_capabilities();
        Ok(format!("{supported} (0x{:X})", supported.bits()))
    }

    async fn get_variant(&self, device_handle: &str) -> Result<String, fdo::Error> {
        info!("get_variant called with name: {device_handle}");
        validate_device_handle(device_handle)?;
        Ok(self.devices.get(device_handle)?.compatible().to_string())
    }
}
