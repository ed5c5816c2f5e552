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

use crate::proxies::control_proxy;
use crate::status::get_first_device_handle;
use zbus::Connection;

/// Sends the dbus command to load a bitstream
async fn call_load_bitstream(
    device_handle: &str,
    file_path: &str,
    flags: u32,
    block_size: u32,
) -> Result<String, zbus::Error> {
    let connection = Connection::system().await?;
    let proxy = control_proxy::ControlProxy::new(&connection).await?;
    proxy
        .load_bitstream(device_handle, file_path, flags, block_size)
        .await
}

/// Populates the device_handle appropriately before calling `call_load_bitstream`
pub async fn load_handler(
    device_handle: &Option<String>,
    file_path: &str,
    flags: u32,
    block_size: u32,
) -> Result<String, zbus::Error> {
    let dev = match device_handle {
        None => get_first_device_handle().await?,
        Some(dev) => dev.clone(),
    };
    // The daemon resolves the path itself, so hand it an absolute one.
    let path = std::path::absolute(file_path)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| file_path.to_string());
    call_load_bitstream(&dev, &path, flags, block_size).await
}
