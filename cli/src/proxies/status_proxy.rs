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

use zbus::{Result, proxy};
#[proxy(
    default_service = "com.canonical.icapd",
    interface = "com.canonical.icapd.status",
    default_path = "/com/canonical/icapd/status"
)]
pub trait Status {
    async fn get_state(&self, device_handle: &str) -> Result<String>;
    async fn get_devices(&self) -> Result<String>;
    async fn get_supported_flags(&self, device_handle: &str) -> Result<String>;
    async fn get_variant(&self, device_handle: &str) -> Result<String>;
}
