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
    interface = "com.canonical.icapd.control",
    default_path = "/com/canonical/icapd/control"
)]
pub trait Control {
    async fn load_bitstream(
        &self,
        device_handle: &str,
        bitstream_path_str: &str,
        flags: u32,
        block_size: u32,
    ) -> Result<String>;
    async fn interrupt(&self, device_handle: &str) -> Result<String>;
}
