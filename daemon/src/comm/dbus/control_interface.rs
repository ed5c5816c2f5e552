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
use crate::comm::dbus::{run_blocking, validate_device_handle, write_reply};
use crate::error::IcapdError;
use crate::flags::ImageFlags;
use crate::manager::ImageInfo;
use crate::system_io::fs_read_bytes;
use log::{info, trace};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use zbus::{fdo, interface};

static WRITE_LOCK: OnceCell<Arc<Mutex<()>>> = OnceCell::const_new();

async fn get_write_lock_guard() -> MutexGuard<'static, ()> {
    let lock = WRITE_LOCK
        .get_or_init(|| async { Arc::new(Mutex::new(())) })
        .await;
    lock.lock().await
}

pub struct ControlInterface {
    devices: Arc<DeviceTable>,
}

impl ControlInterface {
    pub fn new(devices: Arc<DeviceTable>) -> Self {
        ControlInterface { devices }
    }
}

#[interface(name = "com.canonical.icapd.control")]
impl ControlInterface {
    async fn write_init(&self, device_handle: &str, flags: u32) -> Result<String, fdo::Error> {
        info!("write_init called with name: {device_handle} and flags: {flags:#x}");
        validate_device_handle(device_handle)?;
        let manager = self.devices.get(device_handle)?;
        run_blocking(move || {
            manager.write_init(ImageFlags::from_bits(flags), &ImageInfo::default())
        })
        .await?;
        Ok(format!(
            "{device_handle} prepared for a new image with flags 0x{flags:X}"
        ))
    }

    async fn write(&self, device_handle: &str, data: Vec<u8>) -> Result<String, fdo::Error> {
        info!(
            "write called with name: {device_handle} and {} bytes",
            data.len()
        );
        validate_device_handle(device_handle)?;
        let manager = self.devices.get(device_handle)?;
        let len = data.len();
        let remaining = run_blocking(move || manager.write(&data)).await?;
        Ok(write_reply(device_handle, len, remaining)?)
    }

    async fn write_complete(&self, device_handle: &str) -> Result<String, fdo::Error> {
        info!("write_complete called with name: {device_handle}");
        validate_device_handle(device_handle)?;
        let manager = self.devices.get(device_handle)?;
        manager.write_complete()?;
        Ok(format!("{device_handle} is {}", manager.state()))
    }

    /// Run the whole image lifecycle for a bitstream file, `block_size` bytes per write
    /// (0 for the whole file at once).
    async fn load_bitstream(
        &self,
        device_handle: &str,
        bitstream_path_str: &str,
        flags: u32,
        block_size: u32,
    ) -> Result<String, fdo::Error> {
        info!(
            "load_bitstream called with name: {device_handle}, path_str: {bitstream_path_str}, \
            flags: {flags:#x} and block_size: {block_size}"
        );
        validate_device_handle(device_handle)?;
        let path = Path::new(bitstream_path_str);
        if !path.exists() || path.is_dir() {
            return Err(IcapdError::InvalidArgument(format!(
                "{bitstream_path_str} is not a valid path to a bitstream file."
            ))
            .into());
        }
        let manager = self.devices.get(device_handle)?;
        let _guard = get_write_lock_guard().await;
        trace!("Got write lock.");

        let path = PathBuf::from(path);
        run_blocking(move || {
            let image = fs_read_bytes(&path)?;
            let image_info = ImageInfo {
                name: path.display().to_string(),
                size: Some(image.len()),
            };
            manager.load(
                &image,
                ImageFlags::from_bits(flags),
                &image_info,
                block_size as usize,
            )
        })
        .await?;
        Ok(format!("{bitstream_path_str} loaded to {device_handle}"))
    }

    /// Make every caller waiting for the device lock give up with `LockInterrupted`.
    async fn interrupt(&self, device_handle: &str) -> Result<String, fdo::Error> {
        info!("interrupt called with name: {device_handle}");
        validate_device_handle(device_handle)?;
        self.devices.get(device_handle)?.interrupt();
        Ok(format!("Interrupted waiters on {device_handle}"))
    }
}
