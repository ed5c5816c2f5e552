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

//! Error Wrapping File System I/O Helpers
//!
//! Thin wrappers around standard file reads with trace logging and conversion to
//! [`IcapdError::IORead`]. Used for configuration files, bitstream images and the
//! sysfs attributes of DMA buffer drivers.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use icapd::system_io::{fs_read, fs_read_bytes};
//! # use std::path::Path;
//!
//! # fn example() -> Result<(), icapd::error::IcapdError> {
//! let phys = fs_read(Path::new("/sys/class/u-dma-buf/udmabuf0/phys_addr"))?;
//! let image = fs_read_bytes(Path::new("/lib/firmware/partial.bin"))?;
//! # Ok(())
//! # }
//! ```

use crate::error::IcapdError;
use log::trace;
use std::fs::OpenOptions;
use std::io::Read;
use std::path::Path;

/// Read the contents of a file to a String.
///
/// # Arguments
///
/// * `file_path` - Path to the file to read
///
/// # Returns: `Result<String, IcapdError>`
/// * `Ok(String)` - The complete contents of the file
/// * `Err(IcapdError::IORead)` - If the file cannot be read (doesn't exist, permissions, etc.)
pub fn fs_read(file_path: &Path) -> Result<String, IcapdError> {
    trace!("Attempting to read from {file_path:?}");
    let mut buf: String = String::new();
    let result = OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_to_string(&mut buf));

    match result {
        Ok(_) => {
            trace!("Reading done");
            Ok(buf)
        }
        Err(e) => Err(IcapdError::IORead {
            file: file_path.into(),
            e,
        }),
    }
}

/// Read the contents of a file as raw bytes.
///
/// # Arguments
///
/// * `file_path` - Path to the file to read
///
/// # Returns: `Result<Vec<u8>, IcapdError>`
/// * `Ok(Vec<u8>)` - The complete contents of the file
/// * `Err(IcapdError::IORead)` - If the file cannot be read
pub fn fs_read_bytes(file_path: &Path) -> Result<Vec<u8>, IcapdError> {
    trace!("Attempting to read bytes from {file_path:?}");
    let mut buf = Vec::new();
    let result = OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_to_end(&mut buf));

    match result {
        Ok(len) => {
            trace!("Read {len} bytes");
            Ok(buf)
        }
        Err(e) => Err(IcapdError::IORead {
            file: file_path.into(),
            e,
        }),
    }
}

/// Parse a physical address exported by a driver attribute, such as `0x70000000\n`.
///
/// # Returns: `Result<u64, IcapdError>`
/// * `Ok(u64)` - the parsed address; a `0x` prefix selects hex, otherwise decimal
/// * `Err(IcapdError::IORead)` - the attribute could not be read
/// * `Err(IcapdError::InvalidArgument)` - the contents were not a number
pub fn read_phys_addr(file_path: &Path) -> Result<u64, IcapdError> {
    let contents = fs_read(file_path)?;
    let text = contents.trim();
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };
    parsed.map_err(|e| {
        IcapdError::InvalidArgument(format!(
            "{file_path:?} does not hold a physical address ({text:?}): {e}"
        ))
    })
}
