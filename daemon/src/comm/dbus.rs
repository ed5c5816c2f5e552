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

//! DBus surface of the daemon.
//!
//! Two objects are served on the system bus under `com.canonical.icapd`:
//! - `/com/canonical/icapd/control` ([`control_interface::ControlInterface`]) - lifecycle
//!   operations that touch the hardware
//! - `/com/canonical/icapd/status` ([`status_interface::StatusInterface`]) - read-only queries
//!
//! Device operations block while they poll the hardware, so they run on tokio's blocking
//! pool through [`run_blocking`] and never on the executor threads.

pub mod control_interface;
pub mod status_interface;

use crate::error::IcapdError;
use log::trace;

/// Helper function to check that a device handle is usable as a table key.
pub(crate) fn validate_device_handle(device_handle: &str) -> Result<(), IcapdError> {
    if device_handle.is_empty() || !device_handle.is_ascii() {
        return Err(IcapdError::InvalidArgument(format!(
            "'{device_handle}' is an invalid device handle. Handles are non-empty ASCII names."
        )));
    }
    Ok(())
}

/// Run a blocking device operation on the blocking thread pool and wait for it.
pub(crate) async fn run_blocking<T, F>(operation: F) -> Result<T, IcapdError>
where
    F: FnOnce() -> Result<T, IcapdError> + Send + 'static,
    T: Send + 'static,
{
    trace!("Dispatching device operation to the blocking pool");
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|e| IcapdError::Internal(format!("device operation did not finish: {e}")))?
}

/// Turn the remainder reported by a write into the reply string, or a short-write error.
pub(crate) fn write_reply(
    device_handle: &str,
    len: usize,
    remaining: usize,
) -> Result<String, IcapdError> {
    if remaining != 0 {
        return Err(IcapdError::ShortWrite { remaining });
    }
    Ok(format!("{len} bytes written to {device_handle}"))
}
