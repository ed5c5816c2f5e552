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

//! ICAP daemon (icapd) - System service that streams partial bitstreams into Xilinx FPGA
//! configuration ports.
//!
//! The daemon:
//! - Reads its device table from the vendor and user configuration files
//! - Maps each device's register windows and binds the matching port variant
//! - Exposes two DBus interfaces: `control` and `status`
//! - Runs as a system service with access to the memory device
//!
//! # DBus Service
//!
//! - **Service Name**: `com.canonical.icapd`
//! - **Status Interface**: `/com/canonical/icapd/status` - Read-only operations
//! - **Control Interface**: `/com/canonical/icapd/control` - Image lifecycle operations
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (`trace`, `debug`, `info`, `warn`, `error`
//!   or `off`). Defaults to `info`

use icapd::binding::DeviceTable;
use icapd::comm::dbus::{control_interface::ControlInterface, status_interface::StatusInterface};
use icapd::config::load_config;
use icapd::variants::register_variants;
use log::{info, warn};
use std::error::Error;
use std::future::pending;
use std::sync::Arc;
use zbus::connection;

/// Main entry point for the icapd daemon.
///
/// Initializes the daemon by:
/// 1. Setting up logging via `env_logger` (defaults to "info" level)
/// 2. Registering the port variants
/// 3. Loading the configuration and binding every configured device
/// 4. Connecting to the system DBus and advertising the service
/// 5. Running indefinitely to serve DBus requests
///
/// # Examples
///
/// ```bash
/// # Run with default logging (info level)
/// icapd
///
/// # Run with register level tracing
/// RUST_LOG=trace icapd
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    register_variants();

    let config = load_config();
    let devices = Arc::new(DeviceTable::bind_all(&config));
    if devices.is_empty() {
        warn!("No devices are bound. Add [[device]] entries to the configuration.");
    }

    let status_interface = StatusInterface::new(devices.clone());
    let control_interface = ControlInterface::new(devices);

    let _conn = connection::Builder::system()?
        .name("com.canonical.icapd")?
        .serve_at("/com/canonical/icapd/status", status_interface)?
        .serve_at("/com/canonical/icapd/control", control_interface)?
        .build()
        .await?;

    info!("Started com.canonical.icapd dbus service");
    pending::<()>().await;

    Ok(())
}
