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

//! icapd - streams partial bitstreams into Xilinx FPGA configuration ports.
//!
//! The library holds everything the daemon binary serves over DBus, so it can also be
//! driven directly, as the integration tests do against the [`sim`] peripherals.
//!
//! # Layers
//!
//! - [`mmio`], [`poll`] - register access and bounded status polling
//! - [`icap`] - drivers for the configuration port and the AXI CDMA engine
//! - [`staging`], [`carry`] - buffers between the caller's bytes and the hardware
//! - [`variants`] - the DMA-fed and FIFO-fed ways of moving an image into a port
//! - [`manager`] - the per-device image lifecycle, with the device lock in [`lock`]
//! - [`binding`], [`config`] - building devices from the configuration files
//! - [`comm`] - the DBus service
//!
//! # Examples
//!
//! ```rust
//! use icapd::config::PollingConfig;
//! use icapd::flags::ImageFlags;
//! use icapd::manager::{IcapManager, ImageInfo};
//! use icapd::sim::SimulatedHbicap;
//! use icapd::variants::{bind_variant, register_variants};
//!
//! # fn example() -> Result<(), icapd::error::IcapdError> {
//! register_variants();
//! let sim = SimulatedHbicap::new();
//! let variant = bind_variant("xlnx,hbicap-fpga", sim.resources("icap0", PollingConfig::default())?)?;
//! let manager = IcapManager::new("icap0", variant);
//! manager.load(&[0u8; 64], ImageFlags::PARTIAL_RECONFIG, &ImageInfo::default(), 0)?;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod binding;
pub mod carry;
pub mod comm;
pub mod config;
pub mod error;
pub mod flags;
pub mod icap;
pub mod lock;
pub mod manager;
pub mod mmio;
pub mod poll;
pub mod sim;
pub mod staging;
pub mod system_io;
pub mod variants;
