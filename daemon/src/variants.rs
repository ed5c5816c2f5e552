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

//! Configuration port variants and their registry.
//!
//! A variant knows how to move image bytes into one kind of configuration port. Two are
//! provided:
//! - [`hbicap::HbicapVariant`] (`xlnx,hbicap-fpga`) - stages chunks in DMA-visible memory
//!   and has an AXI CDMA engine push them into the port's data window.
//! - [`hwicap::HwicapVariant`] (`xlnx,hwicap-fpga`) - pushes whole words through the
//!   port's keyhole FIFO, carrying partial words between writes.
//!
//! # Architecture
//!
//! Variants register a constructor at daemon startup through the `#[variant]` macro and
//! [`register_variants`]. When a device is bound, its compatible string is matched
//! against the registry and the constructor is handed the device's [`DeviceResources`].
//! The resulting [`IcapVariant`] is owned by an [`IcapManager`](crate::manager::IcapManager),
//! which serialises access to it and tracks the lifecycle state.
//!
//! # Compatible matching
//!
//! An exact match wins. Otherwise the query is split on commas and a registered string
//! matches when it contains every component of the query, so `hwicap-fpga` selects
//! `xlnx,hwicap-fpga`. A query matching more than one registered variant is rejected.

pub mod hbicap;
pub mod hwicap;

use crate::config::{PollingConfig, Window};
use crate::error::IcapdError;
use crate::flags::Capabilities;
use crate::mmio::MmioPort;
use crate::staging::StagingBuffer;
use hbicap::HbicapVariant;
use hwicap::HwicapVariant;
use log::trace;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// Hardware handed to a variant when its device is bound.
#[derive(Debug)]
pub struct DeviceResources {
    pub handle: String,
    /// Configuration port register block.
    pub control: MmioPort,
    /// Physical window the DMA engine writes configuration data to.
    pub data: Option<Window>,
    /// DMA engine register block.
    pub dma: Option<MmioPort>,
    pub staging: Option<StagingBuffer>,
    pub polling: PollingConfig,
}

/// One kind of configuration port.
pub trait IcapVariant: Send {
    fn compatible(&self) -> &'static str;

    /// Capabilities an image may require and still be accepted by
    /// [`IcapManager::write_init`](crate::manager::IcapManager::write_init).
    fn supported_capabilities(&self) -> Capabilities;

    /// Bring the port to a known state before the first write of an image.
    fn prepare(&mut self) -> Result<(), IcapdError>;

    /// Transfer `buf` into the port.
    ///
    /// # Returns: `Result<usize, IcapdError>`
    /// * `Ok(usize)` - number of bytes of `buf` NOT written; 0 when everything went out
    /// * `Err(IcapdError)` - the transfer was aborted
    fn write(&mut self, buf: &[u8]) -> Result<usize, IcapdError>;

    /// Bytes accepted by earlier writes that have not reached the port yet.
    fn pending_bytes(&self) -> usize {
        0
    }
}

/// Type alias for variant constructor functions.
type VariantConstructor = fn(DeviceResources) -> Result<Box<dyn IcapVariant>, IcapdError>;

/// Global registry of variant constructors keyed by compatible string.
pub static VARIANT_REGISTRY: OnceLock<Mutex<HashMap<&'static str, VariantConstructor>>> =
    OnceLock::new();

fn registry() -> MutexGuard<'static, HashMap<&'static str, VariantConstructor>> {
    VARIANT_REGISTRY
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Register a variant constructor under `compatible`. Re-registering replaces the entry.
pub fn register_variant(compatible: &'static str, constructor: VariantConstructor) {
    trace!("registering variant {compatible}");
    registry().insert(compatible, constructor);
}

/// Register every variant built into icapd.
pub fn register_variants() {
    HbicapVariant::register_variant();
    HwicapVariant::register_variant();
}

/// Compatible strings currently registered, sorted.
pub fn registered_variants() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = registry().keys().copied().collect();
    names.sort_unstable();
    names
}

fn match_variant_string(
    variant_string: &str,
) -> Result<(&'static str, VariantConstructor), IcapdError> {
    let registry = registry();
    if let Some((compatible, constructor)) = registry.get_key_value(variant_string) {
        return Ok((compatible, *constructor));
    }

    let mut matches: Vec<(&'static str, VariantConstructor)> = registry
        .iter()
        .filter(|(compat_string, _)| {
            let compat_set: HashSet<&str> = compat_string.split(',').collect();
            variant_string.split(',').all(|x| compat_set.contains(x))
        })
        .map(|(compat_string, constructor)| (*compat_string, *constructor))
        .collect();

    match matches.len() {
        0 => Err(IcapdError::Binding(format!(
            "icapd could not match '{variant_string}' to a known variant"
        ))),
        1 => Ok(matches.remove(0)),
        _ => {
            let mut names: Vec<&str> = matches.iter().map(|(name, _)| *name).collect();
            names.sort_unstable();
            Err(IcapdError::Binding(format!(
                "'{variant_string}' is ambiguous between {}",
                names.join(" and ")
            )))
        }
    }
}

/// Construct the variant registered for `compatible` on top of `resources`.
///
/// # Returns: `Result<Box<dyn IcapVariant>, IcapdError>`
/// * `Ok(Box<dyn IcapVariant>)` - bound variant, hardware initialised
/// * `Err(IcapdError::Binding)` - no variant matches, or the resources do not suit it
pub fn bind_variant(
    compatible: &str,
    resources: DeviceResources,
) -> Result<Box<dyn IcapVariant>, IcapdError> {
    let (matched, constructor) = match_variant_string(compatible)?;
    trace!("'{compatible}' matched variant '{matched}'");
    constructor(resources)
}
