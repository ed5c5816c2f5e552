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

//! DMA-fed configuration port (AXI HBICAP behind an AXI CDMA).
//!
//! A write programs the total word count once, then copies the image through the staging
//! buffer one chunk at a time. Each chunk is pushed into the port's data window by the
//! DMA engine, and the next chunk is only staged after the previous transfer completed.
//! Once every chunk is out, the port is polled until it has consumed the programmed
//! word count.
//!
//! Any engine failure aborts the write. Neither block is reset on the way out; the next
//! [`IcapVariant::prepare`] resets the port.

use crate::carry::WORD_BYTES;
use crate::config::{STAGING_ADDRESS_LIMIT, Window};
use crate::error::IcapdError;
use crate::flags::Capabilities;
use crate::icap::cdma::AxiCdma;
use crate::icap::controller::IcapController;
use crate::staging::StagingBuffer;
use crate::variants::{DeviceResources, IcapVariant};
use icapd_macros::variant;
use log::{debug, info, warn};

/// # Fields
///
/// * `port` - configuration port register block
/// * `dma` - engine that moves staged chunks into `data`
/// * `data` - physical window of the port's data interface, the DMA destination
/// * `staging` - DMA-visible buffer every chunk passes through
#[variant(compat_string = "xlnx,hbicap-fpga")]
#[derive(Debug)]
pub struct HbicapVariant {
    port: IcapController,
    dma: AxiCdma,
    data: Window,
    staging: StagingBuffer,
}

impl HbicapVariant {
    /// Take ownership of the device's hardware and put it in a known state.
    ///
    /// Global interrupts of the port are masked and the DMA engine is reset. The port
    /// itself is reset in [`IcapVariant::prepare`].
    ///
    /// # Returns: `Result<HbicapVariant, IcapdError>`
    /// * `Ok(HbicapVariant)` - ready for the first image
    /// * `Err(IcapdError::Binding)` - DMA engine, data window or staging buffer missing,
    ///   or the staging buffer is empty or not a whole number of words
    pub fn bind(resources: DeviceResources) -> Result<Self, IcapdError> {
        let DeviceResources {
            handle,
            control,
            data,
            dma,
            staging,
            polling,
        } = resources;
        let missing = |what: &str| {
            IcapdError::Binding(format!(
                "{handle}: {} needs {what}",
                HbicapVariant::COMPAT_STRING
            ))
        };
        let dma = dma.ok_or_else(|| missing("a DMA engine register window"))?;
        let data = data.ok_or_else(|| missing("a data window"))?;
        let staging = staging.ok_or_else(|| missing("a staging buffer"))?;
        let capacity = staging.capacity();
        if capacity == 0 || capacity % WORD_BYTES != 0 {
            return Err(IcapdError::Binding(format!(
                "{handle}: staging buffer of {capacity} bytes cannot hold whole {WORD_BYTES} byte words"
            )));
        }

        if staging.phys_addr() + staging.capacity() as u64 > STAGING_ADDRESS_LIMIT {
            warn!(
                "{handle}: staging buffer at {:#x} lies above {STAGING_ADDRESS_LIMIT:#x}, the DMA engine may not reach it",
                staging.phys_addr()
            );
        }

        let port = IcapController::new(control, polling.port);
        port.disable_global_interrupts();
        let dma = AxiCdma::new(dma, polling.dma);
        dma.reset();
        info!(
            "{handle}: bound {} with {} byte staging buffer at {:#x}",
            HbicapVariant::COMPAT_STRING,
            staging.capacity(),
            staging.phys_addr()
        );
        Ok(HbicapVariant {
            port,
            dma,
            data,
            staging,
        })
    }
}

impl IcapVariant for HbicapVariant {
    fn compatible(&self) -> &'static str {
        HbicapVariant::COMPAT_STRING
    }

    fn supported_capabilities(&self) -> Capabilities {
        Capabilities::PARTIAL
    }

    fn prepare(&mut self) -> Result<(), IcapdError> {
        self.port.reset();
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, IcapdError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let words = u32::try_from(buf.len() / 4).map_err(|_| {
            IcapdError::InvalidArgument(format!("{} byte image is too large", buf.len()))
        })?;
        self.port.set_transfer_size(words);

        let mut written = 0;
        for (index, chunk) in buf.chunks(self.staging.capacity()).enumerate() {
            let len = self.staging.stage(chunk)?;
            debug!("chunk {index}: {len} bytes");
            self.dma
                .transfer(self.staging.phys_addr(), self.data.base, len)?;
            written += chunk.len();
        }

        self.port.wait_until_idle()?;
        Ok(buf.len() - written)
    }
}
