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

//! FIFO-fed configuration port (AXI HWICAP, no DMA engine).
//!
//! Image bytes are assembled into whole words in a page-sized scratch buffer and pushed
//! through the write FIFO batch by batch. A write that does not end on a word boundary
//! keeps its last 1 to 3 bytes in a [`CarryBuffer`] for the next write.
//!
//! Before an image, the port is reset and checked with a desync, IDCODE readback,
//! desync handshake.

use crate::carry::{CarryBuffer, WORD_BYTES};
use crate::config::FIFO_SCRATCH_BYTES;
use crate::error::IcapdError;
use crate::flags::Capabilities;
use crate::icap::controller::IcapController;
use crate::icap::packets::ConfigRegister;
use crate::variants::{DeviceResources, IcapVariant};
use icapd_macros::variant;
use log::{debug, info};

const SCRATCH_WORDS: usize = FIFO_SCRATCH_BYTES / WORD_BYTES;

#[variant(compat_string = "xlnx,hwicap-fpga")]
#[derive(Debug)]
pub struct HwicapVariant {
    port: IcapController,
    carry: CarryBuffer,
    last_idcode: Option<u32>,
}

impl HwicapVariant {
    pub fn bind(resources: DeviceResources) -> Result<Self, IcapdError> {
        let port = IcapController::new(resources.control, resources.polling.port);
        port.disable_global_interrupts();
        info!(
            "{}: bound {}",
            resources.handle,
            HwicapVariant::COMPAT_STRING
        );
        Ok(HwicapVariant {
            port,
            carry: CarryBuffer::new(),
            last_idcode: None,
        })
    }

    /// IDCODE read during the last successful [`IcapVariant::prepare`].
    pub fn last_idcode(&self) -> Option<u32> {
        self.last_idcode
    }
}

impl IcapVariant for HwicapVariant {
    fn compatible(&self) -> &'static str {
        HwicapVariant::COMPAT_STRING
    }

    fn supported_capabilities(&self) -> Capabilities {
        Capabilities::PARTIAL
    }

    fn prepare(&mut self) -> Result<(), IcapdError> {
        self.port.reset();
        self.port.desync()?;
        let idcode = self.port.read_config_register(ConfigRegister::Idcode)?;
        info!("IDCODE {idcode:#010x}");
        self.last_idcode = Some(idcode);
        self.port.desync()
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, IcapdError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let total = self.carry.joined_len(buf);
        if total < WORD_BYTES {
            return Err(IcapdError::InvalidArgument(format!(
                "{total} bytes cannot form a {WORD_BYTES} byte configuration word"
            )));
        }

        let tail = total % WORD_BYTES;
        let carry = self.carry;
        let mut words = carry.words(buf);
        let mut scratch = Vec::with_capacity(SCRATCH_WORDS);
        loop {
            scratch.clear();
            scratch.extend(words.by_ref().take(SCRATCH_WORDS));
            if scratch.is_empty() {
                break;
            }
            debug!("pushing {} words", scratch.len());
            self.port.set_configuration(&scratch)?;
            // The carried bytes went out with the first batch.
            self.carry.clear();
        }

        self.carry.store(&buf[buf.len() - tail..]);
        Ok(0)
    }

    fn pending_bytes(&self) -> usize {
        self.carry.len()
    }
}
