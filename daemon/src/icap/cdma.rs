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

//! AXI Central DMA engine in simple (register direct) mode.
//!
//! One transfer at a time: check idle, enable the completion and error interrupt bits,
//! program source, destination and length, then poll the status register for the
//! completion bit. Completion is acknowledged by writing the status bits back.

use crate::error::IcapdError;
use crate::icap::registers::cdma::{self, control, status};
use crate::mmio::MmioPort;
use crate::poll::PollPolicy;
use log::{debug, trace};

#[derive(Debug)]
pub struct AxiCdma {
    regs: MmioPort,
    policy: PollPolicy,
}

impl AxiCdma {
    pub fn new(regs: MmioPort, policy: PollPolicy) -> Self {
        AxiCdma { regs, policy }
    }

    pub fn is_idle(&self) -> bool {
        self.regs.read(cdma::STATUS) & status::IDLE != 0
    }

    /// Soft reset the engine. Unconditional; the engine gives no acknowledgement, so the
    /// reset bit is not read back.
    pub fn reset(&self) {
        self.regs.write(cdma::CONTROL, control::RESET);
        debug!("{}: reset", self.regs.name());
    }

    /// Copy `len` bytes from physical address `src` to `dst` and wait for completion.
    ///
    /// # Arguments
    ///
    /// * `src` - physical address of the staged data
    /// * `dst` - physical address of the configuration port's data window
    /// * `len` - number of bytes, at most the staging capacity
    ///
    /// # Returns: `Result<(), IcapdError>`
    /// * `Ok(())` - transfer completed without error
    /// * `Err(IcapdError::NotIdle)` - engine busy on entry; no register was written
    /// * `Err(IcapdError::WriteTimeout)` - completion bit never rose
    /// * `Err(IcapdError::WriteError)` - engine completed with its error bit set
    pub fn transfer(&self, src: u64, dst: u64, len: u32) -> Result<(), IcapdError> {
        if !self.is_idle() {
            return Err(IcapdError::NotIdle);
        }
        self.regs.set_bits(cdma::CONTROL, control::SIMPLE_IRQ);
        self.regs.write(cdma::SRC_HIGH, (src >> 32) as u32);
        self.regs.write(cdma::SRC_LOW, src as u32);
        self.regs.write(cdma::DST_HIGH, (dst >> 32) as u32);
        self.regs.write(cdma::DST_LOW, dst as u32);
        self.regs.write(cdma::BYTES_TO_TRANSFER, len);
        trace!("{}: {len} bytes {src:#x} -> {dst:#x}", self.regs.name());
        self.wait_complete(len)
    }

    fn wait_complete(&self, len: u32) -> Result<(), IcapdError> {
        let mut sr = 0;
        self.policy
            .poll(|| {
                sr = self.regs.read(cdma::STATUS);
                sr & status::IOC_IRQ != 0
            })
            .map_err(|timeout| IcapdError::WriteTimeout {
                what: "DMA transfer",
                attempts: timeout.attempts,
            })?;
        self.regs
            .write(cdma::STATUS, sr & (status::IOC_IRQ | status::ERR_IRQ));
        if sr & status::ERR_IRQ != 0 {
            return Err(IcapdError::WriteError { len });
        }
        Ok(())
    }
}
