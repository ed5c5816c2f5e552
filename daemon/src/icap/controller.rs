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

//! Control of the AXI HBICAP/HWICAP register block.
//!
//! The block is the same for both data paths. [`IcapController`] covers the operations
//! they share: soft reset, programming the transfer size, and watching the DONE bit.
//! The FIFO data path lives in [`crate::icap::fifo`].

use crate::error::IcapdError;
use crate::icap::registers::port::{self, control, status};
use crate::mmio::MmioPort;
use crate::poll::PollPolicy;
use log::{debug, trace};

#[derive(Debug)]
pub struct IcapController {
    pub(crate) regs: MmioPort,
    pub(crate) policy: PollPolicy,
}

impl IcapController {
    /// Wrap the register window of a configuration port.
    ///
    /// # Arguments
    ///
    /// * `regs` - window covering at least [`port::SPAN`] bytes
    /// * `policy` - retry budget for busy and FIFO polling
    pub fn new(regs: MmioPort, policy: PollPolicy) -> Self {
        IcapController { regs, policy }
    }

    pub fn status(&self) -> u32 {
        self.regs.read(port::STATUS)
    }

    /// `true` while the port is still consuming a transfer (DONE clear).
    pub fn is_busy(&self) -> bool {
        self.status() & status::DONE == 0
    }

    pub fn is_end_of_startup(&self) -> bool {
        self.status() & status::EOS != 0
    }

    /// Tell the port how many 32-bit words the next transfer carries.
    pub fn set_transfer_size(&self, words: u32) {
        trace!("{}: transfer size {words} words", self.regs.name());
        self.regs.write(port::SIZE, words);
    }

    /// Pulse the soft reset bit, leaving the rest of the control register untouched.
    pub fn reset(&self) {
        let value = self.regs.read(port::CONTROL);
        self.regs.write(port::CONTROL, value | control::SW_RESET);
        self.regs.write(port::CONTROL, value & !control::SW_RESET);
        debug!("{}: soft reset", self.regs.name());
    }

    /// Pulse the FIFO clear bit.
    pub fn flush_fifo(&self) {
        let value = self.regs.read(port::CONTROL);
        self.regs.write(port::CONTROL, value | control::FIFO_CLEAR);
        self.regs.write(port::CONTROL, value & !control::FIFO_CLEAR);
    }

    /// Mask the global interrupt output. icapd polls and never services the interrupt.
    pub fn disable_global_interrupts(&self) {
        self.regs.write(port::GIER, 0);
    }

    /// Poll DONE until the port is idle.
    ///
    /// # Returns: `Result<(), IcapdError>`
    /// * `Ok(())` - port idle
    /// * `Err(IcapdError::WriteTimeout)` - still busy after every allowed poll
    pub fn wait_until_idle(&self) -> Result<(), IcapdError> {
        self.policy
            .poll(|| !self.is_busy())
            .map(|attempts| trace!("{}: idle after {attempts} polls", self.regs.name()))
            .map_err(|timeout| IcapdError::WriteTimeout {
                what: "configuration port",
                attempts: timeout.attempts,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Access, PortMode, SimPort};
    use googletest::prelude::*;
    use std::time::Duration;

    fn controller(sim: &SimPort) -> IcapController {
        IcapController::new(sim.mmio_port().unwrap(), PollPolicy::new(5, Duration::ZERO))
    }

    #[gtest]
    fn should_pulse_soft_reset_preserving_control_bits() {
        let sim = SimPort::new(PortMode::Dma);
        let icap = controller(&sim);
        icap.regs.write(port::CONTROL, control::READ_DELAY);
        sim.clear_accesses();

        icap.reset();

        assert_eq!(
            sim.writes(),
            vec![
                (port::CONTROL, control::READ_DELAY | control::SW_RESET),
                (port::CONTROL, control::READ_DELAY),
            ]
        );
        assert_that!(sim.with(|m| m.resets), eq(1));
    }

    #[gtest]
    fn should_report_busy_until_size_consumed() {
        let sim = SimPort::new(PortMode::Dma);
        let icap = controller(&sim);
        icap.set_transfer_size(2);
        assert!(icap.is_busy());
        sim.with(|m| m.deliver(&[0u8; 8]));
        assert!(!icap.is_busy());
        assert!(icap.is_end_of_startup());
    }

    #[gtest]
    fn should_time_out_when_busy_never_clears() {
        let sim = SimPort::new(PortMode::Dma);
        let icap = controller(&sim);
        sim.with(|m| m.stuck_busy = true);
        let result = icap.wait_until_idle();
        assert_that!(
            result,
            err(displays_as(contains_substring(
                "configuration port did not complete after 5 polls"
            )))
        );
        let status_reads = sim
            .accesses()
            .iter()
            .filter(|a| matches!(a, Access::Read { offset: port::STATUS, .. }))
            .count();
        assert_that!(status_reads, eq(5));
    }

    #[gtest]
    fn should_disable_global_interrupts() {
        let sim = SimPort::new(PortMode::Fifo);
        let icap = controller(&sim);
        icap.regs.write(port::GIER, crate::icap::registers::port::gier::GLOBAL_ENABLE);
        icap.disable_global_interrupts();
        assert_that!(sim.with(|m| m.gier), eq(0));
    }
}
