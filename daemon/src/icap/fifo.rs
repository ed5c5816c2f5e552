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

//! Keyhole FIFO data path of the configuration port.
//!
//! Words are pushed one at a time into the write FIFO and committed with the WRITE
//! control bit. Readback programs SIZE, sets the READ control bit and drains the read
//! FIFO as words arrive. Both directions give up when the FIFO makes no progress within
//! the controller's poll budget, and report how many words were left over.

use crate::config::MAX_READ_TRANSACTION_WORDS;
use crate::error::{FifoFault, IcapdError};
use crate::icap::controller::IcapController;
use crate::icap::packets::{ConfigRegister, desync_sequence, read_register_request, sync_sequence};
use crate::icap::registers::port::{self, control};
use log::{debug, warn};

impl IcapController {
    pub fn write_fifo_vacancy(&self) -> u32 {
        self.regs.read(port::WRITE_FIFO_VACANCY)
    }

    pub fn read_fifo_occupancy(&self) -> u32 {
        self.regs.read(port::READ_FIFO_OCCUPANCY)
    }

    /// Send `words` to the configuration logic through the write FIFO.
    ///
    /// # Returns: `Result<(), IcapdError>`
    /// * `Ok(())` - every word was committed and the port went idle
    /// * `Err(IcapdError::FifoTransfer(FifoFault::Busy))` - the port was busy on entry
    /// * `Err(IcapdError::FifoTransfer(FifoFault::Incomplete))` - the FIFO stopped draining
    /// * `Err(IcapdError::WriteTimeout)` - the port never went idle after the last commit
    pub fn set_configuration(&self, words: &[u32]) -> Result<(), IcapdError> {
        if self.is_busy() {
            return Err(FifoFault::Busy.into());
        }
        let mut remaining = words;
        while !remaining.is_empty() {
            let mut vacancy = 0;
            if self
                .policy
                .poll(|| {
                    vacancy = self.write_fifo_vacancy();
                    vacancy > 0
                })
                .is_err()
            {
                break;
            }
            let take = remaining.len().min(vacancy as usize);
            for word in &remaining[..take] {
                self.regs.write(port::WRITE_FIFO, *word);
            }
            remaining = &remaining[take..];
            self.regs.write(port::CONTROL, control::WRITE);
        }
        if !remaining.is_empty() {
            warn!(
                "{}: write FIFO stalled with {} words left",
                self.regs.name(),
                remaining.len()
            );
            return Err(FifoFault::Incomplete {
                remaining: remaining.len(),
            }
            .into());
        }
        self.wait_until_idle()
    }

    /// Fill `buffer` with words read back from the configuration logic.
    ///
    /// Reads are split into transactions of at most [`MAX_READ_TRANSACTION_WORDS`].
    pub fn get_configuration(&self, buffer: &mut [u32]) -> Result<(), IcapdError> {
        if self.is_busy() {
            return Err(FifoFault::Busy.into());
        }
        let mut outstanding = buffer.len();
        for transaction in buffer.chunks_mut(MAX_READ_TRANSACTION_WORDS) {
            self.set_transfer_size(transaction.len() as u32);
            self.regs.write(port::CONTROL, control::READ);
            let mut filled = 0;
            while filled < transaction.len() {
                let mut occupancy = 0;
                if self
                    .policy
                    .poll(|| {
                        occupancy = self.read_fifo_occupancy();
                        occupancy > 0
                    })
                    .is_err()
                {
                    self.flush_fifo();
                    return Err(FifoFault::Incomplete {
                        remaining: outstanding,
                    }
                    .into());
                }
                let take = (transaction.len() - filled).min(occupancy as usize);
                for slot in &mut transaction[filled..filled + take] {
                    *slot = self.regs.read(port::READ_FIFO);
                }
                filled += take;
                outstanding -= take;
            }
        }
        self.wait_until_idle()
    }

    /// Read one configuration register.
    ///
    /// The sync sequence and the read request go out as two separate FIFO transactions
    /// before the one-word readback. The configuration logic is left synched.
    pub fn read_config_register(&self, register: ConfigRegister) -> Result<u32, IcapdError> {
        let index = register.index().ok_or_else(|| {
            IcapdError::InvalidArgument(format!("{register} is not implemented by this device"))
        })?;
        self.set_configuration(&sync_sequence())?;
        self.set_configuration(&read_register_request(index))?;
        let mut value = [0u32; 1];
        self.get_configuration(&mut value)?;
        debug!("{}: {register} = {:#010x}", self.regs.name(), value[0]);
        Ok(value[0])
    }

    /// End the current configuration session.
    pub fn desync(&self) -> Result<(), IcapdError> {
        self.set_configuration(&desync_sequence())
    }
}
