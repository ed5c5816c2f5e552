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

//! DMA staging buffer.
//!
//! A fixed, physically contiguous region the DMA engine can read. Each chunk of an image
//! is copied here before the engine is pointed at it, so the capacity bounds the size of
//! every transfer.

use crate::error::IcapdError;
use std::fmt;

/// CPU side of a DMA-visible memory region.
pub trait StagingMemory: Send {
    fn capacity(&self) -> usize;
    /// Copy `data` to the start of the region. `data.len()` never exceeds the capacity.
    fn fill(&mut self, data: &[u8]);
}

pub struct StagingBuffer {
    memory: Box<dyn StagingMemory>,
    phys_addr: u64,
}

impl fmt::Debug for StagingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("capacity", &self.memory.capacity())
            .field("phys_addr", &format_args!("{:#x}", self.phys_addr))
            .finish()
    }
}

impl StagingBuffer {
    /// # Arguments
    ///
    /// * `memory` - CPU mapping of the region
    /// * `phys_addr` - bus address of the first byte, as the DMA engine sees it
    pub fn new(memory: Box<dyn StagingMemory>, phys_addr: u64) -> Self {
        StagingBuffer { memory, phys_addr }
    }

    pub fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    pub fn phys_addr(&self) -> u64 {
        self.phys_addr
    }

    /// Copy one chunk into the region and return its length in the DMA engine's units.
    ///
    /// # Returns: `Result<u32, IcapdError>`
    /// * `Ok(u32)` - number of bytes staged
    /// * `Err(IcapdError::InvalidArgument)` - chunk larger than the region
    pub fn stage(&mut self, chunk: &[u8]) -> Result<u32, IcapdError> {
        if chunk.len() > self.capacity() {
            return Err(IcapdError::InvalidArgument(format!(
                "chunk of {} bytes does not fit the {} byte staging buffer",
                chunk.len(),
                self.capacity()
            )));
        }
        self.memory.fill(chunk);
        u32::try_from(chunk.len())
            .map_err(|_| IcapdError::InvalidArgument(format!("chunk of {} bytes", chunk.len())))
    }
}
