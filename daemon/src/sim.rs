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

//! In-process models of the configuration port, the DMA engine and the staging memory.
//!
//! The models implement [`RegisterIo`] and [`StagingMemory`] so the real controllers run
//! against them unchanged. They back the `simulated` device backend and the tests.
//!
//! Every model is shared behind an `Arc<Mutex<..>>`: one handle is turned into the
//! register window a controller owns, the other stays with the caller to inspect the
//! register trace or inject faults.
//!
//! ```text
//! SimulatedHbicap
//!   ├── cdma: SimCdma ── BYTES_TO_TRANSFER ──► copies memory[src..] ──► port.deliver()
//!   ├── memory: SimMemory
//!   └── port: SimPort (PortMode::Dma)
//! ```

use crate::config::{PollingConfig, STAGING_CAPACITY, Window};
use crate::error::IcapdError;
use crate::icap::registers::{
    cdma::{self, control as cdma_control, status as cdma_status},
    port::{self, control, status},
};
use crate::mmio::{MmioPort, RegisterIo};
use crate::staging::{StagingBuffer, StagingMemory};
use crate::variants::DeviceResources;
use log::trace;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Physical address the simulated DMA engine accepts as the port's data window.
pub const SIM_DATA_PORT_BASE: u64 = 0xB000_0000;

/// Physical address of the simulated staging memory.
pub const SIM_STAGING_PHYS: u64 = 0x7000_0000;

const SIM_FIFO_DEPTH: u32 = 64;

/// One register access, in the order the models saw them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read { offset: usize, value: u32 },
    Write { offset: usize, value: u32 },
}

/// How configuration data reaches a simulated port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortMode {
    /// Data arrives through [`PortModel::deliver`]; DONE stays low until SIZE words came in.
    Dma,
    /// Data is pushed into the write FIFO and committed with the WRITE control bit.
    Fifo,
}

fn lock<T>(model: &Mutex<T>) -> MutexGuard<'_, T> {
    model.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State of a simulated configuration port.
#[derive(Debug)]
pub struct PortModel {
    pub mode: PortMode,
    pub control: u32,
    pub gier: u32,
    pub size: u32,
    pub fifo_depth: u32,
    /// Word returned for every readback.
    pub idcode: u32,
    /// Hold DONE low forever.
    pub stuck_busy: bool,
    /// Empty the write FIFO when WRITE is set. Clear it to model a stalled port.
    pub drain_on_commit: bool,
    pub resets: u32,
    /// Words the configuration logic has accepted.
    pub received: Vec<u32>,
    pub accesses: Vec<Access>,
    consumed: u32,
    partial: Vec<u8>,
    write_fifo: VecDeque<u32>,
    read_fifo: VecDeque<u32>,
}

impl PortModel {
    fn new(mode: PortMode, fifo_depth: u32) -> Self {
        PortModel {
            mode,
            control: 0,
            gier: 0,
            size: 0,
            fifo_depth,
            idcode: 0,
            stuck_busy: false,
            drain_on_commit: true,
            resets: 0,
            received: Vec::new(),
            accesses: Vec::new(),
            consumed: 0,
            partial: Vec::new(),
            write_fifo: VecDeque::new(),
            read_fifo: VecDeque::new(),
        }
    }

    /// Feed bytes into the data window as the DMA engine would.
    pub fn deliver(&mut self, bytes: &[u8]) {
        self.partial.extend_from_slice(bytes);
        let whole = self.partial.len() / 4 * 4;
        for word in self.partial[..whole].chunks_exact(4) {
            self.received
                .push(u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
            self.consumed += 1;
        }
        self.partial.drain(..whole);
    }

    fn status(&self) -> u32 {
        if self.stuck_busy || (self.mode == PortMode::Dma && self.consumed < self.size) {
            return 0;
        }
        status::DONE | status::EOS
    }

    fn soft_reset(&mut self) {
        self.resets += 1;
        self.size = 0;
        self.consumed = 0;
        self.partial.clear();
        self.write_fifo.clear();
        self.read_fifo.clear();
    }

    fn read(&mut self, offset: usize) -> u32 {
        let value = match offset {
            port::GIER => self.gier,
            port::SIZE => self.size,
            port::CONTROL => self.control,
            port::STATUS => self.status(),
            port::WRITE_FIFO_VACANCY => self
                .fifo_depth
                .saturating_sub(self.write_fifo.len() as u32),
            port::READ_FIFO_OCCUPANCY => self.read_fifo.len() as u32,
            port::READ_FIFO => self.read_fifo.pop_front().unwrap_or_default(),
            _ => 0,
        };
        self.accesses.push(Access::Read { offset, value });
        value
    }

    fn write(&mut self, offset: usize, value: u32) {
        self.accesses.push(Access::Write { offset, value });
        match offset {
            port::GIER => self.gier = value,
            port::SIZE => {
                self.size = value;
                self.consumed = 0;
            }
            port::WRITE_FIFO => {
                if (self.write_fifo.len() as u32) < self.fifo_depth {
                    self.write_fifo.push_back(value);
                }
            }
            port::CONTROL => self.write_control(value),
            _ => {}
        }
    }

    fn write_control(&mut self, value: u32) {
        if value & control::SW_RESET != 0 {
            self.soft_reset();
        }
        if value & control::FIFO_CLEAR != 0 {
            self.write_fifo.clear();
            self.read_fifo.clear();
        }
        if value & control::WRITE != 0 && self.drain_on_commit {
            self.received.extend(self.write_fifo.drain(..));
        }
        if value & control::READ != 0 {
            let words = std::iter::repeat_n(self.idcode, self.size as usize);
            self.read_fifo.extend(words);
        }
        self.control = value & !(control::WRITE | control::READ);
    }
}

struct PortRegisters {
    model: Arc<Mutex<PortModel>>,
}

impl RegisterIo for PortRegisters {
    fn read32(&self, offset: usize) -> u32 {
        lock(&self.model).read(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        lock(&self.model).write(offset, value)
    }

    fn size(&self) -> usize {
        port::SPAN
    }
}

/// Handle to a simulated configuration port.
#[derive(Debug, Clone)]
pub struct SimPort {
    model: Arc<Mutex<PortModel>>,
}

impl SimPort {
    pub fn new(mode: PortMode) -> Self {
        SimPort::with_fifo_depth(mode, SIM_FIFO_DEPTH)
    }

    pub fn with_fifo_depth(mode: PortMode, fifo_depth: u32) -> Self {
        SimPort {
            model: Arc::new(Mutex::new(PortModel::new(mode, fifo_depth))),
        }
    }

    /// Run `f` with the model locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut PortModel) -> R) -> R {
        f(&mut lock(&self.model))
    }

    /// A register window onto this port for an [`IcapController`](crate::icap::controller::IcapController).
    pub fn mmio_port(&self) -> Result<MmioPort, IcapdError> {
        let regs = PortRegisters {
            model: self.model.clone(),
        };
        MmioPort::new("icap", Box::new(regs), port::SPAN)
    }

    pub fn accesses(&self) -> Vec<Access> {
        self.with(|m| m.accesses.clone())
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        writes_of(&self.accesses())
    }

    pub fn clear_accesses(&self) {
        self.with(|m| m.accesses.clear())
    }

    /// Words received so far. The record is emptied.
    pub fn take_received(&self) -> Vec<u32> {
        self.with(|m| std::mem::take(&mut m.received))
    }
}

fn writes_of(accesses: &[Access]) -> Vec<(usize, u32)> {
    accesses
        .iter()
        .filter_map(|access| match access {
            Access::Write { offset, value } => Some((*offset, *value)),
            Access::Read { .. } => None,
        })
        .collect()
}

/// Simulated DMA-visible memory.
#[derive(Debug, Clone)]
pub struct SimMemory {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SimMemory {
    pub fn new(capacity: usize) -> Self {
        SimMemory {
            bytes: Arc::new(Mutex::new(vec![0; capacity])),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        lock(&self.bytes).clone()
    }
}

impl StagingMemory for SimMemory {
    fn capacity(&self) -> usize {
        lock(&self.bytes).len()
    }

    fn fill(&mut self, data: &[u8]) {
        lock(&self.bytes)[..data.len()].copy_from_slice(data);
    }
}

/// Misbehaviour injected into a [`SimCdma`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdmaFault {
    /// IDLE never reads back as set.
    NeverIdle,
    /// Transfers start but never raise the completion bit.
    NeverComplete,
    /// The transfer with this 0-based index completes with the error bit set.
    ErrorOnTransfer(usize),
}

/// State of a simulated AXI CDMA engine.
#[derive(Debug)]
pub struct CdmaModel {
    pub control: u32,
    pub status: u32,
    pub resets: u32,
    pub fault: Option<CdmaFault>,
    /// `(src, dst, len)` of every transfer started.
    pub transfers: Vec<(u64, u64, u32)>,
    pub accesses: Vec<Access>,
    registers: [u32; cdma::SPAN / 4],
    port: SimPort,
    memory: SimMemory,
    staging_phys: u64,
    data_base: u64,
}

impl CdmaModel {
    fn address(&self, low: usize, high: usize) -> u64 {
        (u64::from(self.registers[high / 4]) << 32) | u64::from(self.registers[low / 4])
    }

    fn read(&mut self, offset: usize) -> u32 {
        let value = match offset {
            cdma::CONTROL => self.control,
            cdma::STATUS if self.fault == Some(CdmaFault::NeverIdle) => {
                self.status & !cdma_status::IDLE
            }
            cdma::STATUS => self.status,
            _ => self.registers[offset / 4],
        };
        self.accesses.push(Access::Read { offset, value });
        value
    }

    fn write(&mut self, offset: usize, value: u32) {
        self.accesses.push(Access::Write { offset, value });
        match offset {
            cdma::CONTROL if value & cdma_control::RESET != 0 => {
                self.resets += 1;
                self.control = 0;
                self.status = cdma_status::IDLE;
            }
            cdma::CONTROL => self.control = value,
            cdma::STATUS => {
                self.status &= !(value & (cdma_status::IOC_IRQ | cdma_status::ERR_IRQ));
            }
            cdma::BYTES_TO_TRANSFER => {
                self.registers[offset / 4] = value;
                self.start(value);
            }
            _ => self.registers[offset / 4] = value,
        }
    }

    fn start(&mut self, len: u32) {
        let src = self.address(cdma::SRC_LOW, cdma::SRC_HIGH);
        let dst = self.address(cdma::DST_LOW, cdma::DST_HIGH);
        let index = self.transfers.len();
        self.transfers.push((src, dst, len));
        trace!("sim cdma: transfer {index}: {len} bytes {src:#x} -> {dst:#x}");

        if self.fault == Some(CdmaFault::NeverComplete) {
            self.status &= !cdma_status::IDLE;
            return;
        }

        let contents = self.memory.contents();
        let start = src.checked_sub(self.staging_phys).map(|s| s as usize);
        let delivered = match start {
            Some(start) if dst == self.data_base && start + len as usize <= contents.len() => {
                let bytes = &contents[start..start + len as usize];
                self.port.with(|m| m.deliver(bytes));
                true
            }
            _ => false,
        };

        self.status |= cdma_status::IOC_IRQ | cdma_status::IDLE;
        if !delivered || self.fault == Some(CdmaFault::ErrorOnTransfer(index)) {
            self.status |= cdma_status::ERR_IRQ;
        }
    }
}

struct CdmaRegisters {
    model: Arc<Mutex<CdmaModel>>,
}

impl RegisterIo for CdmaRegisters {
    fn read32(&self, offset: usize) -> u32 {
        lock(&self.model).read(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        lock(&self.model).write(offset, value)
    }

    fn size(&self) -> usize {
        cdma::SPAN
    }
}

/// Handle to a simulated DMA engine.
#[derive(Debug, Clone)]
pub struct SimCdma {
    model: Arc<Mutex<CdmaModel>>,
}

impl SimCdma {
    /// An idle engine that copies from `memory` (mapped at `staging_phys`) into `port`
    /// when a transfer targets `data_base`.
    pub fn new(port: SimPort, memory: SimMemory, staging_phys: u64, data_base: u64) -> Self {
        let model = CdmaModel {
            control: 0,
            status: cdma_status::IDLE,
            resets: 0,
            fault: None,
            transfers: Vec::new(),
            accesses: Vec::new(),
            registers: [0; cdma::SPAN / 4],
            port,
            memory,
            staging_phys,
            data_base,
        };
        SimCdma {
            model: Arc::new(Mutex::new(model)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut CdmaModel) -> R) -> R {
        f(&mut lock(&self.model))
    }

    pub fn inject(&self, fault: CdmaFault) {
        self.with(|m| m.fault = Some(fault))
    }

    pub fn mmio_port(&self) -> Result<MmioPort, IcapdError> {
        let regs = CdmaRegisters {
            model: self.model.clone(),
        };
        MmioPort::new("cdma", Box::new(regs), cdma::SPAN)
    }

    pub fn accesses(&self) -> Vec<Access> {
        self.with(|m| m.accesses.clone())
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        writes_of(&self.accesses())
    }

    pub fn clear_accesses(&self) {
        self.with(|m| m.accesses.clear())
    }
}

/// A DMA-fed configuration port with its engine and staging memory.
#[derive(Debug, Clone)]
pub struct SimulatedHbicap {
    pub port: SimPort,
    pub cdma: SimCdma,
    pub memory: SimMemory,
}

impl Default for SimulatedHbicap {
    fn default() -> Self {
        SimulatedHbicap::new()
    }
}

impl SimulatedHbicap {
    pub fn new() -> Self {
        let port = SimPort::new(PortMode::Dma);
        let memory = SimMemory::new(STAGING_CAPACITY);
        let cdma = SimCdma::new(
            port.clone(),
            memory.clone(),
            SIM_STAGING_PHYS,
            SIM_DATA_PORT_BASE,
        );
        SimulatedHbicap { port, cdma, memory }
    }

    pub fn resources(
        &self,
        handle: &str,
        polling: PollingConfig,
    ) -> Result<DeviceResources, IcapdError> {
        Ok(DeviceResources {
            handle: handle.to_string(),
            control: self.port.mmio_port()?,
            data: Some(Window {
                base: SIM_DATA_PORT_BASE,
                size: 0x1000,
            }),
            dma: Some(self.cdma.mmio_port()?),
            staging: Some(StagingBuffer::new(
                Box::new(self.memory.clone()),
                SIM_STAGING_PHYS,
            )),
            polling,
        })
    }
}

/// A FIFO-fed configuration port.
#[derive(Debug, Clone)]
pub struct SimulatedHwicap {
    pub port: SimPort,
}

impl Default for SimulatedHwicap {
    fn default() -> Self {
        SimulatedHwicap::new()
    }
}

impl SimulatedHwicap {
    pub fn new() -> Self {
        SimulatedHwicap {
            port: SimPort::new(PortMode::Fifo),
        }
    }

    pub fn resources(
        &self,
        handle: &str,
        polling: PollingConfig,
    ) -> Result<DeviceResources, IcapdError> {
        Ok(DeviceResources {
            handle: handle.to_string(),
            control: self.port.mmio_port()?,
            data: None,
            dma: None,
            staging: None,
            polling,
        })
    }
}

/// Resources for a `simulated` device entry: a DMA-fed port when `compatible` names the
/// HBICAP, a FIFO-fed one otherwise.
pub fn simulated_resources(
    handle: &str,
    compatible: &str,
    polling: PollingConfig,
) -> Result<DeviceResources, IcapdError> {
    if compatible.contains("hbicap") {
        SimulatedHbicap::new().resources(handle, polling)
    } else {
        SimulatedHwicap::new().resources(handle, polling)
    }
}
