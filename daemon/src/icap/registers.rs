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

//! Register maps. Offsets are byte offsets from the base of each block.

/// AXI HBICAP / HWICAP configuration port.
pub mod port {
    /// Global interrupt enable
    pub const GIER: usize = 0x1C;
    /// Interrupt status
    pub const IPISR: usize = 0x20;
    /// Interrupt enable
    pub const IPIER: usize = 0x28;
    /// Write FIFO keyhole
    pub const WRITE_FIFO: usize = 0x100;
    /// Read FIFO keyhole
    pub const READ_FIFO: usize = 0x104;
    /// Transfer size in 32-bit words
    pub const SIZE: usize = 0x108;
    /// Control
    pub const CONTROL: usize = 0x10C;
    /// Status
    pub const STATUS: usize = 0x110;
    /// Write FIFO vacancy in words
    pub const WRITE_FIFO_VACANCY: usize = 0x114;
    /// Read FIFO occupancy in words
    pub const READ_FIFO_OCCUPANCY: usize = 0x118;
    /// Abort status
    pub const ABORT_STATUS: usize = 0x11C;

    /// One past the last register of the block.
    pub const SPAN: usize = 0x120;

    pub mod gier {
        pub const GLOBAL_ENABLE: u32 = 0x8000_0000;
    }

    /// Control register bit definitions
    pub mod control {
        /// Commit the write FIFO to the configuration logic (self clearing)
        pub const WRITE: u32 = 0x1;
        /// Start a readback of SIZE words (self clearing)
        pub const READ: u32 = 0x2;
        pub const FIFO_CLEAR: u32 = 0x4;
        pub const SW_RESET: u32 = 0x8;
        pub const ABORT: u32 = 0x10;
        pub const LOCK: u32 = 0x20;
        pub const READ_DELAY: u32 = 0x400;
    }

    /// Status register bit definitions
    pub mod status {
        /// Set when the port is not processing a transfer
        pub const DONE: u32 = 0x1;
        /// End of startup sequence
        pub const EOS: u32 = 0x4;
    }
}

/// AXI Central DMA engine.
pub mod cdma {
    /// Control
    pub const CONTROL: usize = 0x00;
    /// Status
    pub const STATUS: usize = 0x04;
    /// Source address, low word
    pub const SRC_LOW: usize = 0x18;
    /// Source address, high word
    pub const SRC_HIGH: usize = 0x1C;
    /// Destination address, low word
    pub const DST_LOW: usize = 0x20;
    /// Destination address, high word
    pub const DST_HIGH: usize = 0x24;
    /// Bytes to transfer. Writing it starts the transfer.
    pub const BYTES_TO_TRANSFER: usize = 0x28;

    pub const SPAN: usize = 0x2C;

    /// Control register bit definitions
    pub mod control {
        pub const RESET: u32 = 0x4;
        /// Keep the destination address fixed (keyhole write)
        pub const KEYHOLE_WRITE: u32 = 0x20;
        /// Completion and error interrupt enables
        pub const SIMPLE_IRQ: u32 = 0x5000;
    }

    /// Status register bit definitions
    pub mod status {
        pub const IDLE: u32 = 0x2;
        /// Transfer complete. Write one to clear.
        pub const IOC_IRQ: u32 = 0x1000;
        /// Transfer error. Write one to clear.
        pub const ERR_IRQ: u32 = 0x4000;
    }
}
