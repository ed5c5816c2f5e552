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

//! Drivers for the two hardware blocks behind an ICAP.
//!
//! * [`controller`] - the AXI HBICAP/HWICAP register block: reset, size, busy status.
//! * [`fifo`] - the keyhole FIFO path of the same block, used when no DMA engine exists.
//! * [`cdma`] - the AXI Central DMA engine that pushes staged chunks into the data port.
//! * [`packets`] - configuration packet words understood by the configuration logic.
//! * [`registers`] - register offsets and bit masks of both blocks.

pub mod cdma;
pub mod controller;
pub mod fifo;
pub mod packets;
pub mod registers;
