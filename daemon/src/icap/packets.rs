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

//! Configuration packets for UltraScale+ configuration logic.
//!
//! Only the handful of packets needed to bracket a register readback are built here;
//! bitstream images carry their own packets and are streamed through untouched.

use std::fmt;

/// Marks the start of a packet stream.
pub const SYNC_WORD: u32 = 0xAA99_5566;
/// Pads the stream before a sync word.
pub const DUMMY_WORD: u32 = 0xFFFF_FFFF;
/// Type 1 packet with no operation.
pub const NOOP_WORD: u32 = 0x2000_0000;
/// Value written to the CMD register to end a packet stream.
pub const CMD_DESYNC: u32 = 13;

const TYPE1: u32 = 1 << 29;
const OP_READ: u32 = 1 << 27;
const OP_WRITE: u32 = 2 << 27;
const REGISTER_SHIFT: u32 = 13;
const CMD_INDEX: u32 = 4;

/// Type 1 packet header that reads the register at `index`. The word count is zero and
/// is OR-ed in by the caller.
pub const fn type1_read(index: u32) -> u32 {
    TYPE1 | (index << REGISTER_SHIFT) | OP_READ
}

/// Type 1 packet header that writes the register at `index`.
pub const fn type1_write(index: u32) -> u32 {
    TYPE1 | (index << REGISTER_SHIFT) | OP_WRITE
}

/// Configuration registers of the UltraScale+ configuration logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRegister {
    Crc,
    Far,
    Fdri,
    Fdro,
    Cmd,
    Ctl,
    Mask,
    Stat,
    Lout,
    Cor,
    Mfwr,
    Flr,
    Key,
    Cbc,
    Idcode,
    Axss,
    C0r1,
    Csob,
    Wbstar,
    Timer,
    Bootsts,
    Ctl1,
}

impl ConfigRegister {
    /// Register address used in packet headers, or `None` for registers this family does
    /// not implement.
    pub const fn index(self) -> Option<u32> {
        match self {
            ConfigRegister::Crc => Some(0),
            ConfigRegister::Far => Some(1),
            ConfigRegister::Fdri => Some(2),
            ConfigRegister::Fdro => Some(3),
            ConfigRegister::Cmd => Some(4),
            ConfigRegister::Ctl => Some(5),
            ConfigRegister::Mask => Some(6),
            ConfigRegister::Stat => Some(7),
            ConfigRegister::Lout => Some(8),
            ConfigRegister::Cor => Some(9),
            ConfigRegister::Mfwr => Some(10),
            ConfigRegister::Flr | ConfigRegister::Key => None,
            ConfigRegister::Cbc => Some(11),
            ConfigRegister::Idcode => Some(12),
            ConfigRegister::Axss => Some(13),
            ConfigRegister::C0r1 => Some(14),
            ConfigRegister::Csob => Some(15),
            ConfigRegister::Wbstar => Some(16),
            ConfigRegister::Timer => Some(17),
            ConfigRegister::Bootsts => Some(22),
            ConfigRegister::Ctl1 => Some(24),
        }
    }
}

impl fmt::Display for ConfigRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigRegister::Crc => "CRC",
            ConfigRegister::Far => "FAR",
            ConfigRegister::Fdri => "FDRI",
            ConfigRegister::Fdro => "FDRO",
            ConfigRegister::Cmd => "CMD",
            ConfigRegister::Ctl => "CTL",
            ConfigRegister::Mask => "MASK",
            ConfigRegister::Stat => "STAT",
            ConfigRegister::Lout => "LOUT",
            ConfigRegister::Cor => "COR",
            ConfigRegister::Mfwr => "MFWR",
            ConfigRegister::Flr => "FLR",
            ConfigRegister::Key => "KEY",
            ConfigRegister::Cbc => "CBC",
            ConfigRegister::Idcode => "IDCODE",
            ConfigRegister::Axss => "AXSS",
            ConfigRegister::C0r1 => "C0R_1",
            ConfigRegister::Csob => "CSOB",
            ConfigRegister::Wbstar => "WBSTAR",
            ConfigRegister::Timer => "TIMER",
            ConfigRegister::Bootsts => "BOOTSTS",
            ConfigRegister::Ctl1 => "CTL_1",
        };
        f.write_str(name)
    }
}

/// Packet stream that brings the configuration logic into the synched state.
pub fn sync_sequence() -> [u32; 5] {
    [DUMMY_WORD, NOOP_WORD, SYNC_WORD, NOOP_WORD, NOOP_WORD]
}

/// Packet stream that requests one word from the register at `index`. Only valid after
/// [`sync_sequence`].
pub fn read_register_request(index: u32) -> [u32; 3] {
    [type1_read(index) | 1, NOOP_WORD, NOOP_WORD]
}

/// Packet stream that ends the current configuration session.
pub fn desync_sequence() -> [u32; 4] {
    [type1_write(CMD_INDEX) | 1, CMD_DESYNC, NOOP_WORD, NOOP_WORD]
}
