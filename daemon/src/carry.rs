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

//! Word alignment across writes.
//!
//! The FIFO path only moves whole 32-bit words, but callers may split an image at any
//! byte. The 1 to 3 bytes left over at the end of one write are held in a
//! [`CarryBuffer`] and logically prepended to the next write.

/// Bytes per configuration word.
pub const WORD_BYTES: usize = 4;

/// Holds fewer than [`WORD_BYTES`] bytes between writes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CarryBuffer {
    bytes: [u8; WORD_BYTES - 1],
    len: usize,
}

impl CarryBuffer {
    pub fn new() -> Self {
        CarryBuffer::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Replace the held bytes with the last `WORD_BYTES - 1` bytes of `tail` at most.
    pub fn store(&mut self, tail: &[u8]) {
        let keep = &tail[tail.len().saturating_sub(WORD_BYTES - 1)..];
        self.bytes[..keep.len()].copy_from_slice(keep);
        self.len = keep.len();
    }

    /// Length of the held bytes followed by `input`.
    pub fn joined_len(&self, input: &[u8]) -> usize {
        self.len + input.len()
    }

    /// The held bytes followed by `input`, as whole little-endian words.
    ///
    /// Bytes past the last whole word are not yielded. When the joined length is at
    /// least one word, those bytes all come from `input`, so they are the last
    /// `joined_len % WORD_BYTES` bytes of it.
    pub fn words<'a>(&'a self, input: &'a [u8]) -> impl Iterator<Item = u32> + 'a {
        let mut bytes = self.as_slice().iter().chain(input.iter()).copied();
        let count = self.joined_len(input) / WORD_BYTES;
        (0..count).map(move |_| {
            let mut word = [0u8; WORD_BYTES];
            for byte in &mut word {
                *byte = bytes.next().unwrap_or_default();
            }
            u32::from_le_bytes(word)
        })
    }
}
