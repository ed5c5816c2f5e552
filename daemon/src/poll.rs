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

//! Bounded status polling.

use std::time::Duration;

/// How often a status register may be sampled before giving up, and how long to wait
/// between samples. A zero interval busy-waits with [`std::hint::spin_loop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

/// The condition was still false after every allowed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimeout {
    pub attempts: u32,
}

impl PollPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        PollPolicy {
            max_attempts,
            interval,
        }
    }

    /// Evaluate `condition` until it returns `true` or the attempts run out.
    ///
    /// The condition is evaluated at most `max_attempts` times, and never when
    /// `max_attempts` is zero.
    ///
    /// # Returns: `Result<u32, PollTimeout>`
    /// * `Ok(u32)` - the attempt (1-based) on which the condition held
    /// * `Err(PollTimeout)` - the condition never held
    pub fn poll<F>(&self, mut condition: F) -> Result<u32, PollTimeout>
    where
        F: FnMut() -> bool,
    {
        for attempt in 1..=self.max_attempts {
            if condition() {
                return Ok(attempt);
            }
            if self.interval.is_zero() {
                std::hint::spin_loop();
            } else {
                std::thread::sleep(self.interval);
            }
        }
        Err(PollTimeout {
            attempts: self.max_attempts,
        })
    }
}
