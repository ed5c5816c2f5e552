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

//! A mutual exclusion lock whose waiters can be interrupted.
//!
//! Hardware access to one configuration port is serialised by an [`InterruptibleLock`].
//! A thread blocked in [`InterruptibleLock::acquire`] gives up with
//! [`IcapdError::LockInterrupted`] when another thread calls
//! [`InterruptibleLock::interrupt`], without having touched the protected value. The
//! current holder is never disturbed.

use crate::error::IcapdError;
use log::trace;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Gate {
    held: bool,
    interrupts: u64,
}

#[derive(Debug)]
pub struct InterruptibleLock<T> {
    gate: Mutex<Gate>,
    released: Condvar,
    value: Mutex<T>,
}

/// Exclusive access to the value of an [`InterruptibleLock`]. Releases the lock on drop.
pub struct LockGuard<'a, T> {
    lock: &'a InterruptibleLock<T>,
    value: MutexGuard<'a, T>,
}

impl<T> InterruptibleLock<T> {
    pub fn new(value: T) -> Self {
        InterruptibleLock {
            gate: Mutex::new(Gate::default()),
            released: Condvar::new(),
            value: Mutex::new(value),
        }
    }

    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the lock is free, or until [`interrupt`](Self::interrupt) is called.
    ///
    /// # Returns: `Result<LockGuard<T>, IcapdError>`
    /// * `Ok(LockGuard)` - exclusive access until the guard is dropped
    /// * `Err(IcapdError::LockInterrupted)` - interrupted while waiting
    pub fn acquire(&self) -> Result<LockGuard<'_, T>, IcapdError> {
        let mut gate = self.gate();
        let seen = gate.interrupts;
        loop {
            if gate.interrupts != seen {
                trace!("lock wait interrupted");
                return Err(IcapdError::LockInterrupted);
            }
            if !gate.held {
                break;
            }
            gate = self
                .released
                .wait(gate)
                .unwrap_or_else(PoisonError::into_inner);
        }
        gate.held = true;
        drop(gate);
        let value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(LockGuard { lock: self, value })
    }

    /// Wake every thread waiting in [`acquire`](Self::acquire) and make it fail.
    pub fn interrupt(&self) {
        let mut gate = self.gate();
        gate.interrupts = gate.interrupts.wrapping_add(1);
        drop(gate);
        self.released.notify_all();
    }

    pub fn is_held(&self) -> bool {
        self.gate().held
    }
}

impl<T> Deref for LockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for LockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for LockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.gate().held = false;
        self.lock.released.notify_all();
    }
}
