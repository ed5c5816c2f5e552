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

//! Image lifecycle of one bound configuration port.
//!
//! An [`IcapManager`] owns one [`IcapVariant`] behind an [`InterruptibleLock`] and walks
//! it through the lifecycle of an image:
//!
//! ```text
//! Uninitialized ──write_init──► WriteInit ──write──► Writing ──write_complete──► WriteComplete ──► Operating
//!                                   │                   │
//!                                   ▼                   ▼
//!                             WriteInitError        WriteError
//! ```
//!
//! Flags are checked before the hardware is touched, so a rejected [`IcapManager::write_init`]
//! leaves the port exactly as it was. Every hardware step runs with the device lock held,
//! and the lock is released on every exit path.

use crate::carry::WORD_BYTES;
use crate::error::IcapdError;
use crate::flags::{Capabilities, ImageFlags};
use crate::lock::InterruptibleLock;
use crate::variants::IcapVariant;
use log::{debug, info, warn};
use std::fmt;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    #[default]
    Uninitialized,
    WriteInit,
    WriteInitError,
    Writing,
    WriteError,
    WriteComplete,
    Operating,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManagerState::Uninitialized => "unknown",
            ManagerState::WriteInit => "write init",
            ManagerState::WriteInitError => "write init error",
            ManagerState::Writing => "write",
            ManagerState::WriteError => "write error",
            ManagerState::WriteComplete => "write complete",
            ManagerState::Operating => "operating",
        };
        write!(f, "{name}")
    }
}

/// What the caller knows about the image being loaded. Only used for logging.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub name: String,
    pub size: Option<usize>,
}

pub struct IcapManager {
    handle: String,
    compatible: &'static str,
    supported: Capabilities,
    state: Mutex<ManagerState>,
    device: InterruptibleLock<Box<dyn IcapVariant>>,
}

impl fmt::Debug for IcapManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IcapManager")
            .field("handle", &self.handle)
            .field("compatible", &self.compatible)
            .field("state", &self.state())
            .finish()
    }
}

impl IcapManager {
    pub fn new(handle: impl Into<String>, variant: Box<dyn IcapVariant>) -> Self {
        IcapManager {
            handle: handle.into(),
            compatible: variant.compatible(),
            supported: variant.supported_capabilities(),
            state: Mutex::new(ManagerState::Uninitialized),
            device: InterruptibleLock::new(variant),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn compatible(&self) -> &'static str {
        self.compatible
    }

    pub fn supported_capabilities(&self) -> Capabilities {
        self.supported
    }

    /// Current lifecycle state. Never touches the hardware.
    pub fn state(&self) -> ManagerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ManagerState) {
        debug!("{}: state {state}", self.handle);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Validate `flags` and bring the port into a known state for a new image.
    ///
    /// # Returns: `Result<(), IcapdError>`
    /// * `Ok(())` - ready for [`write`](Self::write)
    /// * `Err(IcapdError::InvalidFlags)` - the image needs a capability the device lacks;
    ///   no register was accessed
    /// * `Err(IcapdError::LockInterrupted)` - interrupted while waiting for the device
    /// * `Err(IcapdError)` - the variant failed to prepare the port
    pub fn write_init(&self, flags: ImageFlags, image: &ImageInfo) -> Result<(), IcapdError> {
        self.set_state(ManagerState::WriteInit);
        debug!("{}: image to be written: {image:?}", self.handle);

        let requested = flags.capabilities();
        if !requested.is_subset_of(self.supported) {
            self.set_state(ManagerState::WriteInitError);
            return Err(IcapdError::InvalidFlags {
                requested,
                supported: self.supported,
            });
        }

        let result = self.device.acquire().and_then(|mut device| device.prepare());
        if let Err(e) = result {
            self.set_state(ManagerState::WriteInitError);
            return Err(e);
        }
        Ok(())
    }

    /// Transfer one piece of the image.
    ///
    /// # Returns: `Result<usize, IcapdError>`
    /// * `Ok(usize)` - bytes of `buf` that were not written; 0 on full success
    /// * `Err(IcapdError)` - the transfer was aborted, the state is now `WriteError`
    pub fn write(&self, buf: &[u8]) -> Result<usize, IcapdError> {
        let previous = self.state();
        if !matches!(previous, ManagerState::WriteInit | ManagerState::Writing) {
            warn!(
                "{}: write of {} bytes requested in state '{previous}'",
                self.handle,
                buf.len()
            );
        }
        self.set_state(ManagerState::Writing);

        let result = self.device.acquire().and_then(|mut device| device.write(buf));
        if result.is_err() {
            self.set_state(ManagerState::WriteError);
        }
        result
    }

    /// Mark the image as loaded. Performs no hardware access.
    pub fn write_complete(&self) -> Result<(), IcapdError> {
        self.set_state(ManagerState::WriteComplete);
        self.set_state(ManagerState::Operating);
        Ok(())
    }

    /// Wake every caller blocked on this device's lock with [`IcapdError::LockInterrupted`].
    pub fn interrupt(&self) {
        info!("{}: interrupting waiters", self.handle);
        self.device.interrupt();
    }

    /// Bytes the variant is holding back until a later write completes a word.
    pub fn pending_bytes(&self) -> Result<usize, IcapdError> {
        Ok(self.device.acquire()?.pending_bytes())
    }

    /// Run the whole lifecycle for an in-memory image.
    ///
    /// # Arguments
    ///
    /// * `image` - the complete partial bitstream
    /// * `flags` - image flags checked by [`write_init`](Self::write_init)
    /// * `info` - description used for logging
    /// * `block_size` - size of each [`write`](Self::write); 0 writes the image in one piece
    ///
    /// # Returns: `Result<(), IcapdError>`
    /// * `Ok(())` - image loaded, state is `Operating`
    /// * `Err(IcapdError::InvalidArgument)` - `block_size` is smaller than one word
    /// * `Err(IcapdError::ShortWrite)` - a write left bytes behind
    /// * `Err(IcapdError)` - any lifecycle step failed
    pub fn load(
        &self,
        image: &[u8],
        flags: ImageFlags,
        info: &ImageInfo,
        block_size: usize,
    ) -> Result<(), IcapdError> {
        if block_size != 0 && block_size < WORD_BYTES {
            return Err(IcapdError::InvalidArgument(format!(
                "block size {block_size} is smaller than one {WORD_BYTES} byte word"
            )));
        }
        self.write_init(flags, info)?;

        let block = if block_size == 0 {
            image.len().max(1)
        } else {
            block_size
        };
        for piece in image.chunks(block) {
            let remaining = self.write(piece)?;
            if remaining != 0 {
                self.set_state(ManagerState::WriteError);
                return Err(IcapdError::ShortWrite { remaining });
            }
        }

        let pending = self.pending_bytes()?;
        if pending != 0 {
            warn!(
                "{}: {pending} trailing bytes do not form a whole word and were not sent",
                self.handle
            );
        }
        self.write_complete()?;
        info!(
            "{}: loaded '{}' ({} bytes)",
            self.handle,
            info.name,
            image.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use rstest::*;
    use std::sync::Arc;

    /// Variant that records calls and returns scripted results.
    #[derive(Default)]
    struct Scripted {
        prepared: Arc<Mutex<u32>>,
        written: Arc<Mutex<Vec<usize>>>,
        left_behind: usize,
        fail_write: bool,
    }

    impl IcapVariant for Scripted {
        fn compatible(&self) -> &'static str {
            "test,scripted"
        }

        fn supported_capabilities(&self) -> Capabilities {
            Capabilities::PARTIAL
        }

        fn prepare(&mut self) -> Result<(), IcapdError> {
            *self.prepared.lock().unwrap() += 1;
            Ok(())
        }

        fn write(&mut self, buf: &[u8]) -> Result<usize, IcapdError> {
            if self.fail_write {
                return Err(IcapdError::NotIdle);
            }
            self.written.lock().unwrap().push(buf.len());
            Ok(self.left_behind)
        }
    }

    fn manager(variant: Scripted) -> IcapManager {
        IcapManager::new("icap0", Box::new(variant))
    }

    #[gtest]
    fn should_start_uninitialized() {
        let manager = manager(Scripted::default());
        assert_that!(manager.state(), eq(ManagerState::Uninitialized));
        assert_that!(manager.compatible(), eq("test,scripted"));
    }

    #[gtest]
    fn should_walk_through_lifecycle() {
        let manager = manager(Scripted::default());
        manager
            .write_init(ImageFlags::PARTIAL_RECONFIG, &ImageInfo::default())
            .unwrap();
        assert_that!(manager.state(), eq(ManagerState::WriteInit));
        let remaining = manager.write(&[0; 8]);
        assert_that!(remaining, ok(eq(&0)));
        assert_that!(manager.state(), eq(ManagerState::Writing));
        manager.write_complete().unwrap();
        assert_that!(manager.state(), eq(ManagerState::Operating));
    }

    #[gtest]
    #[rstest]
    #[case::ddr_auth(ImageFlags::DDR_MEM_AUTH_BITSTREAM)]
    #[case::encrypted(ImageFlags::PARTIAL_RECONFIG | ImageFlags::ENCRYPTED_BITSTREAM)]
    fn should_reject_unsupported_flags_before_prepare(#[case] flags: ImageFlags) {
        let variant = Scripted::default();
        let prepared = variant.prepared.clone();
        let manager = manager(variant);

        let result = manager.write_init(flags, &ImageInfo::default());

        assert_that!(
            result,
            err(displays_as(contains_substring("IcapdError::InvalidFlags")))
        );
        assert_that!(*prepared.lock().unwrap(), eq(0));
        assert_that!(manager.state(), eq(ManagerState::WriteInitError));
    }

    #[gtest]
    fn should_record_write_error() {
        let manager = manager(Scripted {
            fail_write: true,
            ..Scripted::default()
        });
        manager
            .write_init(ImageFlags::default(), &ImageInfo::default())
            .unwrap();
        let result = manager.write(&[0; 4]);
        assert_that!(result, err(displays_as(contains_substring("NotIdle"))));
        assert_that!(manager.state(), eq(ManagerState::WriteError));
    }

    #[gtest]
    fn should_split_load_into_blocks() {
        let variant = Scripted::default();
        let written = variant.written.clone();
        let manager = manager(variant);

        let result = manager.load(&[0; 10], ImageFlags::default(), &ImageInfo::default(), 4);

        assert!(result.is_ok());
        assert_eq!(*written.lock().unwrap(), vec![4, 4, 2]);
        assert_that!(manager.state(), eq(ManagerState::Operating));
    }

    #[gtest]
    fn should_report_short_write_from_load() {
        let manager = manager(Scripted {
            left_behind: 3,
            ..Scripted::default()
        });
        let result = manager.load(&[0; 8], ImageFlags::default(), &ImageInfo::default(), 0);
        assert_that!(
            result,
            err(displays_as(contains_substring("3 bytes were not transferred")))
        );
        assert_that!(manager.state(), eq(ManagerState::WriteError));
    }

    #[gtest]
    fn should_reject_sub_word_block_size() {
        let manager = manager(Scripted::default());
        let result = manager.load(&[0; 8], ImageFlags::default(), &ImageInfo::default(), 3);
        assert_that!(result, err(displays_as(contains_substring("block size 3"))));
        assert_that!(manager.state(), eq(ManagerState::Uninitialized));
    }

    #[gtest]
    fn should_display_framework_state_names() {
        assert_that!(ManagerState::WriteInitError.to_string(), eq("write init error"));
        assert_that!(ManagerState::Operating.to_string(), eq("operating"));
    }
}
