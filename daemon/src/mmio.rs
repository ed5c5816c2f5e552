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

//! Memory-mapped register access.
//!
//! All hardware access in icapd goes through two layers:
//!
//! * [`RegisterIo`] - a raw 32-bit little-endian register window. [`MappedRegion`] implements
//!   it for physical memory mapped from a memory device (`/dev/mem`, `/dev/uio*`), and the
//!   [`crate::sim`] models implement it for tests and the simulated backend.
//! * [`MmioPort`] - a named, bounds-checked view of one window that the controllers use. It
//!   adds trace logging and read-modify-write helpers.
//!
//! # Architecture
//!
//! ```text
//! IcapController / AxiCdma
//!          │
//!          ▼
//!      MmioPort ──► Box<dyn RegisterIo>
//!                        ├── MappedRegion (rustix mmap)
//!                        └── sim::*Registers
//! ```

use crate::error::IcapdError;
use crate::staging::StagingMemory;
use log::{debug, trace};
use rustix::fs::OFlags;
use rustix::mm::{MapFlags, ProtFlags, mmap, munmap};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{Ordering, fence};

/// A window of 32-bit little-endian device registers.
///
/// Offsets are byte offsets from the start of the window. Implementations may panic on
/// out-of-range offsets; [`MmioPort::new`] checks the window is large enough for the
/// register map it will be used with.
pub trait RegisterIo: Send {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
    /// Size of the window in bytes.
    fn size(&self) -> usize;
}

/// A named register window used by one controller.
pub struct MmioPort {
    name: &'static str,
    io: Box<dyn RegisterIo>,
}

impl fmt::Debug for MmioPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmioPort")
            .field("name", &self.name)
            .field("size", &self.io.size())
            .finish()
    }
}

impl MmioPort {
    /// Wrap a register window after checking it spans at least `required_span` bytes.
    ///
    /// # Arguments
    ///
    /// * `name` - name of the block behind the window, used in logs
    /// * `io` - the window itself
    /// * `required_span` - one past the last byte of the register map the caller will touch
    ///
    /// # Returns: `Result<MmioPort, IcapdError>`
    /// * `Ok(MmioPort)` - window is usable
    /// * `Err(IcapdError::Binding)` - window too small for the register map
    pub fn new(
        name: &'static str,
        io: Box<dyn RegisterIo>,
        required_span: usize,
    ) -> Result<Self, IcapdError> {
        if io.size() < required_span {
            return Err(IcapdError::Binding(format!(
                "{name} register window is {:#x} bytes but the register map needs {required_span:#x}",
                io.size()
            )));
        }
        Ok(MmioPort { name, io })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn read(&self, offset: usize) -> u32 {
        let value = self.io.read32(offset);
        trace!("{}: read {value:#010x} from {offset:#05x}", self.name);
        value
    }

    pub fn write(&self, offset: usize, value: u32) {
        trace!("{}: write {value:#010x} to {offset:#05x}", self.name);
        self.io.write32(offset, value);
    }

    /// Read-modify-write that sets `mask` in the register at `offset`.
    pub fn set_bits(&self, offset: usize, mask: u32) {
        let value = self.read(offset);
        self.write(offset, value | mask);
    }

    /// Read-modify-write that clears `mask` in the register at `offset`.
    pub fn clear_bits(&self, offset: usize, mask: u32) {
        let value = self.read(offset);
        self.write(offset, value & !mask);
    }
}

/// A physical address range made visible to this process with `mmap`.
///
/// Used both for register windows and for the DMA staging buffer. The backing file is
/// opened with `O_SYNC` so `/dev/mem` mappings are uncached.
pub struct MappedRegion {
    /// Start of the requested range inside the mapping.
    ptr: NonNull<u8>,
    size: usize,
    /// Page-aligned start and length actually handed to `mmap`.
    map_base: NonNull<u8>,
    map_len: usize,
    file: PathBuf,
    offset: u64,
}

impl fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedRegion")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("size", &self.size)
            .field("file", &self.file)
            .field("offset", &format_args!("{:#x}", self.offset))
            .finish()
    }
}

// SAFETY: MappedRegion owns its mapping exclusively. The mapping is process-wide, so moving
// the owner to another thread does not invalidate it.
unsafe impl Send for MappedRegion {}

impl MappedRegion {
    /// Map `size` bytes at byte `offset` of `file`.
    ///
    /// `offset` does not have to be page aligned; the mapping is widened to page
    /// boundaries and the returned region starts at the requested byte.
    ///
    /// # Arguments
    ///
    /// * `file` - memory device to map, usually `/dev/mem` or a `u-dma-buf` node
    /// * `offset` - byte offset into the device, the physical address for `/dev/mem`
    /// * `size` - number of bytes the caller needs
    ///
    /// # Returns: `Result<MappedRegion, IcapdError>`
    /// * `Ok(MappedRegion)` - mapping established
    /// * `Err(IcapdError::IOOpen)` - device could not be opened read/write
    /// * `Err(IcapdError::Map)` - `mmap` refused the range
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use icapd::mmio::{MappedRegion, RegisterIo};
    /// # use std::path::Path;
    /// # fn example() -> Result<(), icapd::error::IcapdError> {
    /// let regs = MappedRegion::map(Path::new("/dev/mem"), 0xA000_0000, 0x1000)?;
    /// let status = regs.read32(0x110);
    /// # Ok(())
    /// # }
    /// ```
    pub fn map(file: &Path, offset: u64, size: usize) -> Result<Self, IcapdError> {
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlags::SYNC.bits() as i32)
            .open(file)
            .map_err(|e| IcapdError::IOOpen {
                file: file.into(),
                e,
            })?;
        let page_size = rustix::param::page_size() as u64;
        let aligned = offset & !(page_size - 1);
        let lead = (offset - aligned) as usize;
        let map_len = lead + size;

        let mapping = map_shared(&device, aligned, map_len).map_err(|e| IcapdError::Map {
            file: file.into(),
            offset,
            size,
            e,
        })?;
        let map_base = NonNull::new(mapping.cast::<u8>()).ok_or_else(|| {
            IcapdError::Internal(format!("mmap of {file:?} returned a null mapping"))
        })?;
        // SAFETY: lead < page_size <= map_len, so the result stays inside the mapping.
        let ptr = unsafe { map_base.add(lead) };
        debug!("Mapped {size:#x} bytes at {offset:#x} of {file:?} to {ptr:p}");

        Ok(MappedRegion {
            ptr,
            size,
            map_base,
            map_len,
            file: file.into(),
            offset,
        })
    }

    fn check_word(&self, offset: usize) {
        assert!(offset + 4 <= self.size, "Register offset out of bounds");
        assert!(offset % 4 == 0, "Register offset is not word aligned");
    }
}

fn map_shared(
    device: &File,
    offset: u64,
    len: usize,
) -> Result<*mut std::ffi::c_void, rustix::io::Errno> {
    // SAFETY: a fresh shared mapping with a null hint does not alias any Rust object. The
    // kernel validates the device range and returns an error instead of a partial mapping.
    unsafe {
        mmap(
            std::ptr::null_mut(),
            len,
            ProtFlags::READ | ProtFlags::WRITE,
            MapFlags::SHARED,
            device,
            offset,
        )
    }
}

impl RegisterIo for MappedRegion {
    fn read32(&self, offset: usize) -> u32 {
        self.check_word(offset);
        // SAFETY: ptr is valid for self.size bytes, offset+4 <= size and offset is aligned.
        // Volatile because the hardware can change the value at any time.
        let value = unsafe { std::ptr::read_volatile(self.ptr.as_ptr().add(offset).cast::<u32>()) };
        fence(Ordering::SeqCst);
        u32::from_le(value)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.check_word(offset);
        fence(Ordering::SeqCst);
        // SAFETY: same bounds as read32. Volatile because the store has side effects.
        unsafe {
            std::ptr::write_volatile(self.ptr.as_ptr().add(offset).cast::<u32>(), value.to_le());
        }
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl StagingMemory for MappedRegion {
    fn capacity(&self) -> usize {
        self.size
    }

    fn fill(&mut self, data: &[u8]) {
        assert!(data.len() <= self.size, "Staging copy out of bounds");
        for (index, byte) in data.iter().enumerate() {
            // SAFETY: index < data.len() <= size. Byte stores have no alignment requirement.
            unsafe { std::ptr::write_volatile(self.ptr.as_ptr().add(index), *byte) };
        }
        fence(Ordering::SeqCst);
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: map_base/map_len are exactly what mmap returned and Drop runs once.
        if let Err(e) = unsafe { munmap(self.map_base.as_ptr().cast(), self.map_len) } {
            debug!("Failed to unmap {:?} at {:#x}: {e}", self.file, self.offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Backing {
        words: Arc<Mutex<Vec<u32>>>,
    }

    impl RegisterIo for Backing {
        fn read32(&self, offset: usize) -> u32 {
            self.words.lock().unwrap()[offset / 4]
        }
        fn write32(&self, offset: usize, value: u32) {
            self.words.lock().unwrap()[offset / 4] = value;
        }
        fn size(&self) -> usize {
            self.words.lock().unwrap().len() * 4
        }
    }

    fn port(words: usize) -> (MmioPort, Arc<Mutex<Vec<u32>>>) {
        let shared = Arc::new(Mutex::new(vec![0; words]));
        let backing = Backing {
            words: shared.clone(),
        };
        (
            MmioPort::new("test", Box::new(backing), words * 4).unwrap(),
            shared,
        )
    }

    #[gtest]
    fn should_reject_window_smaller_than_register_map() {
        let backing = Backing {
            words: Arc::new(Mutex::new(vec![0; 4])),
        };
        let result = MmioPort::new("cdma", Box::new(backing), 0x2C);
        assert_that!(
            result,
            err(displays_as(contains_substring("cdma register window")))
        );
    }

    #[gtest]
    fn should_set_and_clear_bits() {
        let (port, shared) = port(4);
        port.write(0x8, 0b1001);
        port.set_bits(0x8, 0b0110);
        assert_that!(port.read(0x8), eq(0b1111));
        port.clear_bits(0x8, 0b0011);
        assert_that!(shared.lock().unwrap()[2], eq(0b1100));
    }

    #[gtest]
    fn should_fail_to_map_missing_device() {
        let result = MappedRegion::map(Path::new("/this/device/does/not/exist"), 0, 0x1000);
        assert_that!(result, err(displays_as(contains_substring("IcapdError::IOOpen"))));
    }
}
