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

//! Image flags and device capabilities.
//!
//! Callers describe an image with [`ImageFlags`], which are bit compatible with the Linux
//! FPGA manager flags so existing tooling can pass them through unchanged. Devices
//! advertise what they can load as [`Capabilities`]. [`ImageFlags::capabilities`] maps
//! the former onto the latter:
//!
//! | Image flag                     | Capability                                  |
//! |--------------------------------|---------------------------------------------|
//! | `USERKEY_ENCRYPTED_BITSTREAM`  | `ENC_USERKEY`                               |
//! | `ENCRYPTED_BITSTREAM`          | `ENC_DEVKEY`, unless a user key was given   |
//! | `DDR_MEM_AUTH_BITSTREAM`       | `AUTH_DDR`                                  |
//! | `SECURE_MEM_AUTH_BITSTREAM`    | `AUTH_OCM`, unless DDR authentication was given |
//! | `PARTIAL_RECONFIG`             | `PARTIAL`                                   |

use std::fmt;
use std::ops::BitOr;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImageFlags(u32);

impl ImageFlags {
    pub const PARTIAL_RECONFIG: ImageFlags = ImageFlags(1 << 0);
    pub const EXTERNAL_CONFIG: ImageFlags = ImageFlags(1 << 1);
    pub const ENCRYPTED_BITSTREAM: ImageFlags = ImageFlags(1 << 2);
    pub const BITSTREAM_LSB_FIRST: ImageFlags = ImageFlags(1 << 3);
    pub const COMPRESSED_BITSTREAM: ImageFlags = ImageFlags(1 << 4);
    pub const USERKEY_ENCRYPTED_BITSTREAM: ImageFlags = ImageFlags(1 << 5);
    pub const DDR_MEM_AUTH_BITSTREAM: ImageFlags = ImageFlags(1 << 6);
    pub const SECURE_MEM_AUTH_BITSTREAM: ImageFlags = ImageFlags(1 << 7);

    pub const fn from_bits(bits: u32) -> Self {
        ImageFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: ImageFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// The capabilities a device needs to load an image with these flags.
    ///
    /// Flags with no capability counterpart (`EXTERNAL_CONFIG`, `BITSTREAM_LSB_FIRST`,
    /// `COMPRESSED_BITSTREAM`) do not contribute.
    pub fn capabilities(self) -> Capabilities {
        let mut required = Capabilities::NONE;
        if self.contains(ImageFlags::USERKEY_ENCRYPTED_BITSTREAM) {
            required = required | Capabilities::ENC_USERKEY;
        } else if self.contains(ImageFlags::ENCRYPTED_BITSTREAM) {
            required = required | Capabilities::ENC_DEVKEY;
        }
        if self.contains(ImageFlags::DDR_MEM_AUTH_BITSTREAM) {
            required = required | Capabilities::AUTH_DDR;
        } else if self.contains(ImageFlags::SECURE_MEM_AUTH_BITSTREAM) {
            required = required | Capabilities::AUTH_OCM;
        }
        if self.contains(ImageFlags::PARTIAL_RECONFIG) {
            required = required | Capabilities::PARTIAL;
        }
        required
    }
}

impl BitOr for ImageFlags {
    type Output = ImageFlags;

    fn bitor(self, rhs: ImageFlags) -> ImageFlags {
        ImageFlags(self.0 | rhs.0)
    }
}

/// What a device can load.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const PARTIAL: Capabilities = Capabilities(1 << 0);
    pub const AUTH_DDR: Capabilities = Capabilities(1 << 1);
    pub const AUTH_OCM: Capabilities = Capabilities(1 << 2);
    pub const ENC_USERKEY: Capabilities = Capabilities(1 << 3);
    pub const ENC_DEVKEY: Capabilities = Capabilities(1 << 4);

    const NAMES: [(Capabilities, &'static str); 5] = [
        (Capabilities::PARTIAL, "PARTIAL"),
        (Capabilities::AUTH_DDR, "AUTH_DDR"),
        (Capabilities::AUTH_OCM, "AUTH_OCM"),
        (Capabilities::ENC_USERKEY, "ENC_USERKEY"),
        (Capabilities::ENC_DEVKEY, "ENC_DEVKEY"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_subset_of(self, other: Capabilities) -> bool {
        self.0 & other.0 == self.0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Capabilities::NAMES
            .iter()
            .filter(|(capability, _)| capability.is_subset_of(*self) && capability.0 != 0)
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;
    use rstest::*;

    #[gtest]
    #[rstest]
    #[case::none(ImageFlags::default(), Capabilities::NONE)]
    #[case::partial(ImageFlags::PARTIAL_RECONFIG, Capabilities::PARTIAL)]
    #[case::devkey(ImageFlags::ENCRYPTED_BITSTREAM, Capabilities::ENC_DEVKEY)]
    #[case::userkey_wins(
        ImageFlags::ENCRYPTED_BITSTREAM | ImageFlags::USERKEY_ENCRYPTED_BITSTREAM,
        Capabilities::ENC_USERKEY
    )]
    #[case::ocm(ImageFlags::SECURE_MEM_AUTH_BITSTREAM, Capabilities::AUTH_OCM)]
    #[case::ddr_wins(
        ImageFlags::SECURE_MEM_AUTH_BITSTREAM | ImageFlags::DDR_MEM_AUTH_BITSTREAM,
        Capabilities::AUTH_DDR
    )]
    #[case::ignored(
        ImageFlags::EXTERNAL_CONFIG | ImageFlags::COMPRESSED_BITSTREAM | ImageFlags::BITSTREAM_LSB_FIRST,
        Capabilities::NONE
    )]
    #[case::combined(
        ImageFlags::PARTIAL_RECONFIG | ImageFlags::USERKEY_ENCRYPTED_BITSTREAM | ImageFlags::DDR_MEM_AUTH_BITSTREAM,
        Capabilities::PARTIAL | Capabilities::ENC_USERKEY | Capabilities::AUTH_DDR
    )]
    fn should_map_flags(#[case] flags: ImageFlags, #[case] expected: Capabilities) {
        assert_that!(flags.capabilities(), eq(expected));
    }

    #[gtest]
    fn should_check_subset() {
        assert!(Capabilities::PARTIAL.is_subset_of(Capabilities::PARTIAL));
        assert!(Capabilities::NONE.is_subset_of(Capabilities::PARTIAL));
        assert!(!(Capabilities::PARTIAL | Capabilities::AUTH_DDR).is_subset_of(Capabilities::PARTIAL));
    }

    #[gtest]
    fn should_display_names() {
        let caps = Capabilities::PARTIAL | Capabilities::ENC_DEVKEY;
        assert_that!(caps.to_string(), eq("PARTIAL | ENC_DEVKEY"));
        assert_that!(Capabilities::NONE.to_string(), eq(""));
    }

    #[gtest]
    fn should_keep_linux_bit_values() {
        assert_that!(ImageFlags::PARTIAL_RECONFIG.bits(), eq(0x1));
        assert_that!(ImageFlags::USERKEY_ENCRYPTED_BITSTREAM.bits(), eq(0x20));
        assert_that!(ImageFlags::SECURE_MEM_AUTH_BITSTREAM.bits(), eq(0x80));
    }
}
