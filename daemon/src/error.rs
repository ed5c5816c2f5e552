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

//! Error types for the icapd daemon.
//!
//! Every fallible operation in the crate returns [`IcapdError`]. Each variant carries a
//! `IcapdError::<Variant>:` prefix in its message so that errors stay recognisable after
//! they have been flattened into strings on the DBus boundary.
//!
//! [`IcapdError::code`] reports the errno-style status code that the equivalent kernel
//! driver would have returned, which is what the DBus clients and logs display next to
//! the message.

use log::error;
use std::path::PathBuf;
use zbus::fdo;

const EINTR: i64 = 4;
const EIO: i64 = 5;
const ENXIO: i64 = 6;
const EBUSY: i64 = 16;
const ENODEV: i64 = 19;
const EINVAL: i64 = 22;

/// Failures of the FIFO (keyhole) data path of the configuration port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FifoFault {
    #[error("the configuration port was busy when a FIFO transfer was requested")]
    Busy,
    #[error("the configuration port finished with {remaining} words still outstanding")]
    Incomplete { remaining: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum IcapdError {
    #[error("IcapdError::NotIdle: the DMA engine was not idle when a transfer was requested")]
    NotIdle,
    #[error("IcapdError::WriteError: the DMA engine flagged an error for a {len} byte transfer")]
    WriteError { len: u32 },
    #[error("IcapdError::WriteTimeout: {what} did not complete after {attempts} polls")]
    WriteTimeout { what: &'static str, attempts: u32 },
    #[error(
        "IcapdError::InvalidFlags: requested capabilities [{requested}] are not within the supported set [{supported}]"
    )]
    InvalidFlags {
        requested: crate::flags::Capabilities,
        supported: crate::flags::Capabilities,
    },
    #[error("IcapdError::LockInterrupted: interrupted while waiting for the device lock")]
    LockInterrupted,
    #[error("IcapdError::ShortWrite: {remaining} bytes were not transferred")]
    ShortWrite { remaining: usize },
    #[error("IcapdError::InvalidArgument: {0}")]
    InvalidArgument(String),
    #[error("IcapdError::FifoTransfer: {0}")]
    FifoTransfer(FifoFault),
    #[error("IcapdError::IORead: An IO error occurred when reading from {file:?}: {e}")]
    IORead { file: PathBuf, e: std::io::Error },
    #[error("IcapdError::IOOpen: An IO error occurred when opening {file:?}: {e}")]
    IOOpen { file: PathBuf, e: std::io::Error },
    #[error("IcapdError::Map: failed to map {size:#x} bytes at {offset:#x} of {file:?}: {e}")]
    Map {
        file: PathBuf,
        offset: u64,
        size: usize,
        e: rustix::io::Errno,
    },
    #[error("IcapdError::Config: failed to parse {file:?}: {e}")]
    Config { file: PathBuf, e: toml::de::Error },
    #[error("IcapdError::Binding: {0}")]
    Binding(String),
    #[error("IcapdError::UnknownDevice: no device is bound under handle '{0}'")]
    UnknownDevice(String),
    #[error("IcapdError::Internal: An Internal error occurred: {0}")]
    Internal(String),
}

impl IcapdError {
    /// The status code the error is reported with.
    ///
    /// DMA engine failures keep the small negative codes the engine driver has always
    /// used (`-1` not idle, `-2` transfer error, `-3` timeout). A [`IcapdError::ShortWrite`]
    /// reports the positive number of bytes left behind. Everything else maps onto a
    /// negative errno value.
    pub fn code(&self) -> i64 {
        match self {
            IcapdError::NotIdle => -1,
            IcapdError::WriteError { .. } => -2,
            IcapdError::WriteTimeout { .. } => -3,
            IcapdError::InvalidFlags { .. } | IcapdError::InvalidArgument(..) => -EINVAL,
            IcapdError::Config { .. } => -EINVAL,
            IcapdError::LockInterrupted => -EINTR,
            IcapdError::ShortWrite { remaining } => *remaining as i64,
            IcapdError::FifoTransfer(FifoFault::Busy) => -EBUSY,
            IcapdError::FifoTransfer(..) => -EIO,
            IcapdError::IORead { .. } | IcapdError::IOOpen { .. } => -EIO,
            IcapdError::Map { .. } => -ENXIO,
            IcapdError::Binding(..) | IcapdError::UnknownDevice(..) => -ENODEV,
            IcapdError::Internal(..) => -EIO,
        }
    }
}

impl From<FifoFault> for IcapdError {
    fn from(fault: FifoFault) -> Self {
        IcapdError::FifoTransfer(fault)
    }
}

impl From<IcapdError> for fdo::Error {
    fn from(err: IcapdError) -> Self {
        error!("{err} (code {})", err.code());
        match err {
            IcapdError::InvalidArgument(..) => fdo::Error::InvalidArgs(err.to_string()),
            IcapdError::InvalidFlags { .. } => fdo::Error::InvalidArgs(err.to_string()),
            IcapdError::UnknownDevice(..) => fdo::Error::InvalidArgs(err.to_string()),
            IcapdError::IORead { .. } => fdo::Error::IOError(err.to_string()),
            IcapdError::IOOpen { .. } => fdo::Error::IOError(err.to_string()),
            IcapdError::Map { .. } => fdo::Error::IOError(err.to_string()),
            _ => fdo::Error::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::Capabilities;
    use googletest::prelude::*;
    use rstest::*;

    #[gtest]
    #[rstest]
    #[case::not_idle(IcapdError::NotIdle, -1)]
    #[case::write_error(IcapdError::WriteError { len: 4096 }, -2)]
    #[case::timeout(IcapdError::WriteTimeout { what: "DMA transfer", attempts: 10 }, -3)]
    #[case::interrupted(IcapdError::LockInterrupted, -4)]
    #[case::short_write(IcapdError::ShortWrite { remaining: 12 }, 12)]
    #[case::fifo_busy(IcapdError::FifoTransfer(FifoFault::Busy), -16)]
    #[case::fifo_incomplete(IcapdError::FifoTransfer(FifoFault::Incomplete { remaining: 3 }), -5)]
    #[case::flags(
        IcapdError::InvalidFlags {
            requested: Capabilities::AUTH_DDR,
            supported: Capabilities::PARTIAL,
        },
        -22
    )]
    fn should_report_code(#[case] err: IcapdError, #[case] code: i64) {
        assert_that!(err.code(), eq(code));
    }

    #[gtest]
    fn should_prefix_message_with_variant() {
        let err = IcapdError::WriteTimeout {
            what: "configuration port",
            attempts: 5000,
        };
        assert_that!(
            err.to_string(),
            starts_with("IcapdError::WriteTimeout: configuration port")
        );
    }

    #[gtest]
    fn should_map_argument_errors_to_invalid_args() {
        let err: fdo::Error = IcapdError::UnknownDevice("icap7".into()).into();
        assert!(matches!(err, fdo::Error::InvalidArgs(..)));
    }
}
