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

use crate::simulated::{hbicap_manager, image, polling};
use googletest::prelude::*;
use icapd::config::PollingConfig;
use icapd::flags::ImageFlags;
use icapd::icap::registers::port;
use icapd::manager::{ImageInfo, ManagerState};
use icapd::poll::PollPolicy;
use icapd::sim::{Access, SimulatedHbicap};
use rstest::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[gtest]
#[rstest]
#[case::none(ImageFlags::default(), true)]
#[case::partial(ImageFlags::PARTIAL_RECONFIG, true)]
#[case::partial_lsb_first(ImageFlags::PARTIAL_RECONFIG | ImageFlags::BITSTREAM_LSB_FIRST, true)]
#[case::device_key(ImageFlags::ENCRYPTED_BITSTREAM, false)]
#[case::user_key(ImageFlags::USERKEY_ENCRYPTED_BITSTREAM, false)]
#[case::ddr_auth(ImageFlags::PARTIAL_RECONFIG | ImageFlags::DDR_MEM_AUTH_BITSTREAM, false)]
#[case::ocm_auth(ImageFlags::SECURE_MEM_AUTH_BITSTREAM, false)]
fn should_accept_flags_only_within_supported_set(
    polling: PollingConfig,
    #[case] flags: ImageFlags,
    #[case] accepted: bool,
) {
    let sim = SimulatedHbicap::new();
    let manager = hbicap_manager(&sim, polling);
    sim.port.clear_accesses();
    sim.cdma.clear_accesses();

    let result = manager.write_init(flags, &ImageInfo::default());

    if accepted {
        assert!(result.is_ok());
        assert_that!(manager.state(), eq(ManagerState::WriteInit));
        assert_that!(sim.port.with(|m| m.resets), eq(1));
    } else {
        assert_that!(result.err().map(|e| e.code()), some(eq(-22)));
        assert_that!(manager.state(), eq(ManagerState::WriteInitError));
        assert!(sim.port.accesses().is_empty());
        assert!(sim.cdma.accesses().is_empty());
    }
}

#[gtest]
#[rstest]
fn should_walk_states_of_a_full_image(polling: PollingConfig) {
    let sim = SimulatedHbicap::new();
    let manager = hbicap_manager(&sim, polling);
    assert_that!(manager.state(), eq(ManagerState::Uninitialized));

    manager
        .write_init(ImageFlags::PARTIAL_RECONFIG, &ImageInfo::default())
        .unwrap();
    assert_that!(manager.state(), eq(ManagerState::WriteInit));
    manager.write(&image(512)).unwrap();
    assert_that!(manager.state(), eq(ManagerState::Writing));
    manager.write(&image(512)).unwrap();
    assert_that!(manager.state(), eq(ManagerState::Writing));
    manager.write_complete().unwrap();
    assert_that!(manager.state(), eq(ManagerState::Operating));
    assert_that!(manager.state().to_string(), eq("operating"));
}

#[gtest]
#[rstest]
fn should_recover_from_write_error_with_new_image(polling: PollingConfig) {
    let sim = SimulatedHbicap::new();
    let manager = hbicap_manager(&sim, polling);
    sim.port.with(|m| m.stuck_busy = true);
    let failed = manager.write(&image(16));
    assert!(failed.is_err());
    assert_that!(manager.state(), eq(ManagerState::WriteError));

    sim.port.with(|m| m.stuck_busy = false);
    let result = manager.load(&image(16), ImageFlags::PARTIAL_RECONFIG, &ImageInfo::default(), 0);

    assert!(result.is_ok());
    assert_that!(manager.state(), eq(ManagerState::Operating));
}

#[gtest]
fn should_interrupt_waiter_without_touching_registers() {
    let sim = SimulatedHbicap::new();
    sim.port.with(|m| m.stuck_busy = true);
    let polling = PollingConfig {
        dma: PollPolicy::new(32, Duration::ZERO),
        port: PollPolicy::new(1_000_000, Duration::from_micros(100)),
    };
    let manager = Arc::new(hbicap_manager(&sim, polling));
    manager
        .write_init(ImageFlags::PARTIAL_RECONFIG, &ImageInfo::default())
        .unwrap();
    sim.port.clear_accesses();

    let holder = {
        let manager = manager.clone();
        thread::spawn(move || manager.write(&image(8)))
    };
    // The holder is polling the port once it reads STATUS.
    while !sim
        .port
        .accesses()
        .iter()
        .any(|access| matches!(access, Access::Read { offset, .. } if *offset == port::STATUS))
    {
        thread::sleep(Duration::from_millis(1));
    }
    let port_writes = sim.port.writes();
    let cdma_writes = sim.cdma.writes();

    let waiter = {
        let manager = manager.clone();
        thread::spawn(move || manager.write(&image(4)))
    };
    while !waiter.is_finished() {
        manager.interrupt();
        thread::sleep(Duration::from_millis(1));
    }
    let interrupted = waiter.join().unwrap();

    assert_that!(
        interrupted,
        err(displays_as(contains_substring("IcapdError::LockInterrupted")))
    );
    assert_eq!(sim.port.writes(), port_writes);
    assert_eq!(sim.cdma.writes(), cdma_writes);

    sim.port.with(|m| m.stuck_busy = false);
    let held = holder.join().unwrap();
    assert_that!(held, ok(eq(&0)));
}

#[gtest]
#[rstest]
fn should_serialise_concurrent_writers(polling: PollingConfig) {
    let sim = SimulatedHbicap::new();
    let manager = Arc::new(hbicap_manager(&sim, polling));

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            thread::spawn(move || manager.write(&image(4096 + 64)))
        })
        .collect();
    for writer in writers {
        let written = writer.join().unwrap();
        assert_that!(written, ok(eq(&0)));
    }

    let lens: Vec<u32> = sim
        .cdma
        .with(|m| m.transfers.iter().map(|(_, _, len)| *len).collect());
    assert_eq!(lens, [4096u32, 64].repeat(4));
}
