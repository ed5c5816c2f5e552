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

use crate::simulated::{hwicap_manager, image, polling, words_of};
use googletest::prelude::*;
use icapd::config::PollingConfig;
use icapd::flags::ImageFlags;
use icapd::manager::{IcapManager, ImageInfo, ManagerState};
use icapd::sim::SimulatedHwicap;
use rstest::*;

fn initialised(sim: &SimulatedHwicap, polling: PollingConfig) -> IcapManager {
    let manager = hwicap_manager(sim, polling);
    manager
        .write_init(ImageFlags::PARTIAL_RECONFIG, &ImageInfo::default())
        .unwrap();
    // Drop the desync/IDCODE handshake words.
    sim.port.take_received();
    manager
}

#[gtest]
#[rstest]
fn should_join_five_and_three_bytes_into_two_words(polling: PollingConfig) {
    let sim = SimulatedHwicap::new();
    let manager = initialised(&sim, polling);

    manager.write(&[0x11, 0x22, 0x33, 0x44, 0x55]).unwrap();
    manager.write(&[0x66, 0x77, 0x88]).unwrap();

    assert_eq!(sim.port.take_received(), vec![0x4433_2211, 0x8877_6655]);
    let pending = manager.pending_bytes();
    assert_that!(pending, ok(eq(&0)));
}

#[gtest]
#[rstest]
#[case::whole(&[23])]
#[case::five_three_rest(&[5, 3, 15])]
#[case::word_then_rest(&[4, 19])]
#[case::odd_pieces(&[7, 9, 7])]
#[case::eleven_six_six(&[11, 6, 6])]
fn should_send_same_words_for_any_split(polling: PollingConfig, #[case] pieces: &[usize]) {
    let sim = SimulatedHwicap::new();
    let manager = initialised(&sim, polling);
    let data = image(23);

    let mut rest = data.as_slice();
    for len in pieces {
        let (piece, tail) = rest.split_at(*len);
        manager.write(piece).unwrap();
        rest = tail;
    }

    assert_eq!(sim.port.take_received(), words_of(&data));
    let pending = manager.pending_bytes();
    assert_that!(pending, ok(eq(&3)));
}

#[gtest]
#[rstest]
fn should_reject_sub_word_input_without_register_access(polling: PollingConfig) {
    let sim = SimulatedHwicap::new();
    let manager = initialised(&sim, polling);
    sim.port.clear_accesses();

    let result = manager.write(&[1, 2]);

    assert_that!(result.err().map(|e| e.code()), some(eq(-22)));
    assert!(sim.port.accesses().is_empty());
    assert_that!(manager.state(), eq(ManagerState::WriteError));
}

#[gtest]
#[rstest]
fn should_report_busy_port(polling: PollingConfig) {
    let sim = SimulatedHwicap::new();
    let manager = initialised(&sim, polling);
    sim.port.with(|m| m.stuck_busy = true);

    let result = manager.write(&image(8));

    assert_that!(result.err().map(|e| e.code()), some(eq(-16)));
    assert!(sim.port.take_received().is_empty());
}

#[gtest]
#[rstest]
fn should_report_stalled_fifo(polling: PollingConfig) {
    let sim = SimulatedHwicap::new();
    let manager = initialised(&sim, polling);
    sim.port.with(|m| {
        m.drain_on_commit = false;
        m.fifo_depth = 4;
    });

    let result = manager.write(&image(40));

    assert_that!(
        result,
        err(displays_as(contains_substring("6 words still outstanding")))
    );
    assert_that!(manager.state(), eq(ManagerState::WriteError));
}

#[gtest]
#[rstest]
fn should_fail_init_when_port_is_busy(polling: PollingConfig) {
    let sim = SimulatedHwicap::new();
    let manager = hwicap_manager(&sim, polling);
    sim.port.with(|m| m.stuck_busy = true);

    let result = manager.write_init(ImageFlags::PARTIAL_RECONFIG, &ImageInfo::default());

    assert!(result.is_err());
    assert_that!(manager.state(), eq(ManagerState::WriteInitError));
}

#[gtest]
#[rstest]
fn should_load_image_and_keep_trailing_bytes_back(polling: PollingConfig) {
    let sim = SimulatedHwicap::new();
    let manager = hwicap_manager(&sim, polling);
    sim.port.with(|m| m.idcode = 0x0372_8093);
    let data = image(4098);

    let result = manager.load(&data, ImageFlags::PARTIAL_RECONFIG, &ImageInfo::default(), 1000);

    assert!(result.is_ok());
    let received = sim.port.take_received();
    assert!(received.ends_with(&words_of(&data)));
    let pending = manager.pending_bytes();
    assert_that!(pending, ok(eq(&2)));
    assert_that!(manager.state(), eq(ManagerState::Operating));
}
