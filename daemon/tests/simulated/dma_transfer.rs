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

use crate::simulated::{hbicap_manager, image, polling, words_of};
use googletest::prelude::*;
use icapd::config::{PollingConfig, STAGING_CAPACITY};
use icapd::flags::ImageFlags;
use icapd::icap::registers::{cdma, port};
use icapd::manager::{ImageInfo, ManagerState};
use icapd::poll::PollPolicy;
use icapd::sim::{Access, CdmaFault, SimulatedHbicap};
use rstest::*;
use std::time::Duration;

fn transfer_lengths(sim: &SimulatedHbicap) -> Vec<u32> {
    sim.cdma
        .with(|m| m.transfers.iter().map(|(_, _, len)| *len).collect())
}

#[gtest]
#[rstest]
#[case::one_word(4)]
#[case::just_below_capacity(STAGING_CAPACITY - 4)]
#[case::exactly_capacity(STAGING_CAPACITY)]
#[case::one_byte_over(STAGING_CAPACITY + 1)]
#[case::two_and_a_bit(2 * STAGING_CAPACITY + 12)]
fn should_split_write_into_capacity_sized_chunks(polling: PollingConfig, #[case] len: usize) {
    let sim = SimulatedHbicap::new();
    let manager = hbicap_manager(&sim, polling);
    manager
        .write_init(ImageFlags::PARTIAL_RECONFIG, &ImageInfo::default())
        .unwrap();
    let data = image(len);

    let remaining = manager.write(&data);

    assert_that!(remaining, ok(eq(&0)));
    let lens = transfer_lengths(&sim);
    assert_that!(lens.len(), eq(len.div_ceil(STAGING_CAPACITY)));
    let (last, full) = lens.split_last().unwrap();
    assert!(full.iter().all(|l| *l as usize == STAGING_CAPACITY));
    assert_that!(*last as usize, eq(len - full.len() * STAGING_CAPACITY));
    assert_eq!(sim.port.take_received(), words_of(&data));
}

#[gtest]
#[rstest]
fn should_program_total_word_count(polling: PollingConfig) {
    let sim = SimulatedHbicap::new();
    let manager = hbicap_manager(&sim, polling);
    sim.port.clear_accesses();

    manager.write(&image(STAGING_CAPACITY + 8)).unwrap();

    assert_that!(sim.port.with(|m| m.size), eq((STAGING_CAPACITY as u32 + 8) / 4));
}

#[gtest]
#[rstest]
fn should_start_next_chunk_after_previous_completed(polling: PollingConfig) {
    let sim = SimulatedHbicap::new();
    let manager = hbicap_manager(&sim, polling);
    sim.cdma.clear_accesses();

    manager.write(&image(STAGING_CAPACITY + 1)).unwrap();

    let writes = sim.cdma.writes();
    let starts: Vec<usize> = writes
        .iter()
        .enumerate()
        .filter(|(_, (offset, _))| *offset == cdma::BYTES_TO_TRANSFER)
        .map(|(index, _)| index)
        .collect();
    let acks: Vec<usize> = writes
        .iter()
        .enumerate()
        .filter(|(_, (offset, _))| *offset == cdma::STATUS)
        .map(|(index, _)| index)
        .collect();
    assert_that!(starts.len(), eq(2));
    assert_that!(acks.len(), eq(2));
    assert!(starts[0] < acks[0]);
    assert!(acks[0] < starts[1]);
}

#[gtest]
#[rstest]
fn should_leave_hardware_alone_for_empty_write(polling: PollingConfig) {
    let sim = SimulatedHbicap::new();
    let manager = hbicap_manager(&sim, polling);
    sim.port.clear_accesses();
    sim.cdma.clear_accesses();

    let remaining = manager.write(&[]);

    assert_that!(remaining, ok(eq(&0)));
    assert!(sim.port.accesses().is_empty());
    assert!(sim.cdma.accesses().is_empty());
}

#[gtest]
#[rstest]
fn should_refuse_transfer_when_engine_not_idle(polling: PollingConfig) {
    let sim = SimulatedHbicap::new();
    let manager = hbicap_manager(&sim, polling);
    sim.cdma.inject(CdmaFault::NeverIdle);
    sim.cdma.clear_accesses();

    let result = manager.write(&image(64));

    assert_that!(result.err().map(|e| e.code()), some(eq(-1)));
    assert!(sim.cdma.writes().is_empty());
    assert_that!(manager.state(), eq(ManagerState::WriteError));
}

#[gtest]
#[rstest]
#[case::engine_never_completes(CdmaFault::NeverComplete, -3)]
#[case::engine_reports_error(CdmaFault::ErrorOnTransfer(0), -2)]
fn should_abort_on_engine_failure(
    polling: PollingConfig,
    #[case] fault: CdmaFault,
    #[case] code: i64,
) {
    let sim = SimulatedHbicap::new();
    let manager = hbicap_manager(&sim, polling);
    sim.cdma.inject(fault);

    let result = manager.write(&image(3 * STAGING_CAPACITY));

    assert_that!(result.err().map(|e| e.code()), some(eq(code)));
    assert_that!(transfer_lengths(&sim).len(), eq(1));
    assert_that!(manager.state(), eq(ManagerState::WriteError));
}

#[gtest]
#[rstest]
fn should_time_out_when_port_never_finishes(polling: PollingConfig) {
    let sim = SimulatedHbicap::new();
    let manager = hbicap_manager(&sim, polling);
    sim.port.with(|m| m.stuck_busy = true);

    let result = manager.write(&image(16));

    assert_that!(
        result,
        err(displays_as(contains_substring(
            "IcapdError::WriteTimeout: configuration port"
        )))
    );
    let status_reads = sim
        .port
        .accesses()
        .iter()
        .filter(|access| matches!(access, Access::Read { offset, .. } if *offset == port::STATUS))
        .count();
    assert_that!(status_reads, eq(polling.port.max_attempts as usize));
    // The lock was released on the error path.
    let pending = manager.pending_bytes();
    assert_that!(pending, ok(eq(&0)));
}

#[gtest]
fn should_load_whole_image_in_blocks() {
    let sim = SimulatedHbicap::new();
    let polling = PollingConfig {
        dma: PollPolicy::new(4, Duration::ZERO),
        port: PollPolicy::new(4, Duration::ZERO),
    };
    let manager = hbicap_manager(&sim, polling);
    let data = image(10_000);
    let info = ImageInfo {
        name: "blinky_partial.bin".to_string(),
        size: Some(data.len()),
    };

    let result = manager.load(&data, ImageFlags::PARTIAL_RECONFIG, &info, 8192);

    assert!(result.is_ok());
    assert_that!(manager.state(), eq(ManagerState::Operating));
    assert_eq!(transfer_lengths(&sim), vec![4096, 4096, 4096, 1808]);
    assert_eq!(sim.port.take_received(), words_of(&data));
    assert_that!(sim.port.with(|m| m.resets), eq(1));
}
