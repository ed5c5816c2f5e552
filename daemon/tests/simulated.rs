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

//! Library-level tests that drive bound devices end to end against the simulated
//! configuration port, DMA engine and staging memory.

pub mod simulated {
    pub mod binding;
    pub mod dma_transfer;
    pub mod fifo_transfer;
    pub mod lifecycle;

    use icapd::config::PollingConfig;
    use icapd::manager::IcapManager;
    use icapd::poll::PollPolicy;
    use icapd::sim::{SimulatedHbicap, SimulatedHwicap};
    use icapd::variants::{bind_variant, register_variants};
    use rstest::*;
    use std::time::Duration;

    /// Small retry budgets so timeouts show up quickly.
    #[fixture]
    pub fn polling() -> PollingConfig {
        PollingConfig {
            dma: PollPolicy::new(32, Duration::ZERO),
            port: PollPolicy::new(32, Duration::ZERO),
        }
    }

    pub fn hbicap_manager(sim: &SimulatedHbicap, polling: PollingConfig) -> IcapManager {
        register_variants();
        let resources = sim.resources("icap0", polling).unwrap();
        IcapManager::new("icap0", bind_variant("xlnx,hbicap-fpga", resources).unwrap())
    }

    pub fn hwicap_manager(sim: &SimulatedHwicap, polling: PollingConfig) -> IcapManager {
        register_variants();
        let resources = sim.resources("icap1", polling).unwrap();
        IcapManager::new("icap1", bind_variant("xlnx,hwicap-fpga", resources).unwrap())
    }

    /// Little-endian words of `bytes`, dropping a trailing partial word.
    pub fn words_of(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect()
    }

    pub fn image(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }
}
