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

use googletest::prelude::*;
use icapd::binding::DeviceTable;
use icapd::config::load_config_from;
use icapd::flags::ImageFlags;
use icapd::manager::{ImageInfo, ManagerState};
use icapd::variants::register_variants;
use rstest::*;
use std::fs;
use std::path::PathBuf;

const VENDOR: &str = r#"
[polling]
dma_max_retries = 64
port_max_retries = 64

[[device]]
handle = "icap0"
compatible = "xlnx,hbicap-fpga"
backend = "simulated"
"#;

const USER: &str = r#"
[polling]
port_max_retries = 16

[[device]]
handle = "icap0"
compatible = "xlnx,hbicap-fpga"
backend = "simulated"

[[device]]
handle = "icap1"
compatible = "hwicap-fpga"
backend = "simulated"
"#;

/// Scratch directory for one test's config files, removed on drop.
struct ConfigDir(PathBuf);

impl ConfigDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("icapd-{}-{name}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        ConfigDir(dir)
    }

    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.0.join(name);
        fs::write(&path, contents).unwrap();
        path
    }
}

impl Drop for ConfigDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

#[gtest]
fn should_bind_devices_from_user_config() {
    register_variants();
    let dir = ConfigDir::new("user-config");
    let vendor = dir.file("vendor.toml", VENDOR);
    let user = dir.file("user.toml", USER);

    let config = load_config_from(&vendor, &user);
    let table = DeviceTable::bind_all(&config);

    assert_that!(config.polling.dma.max_attempts, eq(64));
    assert_that!(config.polling.port.max_attempts, eq(16));
    let devices: Vec<String> = table
        .iter()
        .map(|m| format!("{}:{}", m.handle(), m.compatible()))
        .collect();
    assert_eq!(devices, vec!["icap0:xlnx,hbicap-fpga", "icap1:xlnx,hwicap-fpga"]);
}

#[gtest]
fn should_fall_back_to_vendor_config_when_user_file_missing() {
    register_variants();
    let dir = ConfigDir::new("vendor-only");
    let vendor = dir.file("vendor.toml", VENDOR);

    let config = load_config_from(&vendor, &dir.0.join("missing.toml"));
    let table = DeviceTable::bind_all(&config);

    assert_that!(table.iter().count(), eq(1));
    assert!(table.get("icap0").is_ok());
}

#[gtest]
fn should_bind_nothing_from_broken_config() {
    let dir = ConfigDir::new("broken");
    let vendor = dir.file("vendor.toml", "[[device]]\nhandle = 3");
    let user = dir.file("user.toml", "not toml at all");

    let config = load_config_from(&vendor, &user);
    let table = DeviceTable::bind_all(&config);

    assert!(table.is_empty());
}

#[gtest]
#[rstest]
#[case::dma_port("icap0")]
#[case::fifo_port("icap1")]
fn should_load_image_through_bound_device(#[case] handle: &str) {
    register_variants();
    let dir = ConfigDir::new(&format!("load-{handle}"));
    let vendor = dir.file("vendor.toml", VENDOR);
    let user = dir.file("user.toml", USER);
    let table = DeviceTable::bind_all(&load_config_from(&vendor, &user));
    let manager = table.get(handle).unwrap();
    let image = vec![0x5A; 6000];

    let result = manager.load(&image, ImageFlags::PARTIAL_RECONFIG, &ImageInfo::default(), 2048);

    assert!(result.is_ok());
    assert_that!(manager.state(), eq(ManagerState::Operating));
}
