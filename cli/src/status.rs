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

use crate::proxies::{control_proxy, status_proxy};
use zbus::Connection;

async fn connect_status() -> Result<status_proxy::StatusProxy<'static>, zbus::Error> {
    let connection = Connection::system().await?;
    status_proxy::StatusProxy::new(&connection).await
}

/// `(handle, compatible)` of every bound device, in handle order.
async fn call_get_devices() -> Result<Vec<(String, String)>, zbus::Error> {
    let devices = connect_status().await?.get_devices().await?;
    Ok(parse_devices(&devices))
}

fn parse_devices(devices: &str) -> Vec<(String, String)> {
    devices
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(handle, compatible)| (handle.to_string(), compatible.to_string()))
        .collect()
}

/// gets the first device handle from `call_get_devices`
pub async fn get_first_device_handle() -> Result<String, zbus::Error> {
    match call_get_devices().await?.into_iter().next() {
        Some((handle, _)) => Ok(handle),
        None => Err(zbus::Error::Failure("icapd has no bound devices.".to_string())),
    }
}

/// gets one device state and returns an ascii table as String
async fn get_device_status_message(device_handle: &str) -> Result<String, zbus::Error> {
    let proxy = connect_status().await?;
    let state = proxy.get_state(device_handle).await?;
    let variant = proxy.get_variant(device_handle).await?;
    let flags = proxy.get_supported_flags(device_handle).await?;
    Ok(format!(
        "---- DEVICE  ----\n\
        | dev | variant | state | supported |\n\
        | {device_handle} | {variant} | {state} | {flags} |"
    ))
}

/// gets all device states and returns an ascii table as String
async fn get_full_status_message() -> Result<String, zbus::Error> {
    let proxy = connect_status().await?;
    let mut ret_string = String::from(
        "---- DEVICES ----\n\
    | dev | variant | state |\n",
    );
    for (dev, variant) in call_get_devices().await? {
        let state = proxy.get_state(&dev).await?;
        ret_string += format!("| {dev} | {variant} | {state} |\n").as_str();
    }
    Ok(ret_string)
}

/// Argument parser for the status command
pub async fn status_handler(device_handle: &Option<String>) -> Result<String, zbus::Error> {
    match device_handle {
        None => get_full_status_message().await,
        Some(dev) => get_device_status_message(dev).await,
    }
}

/// Lists bound devices as `handle: compatible` lines
pub async fn devices_handler() -> Result<String, zbus::Error> {
    let lines: Vec<String> = call_get_devices()
        .await?
        .into_iter()
        .map(|(handle, compatible)| format!("{handle}: {compatible}"))
        .collect();
    Ok(lines.join("\n"))
}

/// Argument parser for the interrupt command
pub async fn interrupt_handler(device_handle: &Option<String>) -> Result<String, zbus::Error> {
    let dev = match device_handle {
        None => get_first_device_handle().await?,
        Some(dev) => dev.clone(),
    };
    let connection = Connection::system().await?;
    let proxy = control_proxy::ControlProxy::new(&connection).await?;
    proxy.interrupt(&dev).await
}
