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

//! Command line client for icapd.
//!
//! Talks to the daemon over the system DBus; see [`proxies`] for the interfaces used.

mod load;
mod proxies;
mod status;

use crate::load::load_handler;
use crate::status::{devices_handler, interrupt_handler, status_handler};
use clap::{Parser, Subcommand, arg, command};
use log::{debug, error};

#[derive(Parser, Debug)]
#[command(name = "icap")]
#[command(bin_name = "icap")]
struct Cli {
    #[arg(
        long = "handle",
        help = r#"configuration port handle to be used for operations.
Default value for this option is calculated in runtime and application
picks the first device bound by icapd.
        "#
    )]
    handle: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream a partial bitstream file into a configuration port
    Load {
        /// Path of the bitstream file, readable by the daemon
        file: String,
        /// Image flags, decimal or 0x-prefixed hex
        #[arg(long, default_value = "0x1", value_parser = parse_flags)]
        flags: u32,
        /// Bytes per write; 0 writes the whole file at once
        #[arg(long = "block-size", default_value_t = 0)]
        block_size: u32,
    },
    /// Show the state of one device, or of every device when no handle is given
    Status,
    /// List the devices bound by icapd
    Devices,
    /// Make callers waiting for the device give up
    Interrupt,
}

fn parse_flags(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    };
    parsed.map_err(|e| format!("'{value}' is not a valid flag value: {e}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    debug!("parsed cli command with {cli:?}");
    let result = match cli.command {
        Commands::Load {
            file,
            flags,
            block_size,
        } => load_handler(&cli.handle, &file, flags, block_size).await,
        Commands::Status => status_handler(&cli.handle).await,
        Commands::Devices => devices_handler().await,
        Commands::Interrupt => interrupt_handler(&cli.handle).await,
    };
    match result {
        Ok(msg) => println!("{msg}"),
        Err(e) => {
            error!("{e}");
            return Err(e.into());
        }
    }
    Ok(())
}
