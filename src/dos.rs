// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

//! A module for providing a DOS-like interface to `coffread`.

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::Result;

use coffread::{cli, NameEncoding};

fn dumpcoff_usage() -> ! {
    let args: Vec<String> = env::args().collect();
    eprintln!("Usage: {} <file> [/c] [/b]", args[0]);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  /c    Show section data listing");
    eprintln!("  /b    Decode as big-endian");
    process::exit(1);
}

/// Alternate main that accepts DOS-style arguments.
///
/// Usage:
/// - `program file.obj` - basic info
/// - `program file.obj /c` - info with section data listing
/// - `program file.obj /b` - info, decoded big-endian
pub fn dumpcoff_main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut data = false;
    let mut big_endian = false;
    let mut object: Option<PathBuf> = None;

    for arg in &args[1..] {
        match arg.as_str() {
            "/c" => data = true,
            "/b" => big_endian = true,
            _ if !arg.starts_with('/') && object.is_none() => {
                object = Some(PathBuf::from(arg));
            }
            _ => dumpcoff_usage(),
        }
    }

    let Some(object) = object else {
        dumpcoff_usage();
    };

    cli::info(
        &mut std::io::stdout(),
        &object,
        data,
        NameEncoding::default(),
        cli::byte_order(big_endian),
    )
}
