// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Result};
use clap::{crate_version, ValueEnum};

use super::display;
use super::io::read;
use super::{Endian, NameEncoding, ParsedObject};

/// Name encoding as selected on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum EncodingArg {
    Latin1,
    Utf8,
}

impl From<EncodingArg> for NameEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Latin1 => NameEncoding::Latin1,
            EncodingArg::Utf8 => NameEncoding::Utf8,
        }
    }
}

/// Maps the `--big-endian` flag onto a byte order.
pub fn byte_order(big_endian: bool) -> Endian {
    if big_endian {
        Endian::Big
    } else {
        Endian::Little
    }
}

/// Prints a listing of the object at `object_path`: header, section
/// table, and symbol table, optionally followed by hex dumps of each
/// section's raw data.
pub fn info(
    write: &mut impl Write,
    object_path: &Path,
    data: bool,
    encoding: NameEncoding,
    order: Endian,
) -> Result<()> {
    let buffer = read(object_path)?;
    let object = ParsedObject::parse(&buffer, encoding, order)?;

    let mut options = display::Options::default();
    if data {
        options.data_format = display::DataFormat::Hex;
    }
    writeln!(write, "{}", display::CoffDisplayable::wrap(&object, options))?;

    if data {
        for section in object.sections() {
            let bytes = section.data(&buffer)?;
            writeln!(write, "{} :", section.name())?;
            write!(write, "{}", display::HexDump::new(bytes))?;
            writeln!(write)?;
        }
    }

    Ok(())
}

/// Prints the names of the symbols the object defines for other objects,
/// one per line.
pub fn exports(
    write: &mut impl Write,
    object_path: &Path,
    encoding: NameEncoding,
    order: Endian,
) -> Result<()> {
    let buffer = read(object_path)?;
    let object = ParsedObject::parse(&buffer, encoding, order)?;

    for name in object.exports() {
        writeln!(write, "{name}")?;
    }

    Ok(())
}

/// Writes the raw payload of the named section to `output`.
pub fn extract(
    object_path: &Path,
    section_name: &str,
    output: &Path,
    encoding: NameEncoding,
    order: Endian,
) -> Result<()> {
    let buffer = read(object_path)?;
    let object = ParsedObject::parse(&buffer, encoding, order)?;

    let Some(section) = object.section(section_name) else {
        bail!(
            "no section named '{}' in {}",
            section_name,
            object_path.display(),
        );
    };
    let bytes = section.data(&buffer)?;
    fs::write(output, bytes)?;

    println!("coffread version {}\n", crate_version!());
    println!(
        "Extracted {} ({} bytes) to {}",
        section_name,
        bytes.len(),
        output.display(),
    );
    Ok(())
}

fn stem_or_coffread(path: Option<String>) -> String {
    path.and_then(|path| {
        Path::new(&path)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
    })
    .unwrap_or_else(|| "coffread".to_string())
}

/// Get the binary name from the executable path
pub fn get_binary_name() -> String {
    stem_or_coffread(env::args().next())
}
