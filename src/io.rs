// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

//! Path-based convenience readers.
//!
//! The decoder itself only ever sees in-memory buffers; these helpers do
//! the file system part and add context to failures.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::{Endian, NameEncoding, ParsedObject, FILE_HEADER_SIZE};

/// Reads the file at `path` into a buffer, checking only that it is big
/// enough to hold a file header. Keep the returned buffer around if
/// section payloads are needed later; [Section](crate::Section) slices
/// them from it.
pub fn read(path: &Path) -> Result<Vec<u8>> {
    let data =
        fs::read(path).with_context(|| format!("could not read {}", path.display()))?;

    if data.len() < FILE_HEADER_SIZE {
        bail!("File too small to contain a COFF file header");
    }

    Ok(data)
}

/// Reads and parses the object file at `path`.
///
/// The buffer is dropped after parsing; use [read] + [ParsedObject::parse]
/// instead when section payloads are needed.
pub fn read_object(
    path: &Path,
    encoding: NameEncoding,
    byte_order: Endian,
) -> Result<ParsedObject> {
    let data = read(path)?;
    let object = ParsedObject::parse(&data, encoding, byte_order)
        .with_context(|| format!("could not parse {}", path.display()))?;
    Ok(object)
}
