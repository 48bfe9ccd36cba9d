// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

use std::default::Default;
use std::fmt::{Display, Formatter, Result};

/// The format used to display raw bytes (section payloads and auxiliary
/// records).
#[derive(Clone, Default)]
pub enum DataFormat {
    #[default]
    None,
    Hex,
}

/// Options for displaying a [ParsedObject](super::ParsedObject) listing.
#[derive(Clone, Default)]
pub struct Options {
    /// How to render raw bytes in the listing
    pub data_format: DataFormat,
}

/// Display something with options.
pub trait DisplayWithOptions: Display {
    fn fmt_with_options(&self, f: &mut Formatter<'_>, _options: &Options) -> Result {
        self.fmt(f)
    }
}

pub struct CoffDisplayable<'a, P: DisplayWithOptions> {
    p: &'a P,
    options: Options,
}

impl<'a, P> CoffDisplayable<'a, P>
where
    P: DisplayWithOptions,
{
    pub fn wrap(p: &'a P, options: Options) -> CoffDisplayable<'a, P> {
        Self { p, options }
    }
}

impl<P> Display for CoffDisplayable<'_, P>
where
    P: DisplayWithOptions,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.p.fmt_with_options(f, &self.options)
    }
}

/// Renders a byte slice as a hex listing, 16 bytes per row with a
/// leading offset column.
pub struct HexDump<'a> {
    bytes: &'a [u8],
}

impl<'a> HexDump<'a> {
    pub fn new(bytes: &'a [u8]) -> HexDump<'a> {
        Self { bytes }
    }
}

impl Display for HexDump<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        for (i, chunk) in self.bytes.chunks(16).enumerate() {
            write!(f, "{:04x}:", i * 16)?;
            for byte in chunk {
                write!(f, " {:02x}", byte)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
