// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

//! COFF Object File Parser
//!
//! This crate provides read-only parsing for COFF (Common Object File
//! Format) object files, the format produced by Windows and DJGPP
//! toolchains (and a number of embedded compilers) for relocatable
//! compiler output.
//!
//! # Overview
//!
//! A COFF object is a flat byte buffer containing:
//!
//! - a fixed 20-byte **file header**,
//! - an optional header (skipped; its size is declared in the file header),
//! - a table of fixed 40-byte **section** entries,
//! - a table of fixed 18-byte **symbol** entries, where a symbol may be
//!   followed by opaque auxiliary records occupying further 18-byte slots,
//! - a size-prefixed **string table** holding names too long for the
//!   inline 8-byte name fields.
//!
//! Parsing is a single synchronous pass over an in-memory buffer. The
//! result is an immutable [ParsedObject]; section payloads are not copied
//! into it and are sliced on demand from the same buffer with
//! [Section::data].
//!
//! Multi-byte integers are decoded with a caller-selected byte order
//! ([Endian]), and name bytes with a caller-selected [NameEncoding]. Both
//! are plain arguments, never process-wide state, so independent buffers
//! can be decoded concurrently from separate threads.
//!
//! # Quick Start
//!
//! Reading an object file from disk:
//!
//! ```no_run
//! use std::path::Path;
//! use coffread::{io, Endian, NameEncoding};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let object = io::read_object(
//!         Path::new("module.obj"),
//!         NameEncoding::Latin1,
//!         Endian::Little,
//!     )?;
//!
//!     for symbol in object.symbols() {
//!         println!("{:#010x} {}", symbol.value(), symbol.name());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! Parsing a buffer and slicing section data out of it:
//!
//! ```no_run
//! use coffread::{Endian, NameEncoding, ParsedObject};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let data = std::fs::read("module.obj")?;
//!     let object = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little)?;
//!
//!     if let Some(text) = object.section(".text") {
//!         let code = text.data(&data)?;
//!         println!(".text is {} bytes", code.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

use core::fmt;

use binrw::binrw;
use binrw::io::Cursor;
use binrw::BinReaderExt;
use chrono::{DateTime, Utc};

use crate::display::DisplayWithOptions;

pub mod cli;
pub mod display;
pub mod io;

pub use binrw::Endian;

/// Size of the fixed file header in bytes.
pub const FILE_HEADER_SIZE: usize = 20;

/// Size of one section table entry in bytes.
pub const SECTION_ENTRY_SIZE: usize = 40;

/// Size of one symbol table slot in bytes. Auxiliary records occupy
/// slots of the same size.
pub const SYMBOL_RECORD_SIZE: usize = 18;

/// An opaque auxiliary record following a symbol entry.
///
/// The bytes are copied verbatim from the symbol table and are not
/// interpreted; their shape depends on the owning symbol's storage class
/// and is left to the caller.
pub type AuxRecord = [u8; SYMBOL_RECORD_SIZE];

/// The error produced when any part of a decode would read outside the
/// supplied buffer.
///
/// Parsing is all-or-nothing: a truncated header, section entry, symbol
/// slot, string reference, or raw-data slice aborts the whole parse with
/// this error and no partial result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundsError {
    /// File offset of the attempted access.
    pub offset: u64,
    /// Number of bytes the decoder needed at `offset`.
    pub len: u64,
    /// First offset past the readable range.
    pub limit: u64,
}

impl fmt::Display for BoundsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "out-of-bounds read of {} bytes at offset {:#x} (limit {:#x})",
            self.len, self.offset, self.limit,
        )
    }
}

impl std::error::Error for BoundsError {}

/// The encoding used to turn name bytes into strings.
///
/// COFF predates any notion of Unicode and tools disagree about what
/// lives in name fields. [Latin1](NameEncoding::Latin1) maps every byte
/// to the corresponding code point and can never fail, which is what the
/// classic toolchains effectively did. [Utf8](NameEncoding::Utf8) decodes
/// UTF-8 and substitutes the replacement character (�) for invalid
/// sequences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NameEncoding {
    /// Each byte is one code point (ISO 8859-1). The default.
    #[default]
    Latin1,
    /// Lossy UTF-8.
    Utf8,
}

impl NameEncoding {
    /// Decodes `bytes` into a `String` using this encoding.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

pub mod machine {
    //! Machine type identifiers found in the file header magic field.
    //!
    //! [I386] and [AMD64] are by far the most common in compiler output.
    //! The parser passes the magic through without validation, so objects
    //! for machines not listed here decode fine.

    /// Content assumed applicable to any machine.
    pub const UNKNOWN: u16 = 0x0000;

    /// Intel 386 and compatible.
    pub const I386: u16 = 0x014C;

    /// MIPS R3000, little-endian.
    pub const R3000: u16 = 0x0162;

    /// ARM little-endian.
    pub const ARM: u16 = 0x01C0;

    /// ARM Thumb.
    pub const THUMB: u16 = 0x01C2;

    /// PowerPC little-endian.
    pub const POWERPC: u16 = 0x01F0;

    /// Itanium.
    pub const IA64: u16 = 0x0200;

    /// x86-64.
    pub const AMD64: u16 = 0x8664;

    /// AArch64.
    pub const ARM64: u16 = 0xAA64;
}

pub mod storageclass {
    //! Symbol storage class identifiers.
    //!
    //! The storage class determines how a symbol's value and auxiliary
    //! records are interpreted. This layer does not act on it beyond
    //! [EXTERNAL] (used by [exports](crate::ParsedObject::exports)); the
    //! constants are provided for callers.

    /// No storage class.
    pub const NULL: u8 = 0;

    /// Automatic (stack) variable.
    pub const AUTOMATIC: u8 = 1;

    /// Externally visible symbol.
    pub const EXTERNAL: u8 = 2;

    /// Static symbol, visible within the object only.
    pub const STATIC: u8 = 3;

    /// Register variable.
    pub const REGISTER: u8 = 4;

    /// Code label.
    pub const LABEL: u8 = 6;

    /// Function. Usually followed by auxiliary records describing it.
    pub const FUNCTION: u8 = 101;

    /// Source file name, carried in the auxiliary records.
    pub const FILE: u8 = 103;

    /// Section definition. Auxiliary records carry length and relocation
    /// counts.
    pub const SECTION: u8 = 104;

    /// Weak external.
    pub const WEAK_EXTERNAL: u8 = 105;
}

pub mod sectionnumber {
    //! Special values of a symbol's signed section number.
    //!
    //! Positive values are 1-based indexes into the section table.

    /// The symbol is not defined in this object.
    pub const UNDEFINED: i16 = 0;

    /// The value is an absolute address, not an offset into a section.
    pub const ABSOLUTE: i16 = -1;

    /// The symbol carries debugging information and no section.
    pub const DEBUG: i16 = -2;
}

/// The fixed file header.
///
/// Only ever constructed from the first 20 bytes of the buffer. The
/// magic is not validated; any 16-bit value is passed through for the
/// caller to interpret (see [machine]).
///
/// # Structure on Disk
///
/// | Offset | Type  | Description                                       |
/// |--------|-------|---------------------------------------------------|
/// | 0      | `u16` | Magic (machine type).                             |
/// | 2      | `u16` | Number of section table entries.                  |
/// | 4      | `u32` | Creation timestamp, seconds since the Unix epoch. |
/// | 8      | `i32` | File offset of the symbol table.                  |
/// | 12     | `u32` | Number of symbol table slots, auxiliary included. |
/// | 16     | `u16` | Size of the optional header that follows.         |
/// | 18     | `u16` | Flags.                                            |
#[binrw]
#[derive(Clone, Debug, PartialEq)]
struct RawFileHeader {
    magic: u16,
    num_sections: u16,
    timestamp: u32,
    symbol_table_offset: i32,
    num_symbols: u32,
    optional_header_size: u16,
    flags: u16,
}

impl RawFileHeader {
    /// The section table starts directly after the optional header.
    fn section_table_offset(&self) -> u64 {
        FILE_HEADER_SIZE as u64 + u64::from(self.optional_header_size)
    }

    fn symbol_table_size(&self) -> u64 {
        SYMBOL_RECORD_SIZE as u64 * u64::from(self.num_symbols)
    }

    /// The string table starts directly after the last symbol slot.
    fn string_table_offset(&self) -> u64 {
        (self.symbol_table_offset as u64).saturating_add(self.symbol_table_size())
    }
}

/// One section table entry as it appears on disk.
///
/// # Structure on Disk
///
/// | Offset | Type      | Description                                |
/// |--------|-----------|--------------------------------------------|
/// | 0      | `[u8; 8]` | Name, nul-padded or a `/offset` reference. |
/// | 8      | `u32`     | Physical address.                          |
/// | 12     | `u32`     | Virtual address.                           |
/// | 16     | `u32`     | Size of the raw data in bytes.             |
/// | 20     | `u32`     | File offset of the raw data.               |
/// | 24     | `u32`     | File offset of the relocation table.       |
/// | 28     | `u32`     | File offset of the line number table.      |
/// | 32     | `u16`     | Number of relocation entries.              |
/// | 34     | `u16`     | Number of line number entries.             |
/// | 36     | `u32`     | Flags.                                     |
#[binrw]
#[derive(Clone, Debug, PartialEq)]
struct RawSectionEntry {
    name: [u8; 8],
    physical_address: u32,
    virtual_address: u32,
    size: u32,
    raw_data_offset: u32,
    reloc_offset: u32,
    line_num_offset: u32,
    num_relocs: u16,
    num_line_nums: u16,
    flags: u32,
}

/// One symbol table slot as it appears on disk.
///
/// `num_aux` further slots follow immediately and belong to this symbol
/// as opaque auxiliary records; they are never symbols of their own.
///
/// # Structure on Disk
///
/// | Offset | Type      | Description                                       |
/// |--------|-----------|---------------------------------------------------|
/// | 0      | `[u8; 8]` | Name, inline or `u32` zero + `i32` string offset. |
/// | 8      | `u32`     | Value; meaning depends on the section number.     |
/// | 12     | `i16`     | Section number (see [sectionnumber]).             |
/// | 14     | `u16`     | Type.                                             |
/// | 16     | `u8`      | Storage class (see [storageclass]).               |
/// | 17     | `u8`      | Number of auxiliary records that follow.          |
#[binrw]
#[derive(Clone, Debug, PartialEq)]
struct RawSymbolEntry {
    name: [u8; 8],
    value: u32,
    section_number: i16,
    symbol_type: u16,
    storage_class: u8,
    num_aux: u8,
}

/// Returns `len` bytes of `data` starting at `offset`, or a [BoundsError]
/// describing the access if the range is not fully inside the buffer.
fn get_range(data: &[u8], offset: u64, len: u64) -> Result<&[u8], BoundsError> {
    let limit = data.len() as u64;
    let end = offset.checked_add(len).unwrap_or(u64::MAX);
    if offset > limit || end > limit {
        return Err(BoundsError { offset, len, limit });
    }
    Ok(&data[offset as usize..end as usize])
}

/// The size-prefixed name table following the symbol table.
///
/// Offset 0 is reserved to mean "no name" and is never looked up; callers
/// map it to the empty string before calling [resolve](Self::resolve).
struct StringTable<'a> {
    base: u64,
    table: &'a [u8],
}

impl<'a> StringTable<'a> {
    /// Reads the table at `offset`. The leading `u32` is the total table
    /// size including those four bytes, and the declared range must lie
    /// inside the buffer.
    fn read(data: &'a [u8], offset: u64, byte_order: Endian) -> Result<Self, BoundsError> {
        let prefix = get_range(data, offset, 4)?;
        let raw = [prefix[0], prefix[1], prefix[2], prefix[3]];
        let size = match byte_order {
            Endian::Little => u32::from_le_bytes(raw),
            Endian::Big => u32::from_be_bytes(raw),
        };
        let table = get_range(data, offset, u64::from(size))?;
        Ok(Self {
            base: offset,
            table,
        })
    }

    /// Reads the name at `offset` from the table start, terminated by a
    /// nul byte or the end of the table.
    fn resolve(&self, offset: u32, encoding: NameEncoding) -> Result<String, BoundsError> {
        let start = offset as usize;
        if start >= self.table.len() {
            return Err(BoundsError {
                offset: self.base.saturating_add(u64::from(offset)),
                len: 1,
                limit: self.base.saturating_add(self.table.len() as u64),
            });
        }
        let run = &self.table[start..];
        let end = run.iter().position(|&b| b == 0).unwrap_or(run.len());
        Ok(encoding.decode(&run[..end]))
    }
}

/// Decodes an inline 8-byte name field, stopping at the first nul. The
/// field is nul-padded, not nul-terminated; all 8 bytes may be name.
fn inline_name(bytes: &[u8; 8], encoding: NameEncoding) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    encoding.decode(&bytes[..end])
}

/// Resolves a section name. A leading `/` marks the remaining bytes as
/// ASCII decimal digits forming a string table offset.
fn section_name(
    bytes: &[u8; 8],
    strings: &StringTable,
    encoding: NameEncoding,
) -> Result<String, BoundsError> {
    if bytes[0] != b'/' {
        return Ok(inline_name(bytes, encoding));
    }
    let mut offset: u32 = 0;
    for &b in &bytes[1..] {
        if !b.is_ascii_digit() {
            break;
        }
        offset = offset * 10 + u32::from(b - b'0');
    }
    if offset == 0 {
        return Ok(String::new());
    }
    strings.resolve(offset, encoding)
}

/// Resolves a symbol name. If the first four bytes are zero the second
/// four are a string table offset (0 meaning no name); otherwise all
/// eight bytes are the name itself.
fn symbol_name(
    bytes: &[u8; 8],
    strings: &StringTable,
    encoding: NameEncoding,
    byte_order: Endian,
) -> Result<String, BoundsError> {
    if bytes[..4] != [0, 0, 0, 0] {
        return Ok(inline_name(bytes, encoding));
    }
    let raw = [bytes[4], bytes[5], bytes[6], bytes[7]];
    let reference = match byte_order {
        Endian::Little => i32::from_le_bytes(raw),
        Endian::Big => i32::from_be_bytes(raw),
    };
    if reference == 0 {
        return Ok(String::new());
    }
    strings.resolve(reference as u32, encoding)
}

/// A decoded section table entry.
///
/// The name has been resolved through the string table where necessary;
/// all other fields are carried through numerically. The raw payload
/// stays in the source buffer and is sliced on demand with
/// [data](Self::data).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    name: String,
    physical_address: u32,
    virtual_address: u32,
    size: u32,
    raw_data_offset: u32,
    reloc_offset: u32,
    line_num_offset: u32,
    num_relocs: u16,
    num_line_nums: u16,
    flags: u32,
}

impl Section {
    fn from_raw(
        raw: &RawSectionEntry,
        strings: &StringTable,
        encoding: NameEncoding,
    ) -> Result<Self, BoundsError> {
        Ok(Self {
            name: section_name(&raw.name, strings, encoding)?,
            physical_address: raw.physical_address,
            virtual_address: raw.virtual_address,
            size: raw.size,
            raw_data_offset: raw.raw_data_offset,
            reloc_offset: raw.reloc_offset,
            line_num_offset: raw.line_num_offset,
            num_relocs: raw.num_relocs,
            num_line_nums: raw.num_line_nums,
            flags: raw.flags,
        })
    }

    /// Returns the resolved section name (e.g. `.text`, `.data`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn physical_address(&self) -> u32 {
        self.physical_address
    }

    pub fn virtual_address(&self) -> u32 {
        self.virtual_address
    }

    /// Returns the size of the raw data in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns the file offset of the raw data.
    pub fn raw_data_offset(&self) -> u32 {
        self.raw_data_offset
    }

    pub fn reloc_offset(&self) -> u32 {
        self.reloc_offset
    }

    pub fn line_num_offset(&self) -> u32 {
        self.line_num_offset
    }

    pub fn num_relocs(&self) -> u16 {
        self.num_relocs
    }

    pub fn num_line_nums(&self) -> u16 {
        self.num_line_nums
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Slices this section's raw payload out of `data`, which must be
    /// the buffer the section was parsed from. Returns exactly
    /// [size](Self::size) bytes starting at
    /// [raw_data_offset](Self::raw_data_offset).
    pub fn data<'a>(&self, data: &'a [u8]) -> Result<&'a [u8], BoundsError> {
        get_range(
            data,
            u64::from(self.raw_data_offset),
            u64::from(self.size),
        )
    }
}

/// A decoded symbol table entry.
///
/// Only primary slots become [Symbol]s; the auxiliary slots a primary
/// declares are attached to it verbatim as [AuxRecord]s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    name: String,
    value: u32,
    section_number: i16,
    symbol_type: u16,
    storage_class: u8,
    aux: Vec<AuxRecord>,
}

impl Symbol {
    fn from_raw(
        raw: &RawSymbolEntry,
        aux: Vec<AuxRecord>,
        strings: &StringTable,
        encoding: NameEncoding,
        byte_order: Endian,
    ) -> Result<Self, BoundsError> {
        Ok(Self {
            name: symbol_name(&raw.name, strings, encoding, byte_order)?,
            value: raw.value,
            section_number: raw.section_number,
            symbol_type: raw.symbol_type,
            storage_class: raw.storage_class,
            aux,
        })
    }

    /// Returns the resolved symbol name. May be empty for unnamed
    /// symbols.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the symbol value. Its meaning (address, offset, or plain
    /// value) depends on [section_number](Self::section_number).
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Returns the signed section number (see [sectionnumber]).
    pub fn section_number(&self) -> i16 {
        self.section_number
    }

    pub fn symbol_type(&self) -> u16 {
        self.symbol_type
    }

    /// Returns the storage class (see [storageclass]).
    pub fn storage_class(&self) -> u8 {
        self.storage_class
    }

    /// Returns the auxiliary records following this symbol, byte-for-byte
    /// as they appear in the symbol table.
    pub fn aux_records(&self) -> &Vec<AuxRecord> {
        &self.aux
    }
}

/// A fully decoded COFF object.
///
/// Produced once by [parse](Self::parse) from an immutable buffer and
/// never mutated afterwards. Section payloads are not embedded; slice
/// them from the original buffer with [Section::data].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedObject {
    magic: u16,
    timestamp: u32,
    flags: u16,
    sections: Vec<Section>,
    symbols: Vec<Symbol>,
}

impl ParsedObject {
    /// Decodes a COFF object from `data`.
    ///
    /// All multi-byte integers in the file are decoded with `byte_order`
    /// and all name bytes with `encoding`. The magic is not validated.
    /// Zero section or symbol counts are valid and produce empty
    /// sequences.
    ///
    /// Any access outside `data` aborts the parse with a [BoundsError];
    /// no partial result is ever returned.
    pub fn parse(
        data: &[u8],
        encoding: NameEncoding,
        byte_order: Endian,
    ) -> Result<Self, BoundsError> {
        let entry = get_range(data, 0, FILE_HEADER_SIZE as u64)?;
        let header: RawFileHeader =
            Cursor::new(entry)
                .read_type(byte_order)
                .map_err(|_| BoundsError {
                    offset: 0,
                    len: FILE_HEADER_SIZE as u64,
                    limit: data.len() as u64,
                })?;

        let strings = StringTable::read(data, header.string_table_offset(), byte_order)?;

        let section_table = header.section_table_offset();
        let mut sections = Vec::with_capacity(usize::from(header.num_sections));
        for index in 0..u64::from(header.num_sections) {
            let offset = section_table.saturating_add(index * SECTION_ENTRY_SIZE as u64);
            let entry = get_range(data, offset, SECTION_ENTRY_SIZE as u64)?;
            let raw: RawSectionEntry =
                Cursor::new(entry)
                    .read_type(byte_order)
                    .map_err(|_| BoundsError {
                        offset,
                        len: SECTION_ENTRY_SIZE as u64,
                        limit: data.len() as u64,
                    })?;
            sections.push(Section::from_raw(&raw, &strings, encoding)?);
        }

        let symbol_table = header.symbol_table_offset as u64;
        let total_slots = u64::from(header.num_symbols);
        let mut symbols = Vec::new();
        let mut slot = 0;
        while slot < total_slots {
            let offset = symbol_table.saturating_add(slot * SYMBOL_RECORD_SIZE as u64);
            let entry = get_range(data, offset, SYMBOL_RECORD_SIZE as u64)?;
            let raw: RawSymbolEntry =
                Cursor::new(entry)
                    .read_type(byte_order)
                    .map_err(|_| BoundsError {
                        offset,
                        len: SYMBOL_RECORD_SIZE as u64,
                        limit: data.len() as u64,
                    })?;

            // the trailing aux slots belong to this symbol and are never
            // visited as primaries
            let aux_offset = offset.saturating_add(SYMBOL_RECORD_SIZE as u64);
            let aux_bytes = get_range(
                data,
                aux_offset,
                u64::from(raw.num_aux) * SYMBOL_RECORD_SIZE as u64,
            )?;
            let mut aux = Vec::with_capacity(usize::from(raw.num_aux));
            for chunk in aux_bytes.chunks_exact(SYMBOL_RECORD_SIZE) {
                let mut record = [0; SYMBOL_RECORD_SIZE];
                record.copy_from_slice(chunk);
                aux.push(record);
            }

            slot += 1 + u64::from(raw.num_aux);
            symbols.push(Symbol::from_raw(&raw, aux, &strings, encoding, byte_order)?);
        }

        Ok(Self {
            magic: header.magic,
            timestamp: header.timestamp,
            flags: header.flags,
            sections,
            symbols,
        })
    }

    /// Returns the machine type magic, unvalidated (see [machine]).
    pub fn magic(&self) -> u16 {
        self.magic
    }

    /// Returns the creation timestamp in seconds since the Unix epoch.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Returns the creation timestamp as a UTC datetime.
    pub fn timestamp_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.timestamp), 0)
    }

    /// Returns the file header flags.
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Returns the sections in table order.
    pub fn sections(&self) -> &Vec<Section> {
        &self.sections
    }

    /// Returns the first section with the given name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Returns the primary symbols in table order. Consumed auxiliary
    /// slots never appear here; see [Symbol::aux_records].
    pub fn symbols(&self) -> &Vec<Symbol> {
        &self.symbols
    }

    /// Returns the names of symbols this object defines for other
    /// objects: external storage class, defined in one of this object's
    /// sections.
    pub fn exports(&self) -> Vec<String> {
        self.symbols
            .iter()
            .filter(|s| s.storage_class == storageclass::EXTERNAL && s.section_number > 0)
            .map(|s| s.name.clone())
            .collect()
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:<8} {:08X} {:>8} {:>8}",
            self.name, self.flags, self.raw_data_offset, self.size,
        )
    }
}

impl display::DisplayWithOptions for Section {}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "0x{:08X} {:>4} {:>4} {:>3} {:>3} {}",
            self.value,
            self.section_number,
            self.symbol_type,
            self.storage_class,
            self.aux.len(),
            self.name,
        )
    }
}

impl display::DisplayWithOptions for Symbol {
    fn fmt_with_options(&self, f: &mut fmt::Formatter, options: &display::Options) -> fmt::Result {
        fmt::Display::fmt(self, f)?;
        if matches!(options.data_format, display::DataFormat::Hex) {
            for record in &self.aux {
                write!(f, "\n   ")?;
                for byte in record {
                    write!(f, " {:02x}", byte)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for ParsedObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_with_options(f, &display::Options::default())
    }
}

impl display::DisplayWithOptions for ParsedObject {
    fn fmt_with_options(&self, f: &mut fmt::Formatter, options: &display::Options) -> fmt::Result {
        writeln!(
            f,
            "Header : COFF machine 0x{:04x} flags 0x{:04x}",
            self.magic, self.flags,
        )?;
        match self.timestamp_datetime() {
            Some(created) => writeln!(f, "Created: {}", created.format("%Y-%m-%d %H:%M:%S"))?,
            None => writeln!(f, "Created: -")?,
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:<8} {:<8} {:>8} {:>8}",
            "Name", "Flags", "RawData", "Size",
        )?;
        for section in &self.sections {
            section.fmt_with_options(f, options)?;
            writeln!(f)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:<10} {:>4} {:>4} {:>3} {:>3} {}",
            "Value", "Sect", "Type", "Cls", "Aux", "Name",
        )?;
        for symbol in &self.symbols {
            symbol.fmt_with_options(f, options)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use binrw::BinWriterExt;

    /// Builds a well-formed object buffer: header, optional header bytes,
    /// section entries, symbol slots (each primary followed by its aux
    /// records), then the string table with its size prefix. The header
    /// counts and offsets are derived from the layout.
    fn encode(
        byte_order: Endian,
        magic: u16,
        timestamp: u32,
        flags: u16,
        opt_header: &[u8],
        sections: &[RawSectionEntry],
        symbols: &[(RawSymbolEntry, Vec<AuxRecord>)],
        strings: &[u8],
    ) -> Vec<u8> {
        let num_slots: u32 = symbols.iter().map(|(_, aux)| 1 + aux.len() as u32).sum();
        let symbol_table_offset =
            FILE_HEADER_SIZE + opt_header.len() + SECTION_ENTRY_SIZE * sections.len();
        let header = RawFileHeader {
            magic,
            num_sections: sections.len() as u16,
            timestamp,
            symbol_table_offset: symbol_table_offset as i32,
            num_symbols: num_slots,
            optional_header_size: opt_header.len() as u16,
            flags,
        };

        let mut cursor = Cursor::new(Vec::new());
        cursor.write_type(&header, byte_order).unwrap();
        cursor.write_type(&opt_header.to_vec(), byte_order).unwrap();
        for section in sections {
            cursor.write_type(section, byte_order).unwrap();
        }
        for (symbol, aux) in symbols {
            cursor.write_type(symbol, byte_order).unwrap();
            for record in aux {
                cursor.write_type(record, byte_order).unwrap();
            }
        }
        cursor
            .write_type(&(4 + strings.len() as u32), byte_order)
            .unwrap();
        cursor.write_type(&strings.to_vec(), byte_order).unwrap();
        cursor.into_inner()
    }

    fn name8(name: &[u8]) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..name.len()].copy_from_slice(name);
        bytes
    }

    fn section_entry(
        name: [u8; 8],
        size: u32,
        raw_data_offset: u32,
        flags: u32,
    ) -> RawSectionEntry {
        RawSectionEntry {
            name,
            physical_address: 0,
            virtual_address: 0,
            size,
            raw_data_offset,
            reloc_offset: 0,
            line_num_offset: 0,
            num_relocs: 0,
            num_line_nums: 0,
            flags,
        }
    }

    fn symbol_entry(
        name: [u8; 8],
        value: u32,
        section_number: i16,
        storage_class: u8,
        num_aux: u8,
    ) -> RawSymbolEntry {
        RawSymbolEntry {
            name,
            value,
            section_number,
            symbol_type: 0,
            storage_class,
            num_aux,
        }
    }

    #[test]
    fn test_empty_object() {
        let data = encode(Endian::Little, 0xBEEF, 0, 0x0102, &[], &[], &[], &[]);
        assert_eq!(data.len(), 24);

        let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little).unwrap();
        // the magic is not validated, just passed through
        assert_eq!(parsed.magic(), 0xBEEF);
        assert_eq!(parsed.flags(), 0x0102);
        assert_eq!(parsed.sections().len(), 0);
        assert_eq!(parsed.symbols().len(), 0);
    }

    #[test]
    fn test_truncated_header() {
        let e = ParsedObject::parse(&[0u8; 19], NameEncoding::Latin1, Endian::Little)
            .expect_err("bounds error");
        assert_eq!(
            e,
            BoundsError {
                offset: 0,
                len: 20,
                limit: 19,
            }
        );
        assert_eq!(
            e.to_string(),
            "out-of-bounds read of 20 bytes at offset 0x0 (limit 0x13)",
        );
    }

    #[test]
    fn test_section_names() {
        // inline names occupy up to all 8 bytes; a `/` prefix references
        // the string table by decimal offset
        let strings = b"0123456789long_section_name\0";
        let sections = [
            section_entry(*b"abcdefgh", 0, 0, 0),
            section_entry(name8(b".text"), 0, 0, 0x20),
            section_entry(name8(b"/14"), 0, 0, 0),
            section_entry(name8(b"/0"), 0, 0, 0),
        ];
        let data = encode(
            Endian::Little,
            machine::I386,
            0,
            0,
            &[],
            &sections,
            &[],
            strings,
        );

        let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little).unwrap();
        assert_eq!(parsed.sections()[0].name(), "abcdefgh");
        assert_eq!(parsed.sections()[1].name(), ".text");
        assert_eq!(parsed.sections()[2].name(), "long_section_name");
        assert_eq!(parsed.sections()[3].name(), "");
        assert_eq!(parsed.section(".text").unwrap().flags(), 0x20);
        assert!(parsed.section(".data").is_none());
    }

    #[test]
    fn test_optional_header_is_skipped() {
        let sections = [section_entry(name8(b".data"), 0, 0, 0x40)];
        let data = encode(
            Endian::Little,
            machine::AMD64,
            0,
            0,
            &[0xAA; 28],
            &sections,
            &[],
            &[],
        );

        let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little).unwrap();
        assert_eq!(parsed.sections().len(), 1);
        assert_eq!(parsed.sections()[0].name(), ".data");
    }

    #[test]
    fn test_symbol_names() {
        // string table content starts at offset 4, so "myFunc" lands at 10
        let strings = b"012345myFunc\0";
        let symbols = [
            (symbol_entry(*b"abcdefgh", 0, 0, 0, 0), Vec::new()),
            (symbol_entry(name8(b"a"), 1, 0, 0, 0), Vec::new()),
            (
                symbol_entry([0, 0, 0, 0, 10, 0, 0, 0], 2, 0, 0, 0),
                Vec::new(),
            ),
            (symbol_entry([0; 8], 3, 0, 0, 0), Vec::new()),
        ];
        let data = encode(
            Endian::Little,
            machine::I386,
            0,
            0,
            &[],
            &[],
            &symbols,
            strings,
        );

        let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little).unwrap();
        let names: Vec<&str> = parsed.symbols().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["abcdefgh", "a", "myFunc", ""]);
    }

    #[test]
    fn test_aux_records_consumed() {
        let aux_a: AuxRecord = [0x11; SYMBOL_RECORD_SIZE];
        let aux_b: AuxRecord = [
            b'h', b'e', b'l', b'l', b'o', b'.', b'c', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ];
        let symbols = [
            (
                symbol_entry(
                    name8(b".file"),
                    0,
                    sectionnumber::DEBUG,
                    storageclass::FILE,
                    2,
                ),
                vec![aux_a, aux_b],
            ),
            (
                symbol_entry(name8(b"main"), 0x40, 1, storageclass::EXTERNAL, 0),
                Vec::new(),
            ),
        ];
        let data = encode(
            Endian::Little,
            machine::AMD64,
            0,
            0,
            &[],
            &[],
            &symbols,
            &[],
        );

        let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little).unwrap();
        // four slots, but only two primaries
        assert_eq!(parsed.symbols().len(), 2);

        let file = &parsed.symbols()[0];
        assert_eq!(file.name(), ".file");
        assert_eq!(file.section_number(), sectionnumber::DEBUG);
        assert_eq!(file.storage_class(), storageclass::FILE);
        assert_eq!(file.aux_records().len(), 2);
        assert_eq!(file.aux_records()[0], aux_a);
        assert_eq!(file.aux_records()[1], aux_b);

        let main = &parsed.symbols()[1];
        assert_eq!(main.name(), "main");
        assert_eq!(main.value(), 0x40);
        assert_eq!(main.aux_records().len(), 0);
    }

    #[test]
    fn test_section_data() {
        let payload = b"\xB8\x2A\x00\x00\x00\xC3";
        // the payload is appended after the string table; its offset is
        // header + one section entry + one empty string table
        let raw_data_offset = (FILE_HEADER_SIZE + SECTION_ENTRY_SIZE + 4) as u32;
        let sections = [section_entry(
            name8(b".text"),
            payload.len() as u32,
            raw_data_offset,
            0x20,
        )];
        let mut data = encode(
            Endian::Little,
            machine::I386,
            0,
            0,
            &[],
            &sections,
            &[],
            &[],
        );
        assert_eq!(data.len(), raw_data_offset as usize);
        data.extend_from_slice(payload);

        let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little).unwrap();
        let text = parsed.section(".text").unwrap();
        assert_eq!(text.data(&data).unwrap(), payload);

        // one byte short of the declared size
        data.truncate(data.len() - 1);
        let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little).unwrap();
        let e = parsed
            .section(".text")
            .unwrap()
            .data(&data)
            .expect_err("bounds error");
        assert_eq!(
            e,
            BoundsError {
                offset: u64::from(raw_data_offset),
                len: payload.len() as u64,
                limit: (raw_data_offset as usize + payload.len() - 1) as u64,
            }
        );
    }

    #[test]
    fn test_truncated_string_table() {
        let sections = [section_entry(name8(b".text"), 0, 0, 0)];
        let symbols = [(symbol_entry(name8(b"main"), 0, 1, 2, 0), Vec::new())];
        let data = encode(
            Endian::Little,
            machine::I386,
            0,
            0,
            &[],
            &sections,
            &symbols,
            b"abc\0",
        );

        // cutting into the table body
        let e = ParsedObject::parse(&data[..data.len() - 1], NameEncoding::Latin1, Endian::Little);
        assert!(e.is_err());

        // cutting into the size prefix
        let e = ParsedObject::parse(&data[..data.len() - 10], NameEncoding::Latin1, Endian::Little);
        assert!(e.is_err());
    }

    #[test]
    fn test_section_entry_out_of_range() {
        // a large optional header pushes the section table past the end
        // of the buffer while the symbol and string tables stay readable
        let mut data = Vec::new();
        data.extend_from_slice(&machine::I386.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes()); // num_sections
        data.extend_from_slice(&0u32.to_le_bytes()); // timestamp
        data.extend_from_slice(&20i32.to_le_bytes()); // symbol table offset
        data.extend_from_slice(&0u32.to_le_bytes()); // num_symbols
        data.extend_from_slice(&1000u16.to_le_bytes()); // optional header size
        data.extend_from_slice(&0u16.to_le_bytes()); // flags
        data.extend_from_slice(&4u32.to_le_bytes()); // string table

        let e = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little)
            .expect_err("bounds error");
        assert_eq!(
            e,
            BoundsError {
                offset: 1020,
                len: 40,
                limit: 24,
            }
        );
    }

    #[test]
    fn test_aux_overrun() {
        let symbols = [(symbol_entry(name8(b"main"), 0, 1, 2, 0), Vec::new())];
        let mut data = encode(
            Endian::Little,
            machine::I386,
            0,
            0,
            &[],
            &[],
            &symbols,
            &[],
        );
        // claim far more aux records than the table holds
        data[FILE_HEADER_SIZE + 17] = 200;

        let e = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little);
        assert!(e.is_err());
    }

    #[test]
    fn test_symbol_table_out_of_range() {
        let mut data = encode(Endian::Little, machine::I386, 0, 0, &[], &[], &[], &[]);
        data[8..12].copy_from_slice(&5000i32.to_le_bytes());
        data[12..16].copy_from_slice(&1u32.to_le_bytes());

        let e = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little);
        assert!(e.is_err());
    }

    #[test]
    fn test_negative_symbol_table_offset() {
        // symptr is signed on disk; a negative value can never resolve to
        // a readable table
        let mut data = encode(Endian::Little, machine::I386, 0, 0, &[], &[], &[], &[]);
        data[8..12].copy_from_slice(&(-1i32).to_le_bytes());

        let e = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little);
        assert!(e.is_err());
    }

    #[test]
    fn test_string_reference_out_of_range() {
        let symbols = [(
            symbol_entry([0, 0, 0, 0, 200, 0, 0, 0], 0, 0, 0, 0),
            Vec::new(),
        )];
        let data = encode(
            Endian::Little,
            machine::I386,
            0,
            0,
            &[],
            &[],
            &symbols,
            b"xy\0",
        );

        let e = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little);
        assert!(e.is_err());
    }

    #[test]
    fn test_big_endian() {
        // content offsets: ".debug$X" run starts at table offset 14,
        // "myFunc" at table offset 34
        let strings = b"0123456789long_section_name\0\0\0myFunc\0";
        let sections = [section_entry(name8(b"/14"), 0, 0, 0x80)];
        let symbols = [(
            symbol_entry([0, 0, 0, 0, 0, 0, 0, 34], 0x0102_0304, 1, 2, 0),
            Vec::new(),
        )];

        let data = encode(
            Endian::Big,
            machine::R3000,
            0x0506_0708,
            0x0100,
            &[],
            &sections,
            &symbols,
            strings,
        );

        let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Big).unwrap();
        assert_eq!(parsed.magic(), machine::R3000);
        assert_eq!(parsed.timestamp(), 0x0506_0708);
        assert_eq!(parsed.flags(), 0x0100);
        assert_eq!(parsed.sections()[0].name(), "long_section_name");
        // the string reference at name bytes 4..8 honors the byte order
        assert_eq!(parsed.symbols()[0].name(), "myFunc");
        assert_eq!(parsed.symbols()[0].value(), 0x0102_0304);

        // the same buffer read with the wrong byte order decodes counts
        // as huge values and fails the parse instead of misreading
        let e = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little);
        assert!(e.is_err());
    }

    #[test]
    fn test_roundtrip_both_orders() {
        let strings = b"012345myFunc\0";
        for byte_order in [Endian::Little, Endian::Big] {
            let sections = [
                section_entry(name8(b".text"), 0, 0x100, 0x20),
                section_entry(*b"abcdefgh", 0x80, 0x200, 0x40),
            ];
            let symbols = [
                (
                    symbol_entry(
                        name8(b".file"),
                        0,
                        sectionnumber::DEBUG,
                        storageclass::FILE,
                        1,
                    ),
                    vec![[0x33; SYMBOL_RECORD_SIZE]],
                ),
                (
                    symbol_entry(name8(b"start"), 0x10, 1, storageclass::EXTERNAL, 0),
                    Vec::new(),
                ),
            ];
            let data = encode(
                byte_order,
                machine::AMD64,
                1_000_000_000,
                0x0004,
                &[],
                &sections,
                &symbols,
                strings,
            );

            let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, byte_order).unwrap();
            assert_eq!(parsed.magic(), machine::AMD64);
            assert_eq!(parsed.timestamp(), 1_000_000_000);
            assert_eq!(parsed.flags(), 0x0004);
            assert_eq!(parsed.sections().len(), 2);
            assert_eq!(parsed.sections()[0].name(), ".text");
            assert_eq!(parsed.sections()[0].raw_data_offset(), 0x100);
            assert_eq!(parsed.sections()[1].name(), "abcdefgh");
            assert_eq!(parsed.sections()[1].physical_address(), 0x80);
            assert_eq!(parsed.symbols().len(), 2);
            assert_eq!(parsed.symbols()[0].aux_records(), &vec![[0x33; 18]]);
            assert_eq!(parsed.symbols()[1].name(), "start");
            assert_eq!(parsed.exports(), ["start"]);
        }
    }

    #[test]
    fn test_name_encodings() {
        // 0xE9 is é in latin-1 and an invalid sequence in UTF-8
        let symbols = [(symbol_entry(name8(b"caf\xE9"), 0, 0, 0, 0), Vec::new())];
        let data = encode(
            Endian::Little,
            machine::I386,
            0,
            0,
            &[],
            &[],
            &symbols,
            &[],
        );

        let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little).unwrap();
        assert_eq!(parsed.symbols()[0].name(), "café");

        let parsed = ParsedObject::parse(&data, NameEncoding::Utf8, Endian::Little).unwrap();
        assert_eq!(parsed.symbols()[0].name(), "caf\u{FFFD}");
    }

    #[test]
    fn test_timestamp_datetime() {
        let data = encode(
            Endian::Little,
            machine::AMD64,
            1_000_000_000,
            0,
            &[],
            &[],
            &[],
            &[],
        );
        let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little).unwrap();
        let created = parsed.timestamp_datetime().expect("datetime");
        assert_eq!(
            created.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2001-09-09 01:46:40",
        );
    }

    #[test]
    fn test_display_listing() {
        let sections = [section_entry(name8(b".text"), 6, 0x200, 0x2060_0020)];
        let symbols = [(
            symbol_entry(name8(b"main"), 0x40, 1, storageclass::EXTERNAL, 0),
            Vec::new(),
        )];
        let data = encode(
            Endian::Little,
            machine::AMD64,
            1_000_000_000,
            0x0004,
            &[],
            &sections,
            &symbols,
            &[],
        );

        let parsed = ParsedObject::parse(&data, NameEncoding::Latin1, Endian::Little).unwrap();
        assert_eq!(
            parsed.to_string(),
            "Header : COFF machine 0x8664 flags 0x0004\n\
             Created: 2001-09-09 01:46:40\n\
             \n\
             Name     Flags     RawData     Size\n\
             .text    20600020      512        6\n\
             \n\
             Value      Sect Type Cls Aux Name\n\
             0x00000040    1    0   2   0 main\n",
        );
    }
}
