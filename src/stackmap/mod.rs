//! Decoder for the code emitter's stack-map section.
//!
//! Every patch point and safepoint emitted by the builder leaves a [`Record`] in the binary
//! stack-map section produced by the backend: the patch id it was emitted with, its offset in the
//! machine code, and where each recorded value ended up ([`Location`]). The patch stage reads the
//! section with [`StackMaps::parse`], groups records by code offset with
//! [`StackMaps::compute_record_map`] and pairs them with the builder's bookkeeping through
//! [`info::StackMapInfoMap::join`].
//!
//! # Format
//!
//! All fields are little-endian. Versions 0 to 3 are accepted.
//!
//! ```text
//! Header     version:u8 reserved:u8 reserved:u16 num_functions:u32
//!            [v1+] num_constants:u32 num_records:u32
//! StackSize  v0: offset:u32 size:u32
//!            v1, v2: offset:ptr size:u64        v3: offset:ptr size:u64 call_sites:u64
//! [v0]       num_constants:u32
//! Constant   value:i64
//! [v0]       num_records:u32
//! Record     id:i64 offset:u32 flags:u16 num_locations:u16 Location*
//!            [v1+ align 8] padding:u16 num_live_outs:u16 LiveOut* [v1+ align 8]
//! Location   kind:u8 reserved:u8 size:u16 dwarf_reg:u16 reserved:u16 offset:i32
//! LiveOut    dwarf_reg:u16 reserved:u8 size:u8
//! ```
//!
//! A record id that is negative or does not fit 32 bits is the backend's way of reporting that
//! it gave up on the function; it is surfaced as [`crate::Error::BackendFailure`].
//!
//! # Examples
//!
//! ```rust
//! use jitlower::stackmap::StackMaps;
//!
//! let mut section = vec![1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
//! section.extend_from_slice(&0_u64.to_le_bytes());
//! section.extend_from_slice(&64_u64.to_le_bytes());
//!
//! let maps = StackMaps::parse(&section)?;
//! assert_eq!(maps.stack_size()?, 64);
//! assert!(maps.records().is_empty());
//! # Ok::<(), jitlower::Error>(())
//! ```

pub mod info;
mod record;

pub use record::{LiveOut, Location, LocationKind, Record, RegisterSet, StackSize};

use std::{collections::BTreeMap, fmt, path::Path};

use tracing::{debug, warn};

use crate::{
    file::{parser::Parser, Input, Memory, Physical},
    Error, Result,
};

/// Highest format version the decoder understands.
pub const MAX_VERSION: u8 = 3;

/// Byte order of the section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Little-endian; the only supported order
    #[default]
    Little,
    /// Big-endian
    Big,
}

/// Target properties the format depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Width of pointer-sized fields, 4 or 8
    pub pointer_width: usize,
    /// Byte order of the section
    pub endianness: Endianness,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            pointer_width: 8,
            endianness: Endianness::Little,
        }
    }
}

/// A decoded stack-map section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMaps {
    version: u8,
    stack_sizes: Vec<StackSize>,
    constants: Vec<i64>,
    records: Vec<Record>,
}

impl StackMaps {
    /// Decodes a section for a 64-bit little-endian target.
    ///
    /// # Errors
    ///
    /// See [`StackMaps::parse_with`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with(data, ParseOptions::default())
    }

    /// Decodes a section with explicit target options.
    ///
    /// # Errors
    ///
    /// - [`Error::Empty`] for an empty section
    /// - [`Error::NotSupported`] for big-endian targets, unknown pointer widths and versions
    ///   above [`MAX_VERSION`]
    /// - [`Error::BackendFailure`] if a record carries a negative or oversized patch id
    /// - [`Error::Malformed`] for unknown location kinds
    /// - [`Error::OutOfBounds`] if the section is truncated
    pub fn parse_with(data: &[u8], options: ParseOptions) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::Empty);
        }
        if options.endianness == Endianness::Big {
            return Err(Error::NotSupported);
        }
        if options.pointer_width != 4 && options.pointer_width != 8 {
            return Err(Error::NotSupported);
        }

        let mut parser = Parser::new(data);
        let version = parser.read_le::<u8>()?;
        if version > MAX_VERSION {
            return Err(Error::NotSupported);
        }
        parser.advance_by(3)?;

        let function_count = parser.read_le::<u32>()?;
        let mut constant_count = 0;
        let mut record_count = 0;
        if version >= 1 {
            constant_count = parser.read_le::<u32>()?;
            record_count = parser.read_le::<u32>()?;
        }

        let mut stack_sizes = Vec::new();
        for _ in 0..function_count {
            stack_sizes.push(StackSize::read(&mut parser, version, options.pointer_width)?);
        }

        if version == 0 {
            constant_count = parser.read_le::<u32>()?;
        }
        let mut constants = Vec::new();
        for _ in 0..constant_count {
            constants.push(parser.read_le::<i64>()?);
        }

        if version == 0 {
            record_count = parser.read_le::<u32>()?;
        }
        let mut records = Vec::new();
        for _ in 0..record_count {
            records.push(Record::read(&mut parser, version)?);
        }

        debug!(
            version,
            functions = stack_sizes.len(),
            constants = constants.len(),
            records = records.len(),
            "decoded stack maps"
        );

        Ok(StackMaps {
            version,
            stack_sizes,
            constants,
            records,
        })
    }

    /// Decodes a section handed over as an owned buffer.
    ///
    /// # Errors
    ///
    /// See [`StackMaps::parse_with`].
    pub fn from_mem(data: Vec<u8>, options: ParseOptions) -> Result<Self> {
        let input = Memory::new(data);
        Self::parse_with(input.data(), options)
    }

    /// Maps a section dumped to disk and decodes it.
    ///
    /// # Errors
    ///
    /// [`Error::FileError`] if the file cannot be opened, otherwise see
    /// [`StackMaps::parse_with`].
    pub fn from_file(path: impl AsRef<Path>, options: ParseOptions) -> Result<Self> {
        let input = Physical::new(path)?;
        Self::parse_with(input.data(), options)
    }

    /// Format version of the section.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Frame sizes, one per function.
    #[must_use]
    pub fn stack_sizes(&self) -> &[StackSize] {
        &self.stack_sizes
    }

    /// The constant pool.
    #[must_use]
    pub fn constants(&self) -> &[i64] {
        &self.constants
    }

    /// Records in section order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Frame size of the only function in the section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] unless the section describes exactly one function.
    pub fn stack_size(&self) -> Result<u64> {
        match self.stack_sizes.as_slice() {
            [only] => Ok(only.size),
            sizes => Err(malformed_error!(
                "expected exactly one stack size, found {}",
                sizes.len()
            )),
        }
    }

    /// Groups records by instruction offset.
    #[must_use]
    pub fn compute_record_map(&self) -> RecordMap<'_> {
        let mut map: BTreeMap<u32, Vec<&Record>> = BTreeMap::new();
        for record in &self.records {
            map.entry(record.instruction_offset)
                .or_default()
                .push(record);
        }
        for (offset, records) in &map {
            if records.len() > 1 {
                warn!(
                    offset,
                    count = records.len(),
                    "several stack map records share one instruction offset"
                );
            }
        }
        RecordMap { map }
    }
}

/// Records grouped by instruction offset, in ascending offset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMap<'a> {
    map: BTreeMap<u32, Vec<&'a Record>>,
}

impl<'a> RecordMap<'a> {
    /// Records at `offset`.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<&[&'a Record]> {
        self.map.get(&offset).map(Vec::as_slice)
    }

    /// The single record at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if there is no record or more than one at `offset`.
    pub fn record_at(&self, offset: u32) -> Result<&'a Record> {
        match self.get(offset) {
            Some([record]) => Ok(*record),
            Some(records) => Err(malformed_error!(
                "{} records at offset {}",
                records.len(),
                offset
            )),
            None => Err(malformed_error!("no record at offset {}", offset)),
        }
    }

    /// Number of distinct offsets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Offsets and their records in ascending offset order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[&'a Record])> + '_ {
        self.map
            .iter()
            .map(|(offset, records)| (*offset, records.as_slice()))
    }
}

impl fmt::Display for RecordMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in self.map.values().flatten() {
            writeln!(f, "Patchpoint ID: {}", record.patch_id)?;
            writeln!(f, "Instruction Offset: {}", record.instruction_offset)?;
            for location in &record.locations {
                writeln!(f, "Location: {}", location.kind)?;
                writeln!(f, "Size: {}", location.size)?;
                writeln!(f, "Reg: {}", location.dwarf_register)?;
                writeln!(f, "Offset: {}", location.offset)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::StackMapBuilder;

    #[test]
    fn test_single_record_section() {
        let data = StackMapBuilder::new(1)
            .stack_size(0, 64)
            .record(7, 40)
            .location(3, 8, 11, -16)
            .build();
        assert_eq!(data.len(), 72);

        let maps = StackMaps::parse(&data).unwrap();
        assert_eq!(maps.version(), 1);
        assert_eq!(maps.stack_size().unwrap(), 64);
        assert!(maps.constants().is_empty());

        let record = &maps.records()[0];
        assert_eq!(record.patch_id, 7);
        assert_eq!(record.instruction_offset, 40);
        assert_eq!(
            record.locations,
            vec![Location {
                kind: LocationKind::Indirect,
                size: 8,
                dwarf_register: 11,
                offset: -16,
            }]
        );
        assert!(record.live_outs.is_empty());

        let map = maps.compute_record_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map.record_at(40).unwrap().patch_id, 7);
        assert!(map.record_at(44).is_err());
    }

    #[test]
    fn test_version_zero_layout() {
        let data = StackMapBuilder::new(0)
            .stack_size(0x100, 32)
            .constant(-5)
            .record(3, 12)
            .location(1, 8, 0, 0)
            .live_out(6, 8)
            .build();

        let maps = StackMaps::parse(&data).unwrap();
        assert_eq!(maps.constants(), &[-5]);
        assert_eq!(maps.stack_sizes()[0].function_offset, 0x100);
        let record = &maps.records()[0];
        assert_eq!(record.live_outs, vec![LiveOut { dwarf_register: 6, size: 8 }]);
        assert_eq!(record.used_register_set().iter().collect::<Vec<_>>(), vec![0, 6]);
    }

    #[test]
    fn test_version_three_stack_sizes() {
        let data = StackMapBuilder::new(3)
            .stack_size(0, 16)
            .record(0, 4)
            .record(1, 8)
            .build();
        let maps = StackMaps::parse(&data).unwrap();
        assert_eq!(maps.stack_sizes()[0].call_site_count, Some(2));
        assert_eq!(maps.records().len(), 2);
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(StackMaps::parse(&[]), Err(Error::Empty)));
        assert!(matches!(
            StackMaps::parse(&[4, 0, 0, 0, 0, 0, 0, 0]),
            Err(Error::NotSupported)
        ));
        assert!(matches!(
            StackMaps::parse(&[1, 0, 0]),
            Err(Error::OutOfBounds)
        ));

        let data = StackMapBuilder::new(1).stack_size(0, 8).build();
        let options = ParseOptions {
            endianness: Endianness::Big,
            ..ParseOptions::default()
        };
        assert!(matches!(
            StackMaps::parse_with(&data, options),
            Err(Error::NotSupported)
        ));
    }

    #[test]
    fn test_backend_failure() {
        let data = StackMapBuilder::new(1)
            .stack_size(0, 8)
            .record(-1, 0)
            .build();
        assert!(matches!(
            StackMaps::parse(&data),
            Err(Error::BackendFailure(-1))
        ));
    }

    #[test]
    fn test_stack_size_requires_one_function() {
        let data = StackMapBuilder::new(1)
            .stack_size(0, 8)
            .stack_size(8, 16)
            .build();
        let maps = StackMaps::parse(&data).unwrap();
        assert!(maps.stack_size().is_err());
    }

    #[test]
    fn test_record_map_dump() {
        let data = StackMapBuilder::new(1)
            .stack_size(0, 64)
            .record(7, 40)
            .location(3, 8, 11, -16)
            .build();
        let maps = StackMaps::from_mem(data, ParseOptions::default()).unwrap();
        let dump = maps.compute_record_map().to_string();
        assert_eq!(
            dump,
            "Patchpoint ID: 7\nInstruction Offset: 40\nLocation: Indirect\nSize: 8\nReg: 11\nOffset: -16\n"
        );
    }
}
