//! Entries of the stack-map section.

use std::fmt;

use strum::IntoStaticStr;

use crate::{file::parser::Parser, Error, Result};

/// How a location's value can be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum LocationKind {
    /// Placeholder the backend never filled in
    Unprocessed,
    /// Held in `dwarf_register`
    Register,
    /// The address `dwarf_register + offset`
    Direct,
    /// Spilled at `[dwarf_register + offset]`
    Indirect,
    /// The constant `offset`
    Constant,
    /// Entry `offset` of the constant pool
    ConstantIndex,
}

impl TryFrom<u8> for LocationKind {
    type Error = Error;

    fn try_from(kind: u8) -> Result<Self> {
        Ok(match kind {
            0 => LocationKind::Unprocessed,
            1 => LocationKind::Register,
            2 => LocationKind::Direct,
            3 => LocationKind::Indirect,
            4 => LocationKind::Constant,
            5 => LocationKind::ConstantIndex,
            _ => return Err(malformed_error!("unknown location kind {}", kind)),
        })
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.into();
        f.write_str(name)
    }
}

/// Where one recorded value lives at the patch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    /// Recovery method
    pub kind: LocationKind,
    /// Size of the value in bytes
    pub size: u16,
    /// DWARF register number
    pub dwarf_register: u16,
    /// Byte offset or constant, depending on `kind`
    pub offset: i32,
}

impl Location {
    pub(crate) fn read(parser: &mut Parser<'_>) -> Result<Self> {
        let kind = LocationKind::try_from(parser.read_le::<u8>()?)?;
        parser.advance_by(1)?;
        let size = parser.read_le::<u16>()?;
        let dwarf_register = parser.read_le::<u16>()?;
        parser.advance_by(2)?;
        let offset = parser.read_le::<i32>()?;
        Ok(Location {
            kind,
            size,
            dwarf_register,
            offset,
        })
    }
}

/// A register live across the patch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LiveOut {
    /// DWARF register number
    pub dwarf_register: u16,
    /// Bytes of the register that are live
    pub size: u8,
}

impl LiveOut {
    pub(crate) fn read(parser: &mut Parser<'_>) -> Result<Self> {
        let dwarf_register = parser.read_le::<u16>()?;
        parser.advance_by(1)?;
        let size = parser.read_le::<u8>()?;
        Ok(LiveOut {
            dwarf_register,
            size,
        })
    }
}

/// Frame size of one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackSize {
    /// Address of the function
    pub function_offset: u64,
    /// Frame size in bytes
    pub size: u64,
    /// Number of records belonging to the function; only present from version 3 on
    pub call_site_count: Option<u64>,
}

impl StackSize {
    pub(crate) fn read(parser: &mut Parser<'_>, version: u8, pointer_width: usize) -> Result<Self> {
        if version == 0 {
            return Ok(StackSize {
                function_offset: u64::from(parser.read_le::<u32>()?),
                size: u64::from(parser.read_le::<u32>()?),
                call_site_count: None,
            });
        }

        let function_offset = parser.read_le_sized(pointer_width)?;
        let size = parser.read_le::<u64>()?;
        let call_site_count = if version >= 3 {
            Some(parser.read_le::<u64>()?)
        } else {
            None
        };
        Ok(StackSize {
            function_offset,
            size,
            call_site_count,
        })
    }
}

/// A set of DWARF register numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RegisterSet {
    registers: Vec<u16>,
}

impl RegisterSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `register`; returns whether it was new.
    pub fn insert(&mut self, register: u16) -> bool {
        match self.registers.binary_search(&register) {
            Ok(_) => false,
            Err(position) => {
                self.registers.insert(position, register);
                true
            }
        }
    }

    /// Whether `register` is in the set.
    #[must_use]
    pub fn contains(&self, register: u16) -> bool {
        self.registers.binary_search(&register).is_ok()
    }

    /// Adds every register of `other`.
    pub fn union_with(&mut self, other: &RegisterSet) {
        for &register in &other.registers {
            self.insert(register);
        }
    }

    /// Registers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.registers.iter().copied()
    }

    /// Number of registers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

impl FromIterator<u16> for RegisterSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut set = RegisterSet::new();
        for register in iter {
            set.insert(register);
        }
        set
    }
}

/// One patch point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Id the patch point was emitted with
    pub patch_id: u32,
    /// Offset of the patch point from the function start
    pub instruction_offset: u32,
    /// Record flags, unused by this backend
    pub flags: u16,
    /// Recorded values in operand order
    pub locations: Vec<Location>,
    /// Registers live across the patch point
    pub live_outs: Vec<LiveOut>,
}

impl Record {
    pub(crate) fn read(parser: &mut Parser<'_>, version: u8) -> Result<Self> {
        let id = parser.read_le::<i64>()?;
        let patch_id = i32::try_from(id)
            .ok()
            .and_then(|id| u32::try_from(id).ok())
            .ok_or(Error::BackendFailure(id))?;

        let instruction_offset = parser.read_le::<u32>()?;
        let flags = parser.read_le::<u16>()?;

        let location_count = parser.read_le::<u16>()?;
        let mut locations = Vec::with_capacity(usize::from(location_count).min(parser.remaining() / 12));
        for _ in 0..location_count {
            locations.push(Location::read(parser)?);
        }
        if version >= 1 {
            parser.align(8)?;
        }

        parser.advance_by(2)?;
        let live_out_count = parser.read_le::<u16>()?;
        let mut live_outs = Vec::with_capacity(usize::from(live_out_count).min(parser.remaining() / 4));
        for _ in 0..live_out_count {
            live_outs.push(LiveOut::read(parser)?);
        }
        if version >= 1 {
            parser.align(8)?;
        }

        Ok(Record {
            patch_id,
            instruction_offset,
            flags,
            locations,
            live_outs,
        })
    }

    /// Registers referenced by the record's locations.
    #[must_use]
    pub fn location_set(&self) -> RegisterSet {
        self.locations
            .iter()
            .map(|location| location.dwarf_register)
            .collect()
    }

    /// Registers live across the patch point.
    #[must_use]
    pub fn live_out_set(&self) -> RegisterSet {
        self.live_outs
            .iter()
            .map(|live_out| live_out.dwarf_register)
            .collect()
    }

    /// Union of [`Record::location_set`] and [`Record::live_out_set`].
    #[must_use]
    pub fn used_register_set(&self) -> RegisterSet {
        let mut used = self.location_set();
        used.union_with(&self.live_out_set());
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_read() {
        let data = [3, 0, 8, 0, 11, 0, 0, 0, 0xF0, 0xFF, 0xFF, 0xFF];
        let mut parser = Parser::new(&data);
        let location = Location::read(&mut parser).unwrap();
        assert_eq!(location.kind, LocationKind::Indirect);
        assert_eq!(location.size, 8);
        assert_eq!(location.dwarf_register, 11);
        assert_eq!(location.offset, -16);
        assert_eq!(parser.pos(), 12);
    }

    #[test]
    fn test_unknown_location_kind() {
        let data = [9, 0, 8, 0, 11, 0, 0, 0, 0, 0, 0, 0];
        let mut parser = Parser::new(&data);
        assert!(matches!(
            Location::read(&mut parser),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_stack_size_versions() {
        let data = [0x10, 0, 0, 0, 0x40, 0, 0, 0];
        let v0 = StackSize::read(&mut Parser::new(&data), 0, 8).unwrap();
        assert_eq!((v0.function_offset, v0.size, v0.call_site_count), (0x10, 0x40, None));

        let mut data = vec![0u8; 24];
        data[8] = 0x20;
        data[16] = 3;
        let v3 = StackSize::read(&mut Parser::new(&data), 3, 8).unwrap();
        assert_eq!(v3.size, 0x20);
        assert_eq!(v3.call_site_count, Some(3));

        let data = [0u8; 12];
        let narrow = StackSize::read(&mut Parser::new(&data), 1, 4).unwrap();
        assert_eq!(narrow.function_offset, 0);
    }

    #[test]
    fn test_negative_patch_id() {
        let mut data = vec![0u8; 24];
        data[..8].copy_from_slice(&(-1_i64).to_le_bytes());
        assert!(matches!(
            Record::read(&mut Parser::new(&data), 1),
            Err(Error::BackendFailure(-1))
        ));

        data[..8].copy_from_slice(&(i64::from(i32::MAX) + 1).to_le_bytes());
        assert!(matches!(
            Record::read(&mut Parser::new(&data), 1),
            Err(Error::BackendFailure(_))
        ));
    }

    #[test]
    fn test_register_sets() {
        let record = Record {
            patch_id: 1,
            instruction_offset: 0,
            flags: 0,
            locations: vec![
                Location {
                    kind: LocationKind::Register,
                    size: 8,
                    dwarf_register: 3,
                    offset: 0,
                },
                Location {
                    kind: LocationKind::Indirect,
                    size: 8,
                    dwarf_register: 11,
                    offset: -8,
                },
            ],
            live_outs: vec![
                LiveOut {
                    dwarf_register: 3,
                    size: 8,
                },
                LiveOut {
                    dwarf_register: 5,
                    size: 8,
                },
            ],
        };
        assert_eq!(record.location_set().iter().collect::<Vec<_>>(), vec![3, 11]);
        assert_eq!(record.live_out_set().len(), 2);
        assert_eq!(
            record.used_register_set().iter().collect::<Vec<_>>(),
            vec![3, 5, 11]
        );
    }
}
