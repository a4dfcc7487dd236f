//! Decoding hand-assembled stack-map sections.

use jitlower::{
    stackmap::{
        info::{CallInfo, CallKind, StackMapInfo, StackMapInfoMap},
        LocationKind, ParseOptions, StackMaps,
    },
    Error,
};

/// Little-endian section writer; `align` pads to 8 bytes as versions 1 and up require.
#[derive(Default)]
struct Section(Vec<u8>);

impl Section {
    fn u8(mut self, value: u8) -> Self {
        self.0.push(value);
        self
    }

    fn u16(mut self, value: u16) -> Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn u32(mut self, value: u32) -> Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn u64(mut self, value: u64) -> Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn i32(mut self, value: i32) -> Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn i64(mut self, value: i64) -> Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn align(mut self) -> Self {
        while self.0.len() % 8 != 0 {
            self.0.push(0);
        }
        self
    }

    fn header(self, version: u8) -> Self {
        self.u8(version).u8(0).u16(0)
    }

    fn indirect(self, register: u16, offset: i32) -> Self {
        self.u8(3).u8(0).u16(8).u16(register).u16(0).i32(offset)
    }
}

/// One function with a 64-byte frame and a single record: patch id 7 at offset 40, one spill slot.
fn version_one(patch_id: i64) -> Vec<u8> {
    Section::default()
        .header(1)
        .u32(1)
        .u32(0)
        .u32(1)
        .u64(0)
        .u64(64)
        .i64(patch_id)
        .u32(40)
        .u16(0)
        .u16(1)
        .indirect(11, -16)
        .align()
        .u16(0)
        .u16(0)
        .align()
        .0
}

#[test]
fn version_one_section() {
    let data = version_one(7);
    assert_eq!(data.len(), 72);

    let maps = StackMaps::parse(&data).unwrap();
    assert_eq!(maps.version(), 1);
    assert_eq!(maps.stack_size().unwrap(), 64);
    assert!(maps.constants().is_empty());

    let records = maps.compute_record_map();
    let record = records.record_at(40).unwrap();
    assert_eq!(record.patch_id, 7);
    assert_eq!(record.locations.len(), 1);
    assert_eq!(record.locations[0].kind, LocationKind::Indirect);
    assert_eq!(record.locations[0].size, 8);
    assert_eq!(record.locations[0].dwarf_register, 11);
    assert_eq!(record.locations[0].offset, -16);
    assert!(records.record_at(44).is_err());
}

#[test]
fn version_zero_has_counts_before_each_table() {
    let data = Section::default()
        .header(0)
        .u32(1)
        .u32(0x100)
        .u32(32)
        .u32(1)
        .i64(-8)
        .u32(1)
        .i64(3)
        .u32(12)
        .u16(0)
        .u16(0)
        .u16(0)
        .u16(1)
        .u16(6)
        .u8(0)
        .u8(8)
        .0;

    let maps = StackMaps::parse(&data).unwrap();
    assert_eq!(maps.version(), 0);
    assert_eq!(maps.stack_sizes()[0].function_offset, 0x100);
    assert_eq!(maps.stack_sizes()[0].call_site_count, None);
    assert_eq!(maps.constants(), &[-8]);
    assert_eq!(maps.records()[0].live_outs[0].dwarf_register, 6);
}

#[test]
fn version_three_counts_call_sites() {
    let data = Section::default()
        .header(3)
        .u32(1)
        .u32(0)
        .u32(2)
        .u64(0)
        .u64(48)
        .u64(2)
        .i64(0)
        .u32(8)
        .u16(0)
        .u16(0)
        .align()
        .u16(0)
        .u16(0)
        .align()
        .i64(1)
        .u32(8)
        .u16(0)
        .u16(0)
        .align()
        .u16(0)
        .u16(0)
        .align()
        .0;

    let maps = StackMaps::parse(&data).unwrap();
    assert_eq!(maps.stack_sizes()[0].call_site_count, Some(2));

    let records = maps.compute_record_map();
    assert_eq!(records.len(), 1);
    assert_eq!(records.get(8).map(<[_]>::len), Some(2));
    assert!(records.record_at(8).is_err());
}

#[test]
fn negative_patch_id_reports_a_backend_failure() {
    let data = version_one(-1);
    assert!(matches!(
        StackMaps::parse(&data),
        Err(Error::BackendFailure(-1))
    ));
}

#[test]
fn empty_and_unknown_sections_are_rejected() {
    assert!(matches!(StackMaps::parse(&[]), Err(Error::Empty)));
    assert!(matches!(
        StackMaps::parse(&[4, 0, 0, 0]),
        Err(Error::NotSupported)
    ));
    assert!(matches!(
        StackMaps::parse(&version_one(7)[..50]),
        Err(Error::OutOfBounds)
    ));
}

#[test]
fn section_from_file() {
    let path = std::env::temp_dir().join(format!("jitlower-stackmaps-{}.bin", std::process::id()));
    std::fs::write(&path, version_one(7)).unwrap();

    let maps = StackMaps::from_file(&path, ParseOptions::default());
    let _ = std::fs::remove_file(&path);
    assert_eq!(maps.unwrap().records()[0].instruction_offset, 40);

    assert!(matches!(
        StackMaps::from_file(std::env::temp_dir().join("jitlower-missing.bin"), ParseOptions::default()),
        Err(Error::FileError(_))
    ));
}

#[test]
fn join_pairs_records_with_sites() {
    let maps = StackMaps::parse(&version_one(7)).unwrap();

    let mut info = StackMapInfoMap::new();
    info.insert(
        7,
        StackMapInfo::Call(CallInfo {
            locations: vec![1],
            kind: CallKind::Call,
            return_count: 1,
        }),
    )
    .unwrap();
    info.insert(8, StackMapInfo::StoreBarrier).unwrap();

    let sites = info.join(&maps).unwrap();
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].record.instruction_offset, 40);
    assert!(matches!(sites[0].info, StackMapInfo::Call(_)));

    let unrelated = StackMapInfoMap::new();
    assert!(unrelated.join(&maps).is_err());
}
