//! Placeholder constants for the patch stage.
//!
//! Heap objects, external references and code targets are not known as raw bits while the
//! function is lowered. The builder emits a `load_constant` of a magic number instead and
//! records what kind of object the magic stands for; the patch stage looks the kind up when it
//! finds the magic in the emitted code.

use std::collections::HashMap;

use strum::IntoStaticStr;

use crate::Result;

/// Magic reserved for the isolate's external reference, used by store barriers.
pub const ISOLATE_EXTERNAL_REFERENCE_MAGIC: u64 = u64::MAX - 1;

/// Magic reserved for the record-write stub, used by store barriers.
pub const RECORD_STUB_CODE_MAGIC: u64 = u64::MAX - 2;

/// What a magic constant stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum ConstantKind {
    /// Address outside the collected heap
    ExternalReference,
    /// Object in the collected heap
    HeapConstant,
    /// Code object used as call target
    CodeConstant,
    /// The isolate itself
    IsolateExternalReference,
    /// The write barrier stub
    RecordStubCode,
}

/// Map from magic number to constant kind, filled while lowering one function.
#[derive(Debug, Default, Clone)]
pub struct ConstantRecorder {
    map: HashMap<u64, ConstantKind>,
}

impl ConstantRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `magic` stands for a `kind` object. Recording the same pair twice is fine.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ScheduleDefect`] if `magic` was recorded with another kind.
    pub fn register(&mut self, magic: u64, kind: ConstantKind) -> Result<()> {
        match self.map.insert(magic, kind) {
            Some(previous) if previous != kind => Err(schedule_defect!(
                "magic {:#x} used as {:?} and {:?}",
                magic,
                previous,
                kind
            )),
            _ => Ok(()),
        }
    }

    /// Kind recorded for `magic`.
    #[must_use]
    pub fn query(&self, magic: u64) -> Option<ConstantKind> {
        self.map.get(&magic).copied()
    }

    /// Number of distinct magics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_query() {
        let mut recorder = ConstantRecorder::new();
        recorder.register(0x1234, ConstantKind::HeapConstant).unwrap();
        recorder.register(0x1234, ConstantKind::HeapConstant).unwrap();
        recorder
            .register(RECORD_STUB_CODE_MAGIC, ConstantKind::RecordStubCode)
            .unwrap();

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.query(0x1234), Some(ConstantKind::HeapConstant));
        assert_eq!(recorder.query(0x9999), None);
    }

    #[test]
    fn test_conflicting_kinds() {
        let mut recorder = ConstantRecorder::new();
        recorder.register(7, ConstantKind::CodeConstant).unwrap();
        assert!(recorder.register(7, ConstantKind::HeapConstant).is_err());
    }
}
