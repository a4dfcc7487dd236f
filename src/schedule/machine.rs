//! Machine-level value representations and their lowering-relevant properties.
//!
//! The scheduler attaches a [`MachineRepresentation`] (how many bits, tagged or not) and a
//! [`MachineSemantic`] (how those bits are interpreted) to loads, and a representation to phis
//! and stores. Textual names follow the scheduler's dump format (`kRepWord32`, `kTypeInt32`,
//! `FullWriteBarrier`) so [`std::str::FromStr`] can be used directly by the schedule reader.

use strum::{EnumCount, EnumIter, EnumString, IntoStaticStr};

/// Storage representation of a value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumCount, EnumIter,
)]
pub enum MachineRepresentation {
    /// No value
    #[strum(serialize = "kMachNone")]
    None,
    /// Single bit boolean
    #[strum(serialize = "kRepBit")]
    Bit,
    /// 8-bit integer
    #[strum(serialize = "kRepWord8")]
    Word8,
    /// 16-bit integer
    #[strum(serialize = "kRepWord16")]
    Word16,
    /// 32-bit integer
    #[strum(serialize = "kRepWord32")]
    Word32,
    /// 64-bit integer
    #[strum(serialize = "kRepWord64")]
    Word64,
    /// Tagged small integer
    #[strum(serialize = "kRepTaggedSigned")]
    TaggedSigned,
    /// Tagged heap pointer
    #[strum(serialize = "kRepTaggedPointer")]
    TaggedPointer,
    /// Tagged small integer or heap pointer
    #[strum(serialize = "kRepTagged")]
    Tagged,
    /// Single precision float
    #[strum(serialize = "kRepFloat32")]
    Float32,
    /// Double precision float
    #[strum(serialize = "kRepFloat64")]
    Float64,
    /// 128-bit vector
    #[strum(serialize = "kRepSimd128")]
    Simd128,
}

impl MachineRepresentation {
    /// Whether values of this representation may point into the collected heap.
    #[must_use]
    pub fn is_tagged(self) -> bool {
        matches!(
            self,
            MachineRepresentation::TaggedSigned
                | MachineRepresentation::TaggedPointer
                | MachineRepresentation::Tagged
        )
    }

    /// Size in bytes of the stored value, for a target with `pointer_size`-byte words.
    #[must_use]
    pub fn byte_size(self, pointer_size: u32) -> u32 {
        match self {
            MachineRepresentation::None => 0,
            MachineRepresentation::Bit | MachineRepresentation::Word8 => 1,
            MachineRepresentation::Word16 => 2,
            MachineRepresentation::Word32 | MachineRepresentation::Float32 => 4,
            MachineRepresentation::Word64 | MachineRepresentation::Float64 => 8,
            MachineRepresentation::Simd128 => 16,
            MachineRepresentation::TaggedSigned
            | MachineRepresentation::TaggedPointer
            | MachineRepresentation::Tagged => pointer_size,
        }
    }
}

/// Interpretation of a value's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, EnumCount)]
pub enum MachineSemantic {
    /// No particular interpretation
    #[strum(serialize = "kMachNone")]
    None,
    /// Boolean
    #[strum(serialize = "kTypeBool")]
    Bool,
    /// Signed 32-bit
    #[strum(serialize = "kTypeInt32")]
    Int32,
    /// Unsigned 32-bit
    #[strum(serialize = "kTypeUint32")]
    Uint32,
    /// Signed 64-bit
    #[strum(serialize = "kTypeInt64")]
    Int64,
    /// Unsigned 64-bit
    #[strum(serialize = "kTypeUint64")]
    Uint64,
    /// Floating point number
    #[strum(serialize = "kTypeNumber")]
    Number,
    /// Anything, typically tagged
    #[strum(serialize = "kTypeAny")]
    Any,
}

impl MachineSemantic {
    /// Whether sub-word loads with this semantic are sign-extended.
    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(self, MachineSemantic::Int32 | MachineSemantic::Int64)
    }
}

/// A (representation, semantic) pair as attached to loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MachineType {
    /// How the value is stored
    pub representation: MachineRepresentation,
    /// How the stored bits are interpreted
    pub semantic: MachineSemantic,
}

impl MachineType {
    /// Creates a machine type.
    #[must_use]
    pub const fn new(representation: MachineRepresentation, semantic: MachineSemantic) -> Self {
        MachineType {
            representation,
            semantic,
        }
    }

    /// A tagged value of any kind.
    #[must_use]
    pub const fn any_tagged() -> Self {
        MachineType::new(MachineRepresentation::Tagged, MachineSemantic::Any)
    }
}

/// Kind of write barrier a tagged store requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
pub enum WriteBarrierKind {
    /// Plain store
    #[strum(serialize = "NoWriteBarrier")]
    None,
    /// Storing a map; the value is never a small integer
    #[strum(serialize = "MapWriteBarrier")]
    Map,
    /// Storing a known heap pointer
    #[strum(serialize = "PointerWriteBarrier")]
    Pointer,
    /// Storing an arbitrary tagged value
    #[strum(serialize = "FullWriteBarrier")]
    Full,
}

impl WriteBarrierKind {
    /// Whether the stored value may be a small integer and must be checked before the barrier.
    #[must_use]
    pub fn needs_smi_check(self) -> bool {
        matches!(self, WriteBarrierKind::Full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_parse_dump_names() {
        assert_eq!(
            MachineRepresentation::from_str("kRepWord32").unwrap(),
            MachineRepresentation::Word32
        );
        assert_eq!(
            MachineSemantic::from_str("kTypeUint32").unwrap(),
            MachineSemantic::Uint32
        );
        assert_eq!(
            WriteBarrierKind::from_str("MapWriteBarrier").unwrap(),
            WriteBarrierKind::Map
        );
        assert!(MachineRepresentation::from_str("kRepWord128").is_err());
    }

    #[test]
    fn test_names_round_trip() {
        for rep in MachineRepresentation::iter() {
            let name: &'static str = rep.into();
            assert_eq!(MachineRepresentation::from_str(name).unwrap(), rep);
        }
    }

    #[test]
    fn test_tagged_sizes() {
        assert!(MachineRepresentation::TaggedPointer.is_tagged());
        assert!(!MachineRepresentation::Word64.is_tagged());
        assert_eq!(MachineRepresentation::Tagged.byte_size(4), 4);
        assert_eq!(MachineRepresentation::Tagged.byte_size(8), 8);
        assert_eq!(MachineRepresentation::Word16.byte_size(8), 2);
    }
}
