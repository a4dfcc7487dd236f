//! # jitlower Prelude
//!
//! The most commonly used types of the library. Import this module to drive the lowering
//! passes and read back the stack maps without spelling out every path.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all jitlower operations
pub use crate::Error;

/// The result type used throughout jitlower
pub use crate::Result;

/// Tunables of the lowering passes
pub use crate::LoweringConfig;

/// The process-wide target table
pub use crate::Backend;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Whole-function and batch drivers
pub use crate::compile::{compile_batch, compile_function, CompiledFunction};

/// Input side: schedules and the visitor protocol
pub use crate::schedule::{
    CallDescriptor, CallTarget, Instruction, MachineRepresentation, MachineSemantic, MachineType,
    Schedule, ScheduleBuilder, ScheduleVisitor, WriteBarrierKind,
};

/// Graph ids
pub use crate::graph::{BlockId, GraphModel, ValueId};

// ================================================================================================
// Passes
// ================================================================================================

/// First pass
pub use crate::liveness::LivenessAnalysis;

/// Second pass and its results
pub use crate::lower::{ConstantKind, ConstantRecorder, LoweredFunction, SsaBuilder};

// ================================================================================================
// Code Emission
// ================================================================================================

/// The emission interface and the recording implementation
pub use crate::emit::{EmitType, Emitter, LirEmitter, LirFunction};

// ================================================================================================
// Stack Maps
// ================================================================================================

/// Decoder and its records
pub use crate::stackmap::{ParseOptions, Record, RecordMap, StackMaps};

/// Patch-site bookkeeping
pub use crate::stackmap::info::{PatchSite, StackMapInfo, StackMapInfoMap};
