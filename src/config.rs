//! Configuration for the lowering passes.
//!
//! Everything here describes the target and the runtime's calling conventions, not the
//! function being compiled. One [`LoweringConfig`] is typically shared by every function of a
//! compilation batch.

use crate::emit::EmitType;

/// Target and calling-convention parameters used by the SSA builder and the call resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweringConfig {
    /// Number of operand placement slots of the call convention (default: 12).
    pub slot_count: usize,

    /// Slot reserved for the frame pointer on every call (default: 11).
    pub frame_pointer_slot: usize,

    /// Pinned register holding the root table base (default: 10).
    pub root_slot: u32,

    /// Byte offset from a tagged code object to its first instruction (default: 63).
    ///
    /// This is the code object header size minus the heap object tag.
    pub code_entry_offset: i64,

    /// Patch size estimate for call sites with at most one location (default: 4).
    pub short_call_bytes: u32,

    /// Patch size estimate for call sites with several locations (default: 8).
    pub long_call_bytes: u32,

    /// Stack parameters of the function, added to a constant pop count on return (default: 0).
    pub stack_parameter_count: u32,

    /// Pointer width of the target in bytes, 4 or 8 (default: 8).
    pub pointer_size: u32,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            slot_count: 12,
            frame_pointer_slot: 11,
            root_slot: 10,
            code_entry_offset: 63,
            short_call_bytes: 4,
            long_call_bytes: 8,
            stack_parameter_count: 0,
            pointer_size: 8,
        }
    }
}

impl LoweringConfig {
    /// Creates a configuration for the default 64-bit target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of operand slots.
    #[must_use]
    pub fn with_slot_count(mut self, slot_count: usize) -> Self {
        self.slot_count = slot_count;
        self
    }

    /// Sets the slot reserved for the frame pointer.
    #[must_use]
    pub fn with_frame_pointer_slot(mut self, slot: usize) -> Self {
        self.frame_pointer_slot = slot;
        self
    }

    /// Sets the number of stack parameters popped on return.
    #[must_use]
    pub fn with_stack_parameter_count(mut self, count: u32) -> Self {
        self.stack_parameter_count = count;
        self
    }

    /// Sets the offset of a code object's entry point.
    #[must_use]
    pub fn with_code_entry_offset(mut self, offset: i64) -> Self {
        self.code_entry_offset = offset;
        self
    }

    /// Sets the pointer width. Anything but 4 is treated as 8.
    #[must_use]
    pub fn with_pointer_size(mut self, pointer_size: u32) -> Self {
        self.pointer_size = pointer_size;
        self
    }

    /// The integer type as wide as a pointer.
    #[must_use]
    pub fn int_ptr(&self) -> EmitType {
        if self.pointer_size == 4 {
            EmitType::Int32
        } else {
            EmitType::Int64
        }
    }

    /// Patch size estimate for a call site recording `locations` locations.
    #[must_use]
    pub fn call_bytes(&self, locations: usize) -> u32 {
        if locations > 1 {
            self.long_call_bytes
        } else {
            self.short_call_bytes
        }
    }
}
