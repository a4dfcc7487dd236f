//! Per-block bookkeeping of the SSA builder.

use std::collections::HashMap;

use crate::{
    emit::{BlockHandle, EmitType, ValueHandle},
    graph::{BlockIndex, ValueId},
};

/// One input of a phi placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhiInput {
    /// The incoming edge has been added to the emitted phi.
    Resolved(ValueHandle),
    /// The predecessor was not built yet when the phi was created.
    Pending(BlockIndex),
}

impl PhiInput {
    /// Whether this input still waits for its predecessor.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, PhiInput::Pending(_))
    }
}

/// A phi emitted at block entry together with the origin of each input.
///
/// `inputs` has one entry per predecessor, in predecessor order. Each entry names the value to
/// take from that predecessor: the merged live-in itself, or the operand of a scheduled phi.
#[derive(Debug, Clone, PartialEq)]
pub struct PhiPlaceholder {
    /// The emitted phi
    pub phi: ValueHandle,
    /// Type of the phi
    pub ty: EmitType,
    /// Per-predecessor source value and resolution state
    pub inputs: Vec<(ValueId, PhiInput)>,
}

impl PhiPlaceholder {
    /// Number of inputs still pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inputs
            .iter()
            .filter(|(_, input)| input.is_pending())
            .count()
    }
}

/// The safepoint a block's only predecessor ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingCall {
    /// Token returned by the safepoint
    pub(crate) statepoint: ValueHandle,
    /// Id of the call's own result
    pub(crate) value: ValueId,
    /// Declared number of results
    pub(crate) return_count: u32,
}

/// A live tagged value passed through a safepoint, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// The relocated value
    pub value: ValueId,
    /// Position of the value among the safepoint's operands
    pub position: usize,
}

/// Builder attachment of one block.
#[derive(Debug, Default)]
pub struct BuilderState {
    pub(crate) native: Option<BlockHandle>,
    pub(crate) continuation: Option<BlockHandle>,
    pub(crate) values: HashMap<ValueId, ValueHandle>,
    pub(crate) phis: Vec<PhiPlaceholder>,
    pub(crate) pending_call: Option<PendingCall>,
    pub(crate) relocations: Vec<Relocation>,
    /// Patch id of the invoke whose unwind edge lands here
    pub(crate) exception: Option<u32>,
    pub(crate) landing_pad: Option<ValueHandle>,
    pub(crate) switch: Option<ValueHandle>,
    /// Set after a `Call`; only the closing goto may follow
    pub(crate) after_call: bool,
    pub(crate) started: bool,
    pub(crate) ended: bool,
}

impl BuilderState {
    /// Emitted value of `id` in this block's context.
    #[must_use]
    pub fn value(&self, id: ValueId) -> Option<ValueHandle> {
        self.values.get(&id).copied()
    }

    /// Phi placeholders created at this block's entry or for its scheduled phis.
    #[must_use]
    pub fn phis(&self) -> &[PhiPlaceholder] {
        &self.phis
    }

    /// Relocations this block rebuilds on entry.
    #[must_use]
    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }

    /// Whether any phi input still waits for a predecessor.
    #[must_use]
    pub fn has_pending_phis(&self) -> bool {
        self.phis.iter().any(|phi| phi.pending_count() > 0)
    }
}
