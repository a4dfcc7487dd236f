//! Basic blocks and the per-pass attachment slot.

use crate::{
    graph::{BlockId, BlockIndex, ValueId},
    liveness::LivenessState,
    lower::BuilderState,
    Error, Result,
};

/// Per-block state owned by whichever pass is currently running.
///
/// At most one variant is installed on a block at a time. Each pass installs its own variant
/// when it starts and removes it when it is done, so a leftover attachment is a bug and is
/// reported as [`Error::PassConflict`].
#[derive(Debug)]
pub enum BlockPassData {
    /// Defines, upward-exposed references and phi descriptors collected by liveness.
    Liveness(LivenessState),
    /// Value map, phi placeholders and pending call bookkeeping of the SSA builder.
    Builder(BuilderState),
}

/// A basic block of the scheduled graph.
#[derive(Debug)]
pub struct Block {
    id: BlockId,
    index: BlockIndex,
    predecessors: Vec<BlockIndex>,
    successors: Vec<BlockIndex>,
    deferred: bool,
    scheduled: bool,
    live_ins: Vec<ValueId>,
    pass_data: Option<BlockPassData>,
}

impl Block {
    pub(crate) fn new(id: BlockId, index: BlockIndex) -> Self {
        Block {
            id,
            index,
            predecessors: Vec::new(),
            successors: Vec::new(),
            deferred: false,
            scheduled: false,
            live_ins: Vec::new(),
            pass_data: None,
        }
    }

    /// The scheduler's id of this block.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// The arena index of this block.
    #[must_use]
    pub fn index(&self) -> BlockIndex {
        self.index
    }

    /// Predecessors in the order the scheduler declared them.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockIndex] {
        &self.predecessors
    }

    /// Successors in terminator order (true/false target, switch cases, then/exception).
    #[must_use]
    pub fn successors(&self) -> &[BlockIndex] {
        &self.successors
    }

    /// Whether the scheduler marked this block as a cold path.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Whether the block has been declared by the scheduler, as opposed to only referenced.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Values live on entry, in ascending id order. Empty until liveness has run.
    #[must_use]
    pub fn live_ins(&self) -> &[ValueId] {
        &self.live_ins
    }

    pub(crate) fn mark_scheduled(&mut self, deferred: bool) {
        self.scheduled = true;
        self.deferred = deferred;
    }

    pub(crate) fn add_predecessor(&mut self, predecessor: BlockIndex) {
        self.predecessors.push(predecessor);
    }

    pub(crate) fn add_successor(&mut self, successor: BlockIndex) {
        self.successors.push(successor);
    }

    pub(crate) fn set_live_ins(&mut self, live_ins: Vec<ValueId>) {
        self.live_ins = live_ins;
    }

    /// Installs a pass attachment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PassConflict`] if another attachment is still present.
    pub(crate) fn attach(&mut self, data: BlockPassData) -> Result<()> {
        if self.pass_data.is_some() {
            return Err(Error::PassConflict(self.id.raw()));
        }
        self.pass_data = Some(data);
        Ok(())
    }

    /// Removes and returns the current attachment.
    pub(crate) fn detach(&mut self) -> Option<BlockPassData> {
        self.pass_data.take()
    }

    /// Returns `true` if any pass attachment is installed.
    #[must_use]
    pub fn has_attachment(&self) -> bool {
        self.pass_data.is_some()
    }

    pub(crate) fn liveness(&self) -> Option<&LivenessState> {
        match &self.pass_data {
            Some(BlockPassData::Liveness(state)) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn liveness_mut(&mut self) -> Option<&mut LivenessState> {
        match &mut self.pass_data {
            Some(BlockPassData::Liveness(state)) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn builder(&self) -> Option<&BuilderState> {
        match &self.pass_data {
            Some(BlockPassData::Builder(state)) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn builder_mut(&mut self) -> Option<&mut BuilderState> {
        match &mut self.pass_data {
            Some(BlockPassData::Builder(state)) => Some(state),
            _ => None,
        }
    }
}
