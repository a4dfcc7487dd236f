//! Control-flow graph model shared by the lowering passes.
//!
//! A [`GraphModel`] owns every [`Block`] of one function compilation in an arena. Blocks are
//! addressed by [`BlockIndex`]; the scheduler's [`BlockId`] is mapped to an index on lookup.
//! Predecessor and successor lists, the reverse-postorder list and the builder's phi worklist all
//! store indices, so no pass ever holds a reference into another block.
//!
//! The graph is built once, by the liveness traversal, and then consumed by the SSA builder.
//! Blocks may be referenced before they are declared (forward branches), which is why
//! [`GraphModel::ensure`] exists next to [`GraphModel::create`]. Once a traversal has finished,
//! [`GraphModel::verify_complete`] checks that every referenced block was declared and that both
//! edge directions agree.
//!
//! # Examples
//!
//! ```rust
//! use jitlower::graph::{BlockId, GraphModel};
//!
//! let mut graph = GraphModel::new();
//! let entry = graph.create(BlockId::new(0))?;
//! let exit = graph.ensure(BlockId::new(1));
//! graph.add_edge(entry, exit);
//!
//! assert_eq!(graph.find(BlockId::new(1)), Some(exit));
//! assert_eq!(graph.block(exit).predecessors(), &[entry]);
//! # Ok::<(), jitlower::Error>(())
//! ```

mod block;
mod id;

pub use block::{Block, BlockPassData};
pub use id::{BlockId, BlockIndex, ValueId};

use std::collections::HashMap;

use crate::Result;

/// Arena of blocks for one function compilation.
#[derive(Debug, Default)]
pub struct GraphModel {
    blocks: Vec<Block>,
    by_id: HashMap<BlockId, BlockIndex>,
    rpo: Vec<BlockIndex>,
    needs_frame: bool,
}

impl GraphModel {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new block for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ScheduleDefect`] if a block with this id already exists.
    pub fn create(&mut self, id: BlockId) -> Result<BlockIndex> {
        if self.by_id.contains_key(&id) {
            return Err(schedule_defect!("block {} created twice", id));
        }
        Ok(self.insert(id))
    }

    /// Returns the index of the block with `id`, if it exists.
    #[must_use]
    pub fn find(&self, id: BlockId) -> Option<BlockIndex> {
        self.by_id.get(&id).copied()
    }

    /// Returns the index of the block with `id`, creating it if needed.
    pub fn ensure(&mut self, id: BlockId) -> BlockIndex {
        match self.find(id) {
            Some(index) => index,
            None => self.insert(id),
        }
    }

    /// Declares `id` as scheduled and appends it to the reverse-postorder list.
    ///
    /// The block may already exist if an earlier branch referenced it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ScheduleDefect`] if the block was already scheduled.
    pub fn schedule(&mut self, id: BlockId, deferred: bool) -> Result<BlockIndex> {
        let index = self.ensure(id);
        let block = &mut self.blocks[index.0];
        if block.is_scheduled() {
            return Err(schedule_defect!("block {} scheduled twice", id));
        }
        block.mark_scheduled(deferred);
        self.rpo.push(index);
        Ok(index)
    }

    /// Records the edge `from -> to` on both endpoints.
    pub fn add_edge(&mut self, from: BlockIndex, to: BlockIndex) {
        self.blocks[from.0].add_successor(to);
        self.blocks[to.0].add_predecessor(from);
    }

    /// Adds `to` as a successor of `from` without touching `to`'s predecessor list.
    ///
    /// Terminators call this; predecessors come from the block headers. The two directions
    /// are reconciled by [`GraphModel::verify_complete`].
    pub(crate) fn add_successor(&mut self, from: BlockIndex, to: BlockIndex) {
        self.blocks[from.0].add_successor(to);
    }

    pub(crate) fn add_predecessor(&mut self, to: BlockIndex, from: BlockIndex) {
        self.blocks[to.0].add_predecessor(from);
    }

    /// Returns the block stored at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not produced by this graph.
    #[must_use]
    pub fn block(&self, index: BlockIndex) -> &Block {
        &self.blocks[index.0]
    }

    pub(crate) fn block_mut(&mut self, index: BlockIndex) -> &mut Block {
        &mut self.blocks[index.0]
    }

    /// Looks a block up by its scheduler id.
    #[must_use]
    pub fn block_by_id(&self, id: BlockId) -> Option<&Block> {
        self.find(id).map(|index| &self.blocks[index.0])
    }

    /// All blocks in creation order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Number of blocks, including referenced-but-unscheduled ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if no block has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Scheduled blocks in the order they were declared.
    #[must_use]
    pub fn rpo(&self) -> &[BlockIndex] {
        &self.rpo
    }

    /// Whether the function performs a call and therefore needs a frame.
    #[must_use]
    pub fn needs_frame(&self) -> bool {
        self.needs_frame
    }

    pub(crate) fn set_needs_frame(&mut self) {
        self.needs_frame = true;
    }

    /// Checks that the graph is closed and consistent.
    ///
    /// Every block must have been scheduled, and every predecessor edge declared by a block
    /// header must be matched by a successor edge from a terminator, and the other way round.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ScheduleDefect`] naming the first offending block.
    pub fn verify_complete(&self) -> Result<()> {
        for block in &self.blocks {
            if !block.is_scheduled() {
                return Err(schedule_defect!(
                    "block {} is referenced but never scheduled",
                    block.id()
                ));
            }

            for &pred in block.predecessors() {
                let pred_block = &self.blocks[pred.0];
                if !pred_block.successors().contains(&block.index()) {
                    return Err(schedule_defect!(
                        "block {} lists {} as predecessor, but {} never branches to it",
                        block.id(),
                        pred_block.id(),
                        pred_block.id()
                    ));
                }
            }

            for &succ in block.successors() {
                let succ_block = &self.blocks[succ.0];
                if !succ_block.predecessors().contains(&block.index()) {
                    return Err(schedule_defect!(
                        "block {} branches to {}, which does not list it as predecessor",
                        block.id(),
                        succ_block.id()
                    ));
                }
            }
        }
        Ok(())
    }

    /// Installs `make()` as the attachment of every block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PassConflict`] if a block still carries an attachment.
    pub(crate) fn attach_all(&mut self, make: impl Fn() -> BlockPassData) -> Result<()> {
        for block in &mut self.blocks {
            block.attach(make())?;
        }
        Ok(())
    }

    /// Removes every block's attachment.
    pub(crate) fn detach_all(&mut self) {
        for block in &mut self.blocks {
            block.detach();
        }
    }

    fn insert(&mut self, id: BlockId) -> BlockIndex {
        let index = BlockIndex(self.blocks.len());
        self.blocks.push(Block::new(id, index));
        self.by_id.insert(id, index);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_create_rejects_duplicates() {
        let mut graph = GraphModel::new();
        graph.create(BlockId::new(0)).unwrap();
        let err = graph.create(BlockId::new(0)).unwrap_err();
        assert!(matches!(err, Error::ScheduleDefect { .. }));
    }

    #[test]
    fn test_ensure_then_schedule() {
        let mut graph = GraphModel::new();
        let entry = graph.schedule(BlockId::new(0), false).unwrap();
        let forward = graph.ensure(BlockId::new(5));
        assert!(!graph.block(forward).is_scheduled());

        let scheduled = graph.schedule(BlockId::new(5), true).unwrap();
        assert_eq!(scheduled, forward);
        assert!(graph.block(forward).is_deferred());
        assert_eq!(graph.rpo(), &[entry, forward]);

        assert!(graph.schedule(BlockId::new(5), false).is_err());
    }

    #[test]
    fn test_find_missing() {
        let graph = GraphModel::new();
        assert!(graph.find(BlockId::new(9)).is_none());
        assert!(graph.block_by_id(BlockId::new(9)).is_none());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_verify_complete_unscheduled_predecessor() {
        let mut graph = GraphModel::new();
        let b0 = graph.schedule(BlockId::new(0), false).unwrap();
        let b1 = graph.schedule(BlockId::new(1), false).unwrap();
        let ghost = graph.ensure(BlockId::new(7));
        graph.add_edge(b0, b1);
        graph.add_edge(ghost, b1);

        let err = graph.verify_complete().unwrap_err();
        match err {
            Error::ScheduleDefect { message, .. } => assert!(message.contains("B7")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_verify_complete_one_sided_edge() {
        let mut graph = GraphModel::new();
        let b0 = graph.schedule(BlockId::new(0), false).unwrap();
        let b1 = graph.schedule(BlockId::new(1), false).unwrap();
        graph.add_predecessor(b1, b0);
        assert!(graph.verify_complete().is_err());

        graph.add_successor(b0, b1);
        assert!(graph.verify_complete().is_ok());
    }
}
