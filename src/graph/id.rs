//! Strongly-typed identifiers shared by every pass.
//!
//! Three integer spaces meet in this crate and are easy to mix up:
//!
//! - [`BlockId`] - the block number chosen by the upstream scheduler (`B3`)
//! - [`BlockIndex`] - the slot of a block in the [`crate::graph::GraphModel`] arena
//! - [`ValueId`] - the scheduler's number for an instruction result (`v12`)
//!
//! The newtypes keep them apart; all are [`Copy`] and cheap to hash.

use std::fmt;

/// Identifier of a basic block as assigned by the scheduler.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    /// Creates a block id from the scheduler's raw number.
    #[must_use]
    #[inline]
    pub const fn new(id: u32) -> Self {
        BlockId(id)
    }

    /// Returns the scheduler's raw number.
    #[must_use]
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

impl From<u32> for BlockId {
    fn from(id: u32) -> Self {
        BlockId(id)
    }
}

/// Position of a block inside the graph arena.
///
/// Indices are handed out by [`crate::graph::GraphModel`] in creation order and stay valid for
/// the lifetime of the model. Edges and worklists store indices, never references.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlockIndex(pub(crate) usize);

impl BlockIndex {
    /// Returns the raw arena position.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Identifier of a single instruction's result in the scheduled graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub(crate) u32);

impl ValueId {
    /// Creates a value id from the scheduler's raw number.
    #[must_use]
    #[inline]
    pub const fn new(id: u32) -> Self {
        ValueId(id)
    }

    /// Returns the scheduler's raw number.
    #[must_use]
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueId({})", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u32> for ValueId {
    fn from(id: u32) -> Self {
        ValueId(id)
    }
}
