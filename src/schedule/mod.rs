//! Input side: the scheduled graph and the visitor protocol that walks it.
//!
//! The upstream scheduler drives lowering through [`ScheduleVisitor`]: one
//! [`ScheduleVisitor::visit_block`] per block in emission order, followed by that block's
//! instructions ([`ScheduleVisitor::visit_instruction`]) and, for unconditional control flow,
//! a trailing [`ScheduleVisitor::visit_goto`]. Each block's instructions arrive as one
//! contiguous run.
//!
//! Both lowering passes are visitors. To feed the same input to both, the scheduler output is
//! captured once as a [`Schedule`], built programmatically with [`ScheduleBuilder`] or read from
//! the scheduler's text dump with [`Schedule::from_text`], and then replayed into each pass.
//!
//! # Examples
//!
//! ```rust
//! use jitlower::graph::{BlockId, ValueId};
//! use jitlower::schedule::{Instruction, MachineRepresentation, ScheduleBuilder};
//!
//! let schedule = ScheduleBuilder::new()
//!     .block(0, false, &[])
//!     .instruction(1, Instruction::Parameter { index: 0, representation: MachineRepresentation::Tagged })
//!     .goto(1)
//!     .block(1, false, &[0])
//!     .instruction(2, Instruction::Int32Constant(0))
//!     .instruction(3, Instruction::Return { pop_count: ValueId::new(2), values: vec![ValueId::new(1)] })
//!     .build();
//!
//! assert_eq!(schedule.blocks().len(), 2);
//! assert_eq!(schedule.blocks()[1].predecessors, vec![BlockId::new(0)]);
//! ```

mod instruction;
mod machine;
mod parser;

pub use instruction::{
    BinaryOp, CallDescriptor, CallTarget, CompareOp, ConvertOp, Instruction, OverflowOp, UnaryOp,
};
pub use machine::{MachineRepresentation, MachineSemantic, MachineType, WriteBarrierKind};

use crate::{
    graph::{BlockId, ValueId},
    Result,
};

/// Receiver of the scheduler's callback sequence.
pub trait ScheduleVisitor {
    /// Starts a new block. Ends the previous one, if any.
    ///
    /// # Errors
    ///
    /// Implementations report malformed input as [`crate::Error::ScheduleDefect`].
    fn visit_block(&mut self, id: BlockId, deferred: bool, predecessors: &[BlockId]) -> Result<()>;

    /// Unconditional jump ending the current block.
    ///
    /// # Errors
    ///
    /// Implementations report malformed input as [`crate::Error::ScheduleDefect`].
    fn visit_goto(&mut self, target: BlockId) -> Result<()>;

    /// One instruction of the current block; `id` names its result.
    ///
    /// # Errors
    ///
    /// Any lowering defect for this instruction.
    fn visit_instruction(&mut self, id: ValueId, instruction: &Instruction) -> Result<()>;
}

/// An element of a scheduled block body.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An instruction and the id of its result
    Instruction(ValueId, Instruction),
    /// Unconditional jump
    Goto(BlockId),
}

/// A block as emitted by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBlock {
    /// Scheduler id
    pub id: BlockId,
    /// Cold path hint
    pub deferred: bool,
    /// Declared predecessors
    pub predecessors: Vec<BlockId>,
    /// Instructions and the optional trailing goto
    pub body: Vec<Node>,
}

/// A complete scheduled function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    blocks: Vec<ScheduledBlock>,
}

impl Schedule {
    /// Creates a schedule from blocks in emission order.
    #[must_use]
    pub fn new(blocks: Vec<ScheduledBlock>) -> Self {
        Schedule { blocks }
    }

    /// Reads the scheduler's textual dump.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for unparseable lines.
    pub fn from_text(text: &str) -> Result<Self> {
        parser::parse_schedule(text)
    }

    /// Blocks in emission order.
    #[must_use]
    pub fn blocks(&self) -> &[ScheduledBlock] {
        &self.blocks
    }

    /// Number of instructions over all blocks.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.blocks
            .iter()
            .flat_map(|block| &block.body)
            .filter(|node| matches!(node, Node::Instruction(..)))
            .count()
    }

    /// Feeds the whole schedule to `visitor`.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error raised by the visitor.
    pub fn replay(&self, visitor: &mut dyn ScheduleVisitor) -> Result<()> {
        for block in &self.blocks {
            visitor.visit_block(block.id, block.deferred, &block.predecessors)?;
            for node in &block.body {
                match node {
                    Node::Instruction(id, instruction) => {
                        visitor.visit_instruction(*id, instruction)?;
                    }
                    Node::Goto(target) => visitor.visit_goto(*target)?,
                }
            }
        }
        Ok(())
    }
}

/// Fluent construction of a [`Schedule`], mostly for tests and benchmarks.
///
/// Instructions and gotos attach to the most recently started block; calling them before any
/// [`ScheduleBuilder::block`] drops them.
#[derive(Debug, Default)]
pub struct ScheduleBuilder {
    blocks: Vec<ScheduledBlock>,
}

impl ScheduleBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts block `id` with the given predecessors.
    #[must_use]
    pub fn block(mut self, id: u32, deferred: bool, predecessors: &[u32]) -> Self {
        self.blocks.push(ScheduledBlock {
            id: BlockId::new(id),
            deferred,
            predecessors: predecessors.iter().copied().map(BlockId::new).collect(),
            body: Vec::new(),
        });
        self
    }

    /// Appends an instruction whose result is `id`.
    #[must_use]
    pub fn instruction(mut self, id: u32, instruction: Instruction) -> Self {
        if let Some(block) = self.blocks.last_mut() {
            block
                .body
                .push(Node::Instruction(ValueId::new(id), instruction));
        }
        self
    }

    /// Appends a goto to block `target`.
    #[must_use]
    pub fn goto(mut self, target: u32) -> Self {
        if let Some(block) = self.blocks.last_mut() {
            block.body.push(Node::Goto(BlockId::new(target)));
        }
        self
    }

    /// Finishes the schedule.
    #[must_use]
    pub fn build(self) -> Schedule {
        Schedule::new(self.blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ScheduleVisitor for Recorder {
        fn visit_block(&mut self, id: BlockId, deferred: bool, predecessors: &[BlockId]) -> Result<()> {
            self.events
                .push(format!("block {id} {deferred} {}", predecessors.len()));
            Ok(())
        }

        fn visit_goto(&mut self, target: BlockId) -> Result<()> {
            self.events.push(format!("goto {target}"));
            Ok(())
        }

        fn visit_instruction(&mut self, id: ValueId, instruction: &Instruction) -> Result<()> {
            self.events.push(format!("{id} {}", instruction.mnemonic()));
            Ok(())
        }
    }

    #[test]
    fn test_replay_order() {
        let schedule = ScheduleBuilder::new()
            .block(0, false, &[])
            .instruction(1, Instruction::Int32Constant(3))
            .goto(1)
            .block(1, true, &[0])
            .instruction(2, Instruction::Int32Constant(4))
            .build();

        let mut recorder = Recorder::default();
        schedule.replay(&mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            vec![
                "block B0 false 0",
                "v1 Int32Constant",
                "goto B1",
                "block B1 true 1",
                "v2 Int32Constant",
            ]
        );
        assert_eq!(schedule.instruction_count(), 2);
    }

    #[test]
    fn test_builder_ignores_orphans() {
        let schedule = ScheduleBuilder::new()
            .instruction(1, Instruction::Int32Constant(3))
            .goto(4)
            .build();
        assert!(schedule.blocks().is_empty());
    }
}
