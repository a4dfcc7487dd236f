//! Live-in computation over the scheduled graph.
//!
//! A value is live on entry to a block if some path from the block's start reaches a use of the
//! value without passing its definition. In SSA form every value has a single definition, so
//! the only kill is the defining block itself.
//!
//! # Algorithm
//!
//! [`LivenessAnalysis`] is a [`ScheduleVisitor`]. While the schedule is replayed it builds the
//! shared [`GraphModel`] (blocks, both edge directions, reverse postorder) and records per block:
//!
//! - `DEF[B]` - values defined in B
//! - `USE[B]` - values referenced in B before any local definition
//! - `PHI[B]` - one `(from, value)` descriptor per phi input, keyed by the incoming edge
//!
//! [`LivenessAnalysis::finish`] then iterates backwards to a fixed point:
//!
//! - `OUT[B]` = ∪ over successors S of (`IN[S]` ∪ {v | (B, v) ∈ `PHI[S]`})
//! - `IN[B]` = `USE[B]` ∪ (`OUT[B]` - `DEF[B]`)
//!
//! A phi's input is live out of its own predecessor edge only, not out of every predecessor.
//! The worklist starts with all blocks in reverse order; a block whose `IN` grows re-enqueues its
//! predecessors. Sets only grow and are bounded by the number of values, so the iteration ends.
//! Bit positions are assigned to values in the order they are first seen, so the set width
//! depends on how many values a function has and not on how large their ids are.
//!
//! # Examples
//!
//! ```rust
//! use jitlower::graph::{BlockId, GraphModel, ValueId};
//! use jitlower::liveness::LivenessAnalysis;
//! use jitlower::schedule::{Instruction, MachineRepresentation, ScheduleBuilder};
//!
//! let schedule = ScheduleBuilder::new()
//!     .block(0, false, &[])
//!     .instruction(1, Instruction::Parameter { index: 0, representation: MachineRepresentation::Tagged })
//!     .instruction(2, Instruction::Int32Constant(0))
//!     .goto(1)
//!     .block(1, false, &[0])
//!     .instruction(3, Instruction::Return { pop_count: ValueId::new(2), values: vec![ValueId::new(1)] })
//!     .build();
//!
//! let mut graph = GraphModel::new();
//! let mut liveness = LivenessAnalysis::new(&mut graph);
//! schedule.replay(&mut liveness)?;
//! liveness.finish()?;
//!
//! let exit = graph.block_by_id(BlockId::new(1)).unwrap();
//! assert_eq!(exit.live_ins(), &[ValueId::new(1), ValueId::new(2)]);
//! # Ok::<(), jitlower::Error>(())
//! ```

use std::collections::{hash_map::Entry, BTreeSet, HashMap, VecDeque};

use tracing::{debug, trace};

use crate::{
    graph::{BlockId, BlockIndex, BlockPassData, GraphModel, ValueId},
    schedule::{Instruction, ScheduleVisitor},
    utils::BitSet,
    Result,
};

/// A phi input attributed to one incoming edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiDescriptor {
    /// Predecessor the edge comes from
    pub from: BlockIndex,
    /// Value consumed along that edge
    pub value: ValueId,
}

/// Per-block facts collected during the forward traversal.
#[derive(Debug, Default)]
pub struct LivenessState {
    defines: BTreeSet<ValueId>,
    references: BTreeSet<ValueId>,
    phis: Vec<PhiDescriptor>,
    terminated: bool,
}

impl LivenessState {
    fn define(&mut self, value: ValueId) {
        self.defines.insert(value);
    }

    fn reference(&mut self, value: ValueId) {
        if !self.defines.contains(&value) {
            self.references.insert(value);
        }
    }

    /// Values defined in the block.
    #[must_use]
    pub fn defines(&self) -> &BTreeSet<ValueId> {
        &self.defines
    }

    /// Values used before any local definition.
    #[must_use]
    pub fn references(&self) -> &BTreeSet<ValueId> {
        &self.references
    }

    /// Phi inputs keyed by incoming edge.
    #[must_use]
    pub fn phis(&self) -> &[PhiDescriptor] {
        &self.phis
    }
}

/// The liveness pass. See the module documentation.
pub struct LivenessAnalysis<'g> {
    graph: &'g mut GraphModel,
    current: Option<BlockIndex>,
    /// Dense bit-set position of every value seen, in first-seen order
    slots: HashMap<ValueId, usize>,
    values: Vec<ValueId>,
}

impl<'g> LivenessAnalysis<'g> {
    /// Starts a liveness pass that builds its blocks into `graph`.
    pub fn new(graph: &'g mut GraphModel) -> Self {
        LivenessAnalysis {
            graph,
            current: None,
            slots: HashMap::new(),
            values: Vec::new(),
        }
    }

    fn state_mut(&mut self, index: BlockIndex) -> Result<&mut LivenessState> {
        let block = self.graph.block_mut(index);
        let id = block.id();
        block
            .liveness_mut()
            .ok_or_else(|| schedule_defect!("block {} has no liveness state", id))
    }

    fn current(&self) -> Result<BlockIndex> {
        self.current
            .ok_or_else(|| schedule_defect!("instruction outside of a block"))
    }

    fn open_block(&mut self) -> Result<BlockIndex> {
        let index = self.current()?;
        if self.state_mut(index)?.terminated {
            let id = self.graph.block(index).id();
            return Err(schedule_defect!("block {} continues after its terminator", id));
        }
        Ok(index)
    }

    fn close_block(&mut self) -> Result<()> {
        if let Some(index) = self.current {
            if !self.state_mut(index)?.terminated {
                let id = self.graph.block(index).id();
                return Err(schedule_defect!("block {} ends without a terminator", id));
            }
        }
        Ok(())
    }

    fn note_value(&mut self, value: ValueId) {
        let next = self.values.len();
        if let Entry::Vacant(entry) = self.slots.entry(value) {
            entry.insert(next);
            self.values.push(value);
        }
    }

    fn slots_of<'a>(
        &'a self,
        values: impl IntoIterator<Item = &'a ValueId> + 'a,
    ) -> impl Iterator<Item = usize> + 'a {
        values
            .into_iter()
            .filter_map(|value| self.slots.get(value).copied())
    }

    fn add_successor(&mut self, from: BlockIndex, target: BlockId) {
        let to = self.graph.ensure(target);
        self.graph.add_successor(from, to);
    }

    /// Ends the traversal, computes every block's live-in set and clears the pass attachments.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ScheduleDefect`] if the last block is not terminated, the graph
    /// is not closed (see [`GraphModel::verify_complete`]), or a value is used without a
    /// definition on some path from the entry.
    pub fn finish(mut self) -> Result<()> {
        self.close_block()?;
        self.current = None;
        self.graph.verify_complete()?;

        let result = self.calculate_live_ins();
        self.graph.detach_all();
        result
    }

    fn calculate_live_ins(&mut self) -> Result<()> {
        let capacity = self.values.len();
        let count = self.graph.len();

        let mut defines = Vec::with_capacity(count);
        let mut uses = Vec::with_capacity(count);
        let mut phis = Vec::with_capacity(count);
        for block in self.graph.blocks() {
            let Some(state) = block.liveness() else {
                return Err(schedule_defect!("block {} has no liveness state", block.id()));
            };
            defines.push(BitSet::from_indices(capacity, self.slots_of(&state.defines)));
            uses.push(BitSet::from_indices(capacity, self.slots_of(&state.references)));
            phis.push(state.phis.clone());
        }

        let mut live_in = vec![BitSet::new(capacity); count];
        let mut queued = vec![false; count];
        let mut worklist: VecDeque<BlockIndex> = self.graph.rpo().iter().rev().copied().collect();
        for index in &worklist {
            queued[index.index()] = true;
        }

        let mut iterations = 0_usize;
        while let Some(index) = worklist.pop_front() {
            iterations += 1;
            queued[index.index()] = false;
            let block = self.graph.block(index);

            let mut out = BitSet::new(capacity);
            for &succ in block.successors() {
                out.union_with(&live_in[succ.index()]);
                for phi in phis[succ.index()].iter().filter(|phi| phi.from == index) {
                    if let Some(&slot) = self.slots.get(&phi.value) {
                        out.insert(slot);
                    }
                }
            }
            out.difference_with(&defines[index.index()]);

            let mut candidate = uses[index.index()].clone();
            candidate.union_with(&out);

            if candidate != live_in[index.index()] {
                live_in[index.index()] = candidate;
                for &pred in block.predecessors() {
                    if !queued[pred.index()] {
                        queued[pred.index()] = true;
                        worklist.push_back(pred);
                    }
                }
            }
        }

        if let Some(&entry) = self.graph.rpo().first() {
            if let Some(slot) = live_in[entry.index()].iter().next() {
                return Err(schedule_defect!(
                    "{} is used on a path from the entry block but never defined",
                    self.values[slot]
                ));
            }
        }

        let mut total = 0_usize;
        for (position, set) in live_in.into_iter().enumerate() {
            let mut values: Vec<ValueId> = set.iter().map(|slot| self.values[slot]).collect();
            values.sort_unstable();
            total += values.len();
            self.graph
                .block_mut(BlockIndex(position))
                .set_live_ins(values);
        }

        debug!(
            blocks = count,
            values = capacity,
            iterations,
            live_ins = total,
            "computed live-in sets"
        );
        Ok(())
    }
}

impl ScheduleVisitor for LivenessAnalysis<'_> {
    fn visit_block(&mut self, id: BlockId, deferred: bool, predecessors: &[BlockId]) -> Result<()> {
        self.close_block()?;

        let index = self.graph.schedule(id, deferred)?;
        self.graph
            .block_mut(index)
            .attach(BlockPassData::Liveness(LivenessState::default()))?;
        for &pred in predecessors {
            let pred = self.graph.ensure(pred);
            self.graph.add_predecessor(index, pred);
        }

        trace!(block = %id, predecessors = predecessors.len(), "liveness: block");
        self.current = Some(index);
        Ok(())
    }

    fn visit_goto(&mut self, target: BlockId) -> Result<()> {
        let index = self.open_block()?;
        self.add_successor(index, target);
        self.state_mut(index)?.terminated = true;
        Ok(())
    }

    fn visit_instruction(&mut self, id: ValueId, instruction: &Instruction) -> Result<()> {
        let index = self.open_block()?;
        self.note_value(id);
        for input in instruction.inputs() {
            self.note_value(input);
        }

        if instruction.is_call() {
            self.graph.set_needs_frame();
        }

        if let Instruction::Phi { inputs, .. } = instruction {
            let predecessors = self.graph.block(index).predecessors().to_vec();
            if predecessors.len() != inputs.len() {
                let block = self.graph.block(index).id();
                return Err(schedule_defect!(
                    "phi {} in {} has {} inputs for {} predecessors",
                    id,
                    block,
                    inputs.len(),
                    predecessors.len()
                ));
            }

            let state = self.state_mut(index)?;
            state.define(id);
            state.phis.extend(
                predecessors
                    .into_iter()
                    .zip(inputs.iter().copied())
                    .map(|(from, value)| PhiDescriptor { from, value }),
            );
            return Ok(());
        }

        let state = self.state_mut(index)?;
        for input in instruction.inputs() {
            state.reference(input);
        }
        if instruction.defines_value() {
            state.define(id);
        }
        if instruction.is_terminator() {
            state.terminated = true;
            for target in instruction.successors() {
                self.add_successor(index, target);
            }
        }
        Ok(())
    }
}
