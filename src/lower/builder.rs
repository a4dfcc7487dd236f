//! The incremental SSA builder.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::{
    backend::Backend,
    config::LoweringConfig,
    emit::{BlockHandle, Callee, EmitType, Emitter, Intrinsic, ValueHandle},
    graph::{BlockId, BlockIndex, BlockPassData, GraphModel, ValueId},
    lower::{
        coerce,
        constants::ConstantRecorder,
        state::{BuilderState, PhiInput, PhiPlaceholder},
    },
    schedule::{Instruction, ScheduleVisitor},
    stackmap::info::StackMapInfoMap,
    Result,
};

/// Everything the patch stage needs besides the emitted code.
#[derive(Debug, Clone)]
pub struct LoweredFunction {
    /// Patch sites keyed by patch id
    pub info: StackMapInfoMap,
    /// Magic constants and what they stand for
    pub constants: ConstantRecorder,
    /// Whether the function performs calls and therefore builds a frame
    pub needs_frame: bool,
    /// Number of patch ids handed out
    pub patch_count: u32,
}

/// Second pass over the schedule: builds the function through an [`Emitter`].
///
/// The builder consumes the [`GraphModel`] produced by [`crate::liveness::LivenessAnalysis`]
/// and relies on its live-in sets. Blocks are emitted in scheduler order. On entry, a block with
/// a single predecessor inherits that predecessor's values; a block with several predecessors
/// gets one phi per live-in value, whose inputs from predecessors that are not built yet are
/// filled in by [`SsaBuilder::finish`].
pub struct SsaBuilder<'a> {
    pub(super) backend: &'a Backend,
    pub(super) config: &'a LoweringConfig,
    pub(super) graph: &'a mut GraphModel,
    pub(super) emitter: &'a mut dyn Emitter,
    pub(super) current: Option<BlockIndex>,
    pub(super) worklist: Vec<BlockIndex>,
    pub(super) info: StackMapInfoMap,
    pub(super) constants: ConstantRecorder,
    pub(super) next_patch_id: u32,
    frame_pointer: Option<ValueHandle>,
    root: Option<ValueHandle>,
}

impl<'a> SsaBuilder<'a> {
    /// Prepares a builder over a graph on which liveness has finished.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PassConflict`] if a block still carries another pass's state.
    pub fn new(
        backend: &'a Backend,
        config: &'a LoweringConfig,
        graph: &'a mut GraphModel,
        emitter: &'a mut dyn Emitter,
    ) -> Result<Self> {
        graph.attach_all(|| BlockPassData::Builder(BuilderState::default()))?;
        Ok(SsaBuilder {
            backend,
            config,
            graph,
            emitter,
            current: None,
            worklist: Vec::new(),
            info: StackMapInfoMap::new(),
            constants: ConstantRecorder::new(),
            next_patch_id: 0,
            frame_pointer: None,
            root: None,
        })
    }

    /// Blocks whose phis still have pending inputs, in the order they were deferred.
    #[must_use]
    pub fn pending_phi_blocks(&self) -> Vec<BlockId> {
        self.worklist
            .iter()
            .map(|index| self.graph.block(*index).id())
            .collect()
    }

    /// Builder state of block `id`, while the builder runs.
    #[must_use]
    pub fn block_state(&self, id: BlockId) -> Option<&BuilderState> {
        self.graph.block_by_id(id).and_then(|block| block.builder())
    }

    /// Phi placeholders of block `id`.
    #[must_use]
    pub fn phi_placeholders(&self, id: BlockId) -> Option<&[PhiPlaceholder]> {
        self.block_state(id).map(BuilderState::phis)
    }

    pub(super) fn state(&self, index: BlockIndex) -> Result<&BuilderState> {
        let block = self.graph.block(index);
        block
            .builder()
            .ok_or_else(|| schedule_defect!("block {} has no builder state", block.id()))
    }

    pub(super) fn state_mut(&mut self, index: BlockIndex) -> Result<&mut BuilderState> {
        let block = self.graph.block_mut(index);
        let id = block.id();
        block
            .builder_mut()
            .ok_or_else(|| schedule_defect!("block {} has no builder state", id))
    }

    pub(super) fn current(&self) -> Result<BlockIndex> {
        self.current
            .ok_or_else(|| schedule_defect!("instruction outside of a block"))
    }

    pub(super) fn block_id(&self, index: BlockIndex) -> BlockId {
        self.graph.block(index).id()
    }

    /// The emitted block that starts `index`, created on first request.
    pub(super) fn native(&mut self, index: BlockIndex) -> Result<BlockHandle> {
        if let Some(native) = self.state(index)?.native {
            return Ok(native);
        }
        let name = self.block_id(index).to_string();
        let native = self.emitter.append_block(&name);
        let state = self.state_mut(index)?;
        state.native = Some(native);
        state.continuation = Some(native);
        Ok(native)
    }

    /// The emitted block that currently ends `index`.
    pub(super) fn continuation(&mut self, index: BlockIndex) -> Result<BlockHandle> {
        match self.state(index)?.continuation {
            Some(continuation) => Ok(continuation),
            None => self.native(index),
        }
    }

    pub(super) fn value(&self, index: BlockIndex, id: ValueId) -> Result<ValueHandle> {
        self.state(index)?.value(id).ok_or_else(|| {
            schedule_defect!("{} is not available in {}", id, self.block_id(index))
        })
    }

    /// Emitted value of `id` in the current block.
    pub(super) fn input(&self, id: ValueId) -> Result<ValueHandle> {
        self.value(self.current()?, id)
    }

    pub(super) fn define(&mut self, id: ValueId, value: ValueHandle) -> Result<()> {
        let current = self.current()?;
        self.state_mut(current)?.values.insert(id, value);
        Ok(())
    }

    pub(super) fn next_patch(&mut self) -> u32 {
        let id = self.next_patch_id;
        self.next_patch_id += 1;
        id
    }

    /// Emits `build` into the prologue and returns to the current block.
    fn in_prologue(
        &mut self,
        build: impl FnOnce(&mut dyn Emitter) -> Result<ValueHandle>,
    ) -> Result<ValueHandle> {
        let resume = self.emitter.current_block();
        let entry = self.emitter.entry_block();
        self.emitter.position_at_end(entry);
        let value = build(&mut *self.emitter);
        self.emitter.position_at_end(resume);
        value
    }

    /// Address of the current frame, computed once in the prologue.
    pub(super) fn frame_pointer(&mut self) -> Result<ValueHandle> {
        if let Some(fp) = self.frame_pointer {
            return Ok(fp);
        }
        let fp = self.in_prologue(|emitter| {
            let level = emitter.const_int(EmitType::Int32, 0);
            emitter.build_call(
                Callee::Intrinsic(Intrinsic::FrameAddress),
                &[level],
                EmitType::RawPtr,
            )
        })?;
        self.frame_pointer = Some(fp);
        Ok(fp)
    }

    /// Base of the root table, read from its pinned register in the prologue.
    pub(super) fn root_base(&mut self) -> Result<ValueHandle> {
        if let Some(root) = self.root {
            return Ok(root);
        }
        let slot = i64::from(self.config.root_slot);
        let root = self.in_prologue(|emitter| {
            let register = emitter.const_int(EmitType::Int32, slot);
            emitter.build_call(
                Callee::Intrinsic(Intrinsic::ReadRegister),
                &[register],
                EmitType::RawPtr,
            )
        })?;
        self.root = Some(root);
        Ok(root)
    }

    fn enqueue(&mut self, index: BlockIndex) {
        if !self.worklist.contains(&index) {
            self.worklist.push(index);
        }
    }

    /// Value `id` of predecessor `pred`, converted to `ty` right before `pred`'s terminator.
    pub(super) fn phi_input(
        &mut self,
        pred: BlockIndex,
        id: ValueId,
        ty: EmitType,
    ) -> Result<ValueHandle> {
        let value = self.value(pred, id)?;
        if self.emitter.type_of(value)? == ty {
            return Ok(value);
        }

        let resume = self.emitter.current_block();
        let continuation = self.continuation(pred)?;
        self.emitter.position_before_terminator(continuation);
        let coerced = coerce::coerce_phi_input(&mut *self.emitter, self.config, value, ty);
        self.emitter.position_at_end(resume);
        coerced
    }

    /// Builds a phi of type `ty` in the current block taking `sources[i]` from predecessor `i`.
    pub(super) fn build_merge_phi(
        &mut self,
        index: BlockIndex,
        ty: EmitType,
        sources: &[(BlockIndex, ValueId)],
    ) -> Result<ValueHandle> {
        let phi = self.emitter.build_phi(ty)?;
        let mut inputs = Vec::with_capacity(sources.len());
        for &(pred, source) in sources {
            if self.state(pred)?.ended {
                let value = self.phi_input(pred, source, ty)?;
                let from = self.continuation(pred)?;
                self.emitter.add_incoming(phi, value, from)?;
                inputs.push((source, PhiInput::Resolved(value)));
            } else {
                inputs.push((source, PhiInput::Pending(pred)));
            }
        }

        let deferred = inputs.iter().any(|(_, input)| input.is_pending());
        self.state_mut(index)?.phis.push(PhiPlaceholder { phi, ty, inputs });
        if deferred {
            self.enqueue(index);
        }
        Ok(phi)
    }

    fn merge_predecessors(&mut self, index: BlockIndex) -> Result<()> {
        let predecessors = self.graph.block(index).predecessors().to_vec();
        let live_ins = self.graph.block(index).live_ins().to_vec();

        let overrides = self.resolve_call_successor(index, predecessors.len())?;

        match predecessors.as_slice() {
            [] => {}
            [pred] => {
                for &live in &live_ins {
                    if overrides.contains_key(&live) {
                        continue;
                    }
                    let value = self.value(*pred, live)?;
                    self.state_mut(index)?.values.insert(live, value);
                }
            }
            _ => {
                let Some(reference) = self.first_built(&predecessors)? else {
                    return Err(schedule_defect!(
                        "no predecessor of {} has been built",
                        self.block_id(index)
                    ));
                };
                for &live in &live_ins {
                    let reference_value = self.value(reference, live)?;
                    let ty = self.emitter.type_of(reference_value)?;
                    let sources: Vec<_> = predecessors.iter().map(|pred| (*pred, live)).collect();
                    let phi = self.build_merge_phi(index, ty, &sources)?;
                    self.state_mut(index)?.values.insert(live, phi);
                }
            }
        }

        self.state_mut(index)?.values.extend(overrides);
        Ok(())
    }

    fn first_built(&self, predecessors: &[BlockIndex]) -> Result<Option<BlockIndex>> {
        for &pred in predecessors {
            if self.state(pred)?.ended {
                return Ok(Some(pred));
            }
        }
        Ok(None)
    }

    /// Rebuilds relocated values and the call result at the top of a call or landing block.
    fn resolve_call_successor(
        &mut self,
        index: BlockIndex,
        predecessor_count: usize,
    ) -> Result<HashMap<ValueId, ValueHandle>> {
        let state = self.state_mut(index)?;
        let pending_call = state.pending_call.take();
        let relocations = std::mem::take(&mut state.relocations);
        let exception = state.exception;

        let mut overrides = HashMap::new();
        if pending_call.is_none() && exception.is_none() {
            return Ok(overrides);
        }
        if predecessor_count != 1 {
            return Err(schedule_defect!(
                "call successor {} has {} predecessors",
                self.block_id(index),
                predecessor_count
            ));
        }

        let token = if exception.is_some() {
            let landing_pad = self.emitter.build_landing_pad()?;
            self.state_mut(index)?.landing_pad = Some(landing_pad);
            landing_pad
        } else if let Some(call) = pending_call {
            call.statepoint
        } else {
            return Ok(overrides);
        };

        for relocation in &relocations {
            let position = super::call::int32_operand(relocation.position)?;
            let operand = self.emitter.const_int(EmitType::Int32, position);
            let relocated = self.emitter.build_call(
                Callee::Intrinsic(Intrinsic::GcRelocate),
                &[token, operand, operand],
                EmitType::Tagged,
            )?;
            overrides.insert(relocation.value, relocated);
        }

        if let Some(call) = pending_call {
            let (intrinsic, ty) = match call.return_count {
                0 => (None, EmitType::Void),
                1 => (Some(Intrinsic::GcResult), EmitType::Tagged),
                2 => (Some(Intrinsic::GcResult2), EmitType::TaggedPair),
                count => {
                    return Err(schedule_defect!(
                        "call {} declares {} results",
                        call.value,
                        count
                    ))
                }
            };
            if let Some(intrinsic) = intrinsic {
                let result = self.emitter.build_call(
                    Callee::Intrinsic(intrinsic),
                    &[call.statepoint],
                    ty,
                )?;
                overrides.insert(call.value, result);
            }
        }

        self.state_mut(index)?.relocations = relocations;
        Ok(overrides)
    }

    /// Ends the current block. A block without terminator and without successors gets an
    /// unreachable marker; one with successors is a defect.
    pub(super) fn end_current_block(&mut self) -> Result<()> {
        let Some(index) = self.current.take() else {
            return Ok(());
        };
        let continuation = self.continuation(index)?;
        if !self.emitter.has_terminator(continuation) {
            if self.graph.block(index).successors().is_empty() {
                self.emitter.build_unreachable()?;
            } else {
                return Err(schedule_defect!(
                    "{} falls through to its successors",
                    self.block_id(index)
                ));
            }
        }
        self.state_mut(index)?.ended = true;
        Ok(())
    }

    /// Maps terminator targets to graph indices and checks them against the graph's edges.
    pub(super) fn check_successors(
        &self,
        index: BlockIndex,
        targets: &[BlockId],
    ) -> Result<Vec<BlockIndex>> {
        let mut indices = Vec::with_capacity(targets.len());
        for target in targets {
            let Some(found) = self.graph.find(*target) else {
                return Err(schedule_defect!("{} branches to unknown {}", self.block_id(index), target));
            };
            indices.push(found);
        }
        if indices != self.graph.block(index).successors() {
            return Err(schedule_defect!(
                "terminator of {} disagrees with its recorded successors",
                self.block_id(index)
            ));
        }
        Ok(indices)
    }

    /// Completes deferred phis, links the prologue and releases the graph.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ScheduleDefect`] if a block was never built, a deferred phi input
    /// refers to a predecessor that never ended, or a phi input is still pending afterwards.
    pub fn finish(mut self) -> Result<LoweredFunction> {
        self.end_current_block()?;

        let worklist = std::mem::take(&mut self.worklist);
        let mut resolved = 0_usize;
        for &index in &worklist {
            let mut phis = std::mem::take(&mut self.state_mut(index)?.phis);
            for placeholder in &mut phis {
                for (source, input) in &mut placeholder.inputs {
                    let PhiInput::Pending(pred) = *input else {
                        continue;
                    };
                    if !self.state(pred)?.ended {
                        return Err(schedule_defect!(
                            "predecessor {} of {} was never built",
                            self.block_id(pred),
                            self.block_id(index)
                        ));
                    }
                    let value = self.phi_input(pred, *source, placeholder.ty)?;
                    let from = self.continuation(pred)?;
                    self.emitter.add_incoming(placeholder.phi, value, from)?;
                    *input = PhiInput::Resolved(value);
                    resolved += 1;
                }
            }
            self.state_mut(index)?.phis = phis;
        }

        for block in self.graph.blocks() {
            let Some(state) = block.builder() else {
                continue;
            };
            if !state.started {
                return Err(schedule_defect!("{} was never built", block.id()));
            }
            if state.has_pending_phis() {
                return Err(schedule_defect!("{} has an unresolved phi input", block.id()));
            }
        }

        let entry = self.emitter.entry_block();
        self.emitter.position_at_end(entry);
        if let Some(&first) = self.graph.rpo().first() {
            let first = self.native(first)?;
            self.emitter.build_br(first)?;
        } else {
            self.emitter.build_unreachable()?;
        }

        debug!(
            blocks = self.graph.len(),
            deferred_blocks = worklist.len(),
            deferred_inputs = resolved,
            patch_sites = self.next_patch_id,
            "built function"
        );

        self.graph.detach_all();
        Ok(LoweredFunction {
            info: self.info,
            constants: self.constants,
            needs_frame: self.graph.needs_frame(),
            patch_count: self.next_patch_id,
        })
    }
}

impl ScheduleVisitor for SsaBuilder<'_> {
    fn visit_block(&mut self, id: BlockId, _deferred: bool, predecessors: &[BlockId]) -> Result<()> {
        self.end_current_block()?;

        let Some(index) = self.graph.find(id) else {
            return Err(schedule_defect!("{} was not seen by liveness", id));
        };
        if self.graph.block(index).predecessors().len() != predecessors.len() {
            return Err(schedule_defect!("predecessors of {} changed between passes", id));
        }
        if self.state(index)?.started {
            return Err(schedule_defect!("{} is built twice", id));
        }

        let native = self.native(index)?;
        self.emitter.position_at_end(native);
        self.state_mut(index)?.started = true;
        self.current = Some(index);

        trace!(block = %id, predecessors = predecessors.len(), "builder: block");
        self.merge_predecessors(index)
    }

    fn visit_goto(&mut self, target: BlockId) -> Result<()> {
        let index = self.current()?;
        let Some(target_index) = self.graph.find(target) else {
            return Err(schedule_defect!("goto to unknown {}", target));
        };
        if !self.graph.block(index).successors().contains(&target_index) {
            return Err(schedule_defect!(
                "goto from {} to {} is not a recorded edge",
                self.block_id(index),
                target
            ));
        }
        let target_native = self.native(target_index)?;
        self.emitter.build_br(target_native)?;
        self.end_current_block()
    }

    fn visit_instruction(&mut self, id: ValueId, instruction: &Instruction) -> Result<()> {
        let index = self.current()?;
        if self.state(index)?.after_call {
            return Err(schedule_defect!(
                "{} follows a call in {}; only a goto may",
                instruction.mnemonic(),
                self.block_id(index)
            ));
        }
        trace!(value = %id, op = instruction.mnemonic(), "builder: instruction");
        self.lower(id, instruction)?;
        if instruction.is_terminator() {
            self.end_current_block()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        emit::{LirEmitter, LirFunction, Op},
        liveness::LivenessAnalysis,
        schedule::{Schedule, ScheduleBuilder},
        test::{b, param, ret, stack_call, v},
        Error,
    };

    fn analyze(schedule: &Schedule) -> GraphModel {
        let mut graph = GraphModel::new();
        let mut liveness = LivenessAnalysis::new(&mut graph);
        schedule.replay(&mut liveness).unwrap();
        liveness.finish().unwrap();
        graph
    }

    fn lower(schedule: &Schedule) -> Result<(LirFunction, LoweredFunction)> {
        let mut graph = analyze(schedule);
        let config = LoweringConfig::new();
        let mut emitter = LirEmitter::new("test");
        let lowered = {
            let mut builder =
                SsaBuilder::new(Backend::initialize(), &config, &mut graph, &mut emitter)?;
            schedule.replay(&mut builder)?;
            builder.finish()?
        };
        Ok((emitter.into_function(), lowered))
    }

    fn block(function: &LirFunction, name: &str) -> BlockHandle {
        function.block_named(name).unwrap()
    }

    /// Operands of the patch point in `name` that follow the four leading fields.
    fn return_operands(function: &LirFunction, name: &str) -> Vec<ValueHandle> {
        let target = block(function, name);
        let site = function
            .calls_to(Callee::Intrinsic(Intrinsic::Patchpoint))
            .into_iter()
            .find(|call| function.block_of(*call) == Some(target))
            .unwrap();
        function.call_args(site)[4..].to_vec()
    }

    #[test]
    fn test_single_predecessor_pass_through() {
        let schedule = ScheduleBuilder::new()
            .block(0, false, &[])
            .instruction(1, param(0))
            .instruction(2, Instruction::Int32Constant(0))
            .goto(1)
            .block(1, false, &[0])
            .instruction(3, ret(2, 1))
            .build();

        let (function, lowered) = lower(&schedule).unwrap();
        assert!(function.phis(block(&function, "B1")).is_empty());
        let operands = return_operands(&function, "B1");
        assert_eq!(function.param_index(operands[0]), Some(0));
        assert_eq!(lowered.patch_count, 1);
        assert!(matches!(
            function.terminator(block(&function, "prologue")),
            Some(Op::Br { .. })
        ));
    }

    #[test]
    fn test_loop_phi_is_deferred_then_resolved() {
        // B0 -> B1 <-> B2, B1 -> B3
        let schedule = ScheduleBuilder::new()
            .block(0, false, &[])
            .instruction(1, param(0))
            .instruction(2, param(1))
            .goto(1)
            .block(1, false, &[0, 2])
            .instruction(
                3,
                Instruction::Phi {
                    representation: crate::schedule::MachineRepresentation::Tagged,
                    inputs: vec![v(1), v(5)],
                },
            )
            .instruction(4, Instruction::Int32Constant(1))
            .instruction(
                6,
                Instruction::Branch {
                    condition: v(4),
                    if_true: b(2),
                    if_false: b(3),
                },
            )
            .block(2, false, &[1])
            .instruction(5, param(2))
            .goto(1)
            .block(3, false, &[1])
            .instruction(7, Instruction::Int32Constant(0))
            .instruction(
                8,
                Instruction::Return {
                    pop_count: v(7),
                    values: vec![v(3), v(2)],
                },
            )
            .build();

        let mut graph = analyze(&schedule);
        let config = LoweringConfig::new();
        let mut emitter = LirEmitter::new("loop");
        {
            let mut builder =
                SsaBuilder::new(Backend::initialize(), &config, &mut graph, &mut emitter).unwrap();
            schedule.replay(&mut builder).unwrap();

            assert_eq!(builder.pending_phi_blocks(), vec![b(1)]);
            let placeholders = builder.phi_placeholders(b(1)).unwrap();
            // the live-in v2 and the scheduled phi v3
            assert_eq!(placeholders.len(), 2);
            for placeholder in placeholders {
                assert!(!placeholder.inputs[0].1.is_pending());
                assert!(placeholder.inputs[1].1.is_pending());
            }
            builder.finish().unwrap();
        }

        let function = emitter.into_function();
        let header = block(&function, "B1");
        let phis = function.phis(header);
        assert_eq!(phis.len(), 2);
        for phi in phis {
            let sources: Vec<_> = function
                .phi_incoming(phi)
                .iter()
                .map(|(_, from)| function.block_name(*from).unwrap().to_string())
                .collect();
            assert_eq!(sources, vec!["B0", "B2"]);
        }
    }

    #[test]
    fn test_call_relocates_live_tagged_values() {
        let schedule = ScheduleBuilder::new()
            .block(0, false, &[])
            .instruction(1, param(0))
            .instruction(2, param(1))
            .instruction(3, stack_call(1, &[]))
            .goto(1)
            .block(1, false, &[0])
            .instruction(4, Instruction::Int32Constant(0))
            .instruction(
                5,
                Instruction::Return {
                    pop_count: v(4),
                    values: vec![v(3), v(2)],
                },
            )
            .build();

        let (function, lowered) = lower(&schedule).unwrap();
        assert!(lowered.needs_frame);

        let statepoints = function.calls_to(Callee::Intrinsic(Intrinsic::Statepoint));
        assert_eq!(statepoints.len(), 1);
        let args = function.call_args(statepoints[0]);
        // 5 leading fields, 12 slots, 2 empty lists, then the live value
        assert_eq!(args.len(), 20);
        assert_eq!(function.param_index(args[19]), Some(1));

        let relocations = function.calls_to(Callee::Intrinsic(Intrinsic::GcRelocate));
        assert_eq!(relocations.len(), 1);
        let relocate_args = function.call_args(relocations[0]);
        assert_eq!(relocate_args[0], statepoints[0]);
        assert_eq!(function.constant(relocate_args[1]), Some(crate::emit::Constant::Int(19)));

        let results = function.calls_to(Callee::Intrinsic(Intrinsic::GcResult));
        let operands = return_operands(&function, "B1");
        assert_eq!(operands[0], results[0]);
        assert_eq!(operands[1], relocations[0]);

        assert!(matches!(
            lowered.info.get(0),
            Some(crate::stackmap::info::StackMapInfo::Call(_))
        ));
    }

    #[test]
    fn test_only_goto_may_follow_call() {
        let schedule = ScheduleBuilder::new()
            .block(0, false, &[])
            .instruction(1, param(0))
            .instruction(2, stack_call(1, &[]))
            .instruction(3, Instruction::Int32Constant(0))
            .goto(1)
            .block(1, false, &[0])
            .instruction(4, ret(3, 2))
            .build();

        assert!(matches!(
            lower(&schedule),
            Err(Error::ScheduleDefect { .. })
        ));
    }

    #[test]
    fn test_if_exception_outside_landing_block() {
        let schedule = ScheduleBuilder::new()
            .block(0, false, &[])
            .instruction(1, Instruction::IfException)
            .instruction(2, Instruction::Int32Constant(0))
            .instruction(3, ret(2, 1))
            .build();

        let err = lower(&schedule).unwrap_err();
        assert!(err.is_defect());
    }
}
