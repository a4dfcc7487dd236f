//! Call sites: operand placement, safepoints and GC relocation.
//!
//! A call's operands are passed in a fixed array of `slot_count` pointer-sized slots. Operands
//! the calling convention pins to a register go to that register's slot, the frame pointer
//! occupies its reserved slot, and the call target and the stack operands take the remaining
//! slots in ascending order. Stack operands are assigned in reverse, so the last one lands in
//! the lowest free slot.
//!
//! Calls and invokes are emitted as safepoints. Every tagged value live into a successor is
//! appended to the safepoint's operands once; the successor rebuilds it from the safepoint's
//! token on entry.

use std::collections::HashMap;

use crate::{
    config::LoweringConfig,
    emit::{Callee, EmitType, Emitter, Intrinsic, ValueHandle},
    graph::{BlockIndex, ValueId},
    lower::{
        builder::SsaBuilder,
        coerce,
        state::{PendingCall, Relocation},
    },
    schedule::{CallDescriptor, CallTarget},
    stackmap::info::{CallInfo, CallKind, ExceptionInfo, ReturnInfo, StackMapInfo, StatepointFlags},
    Error, Result,
};

/// Operands of a call laid out in slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedCall {
    /// One value per slot; unused slots are undefined
    pub(crate) slots: Vec<ValueHandle>,
    /// Slot of the call target, then the slots of the stack operands in operand order
    pub(crate) locations: Vec<usize>,
}

/// Places `callee` and `arguments` into slots according to `descriptor`.
///
/// # Errors
///
/// Returns [`Error::SlotsExhausted`] if the target and the stack operands do not fit into the
/// free slots, and [`Error::ScheduleDefect`] if the operands disagree with the descriptor.
pub(crate) fn resolve_operands(
    emitter: &mut dyn Emitter,
    config: &LoweringConfig,
    descriptor: &CallDescriptor,
    callee: ValueHandle,
    arguments: &[ValueHandle],
    frame_pointer: ValueHandle,
) -> Result<ResolvedCall> {
    if arguments.len() != descriptor.registers_for_operands.len() {
        return Err(schedule_defect!(
            "call passes {} arguments, its descriptor expects {}",
            arguments.len(),
            descriptor.registers_for_operands.len()
        ));
    }
    let slot_count = config.slot_count;
    if config.frame_pointer_slot >= slot_count {
        return Err(schedule_defect!(
            "frame pointer slot {} outside of {} slots",
            config.frame_pointer_slot,
            slot_count
        ));
    }

    let int_ptr = config.int_ptr();
    let undefined = emitter.undef(int_ptr);
    let mut slots = vec![undefined; slot_count];
    let mut occupied = vec![false; slot_count];

    let target = match descriptor.target {
        CallTarget::Code => {
            let code = coerce::ensure_pointer(emitter, callee, EmitType::Tagged)?;
            let offset = emitter.const_int(int_ptr, config.code_entry_offset);
            emitter.build_gep(code, offset, EmitType::RawPtr)?
        }
        CallTarget::Address => callee,
    };

    let mut stack = Vec::new();
    for (argument, register) in arguments.iter().zip(&descriptor.registers_for_operands) {
        match register {
            Some(register) => {
                let slot = usize::from(*register);
                if slot >= slot_count {
                    return Err(schedule_defect!(
                        "operand pinned to slot {} outside of {} slots",
                        slot,
                        slot_count
                    ));
                }
                slots[slot] = *argument;
                occupied[slot] = true;
            }
            None => stack.push(*argument),
        }
    }
    slots[config.frame_pointer_slot] = frame_pointer;
    occupied[config.frame_pointer_slot] = true;

    let exhausted = || Error::SlotsExhausted {
        operands: descriptor.operand_count(),
        slots: slot_count,
    };
    let mut free = (0..slot_count).filter(|slot| !occupied[*slot]);

    let target_slot = free.next().ok_or_else(exhausted)?;
    slots[target_slot] = target;

    let mut stack_slots = Vec::with_capacity(stack.len());
    for _ in &stack {
        stack_slots.push(free.next().ok_or_else(exhausted)?);
    }
    stack_slots.reverse();
    for (argument, slot) in stack.iter().zip(&stack_slots) {
        slots[*slot] = *argument;
    }

    let mut locations = Vec::with_capacity(stack_slots.len() + 1);
    locations.push(target_slot);
    locations.extend(stack_slots);
    Ok(ResolvedCall { slots, locations })
}

/// Leading operands of a safepoint followed by `slots` and the empty transition and deopt lists.
pub(crate) fn statepoint_args(
    emitter: &mut dyn Emitter,
    patch_id: u32,
    bytes: u32,
    slots: &[ValueHandle],
) -> Result<Vec<ValueHandle>> {
    let mut args = Vec::with_capacity(slots.len() + 7);
    args.push(emitter.const_int(EmitType::Int64, i64::from(patch_id)));
    args.push(emitter.const_int(EmitType::Int32, i64::from(bytes)));
    args.push(emitter.null(EmitType::RawPtr));
    args.push(emitter.const_int(EmitType::Int32, int32_operand(slots.len())?));
    args.push(emitter.const_int(
        EmitType::Int32,
        i64::from(StatepointFlags::empty().bits()),
    ));
    args.extend_from_slice(slots);
    args.push(emitter.const_int(EmitType::Int32, 0));
    args.push(emitter.const_int(EmitType::Int32, 0));
    Ok(args)
}

/// Leading operands of a patch point followed by `operands`.
pub(crate) fn patchpoint_args(
    emitter: &mut dyn Emitter,
    patch_id: u32,
    bytes: u32,
    operands: &[ValueHandle],
) -> Result<Vec<ValueHandle>> {
    let mut args = Vec::with_capacity(operands.len() + 4);
    args.push(emitter.const_int(EmitType::Int64, i64::from(patch_id)));
    args.push(emitter.const_int(EmitType::Int32, i64::from(bytes)));
    args.push(emitter.null(EmitType::RawPtr));
    args.push(emitter.const_int(EmitType::Int32, int32_operand(operands.len())?));
    args.extend_from_slice(operands);
    Ok(args)
}

/// A count or position emitted as an `i32` operand.
pub(crate) fn int32_operand(value: usize) -> Result<i64> {
    i32::try_from(value)
        .map(i64::from)
        .map_err(|_| schedule_defect!("{} does not fit an i32 operand", value))
}

impl SsaBuilder<'_> {
    fn resolve_call(
        &mut self,
        descriptor: &CallDescriptor,
        operands: &[ValueId],
    ) -> Result<ResolvedCall> {
        let Some((callee, arguments)) = operands.split_first() else {
            return Err(schedule_defect!("call without callee"));
        };
        let callee = self.input(*callee)?;
        let arguments = arguments
            .iter()
            .map(|argument| self.input(*argument))
            .collect::<Result<Vec<_>>>()?;
        let frame_pointer = self.frame_pointer()?;
        resolve_operands(
            &mut *self.emitter,
            self.config,
            descriptor,
            callee,
            &arguments,
            frame_pointer,
        )
    }

    /// Emits a `Call` or an `Invoke` as a safepoint and hands relocations to the successors.
    pub(super) fn lower_safepoint(
        &mut self,
        id: ValueId,
        descriptor: &CallDescriptor,
        operands: &[ValueId],
        kind: CallKind,
    ) -> Result<()> {
        let current = self.current()?;
        let successors = self.graph.block(current).successors().to_vec();
        let expected = if kind == CallKind::Invoke { 2 } else { 1 };
        if successors.len() != expected {
            return Err(schedule_defect!(
                "{:?} in {} needs {} successors, found {}",
                kind,
                self.block_id(current),
                expected,
                successors.len()
            ));
        }
        if descriptor.return_count > 2 {
            return Err(schedule_defect!(
                "call {} declares {} results",
                id,
                descriptor.return_count
            ));
        }

        let resolved = self.resolve_call(descriptor, operands)?;
        let patch_id = self.next_patch();
        let bytes = self.config.call_bytes(resolved.locations.len());
        let mut args = statepoint_args(&mut *self.emitter, patch_id, bytes, &resolved.slots)?;

        let mut positions: HashMap<ValueId, usize> = HashMap::new();
        let mut handed: Vec<(BlockIndex, Vec<Relocation>)> = Vec::with_capacity(successors.len());
        for &successor in &successors {
            let live_ins = self.graph.block(successor).live_ins().to_vec();
            let mut relocations = Vec::new();
            for live in live_ins {
                if live == id {
                    continue;
                }
                let value = self.value(current, live)?;
                if self.emitter.type_of(value)? != EmitType::Tagged {
                    continue;
                }
                let position = *positions.entry(live).or_insert_with(|| {
                    args.push(value);
                    args.len() - 1
                });
                relocations.push(Relocation {
                    value: live,
                    position,
                });
            }
            handed.push((successor, relocations));
        }

        let callee = Callee::Intrinsic(Intrinsic::Statepoint);
        let token = match kind {
            CallKind::Invoke => {
                let normal = self.native(successors[0])?;
                let unwind = self.native(successors[1])?;
                self.emitter
                    .build_invoke(callee, &args, EmitType::Token, normal, unwind)?
            }
            _ => self.emitter.build_call(callee, &args, EmitType::Token)?,
        };

        for (successor, relocations) in handed {
            self.state_mut(successor)?.relocations.extend(relocations);
        }
        self.state_mut(successors[0])?.pending_call = Some(PendingCall {
            statepoint: token,
            value: id,
            return_count: descriptor.return_count,
        });
        if kind == CallKind::Invoke {
            self.state_mut(successors[1])?.exception = Some(patch_id);
        } else {
            self.state_mut(current)?.after_call = true;
        }

        self.info.insert(
            patch_id,
            StackMapInfo::Call(CallInfo {
                locations: resolved.locations,
                kind,
                return_count: descriptor.return_count,
            }),
        )
    }

    /// Emits a tail call as a patch point followed by an unreachable marker.
    pub(super) fn lower_tail_call(
        &mut self,
        descriptor: &CallDescriptor,
        operands: &[ValueId],
    ) -> Result<()> {
        let resolved = self.resolve_call(descriptor, operands)?;
        let patch_id = self.next_patch();
        let bytes = self.config.call_bytes(resolved.locations.len());
        let args = patchpoint_args(&mut *self.emitter, patch_id, bytes, &resolved.slots)?;
        self.emitter.build_call(
            Callee::Intrinsic(Intrinsic::Patchpoint),
            &args,
            EmitType::Void,
        )?;
        self.emitter.build_unreachable()?;
        self.info.insert(
            patch_id,
            StackMapInfo::Call(CallInfo {
                locations: resolved.locations,
                kind: CallKind::TailCall,
                return_count: descriptor.return_count,
            }),
        )
    }

    /// Reads the pending exception at the top of a landing block.
    pub(super) fn lower_if_exception(&mut self, id: ValueId) -> Result<()> {
        let current = self.current()?;
        let Some(call_patch_id) = self.state(current)?.exception else {
            return Err(schedule_defect!(
                "IfException in {}, which is no exception landing block",
                self.block_id(current)
            ));
        };

        let patch_id = self.next_patch();
        let bytes = self.config.short_call_bytes;
        let args = statepoint_args(&mut *self.emitter, patch_id, bytes, &[])?;
        let token = self.emitter.build_call(
            Callee::Intrinsic(Intrinsic::Statepoint),
            &args,
            EmitType::Token,
        )?;
        let exception = self.emitter.build_call(
            Callee::Intrinsic(Intrinsic::GcResult),
            &[token],
            EmitType::Tagged,
        )?;
        self.define(id, exception)?;
        self.info.insert(
            patch_id,
            StackMapInfo::Exception(ExceptionInfo { call_patch_id }),
        )
    }

    /// Emits a return as a patch point carrying the returned values and the pop count.
    pub(super) fn lower_return(&mut self, pop_count: ValueId, values: &[ValueId]) -> Result<()> {
        if values.is_empty() || values.len() > 2 {
            return Err(schedule_defect!("return of {} values", values.len()));
        }
        let mut operands = values
            .iter()
            .map(|value| self.input(*value))
            .collect::<Result<Vec<_>>>()?;

        let pop = self.input(pop_count)?;
        let int_ptr = self.config.int_ptr();
        let mut instructions = 2;
        let (pop, info) = match self.emitter.constant_int(pop) {
            Some(constant) => {
                let constant = constant + i64::from(self.config.stack_parameter_count);
                if constant == 0 {
                    instructions = 1;
                }
                let info = ReturnInfo {
                    pop_count_is_constant: true,
                    constant,
                };
                (self.emitter.undef(int_ptr), info)
            }
            None => {
                let info = ReturnInfo {
                    pop_count_is_constant: false,
                    constant: 0,
                };
                (coerce::ensure_int_ptr(&mut *self.emitter, self.config, pop)?, info)
            }
        };
        operands.push(pop);

        let patch_id = self.next_patch();
        let bytes = instructions * self.config.short_call_bytes;
        let args = patchpoint_args(&mut *self.emitter, patch_id, bytes, &operands)?;
        self.emitter.build_call(
            Callee::Intrinsic(Intrinsic::Patchpoint),
            &args,
            EmitType::Void,
        )?;
        self.emitter.build_unreachable()?;
        self.info.insert(patch_id, StackMapInfo::Return(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::LirEmitter;

    fn descriptor(target: CallTarget, registers: Vec<Option<u8>>) -> CallDescriptor {
        CallDescriptor::new(target, registers, 1)
    }

    #[test]
    fn test_pinned_target_and_stack_operands() {
        let config = LoweringConfig::new();
        let mut emitter = LirEmitter::new("call");
        let fp = emitter.undef(EmitType::RawPtr);
        let callee = emitter.param(0, EmitType::RawPtr).unwrap();
        let a = emitter.param(1, EmitType::Tagged).unwrap();
        let b = emitter.param(2, EmitType::Tagged).unwrap();
        let c = emitter.param(3, EmitType::Tagged).unwrap();

        let call = descriptor(CallTarget::Address, vec![Some(0), None, None]);
        let resolved =
            resolve_operands(&mut emitter, &config, &call, callee, &[a, b, c], fp).unwrap();

        assert_eq!(resolved.slots.len(), 12);
        assert_eq!(resolved.slots[0], a);
        assert_eq!(resolved.slots[11], fp);
        // target takes the first free slot, stack operands the next ones in reverse
        assert_eq!(resolved.slots[1], callee);
        assert_eq!(resolved.slots[3], b);
        assert_eq!(resolved.slots[2], c);
        assert_eq!(resolved.locations, vec![1, 3, 2]);
    }

    #[test]
    fn test_code_target_skips_header() {
        let config = LoweringConfig::new();
        let mut emitter = LirEmitter::new("call");
        let fp = emitter.undef(EmitType::RawPtr);
        let code = emitter.param(0, EmitType::Tagged).unwrap();

        let call = descriptor(CallTarget::Code, vec![]);
        let resolved = resolve_operands(&mut emitter, &config, &call, code, &[], fp).unwrap();
        let target = resolved.slots[resolved.locations[0]];
        assert_ne!(target, code);
        assert_eq!(emitter.type_of(target).unwrap(), EmitType::RawPtr);
        assert_eq!(resolved.locations, vec![0]);
    }

    #[test]
    fn test_slots_exhausted() {
        let config = LoweringConfig::new().with_slot_count(3).with_frame_pointer_slot(2);
        let mut emitter = LirEmitter::new("call");
        let fp = emitter.undef(EmitType::RawPtr);
        let callee = emitter.param(0, EmitType::RawPtr).unwrap();
        let a = emitter.param(1, EmitType::Tagged).unwrap();
        let b = emitter.param(2, EmitType::Tagged).unwrap();

        let call = descriptor(CallTarget::Address, vec![None, None]);
        let result = resolve_operands(&mut emitter, &config, &call, callee, &[a, b], fp);
        assert!(matches!(
            result,
            Err(Error::SlotsExhausted {
                operands: 3,
                slots: 3
            })
        ));
    }

    #[test]
    fn test_pinned_slot_out_of_range() {
        let config = LoweringConfig::new();
        let mut emitter = LirEmitter::new("call");
        let fp = emitter.undef(EmitType::RawPtr);
        let callee = emitter.param(0, EmitType::RawPtr).unwrap();
        let a = emitter.param(1, EmitType::Tagged).unwrap();

        let call = descriptor(CallTarget::Address, vec![Some(12)]);
        let result = resolve_operands(&mut emitter, &config, &call, callee, &[a], fp);
        assert!(result.unwrap_err().is_defect());
    }

    #[test]
    fn test_statepoint_layout() {
        let mut emitter = LirEmitter::new("call");
        let slot = emitter.undef(EmitType::Int64);
        let args = statepoint_args(&mut emitter, 7, 8, &[slot, slot]).unwrap();
        assert_eq!(args.len(), 9);
        assert_eq!(emitter.constant_int(args[0]), Some(7));
        assert_eq!(emitter.constant_int(args[1]), Some(8));
        assert_eq!(emitter.type_of(args[2]).unwrap(), EmitType::RawPtr);
        assert_eq!(emitter.constant_int(args[3]), Some(2));
        assert_eq!(emitter.constant_int(args[4]), Some(0));
        assert_eq!(args[5], slot);
        assert_eq!(emitter.constant_int(args[8]), Some(0));

        let args = patchpoint_args(&mut emitter, 3, 4, &[slot]).unwrap();
        assert_eq!(args.len(), 5);
        assert_eq!(emitter.constant_int(args[3]), Some(1));
    }

    #[test]
    fn test_int32_operand_range() {
        assert_eq!(int32_operand(19).unwrap(), 19);
        assert_eq!(int32_operand(i32::MAX as usize).unwrap(), i64::from(i32::MAX));
        assert!(int32_operand(i32::MAX as usize + 1).unwrap_err().is_defect());
    }
}
