//! Lowering of individual instructions.

use crate::{
    emit::{self, CastKind, EmitType, Intrinsic, Predicate, ValueHandle},
    graph::{BlockId, ValueId},
    lower::{
        builder::SsaBuilder,
        coerce,
        constants::{ConstantKind, ISOLATE_EXTERNAL_REFERENCE_MAGIC, RECORD_STUB_CODE_MAGIC},
    },
    schedule::{
        BinaryOp, CompareOp, ConvertOp, Instruction, MachineRepresentation, MachineType,
        OverflowOp, UnaryOp, WriteBarrierKind,
    },
    stackmap::info::{CallKind, StackMapInfo},
    Result,
};

/// Operand class of an arithmetic or comparison opcode.
#[derive(Clone, Copy)]
enum Operands {
    Word32,
    Word64,
    Float32,
    Float64,
    Tagged,
}

fn binary(op: BinaryOp) -> (emit::BinaryOp, Operands) {
    use emit::BinaryOp as B;
    match op {
        BinaryOp::Int32Add => (B::Add, Operands::Word32),
        BinaryOp::Int32Sub => (B::Sub, Operands::Word32),
        BinaryOp::Int32Mul => (B::Mul, Operands::Word32),
        BinaryOp::Int32Div => (B::SDiv, Operands::Word32),
        BinaryOp::Int32Mod => (B::SRem, Operands::Word32),
        BinaryOp::Uint32Div => (B::UDiv, Operands::Word32),
        BinaryOp::Uint32Mod => (B::URem, Operands::Word32),
        BinaryOp::Word32And => (B::And, Operands::Word32),
        BinaryOp::Word32Or => (B::Or, Operands::Word32),
        BinaryOp::Word32Xor => (B::Xor, Operands::Word32),
        BinaryOp::Word32Shl => (B::Shl, Operands::Word32),
        BinaryOp::Word32Shr => (B::LShr, Operands::Word32),
        BinaryOp::Word32Sar => (B::AShr, Operands::Word32),
        BinaryOp::Int64Add => (B::Add, Operands::Word64),
        BinaryOp::Int64Sub => (B::Sub, Operands::Word64),
        BinaryOp::Int64Mul => (B::Mul, Operands::Word64),
        BinaryOp::Word64And => (B::And, Operands::Word64),
        BinaryOp::Word64Or => (B::Or, Operands::Word64),
        BinaryOp::Word64Xor => (B::Xor, Operands::Word64),
        BinaryOp::Word64Shl => (B::Shl, Operands::Word64),
        BinaryOp::Word64Shr => (B::LShr, Operands::Word64),
        BinaryOp::Word64Sar => (B::AShr, Operands::Word64),
        BinaryOp::Float64Add => (B::FAdd, Operands::Float64),
        BinaryOp::Float64Sub => (B::FSub, Operands::Float64),
        BinaryOp::Float64Mul => (B::FMul, Operands::Float64),
        BinaryOp::Float64Div => (B::FDiv, Operands::Float64),
        BinaryOp::Float64Mod => (B::FRem, Operands::Float64),
        BinaryOp::Float32Add => (B::FAdd, Operands::Float32),
        BinaryOp::Float32Sub => (B::FSub, Operands::Float32),
        BinaryOp::Float32Mul => (B::FMul, Operands::Float32),
        BinaryOp::Float32Div => (B::FDiv, Operands::Float32),
    }
}

fn compare(op: CompareOp) -> (Predicate, Operands) {
    match op {
        CompareOp::Word32Equal => (Predicate::Eq, Operands::Word32),
        CompareOp::Int32LessThan => (Predicate::Slt, Operands::Word32),
        CompareOp::Int32LessThanOrEqual => (Predicate::Sle, Operands::Word32),
        CompareOp::Uint32LessThan => (Predicate::Ult, Operands::Word32),
        CompareOp::Uint32LessThanOrEqual => (Predicate::Ule, Operands::Word32),
        CompareOp::Word64Equal => (Predicate::Eq, Operands::Word64),
        CompareOp::Int64LessThan => (Predicate::Slt, Operands::Word64),
        CompareOp::Int64LessThanOrEqual => (Predicate::Sle, Operands::Word64),
        CompareOp::Uint64LessThan => (Predicate::Ult, Operands::Word64),
        CompareOp::Uint64LessThanOrEqual => (Predicate::Ule, Operands::Word64),
        CompareOp::Float64Equal => (Predicate::FOeq, Operands::Float64),
        CompareOp::Float64LessThan => (Predicate::FOlt, Operands::Float64),
        CompareOp::Float64LessThanOrEqual => (Predicate::FOle, Operands::Float64),
        CompareOp::Float32Equal => (Predicate::FOeq, Operands::Float32),
        CompareOp::Float32LessThan => (Predicate::FOlt, Operands::Float32),
        CompareOp::Float32LessThanOrEqual => (Predicate::FOle, Operands::Float32),
        CompareOp::TaggedEqual => (Predicate::Eq, Operands::Tagged),
    }
}

impl SsaBuilder<'_> {
    pub(super) fn lower(&mut self, id: ValueId, instruction: &Instruction) -> Result<()> {
        let value = match instruction {
            Instruction::Parameter {
                index,
                representation,
            } => {
                let ty = self.backend.emit_type(*representation)?;
                self.emitter.param(*index, ty)?
            }
            Instruction::Int32Constant(c) => self.emitter.const_int(EmitType::Int32, i64::from(*c)),
            Instruction::Int64Constant(c) => self.emitter.const_int(EmitType::Int64, *c),
            Instruction::Float32Constant(c) => {
                self.emitter.const_float(EmitType::Float32, f64::from(*c))
            }
            Instruction::Float64Constant(c) => self.emitter.const_float(EmitType::Float64, *c),
            Instruction::SmiConstant(bits) => {
                let word = self.emitter.const_int(self.config.int_ptr(), *bits);
                self.emitter
                    .build_cast(CastKind::IntToPtr, word, EmitType::Tagged)?
            }
            Instruction::HeapConstant(magic) => {
                self.constants.register(*magic, ConstantKind::HeapConstant)?;
                self.emitter.load_constant(EmitType::Tagged, *magic)?
            }
            Instruction::ExternalConstant(magic) => {
                self.constants
                    .register(*magic, ConstantKind::ExternalReference)?;
                self.emitter.load_constant(EmitType::RawPtr, *magic)?
            }
            Instruction::Root(index) => self.lower_root(*index)?,
            Instruction::LoadFramePointer => self.frame_pointer()?,
            Instruction::LoadParentFramePointer => {
                let fp = self.frame_pointer()?;
                if self.graph.needs_frame() {
                    self.emitter.build_load(fp, EmitType::RawPtr)?
                } else {
                    fp
                }
            }
            Instruction::StackSlot { size, alignment } => {
                self.emitter.build_alloca(*size, *alignment)?
            }
            Instruction::Unary { op, input } => self.lower_unary(*op, *input)?,
            Instruction::Binary { op, lhs, rhs } => {
                let (op, operands) = binary(*op);
                let lhs = self.operand(*lhs, operands)?;
                let rhs = self.operand(*rhs, operands)?;
                self.emitter.build_binary(op, lhs, rhs)?
            }
            Instruction::Compare { op, lhs, rhs } => {
                let (predicate, operands) = compare(*op);
                let lhs = self.operand(*lhs, operands)?;
                let rhs = self.operand(*rhs, operands)?;
                self.emitter.build_compare(predicate, lhs, rhs)?
            }
            Instruction::Convert { op, input } => self.lower_convert(*op, *input)?,
            Instruction::Overflow { op, lhs, rhs } => {
                let intrinsic = match op {
                    OverflowOp::Int32AddWithOverflow => Intrinsic::SAddWithOverflow,
                    OverflowOp::Int32SubWithOverflow => Intrinsic::SSubWithOverflow,
                    OverflowOp::Int32MulWithOverflow => Intrinsic::SMulWithOverflow,
                };
                let lhs = self.operand(*lhs, Operands::Word32)?;
                let rhs = self.operand(*rhs, Operands::Word32)?;
                self.emitter.build_call(
                    emit::Callee::Intrinsic(intrinsic),
                    &[lhs, rhs],
                    EmitType::Int32Overflow,
                )?
            }
            Instruction::Projection { index, input } => {
                let aggregate = self.input(*input)?;
                self.emitter.build_extract_value(aggregate, *index)?
            }
            Instruction::Load {
                machine_type,
                base,
                offset,
            } => self.lower_load(*machine_type, *base, *offset)?,
            Instruction::Store {
                representation,
                barrier,
                base,
                offset,
                value,
            } => {
                return self.lower_store(id, *representation, *barrier, *base, *offset, *value);
            }
            Instruction::Phi {
                representation,
                inputs,
            } => self.lower_phi(*representation, inputs)?,
            Instruction::Call {
                descriptor,
                operands,
            } => return self.lower_safepoint(id, descriptor, operands, CallKind::Call),
            Instruction::Invoke {
                descriptor,
                operands,
                then,
                exception,
            } => {
                let current = self.current()?;
                self.check_successors(current, &[*then, *exception])?;
                return self.lower_safepoint(id, descriptor, operands, CallKind::Invoke);
            }
            Instruction::TailCall {
                descriptor,
                operands,
            } => return self.lower_tail_call(descriptor, operands),
            Instruction::CallWithCallerSavedRegisters {
                function,
                arguments,
            } => {
                let function = self.input(*function)?;
                let function = coerce::ensure_pointer(&mut *self.emitter, function, EmitType::RawPtr)?;
                let arguments = arguments
                    .iter()
                    .map(|argument| self.input(*argument))
                    .collect::<Result<Vec<_>>>()?;
                let int_ptr = self.config.int_ptr();
                self.emitter
                    .build_call(emit::Callee::Value(function), &arguments, int_ptr)?
            }
            Instruction::IfException => return self.lower_if_exception(id),
            Instruction::IfValue(case) => return self.lower_if_value(*case),
            Instruction::IfDefault => return Ok(()),
            Instruction::Branch {
                condition,
                if_true,
                if_false,
            } => return self.lower_branch(*condition, *if_true, *if_false),
            Instruction::Switch { input, successors } => {
                return self.lower_switch(*input, successors)
            }
            Instruction::Return { pop_count, values } => {
                return self.lower_return(*pop_count, values)
            }
        };
        self.define(id, value)
    }

    fn operand(&mut self, id: ValueId, operands: Operands) -> Result<ValueHandle> {
        let value = self.input(id)?;
        match operands {
            Operands::Word32 => coerce::ensure_word32(&mut *self.emitter, value),
            Operands::Word64 => coerce::ensure_word64(&mut *self.emitter, value),
            Operands::Float32 => coerce::expect_type(&*self.emitter, value, EmitType::Float32),
            Operands::Float64 => coerce::expect_type(&*self.emitter, value, EmitType::Float64),
            Operands::Tagged => coerce::ensure_pointer(&mut *self.emitter, value, EmitType::Tagged),
        }
    }

    fn lower_root(&mut self, index: u32) -> Result<ValueHandle> {
        let base = self.root_base()?;
        let offset = i64::from(index) * i64::from(self.config.pointer_size);
        let offset = self.emitter.const_int(self.config.int_ptr(), offset);
        let address = self.emitter.build_gep(base, offset, EmitType::RawPtr)?;
        self.emitter.build_load(address, EmitType::Tagged)
    }

    fn lower_unary(&mut self, op: UnaryOp, input: ValueId) -> Result<ValueHandle> {
        match op {
            UnaryOp::Float64Neg | UnaryOp::Float32Neg => {
                let (operands, ty) = if op == UnaryOp::Float64Neg {
                    (Operands::Float64, EmitType::Float64)
                } else {
                    (Operands::Float32, EmitType::Float32)
                };
                let value = self.operand(input, operands)?;
                let zero = self.emitter.const_float(ty, -0.0);
                self.emitter.build_binary(emit::BinaryOp::FSub, zero, value)
            }
            UnaryOp::Float64Abs => {
                let value = self.operand(input, Operands::Float64)?;
                self.call_intrinsic(Intrinsic::Fabs, &[value], EmitType::Float64)
            }
            UnaryOp::Float32Abs => {
                let value = self.operand(input, Operands::Float32)?;
                self.call_intrinsic(Intrinsic::Fabs, &[value], EmitType::Float32)
            }
            UnaryOp::Float64Sqrt => {
                let value = self.operand(input, Operands::Float64)?;
                self.call_intrinsic(Intrinsic::Sqrt, &[value], EmitType::Float64)
            }
            UnaryOp::Float32Sqrt => {
                let value = self.operand(input, Operands::Float32)?;
                self.call_intrinsic(Intrinsic::Sqrt, &[value], EmitType::Float32)
            }
            UnaryOp::Word32Clz => {
                let value = self.operand(input, Operands::Word32)?;
                let poison = self.emitter.const_int(EmitType::Bool, 0);
                self.call_intrinsic(Intrinsic::Ctlz, &[value, poison], EmitType::Int32)
            }
            UnaryOp::Word64Clz => {
                let value = self.operand(input, Operands::Word64)?;
                let poison = self.emitter.const_int(EmitType::Bool, 0);
                self.call_intrinsic(Intrinsic::Ctlz, &[value, poison], EmitType::Int64)
            }
            UnaryOp::Float64ExtractLowWord32 | UnaryOp::Float64ExtractHighWord32 => {
                let value = self.operand(input, Operands::Float64)?;
                let mut bits = self
                    .emitter
                    .build_cast(CastKind::Bitcast, value, EmitType::Int64)?;
                if op == UnaryOp::Float64ExtractHighWord32 {
                    let shift = self.emitter.const_int(EmitType::Int64, 32);
                    bits = self.emitter.build_binary(emit::BinaryOp::LShr, bits, shift)?;
                }
                self.emitter.build_cast(CastKind::Trunc, bits, EmitType::Int32)
            }
        }
    }

    fn call_intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        operands: &[ValueHandle],
        ty: EmitType,
    ) -> Result<ValueHandle> {
        self.emitter
            .build_call(emit::Callee::Intrinsic(intrinsic), operands, ty)
    }

    fn lower_convert(&mut self, op: ConvertOp, input: ValueId) -> Result<ValueHandle> {
        let (operands, kind, ty) = match op {
            ConvertOp::BitcastWordToTagged => {
                let value = self.input(input)?;
                return coerce::ensure_pointer(&mut *self.emitter, value, EmitType::Tagged);
            }
            ConvertOp::BitcastTaggedToWord => {
                let value = self.input(input)?;
                return coerce::ensure_int_ptr(&mut *self.emitter, self.config, value);
            }
            ConvertOp::TruncateFloat64ToWord32 => {
                let value = self.operand(input, Operands::Float64)?;
                return self.emitter.build_call(
                    emit::Callee::Intrinsic(Intrinsic::TruncateToWord32),
                    &[value],
                    EmitType::Int32,
                );
            }
            ConvertOp::ChangeInt32ToFloat64 => (Operands::Word32, CastKind::SIToFP, EmitType::Float64),
            ConvertOp::ChangeUint32ToFloat64 => {
                (Operands::Word32, CastKind::UIToFP, EmitType::Float64)
            }
            ConvertOp::ChangeFloat32ToFloat64 => {
                (Operands::Float32, CastKind::FPExt, EmitType::Float64)
            }
            ConvertOp::ChangeFloat64ToInt32 | ConvertOp::RoundFloat64ToInt32 => {
                (Operands::Float64, CastKind::FPToSI, EmitType::Int32)
            }
            ConvertOp::ChangeFloat64ToUint32 => {
                (Operands::Float64, CastKind::FPToUI, EmitType::Int32)
            }
            ConvertOp::ChangeInt32ToInt64 => (Operands::Word32, CastKind::SExt, EmitType::Int64),
            ConvertOp::ChangeUint32ToUint64 => (Operands::Word32, CastKind::ZExt, EmitType::Int64),
            ConvertOp::TruncateInt64ToInt32 => (Operands::Word64, CastKind::Trunc, EmitType::Int32),
            ConvertOp::TruncateFloat64ToFloat32 => {
                (Operands::Float64, CastKind::FPTrunc, EmitType::Float32)
            }
            ConvertOp::RoundInt32ToFloat32 => (Operands::Word32, CastKind::SIToFP, EmitType::Float32),
            ConvertOp::RoundUint32ToFloat32 => {
                (Operands::Word32, CastKind::UIToFP, EmitType::Float32)
            }
            ConvertOp::BitcastFloat32ToInt32 => {
                (Operands::Float32, CastKind::Bitcast, EmitType::Int32)
            }
            ConvertOp::BitcastInt32ToFloat32 => {
                (Operands::Word32, CastKind::Bitcast, EmitType::Float32)
            }
            ConvertOp::BitcastFloat64ToInt64 => {
                (Operands::Float64, CastKind::Bitcast, EmitType::Int64)
            }
            ConvertOp::BitcastInt64ToFloat64 => {
                (Operands::Word64, CastKind::Bitcast, EmitType::Float64)
            }
        };
        let value = self.operand(input, operands)?;
        self.emitter.build_cast(kind, value, ty)
    }

    /// `base + offset` as a raw pointer.
    fn address(&mut self, base: ValueId, offset: ValueId) -> Result<ValueHandle> {
        let base = self.input(base)?;
        let base = coerce::ensure_pointer(&mut *self.emitter, base, EmitType::RawPtr)?;
        let offset = self.input(offset)?;
        let offset = if self.emitter.type_of(offset)?.is_integer() {
            offset
        } else {
            coerce::ensure_int_ptr(&mut *self.emitter, self.config, offset)?
        };
        self.emitter.build_gep(base, offset, EmitType::RawPtr)
    }

    fn lower_load(
        &mut self,
        machine_type: MachineType,
        base: ValueId,
        offset: ValueId,
    ) -> Result<ValueHandle> {
        let ty = self.backend.emit_type(machine_type.representation)?;
        let address = self.address(base, offset)?;
        let value = self.emitter.build_load(address, ty)?;
        match machine_type.representation {
            MachineRepresentation::Word8 | MachineRepresentation::Word16 => {
                let kind = if machine_type.semantic.is_signed() {
                    CastKind::SExt
                } else {
                    CastKind::ZExt
                };
                self.emitter.build_cast(kind, value, EmitType::Int32)
            }
            _ => Ok(value),
        }
    }

    fn lower_store(
        &mut self,
        id: ValueId,
        representation: MachineRepresentation,
        barrier: WriteBarrierKind,
        base: ValueId,
        offset: ValueId,
        value: ValueId,
    ) -> Result<()> {
        let ty = self.backend.emit_type(representation)?;
        let address = self.address(base, offset)?;
        let stored = self.input(value)?;
        let stored = match ty {
            EmitType::Int8 | EmitType::Int16 => {
                let word = coerce::ensure_word32(&mut *self.emitter, stored)?;
                self.emitter.build_cast(CastKind::Trunc, word, ty)?
            }
            EmitType::Int32 => coerce::ensure_word32(&mut *self.emitter, stored)?,
            EmitType::Int64 => coerce::ensure_word64(&mut *self.emitter, stored)?,
            EmitType::Tagged | EmitType::RawPtr => {
                coerce::ensure_pointer(&mut *self.emitter, stored, ty)?
            }
            _ => coerce::expect_type(&*self.emitter, stored, ty)?,
        };
        self.emitter.build_store(stored, address)?;

        if barrier != WriteBarrierKind::None && representation.is_tagged() {
            self.lower_store_barrier(id, barrier, base, offset, stored)?;
        }
        Ok(())
    }

    /// Calls the record-write stub after a tagged store, skipping small integers where the
    /// barrier kind allows them.
    fn lower_store_barrier(
        &mut self,
        id: ValueId,
        barrier: WriteBarrierKind,
        base: ValueId,
        offset: ValueId,
        stored: ValueHandle,
    ) -> Result<()> {
        let current = self.current()?;
        let prefix = format!("{}.{}", self.block_id(current), id);
        let continuation = self.emitter.append_block(&format!("{prefix}.continuation"));
        let record = self.emitter.append_block(&format!("{prefix}.barrier"));
        let int_ptr = self.config.int_ptr();

        if barrier.needs_smi_check() {
            let word = coerce::ensure_int_ptr(&mut *self.emitter, self.config, stored)?;
            let one = self.emitter.const_int(int_ptr, 1);
            let tag = self.emitter.build_binary(emit::BinaryOp::And, word, one)?;
            let zero = self.emitter.const_int(int_ptr, 0);
            let is_smi = self.emitter.build_compare(Predicate::Eq, tag, zero)?;
            self.emitter.build_cond_br(is_smi, continuation, record)?;
        } else {
            self.emitter.build_br(record)?;
        }
        self.emitter.position_at_end(record);

        let object = self.input(base)?;
        let object = coerce::ensure_pointer(&mut *self.emitter, object, EmitType::Tagged)?;
        let slot = self.input(offset)?;
        let slot = coerce::ensure_int_ptr(&mut *self.emitter, self.config, slot)?;

        self.constants.register(
            ISOLATE_EXTERNAL_REFERENCE_MAGIC,
            ConstantKind::IsolateExternalReference,
        )?;
        let isolate = self
            .emitter
            .load_constant(EmitType::RawPtr, ISOLATE_EXTERNAL_REFERENCE_MAGIC)?;
        let remembered_set = match barrier {
            WriteBarrierKind::Map => 0,
            _ => 2,
        };
        let remembered_set = self.emitter.const_int(int_ptr, remembered_set);
        let save_fp = self.emitter.const_int(int_ptr, 0);
        let fp = self.frame_pointer()?;
        self.constants
            .register(RECORD_STUB_CODE_MAGIC, ConstantKind::RecordStubCode)?;
        let stub = self
            .emitter
            .load_constant(EmitType::RawPtr, RECORD_STUB_CODE_MAGIC)?;

        let patch_id = self.next_patch();
        let operands = [object, slot, isolate, remembered_set, save_fp, fp, stub];
        let args = super::call::patchpoint_args(
            &mut *self.emitter,
            patch_id,
            self.config.short_call_bytes,
            &operands,
        )?;
        self.emitter.build_call(
            emit::Callee::Intrinsic(Intrinsic::Patchpoint),
            &args,
            EmitType::Void,
        )?;
        self.emitter.build_br(continuation)?;

        self.emitter.position_at_end(continuation);
        self.state_mut(current)?.continuation = Some(continuation);
        self.info.insert(patch_id, StackMapInfo::StoreBarrier)
    }

    fn lower_phi(
        &mut self,
        representation: MachineRepresentation,
        inputs: &[ValueId],
    ) -> Result<ValueHandle> {
        let current = self.current()?;
        let ty = self.backend.emit_type(representation)?;
        let predecessors = self.graph.block(current).predecessors().to_vec();
        if predecessors.len() != inputs.len() {
            return Err(schedule_defect!(
                "phi in {} has {} inputs for {} predecessors",
                self.block_id(current),
                inputs.len(),
                predecessors.len()
            ));
        }
        let sources: Vec<_> = predecessors.into_iter().zip(inputs.iter().copied()).collect();
        self.build_merge_phi(current, ty, &sources)
    }

    fn lower_if_value(&mut self, case: i32) -> Result<()> {
        let current = self.current()?;
        let &[predecessor] = self.graph.block(current).predecessors() else {
            return Err(schedule_defect!(
                "switch case {} must have exactly one predecessor",
                self.block_id(current)
            ));
        };
        let Some(switch) = self.state(predecessor)?.switch else {
            return Err(schedule_defect!(
                "predecessor of case {} does not end in a switch",
                self.block_id(current)
            ));
        };
        let target = self.native(current)?;
        self.emitter.add_case(switch, i64::from(case), target)
    }

    fn lower_branch(
        &mut self,
        condition: ValueId,
        if_true: BlockId,
        if_false: BlockId,
    ) -> Result<()> {
        let current = self.current()?;
        let targets = self.check_successors(current, &[if_true, if_false])?;

        let condition = self.input(condition)?;
        let ty = self.emitter.type_of(condition)?;
        let mut condition = if ty == EmitType::Bool {
            condition
        } else if ty.is_integer() || ty.is_pointer() {
            let word = if ty.is_pointer() {
                coerce::ensure_int_ptr(&mut *self.emitter, self.config, condition)?
            } else {
                condition
            };
            self.emitter
                .build_cast(CastKind::Trunc, word, EmitType::Bool)?
        } else {
            return Err(representation_defect!(
                "branch condition {} is {}",
                condition,
                ty
            ));
        };

        let true_deferred = self.graph.block(targets[0]).is_deferred();
        let false_deferred = self.graph.block(targets[1]).is_deferred();
        if true_deferred != false_deferred {
            let expected = self
                .emitter
                .const_int(EmitType::Bool, i64::from(false_deferred));
            condition = self.emitter.build_call(
                emit::Callee::Intrinsic(Intrinsic::Expect),
                &[condition, expected],
                EmitType::Bool,
            )?;
        }

        let if_true = self.native(targets[0])?;
        let if_false = self.native(targets[1])?;
        self.emitter.build_cond_br(condition, if_true, if_false)
    }

    fn lower_switch(&mut self, input: ValueId, successors: &[BlockId]) -> Result<()> {
        let current = self.current()?;
        let targets = self.check_successors(current, successors)?;
        let Some(&default) = targets.last() else {
            return Err(schedule_defect!(
                "switch in {} has no successors",
                self.block_id(current)
            ));
        };

        let selector = self.operand(input, Operands::Word32)?;
        let default = self.native(default)?;
        let switch = self.emitter.build_switch(selector, default)?;
        self.state_mut(current)?.switch = Some(switch);
        Ok(())
    }
}
