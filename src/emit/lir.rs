//! The recording emitter.

use std::{collections::HashMap, fmt};

use crate::{
    emit::{
        BinaryOp, BlockHandle, Callee, CastKind, EmitType, Emitter, Predicate, ValueHandle,
    },
    Result,
};

/// A constant value.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Constant {
    /// Integer constant
    Int(i64),
    /// Float constant
    Float(f64),
    /// Null pointer
    Null,
    /// Undefined value
    Undef,
}

/// An emitted instruction.
#[derive(Clone, PartialEq, Debug)]
#[allow(missing_docs)]
pub enum Op {
    Binary {
        op: BinaryOp,
        lhs: ValueHandle,
        rhs: ValueHandle,
    },
    Compare {
        predicate: Predicate,
        lhs: ValueHandle,
        rhs: ValueHandle,
    },
    Cast {
        kind: CastKind,
        value: ValueHandle,
    },
    Load {
        pointer: ValueHandle,
    },
    Store {
        value: ValueHandle,
        pointer: ValueHandle,
    },
    Gep {
        base: ValueHandle,
        offset: ValueHandle,
    },
    Alloca {
        size: u32,
        alignment: u32,
    },
    LoadConstant {
        magic: u64,
    },
    Phi {
        incoming: Vec<(ValueHandle, BlockHandle)>,
    },
    Br {
        target: BlockHandle,
    },
    CondBr {
        condition: ValueHandle,
        if_true: BlockHandle,
        if_false: BlockHandle,
    },
    Switch {
        value: ValueHandle,
        default: BlockHandle,
        cases: Vec<(i64, BlockHandle)>,
    },
    Call {
        callee: Callee,
        args: Vec<ValueHandle>,
    },
    Invoke {
        callee: Callee,
        args: Vec<ValueHandle>,
        normal: BlockHandle,
        unwind: BlockHandle,
    },
    LandingPad,
    ExtractValue {
        aggregate: ValueHandle,
        index: u32,
    },
    Ret {
        value: Option<ValueHandle>,
    },
    Unreachable,
}

impl Op {
    /// Whether the instruction ends its block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Br { .. }
                | Op::CondBr { .. }
                | Op::Switch { .. }
                | Op::Invoke { .. }
                | Op::Ret { .. }
                | Op::Unreachable
        )
    }

    /// Blocks this terminator can transfer control to.
    #[must_use]
    pub fn targets(&self) -> Vec<BlockHandle> {
        match self {
            Op::Br { target } => vec![*target],
            Op::CondBr {
                if_true, if_false, ..
            } => vec![*if_true, *if_false],
            Op::Switch { default, cases, .. } => std::iter::once(*default)
                .chain(cases.iter().map(|(_, target)| *target))
                .collect(),
            Op::Invoke { normal, unwind, .. } => vec![*normal, *unwind],
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
enum ValueKind {
    Constant(Constant),
    Param(u32),
    Instruction { block: BlockHandle, op: Op },
}

#[derive(Clone, Debug)]
struct Value {
    ty: EmitType,
    kind: ValueKind,
}

#[derive(Clone, Debug)]
struct BlockData {
    name: String,
    instructions: Vec<ValueHandle>,
}

/// A function recorded by [`LirEmitter`].
#[derive(Clone, Debug)]
pub struct LirFunction {
    name: String,
    blocks: Vec<BlockData>,
    values: Vec<Value>,
    params: HashMap<u32, ValueHandle>,
}

impl LirFunction {
    fn new(name: &str) -> Self {
        LirFunction {
            name: name.to_string(),
            blocks: Vec::new(),
            values: Vec::new(),
            params: HashMap::new(),
        }
    }

    fn value(&self, handle: ValueHandle) -> Result<&Value> {
        self.values
            .get(handle.index())
            .ok_or_else(|| representation_defect!("{} does not belong to {}", handle, self.name))
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of blocks, prologue included.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// All block handles in creation order.
    pub fn block_handles(&self) -> impl Iterator<Item = BlockHandle> + '_ {
        (0..self.blocks.len()).filter_map(|index| u32::try_from(index).ok().map(BlockHandle))
    }

    /// Looks a block up by the name it was created with.
    #[must_use]
    pub fn block_named(&self, name: &str) -> Option<BlockHandle> {
        self.blocks
            .iter()
            .position(|block| block.name == name)
            .and_then(|index| u32::try_from(index).ok())
            .map(BlockHandle)
    }

    /// Name a block was created with.
    #[must_use]
    pub fn block_name(&self, block: BlockHandle) -> Option<&str> {
        self.blocks.get(block.index()).map(|data| data.name.as_str())
    }

    /// Instructions of `block` in order.
    #[must_use]
    pub fn instructions(&self, block: BlockHandle) -> &[ValueHandle] {
        self.blocks
            .get(block.index())
            .map_or(&[], |data| data.instructions.as_slice())
    }

    /// The instruction behind `value`, if it is one.
    #[must_use]
    pub fn op(&self, value: ValueHandle) -> Option<&Op> {
        match self.values.get(value.index()).map(|v| &v.kind) {
            Some(ValueKind::Instruction { op, .. }) => Some(op),
            _ => None,
        }
    }

    /// The block an instruction was placed in.
    #[must_use]
    pub fn block_of(&self, value: ValueHandle) -> Option<BlockHandle> {
        match self.values.get(value.index()).map(|v| &v.kind) {
            Some(ValueKind::Instruction { block, .. }) => Some(*block),
            _ => None,
        }
    }

    /// The constant behind `value`, if it is one.
    #[must_use]
    pub fn constant(&self, value: ValueHandle) -> Option<Constant> {
        match self.values.get(value.index()).map(|v| &v.kind) {
            Some(ValueKind::Constant(constant)) => Some(*constant),
            _ => None,
        }
    }

    /// The parameter position behind `value`, if it is a parameter.
    #[must_use]
    pub fn param_index(&self, value: ValueHandle) -> Option<u32> {
        match self.values.get(value.index()).map(|v| &v.kind) {
            Some(ValueKind::Param(index)) => Some(*index),
            _ => None,
        }
    }

    /// Type of `value`.
    #[must_use]
    pub fn type_of(&self, value: ValueHandle) -> Option<EmitType> {
        self.values.get(value.index()).map(|v| v.ty)
    }

    /// The terminator of `block`, if it has one.
    #[must_use]
    pub fn terminator(&self, block: BlockHandle) -> Option<&Op> {
        self.instructions(block)
            .last()
            .and_then(|last| self.op(*last))
            .filter(|op| op.is_terminator())
    }

    /// The phis at the top of `block`.
    #[must_use]
    pub fn phis(&self, block: BlockHandle) -> Vec<ValueHandle> {
        self.instructions(block)
            .iter()
            .copied()
            .take_while(|inst| matches!(self.op(*inst), Some(Op::Phi { .. })))
            .collect()
    }

    /// Incoming edges of a phi.
    #[must_use]
    pub fn phi_incoming(&self, phi: ValueHandle) -> &[(ValueHandle, BlockHandle)] {
        match self.op(phi) {
            Some(Op::Phi { incoming }) => incoming,
            _ => &[],
        }
    }

    /// Every call instruction (plain or invoke) whose callee is `callee`, in block order.
    #[must_use]
    pub fn calls_to(&self, callee: Callee) -> Vec<ValueHandle> {
        self.blocks
            .iter()
            .flat_map(|block| block.instructions.iter().copied())
            .filter(|inst| match self.op(*inst) {
                Some(Op::Call { callee: c, .. } | Op::Invoke { callee: c, .. }) => *c == callee,
                _ => false,
            })
            .collect()
    }

    /// Arguments of a call or invoke.
    #[must_use]
    pub fn call_args(&self, call: ValueHandle) -> &[ValueHandle] {
        match self.op(call) {
            Some(Op::Call { args, .. } | Op::Invoke { args, .. }) => args,
            _ => &[],
        }
    }

    fn write_value(&self, f: &mut fmt::Formatter<'_>, value: ValueHandle) -> fmt::Result {
        match self.values.get(value.index()).map(|v| &v.kind) {
            Some(ValueKind::Constant(Constant::Int(c))) => write!(f, "{c}"),
            Some(ValueKind::Constant(Constant::Float(c))) => write!(f, "{c:?}"),
            Some(ValueKind::Constant(Constant::Null)) => f.write_str("null"),
            Some(ValueKind::Constant(Constant::Undef)) => f.write_str("undef"),
            Some(ValueKind::Param(index)) => write!(f, "%arg{index}"),
            _ => write!(f, "{value}"),
        }
    }

    fn write_list(&self, f: &mut fmt::Formatter<'_>, values: &[ValueHandle]) -> fmt::Result {
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            self.write_value(f, *value)?;
        }
        Ok(())
    }

    fn write_op(&self, f: &mut fmt::Formatter<'_>, op: &Op) -> fmt::Result {
        match op {
            Op::Binary { op, lhs, rhs } => {
                let name: &'static str = op.into();
                write!(f, "{name} ")?;
                self.write_list(f, &[*lhs, *rhs])
            }
            Op::Compare {
                predicate,
                lhs,
                rhs,
            } => {
                let name: &'static str = predicate.into();
                write!(f, "cmp {name} ")?;
                self.write_list(f, &[*lhs, *rhs])
            }
            Op::Cast { kind, value } => {
                let name: &'static str = kind.into();
                write!(f, "{name} ")?;
                self.write_value(f, *value)
            }
            Op::Load { pointer } => {
                f.write_str("load ")?;
                self.write_value(f, *pointer)
            }
            Op::Store { value, pointer } => {
                f.write_str("store ")?;
                self.write_list(f, &[*value, *pointer])
            }
            Op::Gep { base, offset } => {
                f.write_str("gep ")?;
                self.write_list(f, &[*base, *offset])
            }
            Op::Alloca { size, alignment } => write!(f, "alloca {size}, align {alignment}"),
            Op::LoadConstant { magic } => write!(f, "loadconst {magic:#x}"),
            Op::Phi { incoming } => {
                f.write_str("phi ")?;
                for (i, (value, block)) in incoming.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str("[ ")?;
                    self.write_value(f, *value)?;
                    write!(f, ", {block} ]")?;
                }
                Ok(())
            }
            Op::Br { target } => write!(f, "br {target}"),
            Op::CondBr {
                condition,
                if_true,
                if_false,
            } => {
                f.write_str("br ")?;
                self.write_value(f, *condition)?;
                write!(f, ", {if_true}, {if_false}")
            }
            Op::Switch {
                value,
                default,
                cases,
            } => {
                f.write_str("switch ")?;
                self.write_value(f, *value)?;
                write!(f, ", {default} [")?;
                for (case, target) in cases {
                    write!(f, " {case}: {target}")?;
                }
                f.write_str(" ]")
            }
            Op::Call { callee, args } => {
                write!(f, "call {callee}(")?;
                self.write_list(f, args)?;
                f.write_str(")")
            }
            Op::Invoke {
                callee,
                args,
                normal,
                unwind,
            } => {
                write!(f, "invoke {callee}(")?;
                self.write_list(f, args)?;
                write!(f, ") to {normal} unwind {unwind}")
            }
            Op::LandingPad => f.write_str("landingpad"),
            Op::ExtractValue { aggregate, index } => {
                f.write_str("extractvalue ")?;
                self.write_value(f, *aggregate)?;
                write!(f, ", {index}")
            }
            Op::Ret { value: Some(value) } => {
                f.write_str("ret ")?;
                self.write_value(f, *value)
            }
            Op::Ret { value: None } => f.write_str("ret void"),
            Op::Unreachable => f.write_str("unreachable"),
        }
    }
}

impl fmt::Display for LirFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "define @{} {{", self.name)?;
        for (index, block) in self.blocks.iter().enumerate() {
            writeln!(f, "bb{index}: ; {}", block.name)?;
            for inst in &block.instructions {
                let Some(value) = self.values.get(inst.index()) else {
                    continue;
                };
                let ValueKind::Instruction { op, .. } = &value.kind else {
                    continue;
                };
                f.write_str("  ")?;
                if value.ty != EmitType::Void {
                    write!(f, "{inst}: {} = ", value.ty)?;
                }
                self.write_op(f, op)?;
                writeln!(f)?;
            }
        }
        writeln!(f, "}}")
    }
}

#[derive(Clone, Copy, Debug)]
struct Cursor {
    block: BlockHandle,
    before_terminator: bool,
}

/// An [`Emitter`] that records the function it is driven to build.
///
/// The entry block (named `prologue`) exists from construction on.
#[derive(Debug)]
pub struct LirEmitter {
    function: LirFunction,
    cursor: Cursor,
}

impl LirEmitter {
    /// Starts recording a function called `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut function = LirFunction::new(name);
        function.blocks.push(BlockData {
            name: "prologue".to_string(),
            instructions: Vec::new(),
        });
        LirEmitter {
            function,
            cursor: Cursor {
                block: BlockHandle(0),
                before_terminator: false,
            },
        }
    }

    /// The function recorded so far.
    #[must_use]
    pub fn function(&self) -> &LirFunction {
        &self.function
    }

    /// Finishes recording.
    #[must_use]
    pub fn into_function(self) -> LirFunction {
        self.function
    }

    fn next_handle(&self) -> ValueHandle {
        ValueHandle(u32::try_from(self.function.values.len()).unwrap_or(u32::MAX))
    }

    fn add_value(&mut self, ty: EmitType, kind: ValueKind) -> ValueHandle {
        let handle = self.next_handle();
        self.function.values.push(Value { ty, kind });
        handle
    }

    fn ty(&self, value: ValueHandle) -> Result<EmitType> {
        self.function.value(value).map(|v| v.ty)
    }

    fn block_data(&self, block: BlockHandle) -> Result<&BlockData> {
        self.function
            .blocks
            .get(block.index())
            .ok_or_else(|| representation_defect!("{} does not exist", block))
    }

    fn insert(&mut self, ty: EmitType, op: Op) -> Result<ValueHandle> {
        let block = self.cursor.block;
        let terminated = self.has_terminator(block);
        let position = {
            let data = self.block_data(block)?;
            if terminated && self.cursor.before_terminator {
                data.instructions.len() - 1
            } else if terminated {
                return Err(schedule_defect!(
                    "emitting {:?} into {} after its terminator",
                    op,
                    data.name
                ));
            } else {
                data.instructions.len()
            }
        };

        let handle = self.add_value(ty, ValueKind::Instruction { block, op });
        self.function.blocks[block.index()]
            .instructions
            .insert(position, handle);
        Ok(handle)
    }

    fn insert_terminator(&mut self, ty: EmitType, op: Op) -> Result<ValueHandle> {
        let block = self.cursor.block;
        if self.has_terminator(block) {
            return Err(schedule_defect!(
                "{} already has a terminator",
                self.block_data(block)?.name
            ));
        }
        self.insert(ty, op)
    }

    fn expect_pointer(&self, value: ValueHandle, what: &str) -> Result<EmitType> {
        let ty = self.ty(value)?;
        if !ty.is_pointer() {
            return Err(representation_defect!("{} {} is {}, not a pointer", what, value, ty));
        }
        Ok(ty)
    }

    fn expect_integer(&self, value: ValueHandle, what: &str) -> Result<EmitType> {
        let ty = self.ty(value)?;
        if !ty.is_integer() {
            return Err(representation_defect!("{} {} is {}, not an integer", what, value, ty));
        }
        Ok(ty)
    }

    fn check_callee(&self, callee: Callee) -> Result<()> {
        if let Callee::Value(value) = callee {
            self.expect_pointer(value, "callee")?;
        }
        Ok(())
    }

    fn check_cast(&self, kind: CastKind, from: EmitType, to: EmitType) -> bool {
        let width = |ty: EmitType| ty.bit_width().unwrap_or(0);
        match kind {
            CastKind::Trunc => from.is_integer() && to.is_integer() && width(from) > width(to),
            CastKind::ZExt | CastKind::SExt => {
                from.is_integer() && to.is_integer() && width(from) < width(to)
            }
            CastKind::FPTrunc => from == EmitType::Float64 && to == EmitType::Float32,
            CastKind::FPExt => from == EmitType::Float32 && to == EmitType::Float64,
            CastKind::FPToSI | CastKind::FPToUI => from.is_float() && to.is_integer(),
            CastKind::SIToFP | CastKind::UIToFP => from.is_integer() && to.is_float(),
            CastKind::PtrToInt => from.is_pointer() && to.is_integer(),
            CastKind::IntToPtr => from.is_integer() && to.is_pointer(),
            CastKind::Bitcast => {
                (from.is_pointer() && to.is_pointer())
                    || (from.bit_width().is_some() && width(from) == width(to))
            }
        }
    }
}

impl Emitter for LirEmitter {
    fn entry_block(&self) -> BlockHandle {
        BlockHandle(0)
    }

    fn append_block(&mut self, name: &str) -> BlockHandle {
        let handle = BlockHandle(u32::try_from(self.function.blocks.len()).unwrap_or(u32::MAX));
        self.function.blocks.push(BlockData {
            name: name.to_string(),
            instructions: Vec::new(),
        });
        handle
    }

    fn position_at_end(&mut self, block: BlockHandle) {
        self.cursor = Cursor {
            block,
            before_terminator: false,
        };
    }

    fn position_before_terminator(&mut self, block: BlockHandle) {
        self.cursor = Cursor {
            block,
            before_terminator: true,
        };
    }

    fn current_block(&self) -> BlockHandle {
        self.cursor.block
    }

    fn has_terminator(&self, block: BlockHandle) -> bool {
        self.function.terminator(block).is_some()
    }

    fn type_of(&self, value: ValueHandle) -> Result<EmitType> {
        self.ty(value)
    }

    fn constant_int(&self, value: ValueHandle) -> Option<i64> {
        match self.function.constant(value) {
            Some(Constant::Int(c)) => Some(c),
            _ => None,
        }
    }

    fn const_int(&mut self, ty: EmitType, value: i64) -> ValueHandle {
        self.add_value(ty, ValueKind::Constant(Constant::Int(value)))
    }

    fn const_float(&mut self, ty: EmitType, value: f64) -> ValueHandle {
        self.add_value(ty, ValueKind::Constant(Constant::Float(value)))
    }

    fn null(&mut self, ty: EmitType) -> ValueHandle {
        self.add_value(ty, ValueKind::Constant(Constant::Null))
    }

    fn undef(&mut self, ty: EmitType) -> ValueHandle {
        self.add_value(ty, ValueKind::Constant(Constant::Undef))
    }

    fn param(&mut self, index: u32, ty: EmitType) -> Result<ValueHandle> {
        if let Some(&existing) = self.function.params.get(&index) {
            let existing_ty = self.ty(existing)?;
            if existing_ty != ty {
                return Err(representation_defect!(
                    "parameter {} requested as {} and {}",
                    index,
                    existing_ty,
                    ty
                ));
            }
            return Ok(existing);
        }
        let handle = self.add_value(ty, ValueKind::Param(index));
        self.function.params.insert(index, handle);
        Ok(handle)
    }

    fn load_constant(&mut self, ty: EmitType, magic: u64) -> Result<ValueHandle> {
        self.insert(ty, Op::LoadConstant { magic })
    }

    fn build_binary(
        &mut self,
        op: BinaryOp,
        lhs: ValueHandle,
        rhs: ValueHandle,
    ) -> Result<ValueHandle> {
        let ty = self.ty(lhs)?;
        let rhs_ty = self.ty(rhs)?;
        if ty != rhs_ty {
            return Err(representation_defect!(
                "operands of {:?} differ: {} and {}",
                op,
                ty,
                rhs_ty
            ));
        }
        let accepted = if op.is_float() {
            ty.is_float()
        } else {
            ty.is_integer()
        };
        if !accepted {
            return Err(representation_defect!("{:?} does not accept {}", op, ty));
        }
        self.insert(ty, Op::Binary { op, lhs, rhs })
    }

    fn build_compare(
        &mut self,
        predicate: Predicate,
        lhs: ValueHandle,
        rhs: ValueHandle,
    ) -> Result<ValueHandle> {
        let ty = self.ty(lhs)?;
        let rhs_ty = self.ty(rhs)?;
        if ty != rhs_ty {
            return Err(representation_defect!(
                "operands of {:?} differ: {} and {}",
                predicate,
                ty,
                rhs_ty
            ));
        }
        let accepted = if predicate.is_float() {
            ty.is_float()
        } else {
            ty.is_integer() || ty.is_pointer()
        };
        if !accepted {
            return Err(representation_defect!("{:?} does not accept {}", predicate, ty));
        }
        self.insert(
            EmitType::Bool,
            Op::Compare {
                predicate,
                lhs,
                rhs,
            },
        )
    }

    fn build_cast(
        &mut self,
        kind: CastKind,
        value: ValueHandle,
        ty: EmitType,
    ) -> Result<ValueHandle> {
        let from = self.ty(value)?;
        if !self.check_cast(kind, from, ty) {
            return Err(representation_defect!("cannot {:?} {} to {}", kind, from, ty));
        }
        self.insert(ty, Op::Cast { kind, value })
    }

    fn build_load(&mut self, pointer: ValueHandle, ty: EmitType) -> Result<ValueHandle> {
        self.expect_pointer(pointer, "load address")?;
        self.insert(ty, Op::Load { pointer })
    }

    fn build_store(&mut self, value: ValueHandle, pointer: ValueHandle) -> Result<()> {
        self.expect_pointer(pointer, "store address")?;
        self.ty(value)?;
        self.insert(EmitType::Void, Op::Store { value, pointer })?;
        Ok(())
    }

    fn build_gep(
        &mut self,
        base: ValueHandle,
        offset: ValueHandle,
        ty: EmitType,
    ) -> Result<ValueHandle> {
        self.expect_pointer(base, "address base")?;
        self.expect_integer(offset, "address offset")?;
        if !ty.is_pointer() {
            return Err(representation_defect!("address arithmetic cannot produce {}", ty));
        }
        self.insert(ty, Op::Gep { base, offset })
    }

    fn build_alloca(&mut self, size: u32, alignment: u32) -> Result<ValueHandle> {
        self.insert(EmitType::RawPtr, Op::Alloca { size, alignment })
    }

    fn build_phi(&mut self, ty: EmitType) -> Result<ValueHandle> {
        let block = self.cursor.block;
        let position = self.function.phis(block).len();
        self.block_data(block)?;
        let handle = self.add_value(
            ty,
            ValueKind::Instruction {
                block,
                op: Op::Phi {
                    incoming: Vec::new(),
                },
            },
        );
        self.function.blocks[block.index()]
            .instructions
            .insert(position, handle);
        Ok(handle)
    }

    fn add_incoming(
        &mut self,
        phi: ValueHandle,
        value: ValueHandle,
        from: BlockHandle,
    ) -> Result<()> {
        let value_ty = self.ty(value)?;
        self.block_data(from)?;
        let slot = self
            .function
            .values
            .get_mut(phi.index())
            .ok_or_else(|| representation_defect!("{} is not a phi", phi))?;
        if slot.ty != value_ty {
            return Err(representation_defect!(
                "phi {} of type {} cannot take {} of type {}",
                phi,
                slot.ty,
                value,
                value_ty
            ));
        }
        match &mut slot.kind {
            ValueKind::Instruction {
                op: Op::Phi { incoming },
                ..
            } => {
                incoming.push((value, from));
                Ok(())
            }
            _ => Err(representation_defect!("{} is not a phi", phi)),
        }
    }

    fn build_br(&mut self, target: BlockHandle) -> Result<()> {
        self.block_data(target)?;
        self.insert_terminator(EmitType::Void, Op::Br { target })?;
        Ok(())
    }

    fn build_cond_br(
        &mut self,
        condition: ValueHandle,
        if_true: BlockHandle,
        if_false: BlockHandle,
    ) -> Result<()> {
        let ty = self.ty(condition)?;
        if ty != EmitType::Bool {
            return Err(representation_defect!("branch condition {} is {}", condition, ty));
        }
        self.insert_terminator(
            EmitType::Void,
            Op::CondBr {
                condition,
                if_true,
                if_false,
            },
        )?;
        Ok(())
    }

    fn build_switch(&mut self, value: ValueHandle, default: BlockHandle) -> Result<ValueHandle> {
        self.expect_integer(value, "switch selector")?;
        self.insert_terminator(
            EmitType::Void,
            Op::Switch {
                value,
                default,
                cases: Vec::new(),
            },
        )
    }

    fn add_case(&mut self, switch: ValueHandle, value: i64, target: BlockHandle) -> Result<()> {
        self.block_data(target)?;
        match self.function.values.get_mut(switch.index()).map(|v| &mut v.kind) {
            Some(ValueKind::Instruction {
                op: Op::Switch { cases, .. },
                ..
            }) => {
                cases.push((value, target));
                Ok(())
            }
            _ => Err(representation_defect!("{} is not a switch", switch)),
        }
    }

    fn build_call(
        &mut self,
        callee: Callee,
        args: &[ValueHandle],
        ret: EmitType,
    ) -> Result<ValueHandle> {
        self.check_callee(callee)?;
        for arg in args {
            self.ty(*arg)?;
        }
        self.insert(
            ret,
            Op::Call {
                callee,
                args: args.to_vec(),
            },
        )
    }

    fn build_invoke(
        &mut self,
        callee: Callee,
        args: &[ValueHandle],
        ret: EmitType,
        normal: BlockHandle,
        unwind: BlockHandle,
    ) -> Result<ValueHandle> {
        self.check_callee(callee)?;
        for arg in args {
            self.ty(*arg)?;
        }
        self.insert_terminator(
            ret,
            Op::Invoke {
                callee,
                args: args.to_vec(),
                normal,
                unwind,
            },
        )
    }

    fn build_landing_pad(&mut self) -> Result<ValueHandle> {
        self.insert(EmitType::Token, Op::LandingPad)
    }

    fn build_extract_value(&mut self, aggregate: ValueHandle, index: u32) -> Result<ValueHandle> {
        let ty = match (self.ty(aggregate)?, index) {
            (EmitType::TaggedPair, 0 | 1) => EmitType::Tagged,
            (EmitType::Int32Overflow, 0) => EmitType::Int32,
            (EmitType::Int32Overflow, 1) => EmitType::Bool,
            (ty, index) => {
                return Err(representation_defect!(
                    "cannot extract field {} of {} {}",
                    index,
                    ty,
                    aggregate
                ))
            }
        };
        self.insert(ty, Op::ExtractValue { aggregate, index })
    }

    fn build_ret(&mut self, value: Option<ValueHandle>) -> Result<()> {
        if let Some(value) = value {
            self.ty(value)?;
        }
        self.insert_terminator(EmitType::Void, Op::Ret { value })?;
        Ok(())
    }

    fn build_unreachable(&mut self) -> Result<()> {
        self.insert_terminator(EmitType::Void, Op::Unreachable)?;
        Ok(())
    }
}
