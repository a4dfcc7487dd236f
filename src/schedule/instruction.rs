//! Instructions of the scheduled graph.
//!
//! Every instruction carries the [`ValueId`]s of its inputs. The id of the instruction's own
//! result is passed separately by the visitor protocol, so the same [`Instruction`] value can be
//! shared between passes.
//!
//! Arithmetic, comparison and conversion opcodes are grouped into small enums whose variant
//! names are the scheduler's mnemonics; the schedule reader parses them with
//! [`std::str::FromStr`].

use strum::{EnumString, IntoStaticStr};

use crate::{
    graph::{BlockId, ValueId},
    schedule::{MachineRepresentation, MachineType, WriteBarrierKind},
};

/// Single-input arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[allow(missing_docs)]
pub enum UnaryOp {
    Float64Neg,
    Float64Abs,
    Float64Sqrt,
    Float32Neg,
    Float32Abs,
    Float32Sqrt,
    Word32Clz,
    Word64Clz,
    Float64ExtractLowWord32,
    Float64ExtractHighWord32,
}

/// Two-input arithmetic and bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Int32Add,
    Int32Sub,
    Int32Mul,
    Int32Div,
    Int32Mod,
    Uint32Div,
    Uint32Mod,
    Word32And,
    Word32Or,
    Word32Xor,
    Word32Shl,
    Word32Shr,
    Word32Sar,
    Int64Add,
    Int64Sub,
    Int64Mul,
    Word64And,
    Word64Or,
    Word64Xor,
    Word64Shl,
    Word64Shr,
    Word64Sar,
    Float64Add,
    Float64Sub,
    Float64Mul,
    Float64Div,
    Float64Mod,
    Float32Add,
    Float32Sub,
    Float32Mul,
    Float32Div,
}

/// Comparisons producing a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[allow(missing_docs)]
pub enum CompareOp {
    Word32Equal,
    Int32LessThan,
    Int32LessThanOrEqual,
    Uint32LessThan,
    Uint32LessThanOrEqual,
    Word64Equal,
    Int64LessThan,
    Int64LessThanOrEqual,
    Uint64LessThan,
    Uint64LessThanOrEqual,
    Float64Equal,
    Float64LessThan,
    Float64LessThanOrEqual,
    Float32Equal,
    Float32LessThan,
    Float32LessThanOrEqual,
    TaggedEqual,
}

/// Representation changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[allow(missing_docs)]
pub enum ConvertOp {
    BitcastWordToTagged,
    BitcastTaggedToWord,
    ChangeInt32ToFloat64,
    ChangeUint32ToFloat64,
    ChangeFloat32ToFloat64,
    ChangeFloat64ToInt32,
    ChangeFloat64ToUint32,
    ChangeInt32ToInt64,
    ChangeUint32ToUint64,
    TruncateInt64ToInt32,
    TruncateFloat64ToFloat32,
    TruncateFloat64ToWord32,
    RoundFloat64ToInt32,
    RoundInt32ToFloat32,
    RoundUint32ToFloat32,
    BitcastFloat32ToInt32,
    BitcastInt32ToFloat32,
    BitcastFloat64ToInt64,
    BitcastInt64ToFloat64,
}

/// 32-bit arithmetic that also reports overflow; the pair is split by [`Instruction::Projection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[allow(missing_docs)]
pub enum OverflowOp {
    Int32AddWithOverflow,
    Int32SubWithOverflow,
    Int32MulWithOverflow,
}

/// How a call's first operand designates the callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallTarget {
    /// A tagged code object; the entry point sits at a fixed offset past its header.
    Code,
    /// A raw address.
    Address,
}

/// Calling-convention information attached to a call-shaped instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallDescriptor {
    /// How to interpret the callee operand.
    pub target: CallTarget,
    /// One entry per operand after the callee: the pinned slot, or `None` for a stack operand.
    pub registers_for_operands: Vec<Option<u8>>,
    /// Number of values the call returns (0, 1 or 2).
    pub return_count: u32,
}

impl CallDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(target: CallTarget, registers_for_operands: Vec<Option<u8>>, return_count: u32) -> Self {
        CallDescriptor {
            target,
            registers_for_operands,
            return_count,
        }
    }

    /// Number of operands the call expects, callee included.
    #[must_use]
    pub fn operand_count(&self) -> usize {
        self.registers_for_operands.len() + 1
    }
}

/// One node of the scheduled graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Incoming function parameter.
    Parameter {
        /// Parameter position
        index: u32,
        /// Representation of the parameter
        representation: MachineRepresentation,
    },
    /// 32-bit integer constant
    Int32Constant(i32),
    /// 64-bit integer constant
    Int64Constant(i64),
    /// Single precision constant
    Float32Constant(f32),
    /// Double precision constant
    Float64Constant(f64),
    /// Already-tagged small integer, given as its tagged bit pattern
    SmiConstant(i64),
    /// Heap object known at compile time, identified by a magic placeholder patched later
    HeapConstant(u64),
    /// Address of an external reference, identified by a magic placeholder patched later
    ExternalConstant(u64),
    /// Entry of the root table
    Root(u32),
    /// The current frame pointer
    LoadFramePointer,
    /// The caller's frame pointer
    LoadParentFramePointer,
    /// A fresh stack slot
    StackSlot {
        /// Size in bytes
        size: u32,
        /// Alignment in bytes
        alignment: u32,
    },
    /// Single-input arithmetic
    Unary {
        /// Opcode
        op: UnaryOp,
        /// Operand
        input: ValueId,
    },
    /// Two-input arithmetic
    Binary {
        /// Opcode
        op: BinaryOp,
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },
    /// Comparison
    Compare {
        /// Opcode
        op: CompareOp,
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },
    /// Representation change
    Convert {
        /// Opcode
        op: ConvertOp,
        /// Operand
        input: ValueId,
    },
    /// Overflow-checked arithmetic
    Overflow {
        /// Opcode
        op: OverflowOp,
        /// Left operand
        lhs: ValueId,
        /// Right operand
        rhs: ValueId,
    },
    /// Field `index` of a multi-value instruction
    Projection {
        /// Field position
        index: u32,
        /// The multi-value instruction
        input: ValueId,
    },
    /// Memory read at `base + offset`
    Load {
        /// Loaded type
        machine_type: MachineType,
        /// Base pointer
        base: ValueId,
        /// Byte offset
        offset: ValueId,
    },
    /// Memory write at `base + offset`
    Store {
        /// Stored representation
        representation: MachineRepresentation,
        /// Barrier to apply after the write
        barrier: WriteBarrierKind,
        /// Base pointer
        base: ValueId,
        /// Byte offset
        offset: ValueId,
        /// Stored value
        value: ValueId,
    },
    /// Control-flow merge; one input per predecessor, in predecessor order
    Phi {
        /// Representation of the merged value
        representation: MachineRepresentation,
        /// Inputs, one per predecessor
        inputs: Vec<ValueId>,
    },
    /// Call through a safepoint; the block must end with a `Goto` right after it
    Call {
        /// Calling convention
        descriptor: CallDescriptor,
        /// Callee followed by the arguments
        operands: Vec<ValueId>,
    },
    /// Call that leaves the current frame; ends the block
    TailCall {
        /// Calling convention
        descriptor: CallDescriptor,
        /// Callee followed by the arguments
        operands: Vec<ValueId>,
    },
    /// Call with an exception edge; ends the block
    Invoke {
        /// Calling convention
        descriptor: CallDescriptor,
        /// Callee followed by the arguments
        operands: Vec<ValueId>,
        /// Successor on normal return
        then: BlockId,
        /// Exception landing block
        exception: BlockId,
    },
    /// Plain C call that preserves caller-saved registers; no safepoint
    CallWithCallerSavedRegisters {
        /// Function address
        function: ValueId,
        /// Arguments
        arguments: Vec<ValueId>,
    },
    /// Exception value at the top of an exception landing block
    IfException,
    /// Marks a switch case successor
    IfValue(i32),
    /// Marks the switch default successor
    IfDefault,
    /// Two-way branch; ends the block
    Branch {
        /// Condition
        condition: ValueId,
        /// Taken when the condition is non-zero
        if_true: BlockId,
        /// Taken otherwise
        if_false: BlockId,
    },
    /// Multi-way branch; the last successor is the default; ends the block
    Switch {
        /// Selector
        input: ValueId,
        /// Case successors followed by the default
        successors: Vec<BlockId>,
    },
    /// Function return; ends the block
    Return {
        /// Number of stack slots to pop
        pop_count: ValueId,
        /// Returned values (one or two)
        values: Vec<ValueId>,
    },
}

impl Instruction {
    /// Values read by this instruction, in operand order.
    #[must_use]
    pub fn inputs(&self) -> Vec<ValueId> {
        match self {
            Instruction::Unary { input, .. }
            | Instruction::Convert { input, .. }
            | Instruction::Projection { input, .. } => vec![*input],
            Instruction::Binary { lhs, rhs, .. }
            | Instruction::Compare { lhs, rhs, .. }
            | Instruction::Overflow { lhs, rhs, .. } => vec![*lhs, *rhs],
            Instruction::Load { base, offset, .. } => vec![*base, *offset],
            Instruction::Store {
                base,
                offset,
                value,
                ..
            } => vec![*base, *offset, *value],
            Instruction::Phi { inputs, .. } => inputs.clone(),
            Instruction::Call { operands, .. }
            | Instruction::TailCall { operands, .. }
            | Instruction::Invoke { operands, .. } => operands.clone(),
            Instruction::CallWithCallerSavedRegisters {
                function,
                arguments,
            } => std::iter::once(*function)
                .chain(arguments.iter().copied())
                .collect(),
            Instruction::Branch { condition, .. } => vec![*condition],
            Instruction::Switch { input, .. } => vec![*input],
            Instruction::Return { pop_count, values } => std::iter::once(*pop_count)
                .chain(values.iter().copied())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the instruction produces a value under its own id.
    #[must_use]
    pub fn defines_value(&self) -> bool {
        !matches!(
            self,
            Instruction::Store { .. }
                | Instruction::TailCall { .. }
                | Instruction::IfValue(_)
                | Instruction::IfDefault
                | Instruction::Branch { .. }
                | Instruction::Switch { .. }
                | Instruction::Return { .. }
        )
    }

    /// Whether the instruction ends its block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::TailCall { .. }
                | Instruction::Invoke { .. }
                | Instruction::Branch { .. }
                | Instruction::Switch { .. }
                | Instruction::Return { .. }
        )
    }

    /// Control successors named by a terminator, in edge order.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Instruction::Invoke {
                then, exception, ..
            } => vec![*then, *exception],
            Instruction::Branch {
                if_true, if_false, ..
            } => vec![*if_true, *if_false],
            Instruction::Switch { successors, .. } => successors.clone(),
            _ => Vec::new(),
        }
    }

    /// Whether the instruction makes the function need a frame.
    #[must_use]
    pub fn is_call(&self) -> bool {
        matches!(
            self,
            Instruction::Call { .. }
                | Instruction::TailCall { .. }
                | Instruction::Invoke { .. }
                | Instruction::CallWithCallerSavedRegisters { .. }
        )
    }

    /// The scheduler's mnemonic for this instruction.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Parameter { .. } => "Parameter",
            Instruction::Int32Constant(_) => "Int32Constant",
            Instruction::Int64Constant(_) => "Int64Constant",
            Instruction::Float32Constant(_) => "Float32Constant",
            Instruction::Float64Constant(_) => "Float64Constant",
            Instruction::SmiConstant(_) => "SmiConstant",
            Instruction::HeapConstant(_) => "HeapConstant",
            Instruction::ExternalConstant(_) => "ExternalConstant",
            Instruction::Root(_) => "Root",
            Instruction::LoadFramePointer => "LoadFramePointer",
            Instruction::LoadParentFramePointer => "LoadParentFramePointer",
            Instruction::StackSlot { .. } => "StackSlot",
            Instruction::Unary { op, .. } => op.into(),
            Instruction::Binary { op, .. } => op.into(),
            Instruction::Compare { op, .. } => op.into(),
            Instruction::Convert { op, .. } => op.into(),
            Instruction::Overflow { op, .. } => op.into(),
            Instruction::Projection { .. } => "Projection",
            Instruction::Load { .. } => "Load",
            Instruction::Store { .. } => "Store",
            Instruction::Phi { .. } => "Phi",
            Instruction::Call { .. } => "Call",
            Instruction::TailCall { .. } => "TailCall",
            Instruction::Invoke { .. } => "Invoke",
            Instruction::CallWithCallerSavedRegisters { .. } => "CallWithCallerSavedRegisters",
            Instruction::IfException => "IfException",
            Instruction::IfValue(_) => "IfValue",
            Instruction::IfDefault => "IfDefault",
            Instruction::Branch { .. } => "Branch",
            Instruction::Switch { .. } => "Switch",
            Instruction::Return { .. } => "Return",
        }
    }
}
