//! Code-emission protocol.
//!
//! The SSA builder never produces machine code itself; it drives an [`Emitter`], an abstraction
//! over an LLVM-style instruction builder. The emitter owns the emitted function: blocks are
//! named by [`BlockHandle`], values (including instructions) by [`ValueHandle`], and every value
//! carries an [`EmitType`].
//!
//! The protocol is deliberately small. Safepoints, relocations, patch points and the other
//! runtime hooks are ordinary calls to an [`Intrinsic`]; the emitter only needs to know how to
//! create calls, not what the intrinsics mean.
//!
//! [`LirEmitter`] is the in-tree implementation. It records everything into an inspectable
//! [`LirFunction`] and type-checks its inputs, which makes it the reference for tests and for
//! debugging dumps.
//!
//! # Examples
//!
//! ```rust
//! use jitlower::emit::{BinaryOp, EmitType, Emitter, LirEmitter};
//!
//! let mut emitter = LirEmitter::new("add");
//! let body = emitter.append_block("B0");
//! emitter.position_at_end(body);
//!
//! let one = emitter.const_int(EmitType::Int32, 1);
//! let sum = emitter.build_binary(BinaryOp::Add, one, one)?;
//! emitter.build_unreachable()?;
//!
//! assert_eq!(emitter.type_of(sum)?, EmitType::Int32);
//! assert!(emitter.has_terminator(body));
//! # Ok::<(), jitlower::Error>(())
//! ```

mod lir;

pub use lir::{Constant, LirEmitter, LirFunction, Op};

use std::fmt;

use strum::IntoStaticStr;

use crate::Result;

/// Handle of an emitted value: a constant, a parameter or an instruction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ValueHandle(pub(crate) u32);

impl ValueHandle {
    /// Position of the value in its function.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Handle of an emitted block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlockHandle(pub(crate) u32);

impl BlockHandle {
    /// Position of the block in its function.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Type of an emitted value.
///
/// `Tagged` is a pointer into the collected heap (address space 1); `RawPtr` is any other
/// pointer. The two aggregate types only appear as call results and are taken apart with
/// [`Emitter::build_extract_value`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoStaticStr)]
pub enum EmitType {
    /// No value
    #[strum(serialize = "void")]
    Void,
    /// One-bit integer
    #[strum(serialize = "i1")]
    Bool,
    /// 8-bit integer
    #[strum(serialize = "i8")]
    Int8,
    /// 16-bit integer
    #[strum(serialize = "i16")]
    Int16,
    /// 32-bit integer
    #[strum(serialize = "i32")]
    Int32,
    /// 64-bit integer
    #[strum(serialize = "i64")]
    Int64,
    /// Single precision float
    #[strum(serialize = "float")]
    Float32,
    /// Double precision float
    #[strum(serialize = "double")]
    Float64,
    /// Collected heap pointer
    #[strum(serialize = "ptr addrspace(1)")]
    Tagged,
    /// Untraced pointer
    #[strum(serialize = "ptr")]
    RawPtr,
    /// Safepoint or landing pad token
    #[strum(serialize = "token")]
    Token,
    /// Two tagged values returned together
    #[strum(serialize = "{ ptr addrspace(1), ptr addrspace(1) }")]
    TaggedPair,
    /// A 32-bit result and its overflow bit
    #[strum(serialize = "{ i32, i1 }")]
    Int32Overflow,
}

impl EmitType {
    /// Integer types, booleans included.
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            EmitType::Bool | EmitType::Int8 | EmitType::Int16 | EmitType::Int32 | EmitType::Int64
        )
    }

    /// Floating point types.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, EmitType::Float32 | EmitType::Float64)
    }

    /// Pointer types, traced or not.
    #[must_use]
    pub fn is_pointer(self) -> bool {
        matches!(self, EmitType::Tagged | EmitType::RawPtr)
    }

    /// Bit width of scalar types.
    #[must_use]
    pub fn bit_width(self) -> Option<u32> {
        match self {
            EmitType::Bool => Some(1),
            EmitType::Int8 => Some(8),
            EmitType::Int16 => Some(16),
            EmitType::Int32 | EmitType::Float32 => Some(32),
            EmitType::Int64 | EmitType::Float64 => Some(64),
            _ => None,
        }
    }
}

impl fmt::Display for EmitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.into();
        f.write_str(name)
    }
}

/// Two-operand arithmetic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

impl BinaryOp {
    /// Whether the operation works on floating point operands.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv | BinaryOp::FRem
        )
    }
}

/// Comparison predicates. Integer predicates also accept pointers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum Predicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Ult,
    Ule,
    FOeq,
    FOlt,
    FOle,
}

impl Predicate {
    /// Whether the predicate compares floating point operands.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Predicate::FOeq | Predicate::FOlt | Predicate::FOle)
    }
}

/// Value conversions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum CastKind {
    Trunc,
    ZExt,
    SExt,
    FPTrunc,
    FPExt,
    FPToSI,
    FPToUI,
    SIToFP,
    UIToFP,
    PtrToInt,
    IntToPtr,
    Bitcast,
}

/// Runtime hooks and target builtins reachable through [`Emitter::build_call`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoStaticStr)]
pub enum Intrinsic {
    /// GC safepoint wrapping a call; returns a token
    #[strum(serialize = "llvm.experimental.gc.statepoint")]
    Statepoint,
    /// Relocated copy of a value kept live across a safepoint
    #[strum(serialize = "llvm.experimental.gc.relocate")]
    GcRelocate,
    /// Single result of the call wrapped by a safepoint
    #[strum(serialize = "llvm.experimental.gc.result")]
    GcResult,
    /// Two-value result of the call wrapped by a safepoint
    #[strum(serialize = "llvm.experimental.gc.result2")]
    GcResult2,
    /// Patchable call site without GC semantics
    #[strum(serialize = "llvm.experimental.patchpoint")]
    Patchpoint,
    /// Branch probability hint
    #[strum(serialize = "llvm.expect.i1")]
    Expect,
    /// Signed add reporting overflow
    #[strum(serialize = "llvm.sadd.with.overflow.i32")]
    SAddWithOverflow,
    /// Signed subtract reporting overflow
    #[strum(serialize = "llvm.ssub.with.overflow.i32")]
    SSubWithOverflow,
    /// Signed multiply reporting overflow
    #[strum(serialize = "llvm.smul.with.overflow.i32")]
    SMulWithOverflow,
    /// Float absolute value
    #[strum(serialize = "llvm.fabs")]
    Fabs,
    /// Float square root
    #[strum(serialize = "llvm.sqrt")]
    Sqrt,
    /// Count leading zeros
    #[strum(serialize = "llvm.ctlz")]
    Ctlz,
    /// JavaScript-style double to int32 truncation
    #[strum(serialize = "jit.truncate.float64.word32")]
    TruncateToWord32,
    /// Reads a pinned register
    #[strum(serialize = "llvm.read_register")]
    ReadRegister,
    /// Current frame address
    #[strum(serialize = "llvm.frameaddress")]
    FrameAddress,
}

/// Target of a call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Callee {
    /// Indirect call through a pointer value
    Value(ValueHandle),
    /// Call to a builtin
    Intrinsic(Intrinsic),
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Value(value) => write!(f, "{value}"),
            Callee::Intrinsic(intrinsic) => {
                let name: &'static str = intrinsic.into();
                write!(f, "@{name}")
            }
        }
    }
}

/// Builder interface of the low-level code emitter.
///
/// All instruction-building methods insert at the current position, set with
/// [`Emitter::position_at_end`] or [`Emitter::position_before_terminator`]. Implementations
/// report type mismatches as [`crate::Error::RepresentationDefect`] and emission into an already
/// terminated block as [`crate::Error::ScheduleDefect`].
pub trait Emitter {
    /// The block created together with the function, reserved for the prologue.
    fn entry_block(&self) -> BlockHandle;

    /// Appends a new empty block.
    fn append_block(&mut self, name: &str) -> BlockHandle;

    /// Moves the insertion point to the end of `block`.
    fn position_at_end(&mut self, block: BlockHandle);

    /// Moves the insertion point right before the terminator of `block`, or to its end if it has
    /// none yet.
    fn position_before_terminator(&mut self, block: BlockHandle);

    /// The block the insertion point is in.
    fn current_block(&self) -> BlockHandle;

    /// Whether `block` already ends with a terminator.
    fn has_terminator(&self, block: BlockHandle) -> bool;

    /// Type of an emitted value.
    ///
    /// # Errors
    ///
    /// Fails for handles that do not belong to this function.
    fn type_of(&self, value: ValueHandle) -> Result<EmitType>;

    /// The value of an integer constant, if `value` is one.
    fn constant_int(&self, value: ValueHandle) -> Option<i64>;

    /// Integer constant of type `ty`.
    fn const_int(&mut self, ty: EmitType, value: i64) -> ValueHandle;

    /// Float constant of type `ty`.
    fn const_float(&mut self, ty: EmitType, value: f64) -> ValueHandle;

    /// Null pointer of type `ty`.
    fn null(&mut self, ty: EmitType) -> ValueHandle;

    /// Undefined value of type `ty`.
    fn undef(&mut self, ty: EmitType) -> ValueHandle;

    /// Incoming parameter `index`.
    ///
    /// # Errors
    ///
    /// Fails if the parameter was already requested with a different type.
    fn param(&mut self, index: u32, ty: EmitType) -> Result<ValueHandle>;

    /// Loads a placeholder constant that the patch stage later replaces by `magic`'s target.
    ///
    /// # Errors
    ///
    /// Type errors only.
    fn load_constant(&mut self, ty: EmitType, magic: u64) -> Result<ValueHandle>;

    /// Two-operand arithmetic.
    ///
    /// # Errors
    ///
    /// Operands of different types, or of a kind the operation does not accept.
    fn build_binary(&mut self, op: BinaryOp, lhs: ValueHandle, rhs: ValueHandle)
        -> Result<ValueHandle>;

    /// Comparison producing a [`EmitType::Bool`].
    ///
    /// # Errors
    ///
    /// Operands of different types.
    fn build_compare(
        &mut self,
        predicate: Predicate,
        lhs: ValueHandle,
        rhs: ValueHandle,
    ) -> Result<ValueHandle>;

    /// Converts `value` to `ty`.
    ///
    /// # Errors
    ///
    /// Source and destination types the cast kind does not accept.
    fn build_cast(&mut self, kind: CastKind, value: ValueHandle, ty: EmitType)
        -> Result<ValueHandle>;

    /// Reads a `ty` through `pointer`.
    ///
    /// # Errors
    ///
    /// `pointer` is not a pointer.
    fn build_load(&mut self, pointer: ValueHandle, ty: EmitType) -> Result<ValueHandle>;

    /// Writes `value` through `pointer`.
    ///
    /// # Errors
    ///
    /// `pointer` is not a pointer.
    fn build_store(&mut self, value: ValueHandle, pointer: ValueHandle) -> Result<()>;

    /// Byte-offset address arithmetic producing a pointer of type `ty`.
    ///
    /// # Errors
    ///
    /// `base` is not a pointer or `offset` is not an integer.
    fn build_gep(&mut self, base: ValueHandle, offset: ValueHandle, ty: EmitType)
        -> Result<ValueHandle>;

    /// A stack allocation of `size` bytes.
    ///
    /// # Errors
    ///
    /// Implementation-specific.
    fn build_alloca(&mut self, size: u32, alignment: u32) -> Result<ValueHandle>;

    /// An empty phi of type `ty`, placed after the block's existing phis.
    ///
    /// # Errors
    ///
    /// The current block is already terminated.
    fn build_phi(&mut self, ty: EmitType) -> Result<ValueHandle>;

    /// Adds the incoming edge `(value, from)` to `phi`.
    ///
    /// # Errors
    ///
    /// `phi` is not a phi or `value` has a different type.
    fn add_incoming(&mut self, phi: ValueHandle, value: ValueHandle, from: BlockHandle)
        -> Result<()>;

    /// Unconditional branch.
    ///
    /// # Errors
    ///
    /// The current block is already terminated.
    fn build_br(&mut self, target: BlockHandle) -> Result<()>;

    /// Two-way branch on a boolean.
    ///
    /// # Errors
    ///
    /// `condition` is not a [`EmitType::Bool`].
    fn build_cond_br(
        &mut self,
        condition: ValueHandle,
        if_true: BlockHandle,
        if_false: BlockHandle,
    ) -> Result<()>;

    /// Multi-way branch with no cases yet; cases are added with [`Emitter::add_case`].
    ///
    /// # Errors
    ///
    /// `value` is not an integer.
    fn build_switch(&mut self, value: ValueHandle, default: BlockHandle) -> Result<ValueHandle>;

    /// Adds a case to a switch built by [`Emitter::build_switch`].
    ///
    /// # Errors
    ///
    /// `switch` is not a switch.
    fn add_case(&mut self, switch: ValueHandle, value: i64, target: BlockHandle) -> Result<()>;

    /// A call returning `ret`.
    ///
    /// # Errors
    ///
    /// The callee value is not a pointer.
    fn build_call(&mut self, callee: Callee, args: &[ValueHandle], ret: EmitType)
        -> Result<ValueHandle>;

    /// A call with an unwind edge; terminates the block.
    ///
    /// # Errors
    ///
    /// The callee value is not a pointer.
    fn build_invoke(
        &mut self,
        callee: Callee,
        args: &[ValueHandle],
        ret: EmitType,
        normal: BlockHandle,
        unwind: BlockHandle,
    ) -> Result<ValueHandle>;

    /// Landing pad token at the top of an unwind destination.
    ///
    /// # Errors
    ///
    /// The current block is already terminated.
    fn build_landing_pad(&mut self) -> Result<ValueHandle>;

    /// Field `index` of an aggregate value.
    ///
    /// # Errors
    ///
    /// `aggregate` is not an aggregate or `index` is out of range.
    fn build_extract_value(&mut self, aggregate: ValueHandle, index: u32) -> Result<ValueHandle>;

    /// Function return.
    ///
    /// # Errors
    ///
    /// The current block is already terminated.
    fn build_ret(&mut self, value: Option<ValueHandle>) -> Result<()>;

    /// Marks the end of a block control never reaches.
    ///
    /// # Errors
    ///
    /// The current block is already terminated.
    fn build_unreachable(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(EmitType::Tagged.to_string(), "ptr addrspace(1)");
        assert_eq!(EmitType::Int32Overflow.to_string(), "{ i32, i1 }");
        assert_eq!(EmitType::Bool.bit_width(), Some(1));
        assert!(EmitType::RawPtr.is_pointer());
        assert!(!EmitType::Token.is_integer());
    }

    #[test]
    fn test_op_names() {
        let name: &'static str = BinaryOp::LShr.into();
        assert_eq!(name, "lshr");
        let name: &'static str = CastKind::PtrToInt.into();
        assert_eq!(name, "ptrtoint");
        assert_eq!(
            Callee::Intrinsic(Intrinsic::GcRelocate).to_string(),
            "@llvm.experimental.gc.relocate"
        );
        assert!(BinaryOp::FRem.is_float());
        assert!(Predicate::FOlt.is_float());
    }
}
