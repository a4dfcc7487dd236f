//! Representation coercions.
//!
//! The scheduler does not always agree with itself about how a value is represented: a word
//! may flow into a tagged phi, a comparison result into a word operation. Only the conversions
//! below are sanctioned; any other mismatch is reported as a representation defect.

use crate::{
    config::LoweringConfig,
    emit::{CastKind, EmitType, Emitter, ValueHandle},
    Result,
};

/// Converts a phi input to the phi's type.
///
/// Sanctioned: pointer-sized integer to tagged (`inttoptr`), tagged or raw pointer to
/// pointer-sized integer (`ptrtoint`), boolean to pointer-sized integer (`zext`).
pub(crate) fn coerce_phi_input(
    emitter: &mut dyn Emitter,
    config: &LoweringConfig,
    value: ValueHandle,
    to: EmitType,
) -> Result<ValueHandle> {
    let from = emitter.type_of(value)?;
    if from == to {
        return Ok(value);
    }

    let int_ptr = config.int_ptr();
    let kind = if from == int_ptr && to == EmitType::Tagged {
        CastKind::IntToPtr
    } else if from.is_pointer() && to == int_ptr {
        CastKind::PtrToInt
    } else if from == EmitType::Bool && to == int_ptr {
        CastKind::ZExt
    } else {
        return Err(representation_defect!(
            "phi of type {} cannot take {} of type {}",
            to,
            value,
            from
        ));
    };
    emitter.build_cast(kind, value, to)
}

fn ensure_integer(
    emitter: &mut dyn Emitter,
    value: ValueHandle,
    to: EmitType,
) -> Result<ValueHandle> {
    let from = emitter.type_of(value)?;
    if from == to {
        Ok(value)
    } else if from.is_pointer() {
        emitter.build_cast(CastKind::PtrToInt, value, to)
    } else if from == EmitType::Bool {
        emitter.build_cast(CastKind::ZExt, value, to)
    } else {
        Err(representation_defect!(
            "{} of type {} used as {}",
            value,
            from,
            to
        ))
    }
}

/// A 32-bit operand: pointers are converted, booleans zero-extended.
pub(crate) fn ensure_word32(emitter: &mut dyn Emitter, value: ValueHandle) -> Result<ValueHandle> {
    ensure_integer(emitter, value, EmitType::Int32)
}

/// A 64-bit operand: pointers are converted, booleans zero-extended.
pub(crate) fn ensure_word64(emitter: &mut dyn Emitter, value: ValueHandle) -> Result<ValueHandle> {
    ensure_integer(emitter, value, EmitType::Int64)
}

/// A pointer-sized integer operand.
pub(crate) fn ensure_int_ptr(
    emitter: &mut dyn Emitter,
    config: &LoweringConfig,
    value: ValueHandle,
) -> Result<ValueHandle> {
    ensure_integer(emitter, value, config.int_ptr())
}

/// An address operand of pointer type `to`. Integers are converted with `inttoptr`, the other
/// pointer kind with a bitcast.
pub(crate) fn ensure_pointer(
    emitter: &mut dyn Emitter,
    value: ValueHandle,
    to: EmitType,
) -> Result<ValueHandle> {
    let from = emitter.type_of(value)?;
    if from == to {
        Ok(value)
    } else if from.is_pointer() {
        emitter.build_cast(CastKind::Bitcast, value, to)
    } else if from == EmitType::Int32 || from == EmitType::Int64 {
        emitter.build_cast(CastKind::IntToPtr, value, to)
    } else {
        Err(representation_defect!(
            "{} of type {} used as an address",
            value,
            from
        ))
    }
}

/// An operand that must already have type `ty`.
pub(crate) fn expect_type(
    emitter: &dyn Emitter,
    value: ValueHandle,
    ty: EmitType,
) -> Result<ValueHandle> {
    let actual = emitter.type_of(value)?;
    if actual != ty {
        return Err(representation_defect!(
            "{} of type {} used as {}",
            value,
            actual,
            ty
        ));
    }
    Ok(value)
}
