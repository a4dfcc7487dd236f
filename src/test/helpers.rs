//! Instruction shorthands.

use crate::{
    graph::{BlockId, ValueId},
    schedule::{CallDescriptor, CallTarget, Instruction, MachineRepresentation},
};

/// Value id `n`.
pub fn v(n: u32) -> ValueId {
    ValueId::new(n)
}

/// Block id `n`.
pub fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

/// Tagged parameter `index`.
pub fn param(index: u32) -> Instruction {
    Instruction::Parameter {
        index,
        representation: MachineRepresentation::Tagged,
    }
}

/// Return of `value`, popping `pop` slots.
pub fn ret(pop: u32, value: u32) -> Instruction {
    Instruction::Return {
        pop_count: v(pop),
        values: vec![v(value)],
    }
}

/// Call of a code object with every argument passed on the stack.
pub fn stack_call(callee: u32, arguments: &[u32]) -> Instruction {
    let mut operands = vec![v(callee)];
    operands.extend(arguments.iter().map(|argument| v(*argument)));
    Instruction::Call {
        descriptor: CallDescriptor::new(CallTarget::Code, vec![None; arguments.len()], 1),
        operands,
    }
}
