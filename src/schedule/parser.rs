//! Reader for the scheduler's textual dump.
//!
//! The format is line based:
//!
//! ```text
//! --- BLOCK B0 ---
//! 1: Parameter[0, kRepTagged]
//! 2: Int32Constant[7]
//! 3: Call[code; 0, -1; 1](2, 1, 1)
//! Goto -> B1
//! --- BLOCK B1 (deferred) <- B0 ---
//! 4: Return(2, 3)
//! ```
//!
//! Instructions are `<id>: Mnemonic[props](inputs)` with optional `[props]` and `(inputs)`.
//! Terminators with block successors append `-> B<n>, ...`. Call descriptors are written as
//! `[code|address; <slot or -1>, ...; <return count>]`. Blank lines and lines starting with `#`
//! are ignored.

use std::str::FromStr;

use crate::{
    graph::{BlockId, ValueId},
    schedule::{
        BinaryOp, CallDescriptor, CallTarget, CompareOp, ConvertOp, Instruction,
        MachineRepresentation, MachineSemantic, MachineType, Node, OverflowOp, Schedule,
        ScheduledBlock, UnaryOp, WriteBarrierKind,
    },
    Result,
};

/// Pieces of one instruction line.
struct Line<'a> {
    number: usize,
    mnemonic: &'a str,
    props: Vec<&'a str>,
    inputs: Vec<ValueId>,
    successors: Vec<BlockId>,
}

pub(crate) fn parse_schedule(text: &str) -> Result<Schedule> {
    let mut blocks: Vec<ScheduledBlock> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(header) = line.strip_prefix("--- BLOCK") {
            blocks.push(parse_header(header, number)?);
            continue;
        }

        let Some(block) = blocks.last_mut() else {
            return Err(malformed_error!("line {}: instruction outside of a block", number));
        };

        if let Some(rest) = line.strip_prefix("Goto") {
            let targets = parse_successors(rest, number)?;
            let [target] = targets.as_slice() else {
                return Err(malformed_error!("line {}: goto needs exactly one target", number));
            };
            block.body.push(Node::Goto(*target));
            continue;
        }

        let (id, instruction) = parse_instruction(line, number)?;
        block.body.push(Node::Instruction(id, instruction));
    }

    Ok(Schedule::new(blocks))
}

fn parse_header(header: &str, number: usize) -> Result<ScheduledBlock> {
    let header = header.trim().trim_end_matches('-').trim();
    let (head, preds) = match header.split_once("<-") {
        Some((head, preds)) => (head.trim(), Some(preds)),
        None => (header, None),
    };

    let (name, deferred) = match head.strip_suffix("(deferred)") {
        Some(name) => (name.trim(), true),
        None => (head, false),
    };

    let predecessors = match preds {
        Some(list) => parse_block_list(list, number)?,
        None => Vec::new(),
    };

    Ok(ScheduledBlock {
        id: parse_block_id(name, number)?,
        deferred,
        predecessors,
        body: Vec::new(),
    })
}

fn parse_block_id(token: &str, number: usize) -> Result<BlockId> {
    token
        .trim()
        .strip_prefix('B')
        .and_then(|digits| digits.parse::<u32>().ok())
        .map(BlockId::new)
        .ok_or_else(|| malformed_error!("line {}: invalid block name '{}'", number, token))
}

fn parse_block_list(list: &str, number: usize) -> Result<Vec<BlockId>> {
    list.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| parse_block_id(token, number))
        .collect()
}

fn parse_successors(rest: &str, number: usize) -> Result<Vec<BlockId>> {
    let Some(list) = rest.trim().strip_prefix("->") else {
        return Err(malformed_error!("line {}: expected '->'", number));
    };
    parse_block_list(list, number)
}

fn parse_value(token: &str, number: usize) -> Result<ValueId> {
    token
        .trim()
        .parse::<u32>()
        .map(ValueId::new)
        .map_err(|_| malformed_error!("line {}: invalid value id '{}'", number, token))
}

fn parse_number<T: FromStr>(token: &str, number: usize) -> Result<T> {
    let token = token.trim();
    let parsed = match token.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16)
            .ok()
            .and_then(|value| value.to_string().parse::<T>().ok()),
        None => token.parse::<T>().ok(),
    };
    parsed.ok_or_else(|| malformed_error!("line {}: invalid number '{}'", number, token))
}

fn split_line(line: &str, number: usize) -> Result<(ValueId, Line<'_>)> {
    let Some((id, rest)) = line.split_once(':') else {
        return Err(malformed_error!("line {}: expected '<id>: <mnemonic>'", number));
    };
    let id = parse_value(id, number)?;

    let (rest, successors) = match rest.split_once("->") {
        Some((head, tail)) => (head, parse_block_list(tail, number)?),
        None => (rest, Vec::new()),
    };
    let rest = rest.trim();

    let name_end = rest.find(['[', '(']).unwrap_or(rest.len());
    let mnemonic = rest[..name_end].trim();
    let mut tail = &rest[name_end..];

    let mut props = Vec::new();
    if let Some(inner) = tail.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return Err(malformed_error!("line {}: unterminated '['", number));
        };
        props = inner[..close]
            .split([',', ';', '|'])
            .map(str::trim)
            .collect();
        tail = &inner[close + 1..];
    }

    let mut inputs = Vec::new();
    if let Some(inner) = tail.trim().strip_prefix('(') {
        let Some(close) = inner.find(')') else {
            return Err(malformed_error!("line {}: unterminated '('", number));
        };
        for token in inner[..close].split(',').map(str::trim) {
            if !token.is_empty() {
                inputs.push(parse_value(token, number)?);
            }
        }
    }

    Ok((
        id,
        Line {
            number,
            mnemonic,
            props,
            inputs,
            successors,
        },
    ))
}

impl Line<'_> {
    fn input(&self, position: usize) -> Result<ValueId> {
        self.inputs.get(position).copied().ok_or_else(|| {
            malformed_error!(
                "line {}: {} expects an input at position {}",
                self.number,
                self.mnemonic,
                position
            )
        })
    }

    fn prop(&self, position: usize) -> Result<&str> {
        self.props.get(position).copied().ok_or_else(|| {
            malformed_error!(
                "line {}: {} expects a property at position {}",
                self.number,
                self.mnemonic,
                position
            )
        })
    }

    fn enum_prop<T: FromStr>(&self, position: usize) -> Result<T> {
        let token = self.prop(position)?;
        T::from_str(token)
            .map_err(|_| malformed_error!("line {}: unknown name '{}'", self.number, token))
    }

    fn successor_pair(&self) -> Result<(BlockId, BlockId)> {
        match self.successors.as_slice() {
            [first, second] => Ok((*first, *second)),
            _ => Err(malformed_error!(
                "line {}: {} needs two successors",
                self.number,
                self.mnemonic
            )),
        }
    }

    /// Call properties use `;` between descriptor parts and `,` inside the slot list. Both are
    /// flattened by `split_line`, so the first prop is the target kind, the last the return
    /// count, and everything in between the slots.
    fn call_descriptor(&self) -> Result<CallDescriptor> {
        let target = match self.prop(0)? {
            "code" => CallTarget::Code,
            "address" => CallTarget::Address,
            other => {
                return Err(malformed_error!(
                    "line {}: unknown call target '{}'",
                    self.number,
                    other
                ))
            }
        };
        if self.props.len() < 2 {
            return Err(malformed_error!(
                "line {}: call descriptor needs a return count",
                self.number
            ));
        }
        let return_count = parse_number::<u32>(self.props[self.props.len() - 1], self.number)?;

        let mut registers = Vec::new();
        for token in &self.props[1..self.props.len() - 1] {
            if token.is_empty() {
                continue;
            }
            let slot = parse_number::<i32>(token, self.number)?;
            registers.push(if slot < 0 {
                None
            } else {
                Some(u8::try_from(slot).map_err(|_| {
                    malformed_error!("line {}: slot {} out of range", self.number, slot)
                })?)
            });
        }

        if registers.len() + 1 != self.inputs.len() {
            return Err(malformed_error!(
                "line {}: {} slots for {} operands",
                self.number,
                registers.len(),
                self.inputs.len()
            ));
        }
        Ok(CallDescriptor::new(target, registers, return_count))
    }
}

fn parse_instruction(line: &str, number: usize) -> Result<(ValueId, Instruction)> {
    let (id, line) = split_line(line, number)?;
    let m = line.mnemonic;

    if let Ok(op) = UnaryOp::from_str(m) {
        return Ok((id, Instruction::Unary { op, input: line.input(0)? }));
    }
    if let Ok(op) = BinaryOp::from_str(m) {
        let (lhs, rhs) = (line.input(0)?, line.input(1)?);
        return Ok((id, Instruction::Binary { op, lhs, rhs }));
    }
    if let Ok(op) = CompareOp::from_str(m) {
        let (lhs, rhs) = (line.input(0)?, line.input(1)?);
        return Ok((id, Instruction::Compare { op, lhs, rhs }));
    }
    if let Ok(op) = ConvertOp::from_str(m) {
        return Ok((id, Instruction::Convert { op, input: line.input(0)? }));
    }
    if let Ok(op) = OverflowOp::from_str(m) {
        let (lhs, rhs) = (line.input(0)?, line.input(1)?);
        return Ok((id, Instruction::Overflow { op, lhs, rhs }));
    }

    let instruction = match m {
        "Parameter" => Instruction::Parameter {
            index: parse_number(line.prop(0)?, number)?,
            representation: line.enum_prop(1)?,
        },
        "Int32Constant" => Instruction::Int32Constant(parse_number(line.prop(0)?, number)?),
        "Int64Constant" => Instruction::Int64Constant(parse_number(line.prop(0)?, number)?),
        "Float32Constant" => Instruction::Float32Constant(parse_number(line.prop(0)?, number)?),
        "Float64Constant" => Instruction::Float64Constant(parse_number(line.prop(0)?, number)?),
        "SmiConstant" => Instruction::SmiConstant(parse_number(line.prop(0)?, number)?),
        "HeapConstant" => Instruction::HeapConstant(parse_number(line.prop(0)?, number)?),
        "ExternalConstant" => Instruction::ExternalConstant(parse_number(line.prop(0)?, number)?),
        "Root" => Instruction::Root(parse_number(line.prop(0)?, number)?),
        "LoadFramePointer" => Instruction::LoadFramePointer,
        "LoadParentFramePointer" => Instruction::LoadParentFramePointer,
        "StackSlot" => Instruction::StackSlot {
            size: parse_number(line.prop(0)?, number)?,
            alignment: parse_number(line.prop(1)?, number)?,
        },
        "Projection" => Instruction::Projection {
            index: parse_number(line.prop(0)?, number)?,
            input: line.input(0)?,
        },
        "Load" => Instruction::Load {
            machine_type: MachineType::new(
                line.enum_prop::<MachineRepresentation>(0)?,
                line.enum_prop::<MachineSemantic>(1)?,
            ),
            base: line.input(0)?,
            offset: line.input(1)?,
        },
        "Store" => Instruction::Store {
            representation: line.enum_prop(0)?,
            barrier: line.enum_prop::<WriteBarrierKind>(1)?,
            base: line.input(0)?,
            offset: line.input(1)?,
            value: line.input(2)?,
        },
        "Phi" => Instruction::Phi {
            representation: line.enum_prop(0)?,
            inputs: line.inputs.clone(),
        },
        "Call" => Instruction::Call {
            descriptor: line.call_descriptor()?,
            operands: line.inputs.clone(),
        },
        "TailCall" => Instruction::TailCall {
            descriptor: line.call_descriptor()?,
            operands: line.inputs.clone(),
        },
        "Invoke" => {
            let (then, exception) = line.successor_pair()?;
            Instruction::Invoke {
                descriptor: line.call_descriptor()?,
                operands: line.inputs.clone(),
                then,
                exception,
            }
        }
        "CallWithCallerSavedRegisters" => Instruction::CallWithCallerSavedRegisters {
            function: line.input(0)?,
            arguments: line.inputs[1..].to_vec(),
        },
        "IfException" => Instruction::IfException,
        "IfValue" => Instruction::IfValue(parse_number(line.prop(0)?, number)?),
        "IfDefault" => Instruction::IfDefault,
        "Branch" => {
            let (if_true, if_false) = line.successor_pair()?;
            Instruction::Branch {
                condition: line.input(0)?,
                if_true,
                if_false,
            }
        }
        "Switch" => {
            if line.successors.is_empty() {
                return Err(malformed_error!("line {}: switch without successors", number));
            }
            Instruction::Switch {
                input: line.input(0)?,
                successors: line.successors.clone(),
            }
        }
        "Return" => Instruction::Return {
            pop_count: line.input(0)?,
            values: line.inputs[1..].to_vec(),
        },
        other => {
            return Err(malformed_error!(
                "line {}: unknown mnemonic '{}'",
                number,
                other
            ))
        }
    };

    Ok((id, instruction))
}
