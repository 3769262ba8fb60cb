//! Flat, self-describing instruction set.
//!
//! Jump operands are relative: the target index is the index of the jump
//! instruction plus its offset. Loop control flow is first emitted as
//! [`Instruction::JumpPlaceholder`] and rewritten to concrete offsets once
//! the surrounding body length is known, so a placeholder surviving to
//! execution is a compiler bug the machine reports loudly.

use crate::ast::Literal;
use crate::builtins::Builtin;
use crate::dispatch::{BinaryOp, UnaryOp};
use std::fmt::{self, Display, Formatter};

/// Stack sentinels delimiting regions of the operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    BeginLoop,
    EndLoop,
    Return,
}

impl Display for Marker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Marker::BeginLoop => "BEGIN_LOOP",
            Marker::EndLoop => "END_LOOP",
            Marker::Return => "RETURN",
        };
        write!(f, "{}", name)
    }
}

/// Pending loop-control jump awaiting back-patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Push a literal value.
    Push(Literal),
    /// Push a stack sentinel.
    PushMarker(Marker),
    Pop,
    /// Duplicate the top of the stack.
    Clone,
    /// Swap the top two stack values.
    Swap,
    StoreName(String),
    LoadName(String),
    Jump(i32),
    JumpIfFalse(i32),
    JumpPlaceholder(Placeholder),
    Return,
    /// Pop values down to and including the innermost `BeginLoop` marker.
    ClearLoop,
    /// Push a fresh empty list.
    MakeList,
    /// Append the top of the stack to the list at the given stack offset
    /// (negative, relative to the top after popping the value).
    Append(i32),
    /// Replace the container at the given stack offset with its length.
    Len(i32),
    /// Pop `end` then `start` and push a range iterator.
    MakeRange,
    /// Advance the range at stack offset `iter`, pushing the next element;
    /// on exhaustion jump by `exit` instead.
    IterNext { iter: i32, exit: i32 },
    /// Pop `count` indices and a source, push the selected element.
    SubscriptRead(usize),
    /// Pop a value, `count` indices, and a source; write the value through.
    SubscriptWrite(usize),
    /// Pop the callee name and `count` arguments and invoke. Emitted for
    /// every user function invocation; the machine has no implementation
    /// and fails if it is ever reached.
    Call(usize),
    /// Invoke a native builtin on `count` popped arguments.
    CallBuiltin(Builtin, usize),
    /// Pop `count` values and print them, one per line, oldest first.
    Print(usize),
    /// Print the whole operand stack (diagnostic).
    PrintStack,
    Binary(BinaryOp),
    Unary(UnaryOp),
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push(literal) => match literal {
                Literal::Int(value) => write!(f, "{:<16}{}", "PUSH", value),
                Literal::Float(value) => write!(f, "{:<16}{}", "PUSH", value),
                Literal::Bool(value) => write!(f, "{:<16}{}", "PUSH", value),
                Literal::Str(value) => write!(f, "{:<16}\"{}\"", "PUSH", value),
            },
            Instruction::PushMarker(marker) => write!(f, "{:<16}{}", "PUSH_MARKER", marker),
            Instruction::Pop => write!(f, "POP"),
            Instruction::Clone => write!(f, "CLONE"),
            Instruction::Swap => write!(f, "SWAP"),
            Instruction::StoreName(name) => write!(f, "{:<16}{}", "STORE_NAME", name),
            Instruction::LoadName(name) => write!(f, "{:<16}{}", "LOAD_NAME", name),
            Instruction::Jump(offset) => write!(f, "{:<16}{}", "JUMP", offset),
            Instruction::JumpIfFalse(offset) => write!(f, "{:<16}{}", "JUMP_IF_FALSE", offset),
            Instruction::JumpPlaceholder(Placeholder::Break) => {
                write!(f, "{:<16}BREAK", "JUMP_PENDING")
            }
            Instruction::JumpPlaceholder(Placeholder::Continue) => {
                write!(f, "{:<16}CONTINUE", "JUMP_PENDING")
            }
            Instruction::Return => write!(f, "RETURN"),
            Instruction::ClearLoop => write!(f, "CLEAR_LOOP"),
            Instruction::MakeList => write!(f, "MAKE_LIST"),
            Instruction::Append(offset) => write!(f, "{:<16}{}", "APPEND", offset),
            Instruction::Len(offset) => write!(f, "{:<16}{}", "LEN", offset),
            Instruction::MakeRange => write!(f, "MAKE_RANGE"),
            Instruction::IterNext { iter, exit } => {
                write!(f, "{:<16}{}, {}", "ITER_NEXT", iter, exit)
            }
            Instruction::SubscriptRead(count) => write!(f, "{:<16}{}", "SUBSCRIPT_READ", count),
            Instruction::SubscriptWrite(count) => write!(f, "{:<16}{}", "SUBSCRIPT_WRITE", count),
            Instruction::Call(count) => write!(f, "{:<16}{}", "CALL", count),
            Instruction::CallBuiltin(builtin, count) => {
                write!(f, "{:<16}{}, {}", "CALL_BUILTIN", builtin, count)
            }
            Instruction::Print(count) => write!(f, "{:<16}{}", "PRINT", count),
            Instruction::PrintStack => write!(f, "PRINT_STACK"),
            Instruction::Binary(operator) => write!(f, "{:<16}{}", "BINARY", operator),
            Instruction::Unary(operator) => write!(f, "{:<16}{}", "UNARY", operator),
        }
    }
}

/// One-instruction-per-line listing with indices, for diagnostics.
pub fn disassemble(code: &[Instruction]) -> String {
    code.iter()
        .enumerate()
        .map(|(index, instruction)| format!("{:>4}  {}\n", index, instruction))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_display() {
        let cases = [
            (Instruction::Push(Literal::Int(42)), "PUSH            42"),
            (
                Instruction::Push(Literal::Str("hi".to_string())),
                "PUSH            \"hi\"",
            ),
            (
                Instruction::PushMarker(Marker::BeginLoop),
                "PUSH_MARKER     BEGIN_LOOP",
            ),
            (
                Instruction::StoreName("a".to_string()),
                "STORE_NAME      a",
            ),
            (Instruction::Jump(-5), "JUMP            -5"),
            (
                Instruction::IterNext { iter: -1, exit: 4 },
                "ITER_NEXT       -1, 4",
            ),
            (Instruction::Binary(BinaryOp::DotAdd), "BINARY          .+"),
            (Instruction::Unary(UnaryOp::Transpose), "UNARY           '"),
            (
                Instruction::JumpPlaceholder(Placeholder::Break),
                "JUMP_PENDING    BREAK",
            ),
        ];
        for (instruction, expected) in cases {
            assert_eq!(instruction.to_string(), expected);
        }
    }

    #[test]
    fn disassembly_lists_one_instruction_per_line() {
        let code = vec![
            Instruction::Push(Literal::Int(1)),
            Instruction::StoreName("a".to_string()),
        ];
        let listing = disassemble(&code);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("   0  PUSH"));
        assert!(lines[1].starts_with("   1  STORE_NAME"));
    }
}
