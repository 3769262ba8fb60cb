//! Error types for every stage of the pipeline.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("line {line}: unexpected token `{found}`, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        line: u32,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("line {line}: invalid number literal `{literal}`")]
    InvalidNumber { literal: String, line: u32 },

    #[error("line {line}: illegal character `{character}`")]
    IllegalCharacter { character: char, line: u32 },

    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: u32 },

    #[error("line {line}: cannot assign to this expression")]
    BadAssignmentTarget { line: u32 },
}

#[derive(Debug, Error, PartialEq)]
pub enum SemanticError {
    #[error("line {line}: no overload of `{operator}` accepts ({operands})")]
    DispatchMiss {
        operator: String,
        operands: String,
        line: u32,
    },

    #[error("line {line}: vector elements must share one type")]
    InhomogeneousVector { line: u32 },

    #[error("line {line}: matrix rows must have equal lengths")]
    RaggedMatrix { line: u32 },

    #[error("line {line}: matrix rows must share one element type")]
    MatrixElementMismatch { line: u32 },

    #[error("line {line}: empty containers have no element type")]
    EmptyContainer { line: u32 },

    #[error("line {line}: type `{ty}` cannot be subscripted")]
    NotIndexable { ty: String, line: u32 },

    #[error("line {line}: type `{ty}` cannot be iterated")]
    NotIterable { ty: String, line: u32 },
}

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("line {line}: invalid assignment target")]
    InvalidAssignmentTarget { line: u32 },
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("undefined name `{name}`")]
    UndefinedName { name: String },

    #[error("value stack underflow")]
    StackUnderflow,

    #[error("user-defined function calls are not implemented (called `{callee}`)")]
    CallUnsupported { callee: String },

    #[error("executed an unpatched placeholder jump")]
    UnpatchedJump,

    #[error("value `{value}` cannot be subscripted")]
    NotIndexable { value: String },

    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i32, length: usize },

    #[error("operator `{operator}` cannot be applied to `{left}` and `{right}`")]
    OperatorTypeMismatch {
        operator: String,
        left: String,
        right: String,
    },

    #[error("value `{value}` cannot be iterated")]
    NotIterable { value: String },

    #[error("condition evaluated to non-boolean `{value}`")]
    ConditionNotBoolean { value: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("builtin `{builtin}` cannot accept {value}")]
    BadBuiltinArgument { builtin: String, value: String },

    #[error("elementwise operands have lengths {left} and {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("output error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RuntimeError {
    fn from(error: std::io::Error) -> Self {
        RuntimeError::Io(error.to_string())
    }
}
