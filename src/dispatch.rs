//! Operator dispatch tables.
//!
//! Type inference resolves every operator application by an exact lookup of
//! `(operator, operand type tuple)` in one of the tables below. A miss is a
//! hard type error; there is no fallback and no implicit coercion beyond
//! what an explicit entry encodes.

use crate::types::{Primitive, Type};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    DotAdd,
    DotSub,
    DotMul,
    DotDiv,
    DotRem,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::DotAdd => ".+",
            BinaryOp::DotSub => ".-",
            BinaryOp::DotMul => ".*",
            BinaryOp::DotDiv => "./",
            BinaryOp::DotRem => ".%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        }
    }

    /// For a broadcast (elementwise) operator, the scalar operator it
    /// applies at the leaves. `None` for everything else.
    pub fn broadcast_base(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::DotAdd => Some(BinaryOp::Add),
            BinaryOp::DotSub => Some(BinaryOp::Sub),
            BinaryOp::DotMul => Some(BinaryOp::Mul),
            BinaryOp::DotDiv => Some(BinaryOp::Div),
            BinaryOp::DotRem => Some(BinaryOp::Rem),
            _ => None,
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Not,
    Transpose,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "not",
            UnaryOp::Transpose => "'",
        }
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Assignment statement operators. Everything but `=` desugars to a load,
/// the underlying binary operator, and a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
        }
    }

    pub fn underlying(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
        }
    }
}

impl Display for AssignOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

const INT: Type = Type::INT32;
const FLOAT: Type = Type::FLOAT64;
const BOOL: Type = Type::BOOLEAN;
const STR: Type = Type::STRING;

const COMPARABLE: [Primitive; 4] = [
    Primitive::Int32,
    Primitive::Float64,
    Primitive::Boolean,
    Primitive::Str,
];

const NUMERIC: [Primitive; 2] = [Primitive::Int32, Primitive::Float64];

fn numeric_entries(result_of: fn(Type, Type) -> Type) -> Vec<((Type, Type), Type)> {
    let mut entries = Vec::new();
    for left in NUMERIC {
        for right in NUMERIC {
            let left = Type::Primitive(left);
            let right = Type::Primitive(right);
            entries.push(((left, right), result_of(left, right)));
        }
    }
    entries
}

fn arithmetic_result(left: Type, right: Type) -> Type {
    if left == INT && right == INT {
        INT
    } else {
        FLOAT
    }
}

fn build_binary_table() -> HashMap<(BinaryOp, Type, Type), Type> {
    let mut table = HashMap::new();

    for ((left, right), result) in numeric_entries(arithmetic_result) {
        table.insert((BinaryOp::Add, left, right), result);
        table.insert((BinaryOp::Sub, left, right), result);
        table.insert((BinaryOp::Mul, left, right), result);
        // int32 / int32 is float64, like every other division.
        table.insert((BinaryOp::Div, left, right), FLOAT);
    }
    table.insert((BinaryOp::Add, STR, STR), STR);
    table.insert((BinaryOp::Mul, STR, INT), STR);
    table.insert((BinaryOp::Mul, INT, STR), STR);
    table.insert((BinaryOp::Rem, INT, INT), INT);

    // Broadcast operators: every scalar entry of the base operator lifts
    // to container/scalar, scalar/container, and container/container
    // combinations, carrying the base result as the element type.
    for op in [
        BinaryOp::DotAdd,
        BinaryOp::DotSub,
        BinaryOp::DotMul,
        BinaryOp::DotDiv,
        BinaryOp::DotRem,
    ] {
        let base = op.broadcast_base().expect("dot operator");
        let scalar_entries: Vec<_> = table
            .iter()
            .filter(|((entry_op, left, right), _)| {
                *entry_op == base && !left.is_container() && !right.is_container()
            })
            .map(|((_, left, right), result)| (*left, *right, *result))
            .collect();

        for (left, right, result) in scalar_entries {
            let (Type::Primitive(l), Type::Primitive(r), Type::Primitive(out)) =
                (left, right, result)
            else {
                continue;
            };
            if !NUMERIC.contains(&l) || !NUMERIC.contains(&r) {
                continue;
            }
            table.insert((op, Type::Vector(l), right), Type::Vector(out));
            table.insert((op, left, Type::Vector(r)), Type::Vector(out));
            table.insert((op, Type::Vector(l), Type::Vector(r)), Type::Vector(out));
            table.insert((op, Type::Matrix(l), right), Type::Matrix(out));
            table.insert((op, left, Type::Matrix(r)), Type::Matrix(out));
            table.insert((op, Type::Matrix(l), Type::Matrix(r)), Type::Matrix(out));
        }
    }

    for op in [
        BinaryOp::Equal,
        BinaryOp::NotEqual,
        BinaryOp::Less,
        BinaryOp::LessEqual,
        BinaryOp::Greater,
        BinaryOp::GreaterEqual,
    ] {
        for element in COMPARABLE {
            let scalar = Type::Primitive(element);
            table.insert((op, scalar, scalar), BOOL);
            table.insert((op, Type::Vector(element), Type::Vector(element)), BOOL);
            table.insert((op, Type::Matrix(element), Type::Matrix(element)), BOOL);
        }
    }

    for op in [BinaryOp::And, BinaryOp::Or, BinaryOp::Xor] {
        table.insert((op, BOOL, BOOL), BOOL);
    }

    table
}

fn build_unary_table() -> HashMap<(UnaryOp, Type), Type> {
    let mut table = HashMap::new();

    for element in NUMERIC {
        let scalar = Type::Primitive(element);
        table.insert((UnaryOp::Negate, scalar), scalar);
        table.insert((UnaryOp::Negate, Type::Vector(element)), Type::Vector(element));
        table.insert((UnaryOp::Negate, Type::Matrix(element)), Type::Matrix(element));
    }
    table.insert((UnaryOp::Not, BOOL), BOOL);
    for element in COMPARABLE {
        table.insert(
            (UnaryOp::Transpose, Type::Matrix(element)),
            Type::Matrix(element),
        );
        table.insert(
            (UnaryOp::Transpose, Type::Vector(element)),
            Type::Matrix(element),
        );
    }

    table
}

fn build_interval_table() -> HashMap<(Type, Type), Type> {
    let mut table = HashMap::new();
    table.insert((INT, INT), Type::Range(Primitive::Int32));
    table
}

lazy_static! {
    static ref BINARY_TABLE: HashMap<(BinaryOp, Type, Type), Type> = build_binary_table();
    static ref UNARY_TABLE: HashMap<(UnaryOp, Type), Type> = build_unary_table();
    static ref INTERVAL_TABLE: HashMap<(Type, Type), Type> = build_interval_table();
}

/// Exact-match lookup for a binary operator application.
pub fn binary_result(op: BinaryOp, left: Type, right: Type) -> Option<Type> {
    BINARY_TABLE.get(&(op, left, right)).copied()
}

/// Exact-match lookup for a unary operator application.
pub fn unary_result(op: UnaryOp, operand: Type) -> Option<Type> {
    UNARY_TABLE.get(&(op, operand)).copied()
}

/// Lookup for the `interval` discriminant used by range expressions.
pub fn interval_result(start: Type, end: Type) -> Option<Type> {
    INTERVAL_TABLE.get(&(start, end)).copied()
}
