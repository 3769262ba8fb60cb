//! Tagged runtime values and operator application.
//!
//! Containers are reference-counted shared lists, so a value loaded from
//! the binding table aliases the stored container and subscript writes are
//! visible through every handle. Markers are ordinary stack values the
//! machine matches on; user code can never produce one.

use crate::bytecode::Marker;
use crate::dispatch::{BinaryOp, UnaryOp};
use crate::error::RuntimeError;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Range { next: i32, stop: i32 },
    Marker(Marker),
}

impl Value {
    pub fn list(elements: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(elements)))
    }
}

impl From<crate::ast::Literal> for Value {
    fn from(literal: crate::ast::Literal) -> Self {
        match literal {
            crate::ast::Literal::Int(value) => Value::Int(value),
            crate::ast::Literal::Float(value) => Value::Float(value),
            crate::ast::Literal::Bool(value) => Value::Bool(value),
            crate::ast::Literal::Str(value) => Value::Str(value),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{}", value),
            Value::List(elements) => {
                write!(f, "[")?;
                for (index, element) in elements.borrow().iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Value::Range { next, stop } => write!(f, "{}:{}", next, stop),
            Value::Marker(marker) => write!(f, "<{}>", marker),
        }
    }
}

fn mismatch(operator: BinaryOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::OperatorTypeMismatch {
        operator: operator.symbol().to_string(),
        left: left.to_string(),
        right: right.to_string(),
    }
}

/// Applies a binary operator to two runtime values. Broadcast operators
/// recurse into containers down to scalar leaves; everything else follows
/// the same shapes the compile-time dispatch tables admit.
pub fn apply_binary(operator: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    if let Some(base) = operator.broadcast_base() {
        return broadcast(operator, base, left, right);
    }
    match operator {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            apply_arithmetic(operator, left, right)
        }
        BinaryOp::Equal => Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering =
                compare(&left, &right).ok_or_else(|| mismatch(operator, &left, &right))?;
            let result = match operator {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => match (&left, &right) {
            (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(match operator {
                BinaryOp::And => *l && *r,
                BinaryOp::Or => *l || *r,
                _ => *l != *r,
            })),
            _ => Err(mismatch(operator, &left, &right)),
        },
        _ => unreachable!("broadcast operators are handled above"),
    }
}

fn apply_arithmetic(
    operator: BinaryOp,
    left: Value,
    right: Value,
) -> Result<Value, RuntimeError> {
    match (operator, &left, &right) {
        (BinaryOp::Div, _, &Value::Int(0)) | (BinaryOp::Rem, _, &Value::Int(0)) => {
            Err(RuntimeError::DivisionByZero)
        }
        (BinaryOp::Div, _, &Value::Float(r)) if r == 0.0 => Err(RuntimeError::DivisionByZero),
        (BinaryOp::Add, Value::Int(l), Value::Int(r)) => Ok(Value::Int(l + r)),
        (BinaryOp::Sub, Value::Int(l), Value::Int(r)) => Ok(Value::Int(l - r)),
        (BinaryOp::Mul, Value::Int(l), Value::Int(r)) => Ok(Value::Int(l * r)),
        // Division is float division even over two integers.
        (BinaryOp::Div, Value::Int(l), Value::Int(r)) => Ok(Value::Float(*l as f64 / *r as f64)),
        (BinaryOp::Rem, Value::Int(l), Value::Int(r)) => Ok(Value::Int(l % r)),
        (BinaryOp::Add, Value::Str(l), Value::Str(r)) => Ok(Value::Str(format!("{}{}", l, r))),
        (BinaryOp::Mul, Value::Str(s), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
            Ok(Value::Str(s.repeat((*n).max(0) as usize)))
        }
        (_, Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let l = as_float(&left);
            let r = as_float(&right);
            let result = match operator {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                _ => return Err(mismatch(operator, &left, &right)),
            };
            Ok(Value::Float(result))
        }
        _ => Err(mismatch(operator, &left, &right)),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(value) => *value as f64,
        Value::Float(value) => *value,
        _ => unreachable!("checked by the caller"),
    }
}

fn broadcast(
    operator: BinaryOp,
    base: BinaryOp,
    left: Value,
    right: Value,
) -> Result<Value, RuntimeError> {
    match (&left, &right) {
        (Value::List(l), Value::List(r)) => {
            let l = l.borrow();
            let r = r.borrow();
            if l.len() != r.len() {
                return Err(RuntimeError::LengthMismatch {
                    left: l.len(),
                    right: r.len(),
                });
            }
            let elements = l
                .iter()
                .zip(r.iter())
                .map(|(a, b)| broadcast(operator, base, a.clone(), b.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::list(elements))
        }
        (Value::List(l), _) => {
            let elements = l
                .borrow()
                .iter()
                .map(|a| broadcast(operator, base, a.clone(), right.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::list(elements))
        }
        (_, Value::List(r)) => {
            let elements = r
                .borrow()
                .iter()
                .map(|b| broadcast(operator, base, left.clone(), b.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::list(elements))
        }
        _ => apply_arithmetic(base, left, right),
    }
}

/// Total order over comparable value pairs; lists compare lexicographically.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
        (Value::Int(l), Value::Float(r)) => (*l as f64).partial_cmp(r),
        (Value::Float(l), Value::Int(r)) => l.partial_cmp(&(*r as f64)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::Str(l), Value::Str(r)) => Some(l.cmp(r)),
        (Value::List(l), Value::List(r)) => {
            let l = l.borrow();
            let r = r.borrow();
            for (a, b) in l.iter().zip(r.iter()) {
                match compare(a, b)? {
                    Ordering::Equal => continue,
                    ordering => return Some(ordering),
                }
            }
            Some(l.len().cmp(&r.len()))
        }
        _ => None,
    }
}

pub fn apply_unary(operator: UnaryOp, operand: Value) -> Result<Value, RuntimeError> {
    match (operator, &operand) {
        (UnaryOp::Negate, Value::Int(value)) => Ok(Value::Int(-value)),
        (UnaryOp::Negate, Value::Float(value)) => Ok(Value::Float(-value)),
        (UnaryOp::Negate, Value::List(elements)) => {
            let elements = elements
                .borrow()
                .iter()
                .map(|element| apply_unary(UnaryOp::Negate, element.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::list(elements))
        }
        (UnaryOp::Not, Value::Bool(value)) => Ok(Value::Bool(!value)),
        (UnaryOp::Transpose, Value::List(elements)) => transpose(&elements.borrow()),
        _ => Err(RuntimeError::OperatorTypeMismatch {
            operator: operator.symbol().to_string(),
            left: operand.to_string(),
            right: String::new(),
        }),
    }
}

/// A vector becomes a single-column matrix; a matrix swaps rows with
/// columns.
fn transpose(elements: &[Value]) -> Result<Value, RuntimeError> {
    let rows: Option<Vec<_>> = elements
        .iter()
        .map(|element| match element {
            Value::List(row) => Some(row.borrow().clone()),
            _ => None,
        })
        .collect();
    match rows {
        None => {
            // Flat vector of scalars.
            let columns = elements
                .iter()
                .map(|element| Value::list(vec![element.clone()]))
                .collect();
            Ok(Value::list(columns))
        }
        Some(rows) => {
            let width = rows.first().map(Vec::len).unwrap_or(0);
            let transposed = (0..width)
                .map(|column| {
                    Value::list(rows.iter().map(|row| row[column].clone()).collect())
                })
                .collect();
            Ok(Value::list(transposed))
        }
    }
}
