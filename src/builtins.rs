//! Native builtin functions.
//!
//! Builtins are resolved at compile time by name and invoked through a
//! dedicated call instruction, so they never touch the unimplemented
//! user-function call path.

use crate::error::RuntimeError;
use crate::types::{Primitive, Type};
use crate::value::Value;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Zeros,
    Ones,
    Eye,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Builtin> {
        match name {
            "zeros" => Some(Builtin::Zeros),
            "ones" => Some(Builtin::Ones),
            "eye" => Some(Builtin::Eye),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Zeros => "zeros",
            Builtin::Ones => "ones",
            Builtin::Eye => "eye",
        }
    }

    /// The result type for a given argument type tuple; `None` on a
    /// signature miss.
    pub fn signature(self, arguments: &[Type]) -> Option<Type> {
        match (self, arguments) {
            (Builtin::Zeros | Builtin::Ones, [Type::INT32]) => {
                Some(Type::Vector(Primitive::Int32))
            }
            (Builtin::Zeros | Builtin::Ones, [Type::INT32, Type::INT32]) => {
                Some(Type::Matrix(Primitive::Int32))
            }
            (Builtin::Eye, [Type::INT32]) => Some(Type::Matrix(Primitive::Int32)),
            _ => None,
        }
    }

    pub fn call(self, arguments: &[Value]) -> Result<Value, RuntimeError> {
        let dimensions = arguments
            .iter()
            .map(|argument| match argument {
                Value::Int(value) if *value >= 0 => Ok(*value as usize),
                _ => Err(RuntimeError::BadBuiltinArgument {
                    builtin: self.name().to_string(),
                    value: argument.to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        match (self, dimensions.as_slice()) {
            (Builtin::Zeros, &[length]) => Ok(filled_vector(length, 0)),
            (Builtin::Ones, &[length]) => Ok(filled_vector(length, 1)),
            (Builtin::Zeros, &[rows, columns]) => Ok(filled_matrix(rows, columns, 0)),
            (Builtin::Ones, &[rows, columns]) => Ok(filled_matrix(rows, columns, 1)),
            (Builtin::Eye, &[size]) => {
                Ok(Value::list(
                    (0..size)
                        .map(|row| {
                            Value::list(
                                (0..size)
                                    .map(|column| Value::Int(i32::from(row == column)))
                                    .collect(),
                            )
                        })
                        .collect(),
                ))
            }
            _ => Err(RuntimeError::BadBuiltinArgument {
                builtin: self.name().to_string(),
                value: format!("{} arguments", arguments.len()),
            }),
        }
    }
}

fn filled_vector(length: usize, fill: i32) -> Value {
    Value::list(vec![Value::Int(fill); length])
}

fn filled_matrix(rows: usize, columns: usize, fill: i32) -> Value {
    Value::list((0..rows).map(|_| filled_vector(columns, fill)).collect())
}

impl Display for Builtin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures() {
        let vector = Type::Vector(Primitive::Int32);
        let matrix = Type::Matrix(Primitive::Int32);
        assert_eq!(Builtin::Zeros.signature(&[Type::INT32]), Some(vector));
        assert_eq!(
            Builtin::Ones.signature(&[Type::INT32, Type::INT32]),
            Some(matrix)
        );
        assert_eq!(Builtin::Eye.signature(&[Type::INT32]), Some(matrix));
        assert_eq!(Builtin::Eye.signature(&[Type::INT32, Type::INT32]), None);
        assert_eq!(Builtin::Zeros.signature(&[Type::FLOAT64]), None);
        assert_eq!(Builtin::lookup("transpose"), None);
    }

    #[test]
    fn construction() -> Result<(), RuntimeError> {
        assert_eq!(
            Builtin::Zeros.call(&[Value::Int(3)])?.to_string(),
            "[0, 0, 0]"
        );
        assert_eq!(
            Builtin::Ones.call(&[Value::Int(2), Value::Int(3)])?.to_string(),
            "[[1, 1, 1], [1, 1, 1]]"
        );
        assert_eq!(
            Builtin::Eye.call(&[Value::Int(3)])?.to_string(),
            "[[1, 0, 0], [0, 1, 0], [0, 0, 1]]"
        );
        Ok(())
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(Builtin::Zeros.call(&[Value::Float(2.0)]).is_err());
        assert!(Builtin::Eye.call(&[Value::Int(-1)]).is_err());
        assert!(Builtin::Eye.call(&[Value::Int(1), Value::Int(1)]).is_err());
    }
}
