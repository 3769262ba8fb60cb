use std::fmt::{self, Display, Formatter};

/// A scalar value type, identified solely by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int32,
    Float64,
    Boolean,
    Str,
    Function,
    Nothing,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Int32 => "int32",
            Primitive::Float64 => "float64",
            Primitive::Boolean => "boolean",
            Primitive::Str => "string",
            Primitive::Function => "function",
            Primitive::Nothing => "nothing",
        }
    }
}

impl Display for Primitive {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A value type: either a primitive or an element-typed container.
///
/// Equality and hashing are structural. There is no subtyping; every
/// coercion the language performs has its own dispatch-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(Primitive),
    Vector(Primitive),
    Matrix(Primitive),
    Range(Primitive),
}

impl Type {
    pub const INT32: Type = Type::Primitive(Primitive::Int32);
    pub const FLOAT64: Type = Type::Primitive(Primitive::Float64);
    pub const BOOLEAN: Type = Type::Primitive(Primitive::Boolean);
    pub const STRING: Type = Type::Primitive(Primitive::Str);
    pub const FUNCTION: Type = Type::Primitive(Primitive::Function);
    pub const NOTHING: Type = Type::Primitive(Primitive::Nothing);

    pub fn is_container(&self) -> bool {
        matches!(self, Type::Vector(_) | Type::Matrix(_) | Type::Range(_))
    }

    /// The element type of a container, if this is one.
    pub fn element(&self) -> Option<Primitive> {
        match self {
            Type::Vector(element) | Type::Matrix(element) | Type::Range(element) => Some(*element),
            Type::Primitive(_) => None,
        }
    }

    /// Strips one container layer: a container becomes its element type,
    /// anything else passes through unchanged. Used when a loop variable
    /// is bound from the range it iterates.
    pub fn decapsulate(&self) -> Type {
        match self.element() {
            Some(element) => Type::Primitive(element),
            None => *self,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(primitive) => write!(f, "{}", primitive),
            Type::Vector(element) => write!(f, "vector<{}>", element),
            Type::Matrix(element) => write!(f, "matrix<{}>", element),
            Type::Range(element) => write!(f, "range<{}>", element),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_types_display() {
        assert_eq!(Type::INT32.to_string(), "int32");
        assert_eq!(Type::BOOLEAN.to_string(), "boolean");
        assert_eq!(Type::STRING.to_string(), "string");
        assert_eq!(Type::NOTHING.to_string(), "nothing");
    }

    #[test]
    fn container_types_display() {
        assert_eq!(Type::Vector(Primitive::Int32).to_string(), "vector<int32>");
        assert_eq!(
            Type::Matrix(Primitive::Float64).to_string(),
            "matrix<float64>"
        );
        assert_eq!(Type::Range(Primitive::Int32).to_string(), "range<int32>");
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(
            Type::Vector(Primitive::Int32),
            Type::Vector(Primitive::Int32)
        );
        assert_ne!(
            Type::Vector(Primitive::Int32),
            Type::Vector(Primitive::Float64)
        );
        assert_ne!(
            Type::Vector(Primitive::Int32),
            Type::Matrix(Primitive::Int32)
        );
        assert_ne!(Type::INT32, Type::FLOAT64);
    }

    #[test]
    fn decapsulate_unwraps_containers() {
        assert_eq!(Type::Vector(Primitive::Int32).decapsulate(), Type::INT32);
        assert_eq!(Type::Range(Primitive::Int32).decapsulate(), Type::INT32);
        assert_eq!(
            Type::Matrix(Primitive::Float64).decapsulate(),
            Type::FLOAT64
        );
        assert_eq!(Type::STRING.decapsulate(), Type::STRING);
    }

    #[test]
    fn element_of_primitive_is_none() {
        assert!(Type::INT32.element().is_none());
        assert_eq!(Type::Vector(Primitive::Str).element(), Some(Primitive::Str));
    }
}
