//! Arena-allocated abstract syntax tree.
//!
//! Nodes live in a flat `Vec` inside [`Ast`] and refer to each other through
//! [`NodeId`] indices. Analysis passes attach their results to nodes through
//! side tables keyed by id, so the tree itself stays immutable after parsing.

use crate::dispatch::{AssignOp, BinaryOp, UnaryOp};
use crate::types::Type;
use std::ops::Index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Int(_) => Type::INT32,
            Literal::Float(_) => Type::FLOAT64,
            Literal::Bool(_) => Type::BOOLEAN,
            Literal::Str(_) => Type::STRING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal {
        value: Literal,
        line: u32,
    },
    Identifier {
        name: String,
        line: u32,
    },
    Vector {
        elements: Vec<NodeId>,
        line: u32,
    },
    Matrix {
        rows: Vec<NodeId>,
        line: u32,
    },
    Unary {
        operator: UnaryOp,
        operand: NodeId,
        line: u32,
    },
    Binary {
        operator: BinaryOp,
        left: NodeId,
        right: NodeId,
        line: u32,
    },
    Range {
        start: NodeId,
        end: NodeId,
        line: u32,
    },
    Subscription {
        source: NodeId,
        indices: Vec<NodeId>,
        line: u32,
    },
    Call {
        callee: String,
        arguments: Vec<NodeId>,
        line: u32,
    },
    Assignment {
        operator: AssignOp,
        target: NodeId,
        value: NodeId,
        line: u32,
    },
    If {
        condition: NodeId,
        body: NodeId,
        else_body: Option<NodeId>,
        line: u32,
    },
    While {
        condition: NodeId,
        body: NodeId,
        line: u32,
    },
    For {
        iterator: NodeId,
        range: NodeId,
        body: NodeId,
        line: u32,
    },
    Function {
        name: String,
        parameters: Vec<NodeId>,
        body: NodeId,
        line: u32,
    },
    Return {
        value: Option<NodeId>,
        line: u32,
    },
    Control {
        kind: ControlKind,
        line: u32,
    },
    Print {
        arguments: Vec<NodeId>,
        line: u32,
    },
    Block {
        actions: Vec<NodeId>,
        line: u32,
    },
    Program {
        body: NodeId,
        line: u32,
    },
}

impl Node {
    pub fn line(&self) -> u32 {
        match self {
            Node::Literal { line, .. }
            | Node::Identifier { line, .. }
            | Node::Vector { line, .. }
            | Node::Matrix { line, .. }
            | Node::Unary { line, .. }
            | Node::Binary { line, .. }
            | Node::Range { line, .. }
            | Node::Subscription { line, .. }
            | Node::Call { line, .. }
            | Node::Assignment { line, .. }
            | Node::If { line, .. }
            | Node::While { line, .. }
            | Node::For { line, .. }
            | Node::Function { line, .. }
            | Node::Return { line, .. }
            | Node::Control { line, .. }
            | Node::Print { line, .. }
            | Node::Block { line, .. }
            | Node::Program { line, .. } => *line,
        }
    }

    /// Child ids in source order, for generic tree walks.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Literal { .. } | Node::Identifier { .. } | Node::Control { .. } => Vec::new(),
            Node::Vector { elements, .. } => elements.clone(),
            Node::Matrix { rows, .. } => rows.clone(),
            Node::Unary { operand, .. } => vec![*operand],
            Node::Binary { left, right, .. } => vec![*left, *right],
            Node::Range { start, end, .. } => vec![*start, *end],
            Node::Subscription {
                source, indices, ..
            } => {
                let mut children = vec![*source];
                children.extend(indices);
                children
            }
            Node::Call { arguments, .. } => arguments.clone(),
            Node::Assignment { target, value, .. } => vec![*target, *value],
            Node::If {
                condition,
                body,
                else_body,
                ..
            } => {
                let mut children = vec![*condition, *body];
                children.extend(else_body);
                children
            }
            Node::While {
                condition, body, ..
            } => vec![*condition, *body],
            Node::For {
                iterator,
                range,
                body,
                ..
            } => vec![*iterator, *range, *body],
            Node::Function {
                parameters, body, ..
            } => {
                let mut children = parameters.clone();
                children.push(*body);
                children
            }
            Node::Return { value, .. } => value.iter().copied().collect(),
            Node::Print { arguments, .. } => arguments.clone(),
            Node::Block { actions, .. } => actions.clone(),
            Node::Program { body, .. } => vec![*body],
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        self.node(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_ids_are_stable() {
        let mut ast = Ast::new();
        let one = ast.push(Node::Literal {
            value: Literal::Int(1),
            line: 1,
        });
        let two = ast.push(Node::Literal {
            value: Literal::Int(2),
            line: 1,
        });
        let sum = ast.push(Node::Binary {
            operator: BinaryOp::Add,
            left: one,
            right: two,
            line: 1,
        });
        assert_eq!(ast.len(), 3);
        assert_eq!(ast[sum].children(), vec![one, two]);
        assert_eq!(
            ast[one],
            Node::Literal {
                value: Literal::Int(1),
                line: 1
            }
        );
    }

    #[test]
    fn literal_types() {
        assert_eq!(Literal::Int(0).ty(), Type::INT32);
        assert_eq!(Literal::Float(0.0).ty(), Type::FLOAT64);
        assert_eq!(Literal::Bool(true).ty(), Type::BOOLEAN);
        assert_eq!(Literal::Str(String::new()).ty(), Type::STRING);
    }
}
