//! Bottom-up, table-driven type inference.
//!
//! Walks the linked tree depth-first, resolving each node's type from its
//! children and the dispatch tables. Results land in a [`TypeInfo`] side
//! table; the tree itself is never mutated. A dispatch-table miss aborts
//! the whole pass. Unresolved identifiers and loop control outside a loop
//! are diagnosed leniently and typed `nothing`.

use crate::ast::{Ast, ControlKind, Node, NodeId};
use crate::builtins::Builtin;
use crate::dispatch::{binary_result, interval_result, unary_result, AssignOp, BinaryOp};
use crate::error::SemanticError;
use crate::linker::Linked;
use crate::types::{Primitive, Type};
use std::collections::HashMap;
use tracing::warn;

/// Per-node inference results.
#[derive(Debug, Clone, Default)]
pub struct TypeInfo {
    types: Vec<Option<Type>>,
    lengths: HashMap<NodeId, usize>,
    shapes: HashMap<NodeId, (usize, usize)>,
}

impl TypeInfo {
    pub fn ty(&self, id: NodeId) -> Option<Type> {
        self.types[id.index()]
    }

    /// Element count of a vector literal.
    pub fn length(&self, id: NodeId) -> Option<usize> {
        self.lengths.get(&id).copied()
    }

    /// `(row count, row length)` of a matrix literal.
    pub fn shape(&self, id: NodeId) -> Option<(usize, usize)> {
        self.shapes.get(&id).copied()
    }
}

pub struct TypeChecker<'a> {
    ast: &'a Ast,
    linked: &'a Linked,
    info: TypeInfo,
}

/// Runs inference over the tree rooted at `root`.
pub fn check(ast: &Ast, linked: &Linked, root: NodeId) -> Result<TypeInfo, SemanticError> {
    TypeChecker::new(ast, linked).check(root)
}

impl<'a> TypeChecker<'a> {
    pub fn new(ast: &'a Ast, linked: &'a Linked) -> Self {
        Self {
            ast,
            linked,
            info: TypeInfo {
                types: vec![None; ast.len()],
                lengths: HashMap::new(),
                shapes: HashMap::new(),
            },
        }
    }

    pub fn check(mut self, root: NodeId) -> Result<TypeInfo, SemanticError> {
        self.infer(root)?;
        Ok(self.info)
    }

    fn infer(&mut self, id: NodeId) -> Result<Type, SemanticError> {
        let ty = match self.ast.node(id) {
            Node::Literal { value, .. } => value.ty(),
            Node::Identifier { name, line } => {
                let resolved = self.resolve_identifier(id, name, *line);
                match resolved {
                    Some(ty) => ty,
                    None => {
                        warn!("line {}: unresolved identifier `{}`", line, name);
                        Type::NOTHING
                    }
                }
            }
            Node::Vector { elements, line } => self.infer_vector(id, elements.clone(), *line)?,
            Node::Matrix { rows, line } => self.infer_matrix(id, rows.clone(), *line)?,
            Node::Unary {
                operator,
                operand,
                line,
            } => {
                let (operator, line) = (*operator, *line);
                let operand = self.infer(*operand)?;
                unary_result(operator, operand).ok_or_else(|| SemanticError::DispatchMiss {
                    operator: operator.symbol().to_string(),
                    operands: operand.to_string(),
                    line,
                })?
            }
            Node::Binary {
                operator,
                left,
                right,
                line,
            } => {
                let (operator, line) = (*operator, *line);
                let left = self.infer(*left)?;
                let right = self.infer(*right)?;
                binary_result(operator, left, right).ok_or_else(|| {
                    SemanticError::DispatchMiss {
                        operator: operator.symbol().to_string(),
                        operands: format!("{}, {}", left, right),
                        line,
                    }
                })?
            }
            Node::Range { start, end, line } => {
                let line = *line;
                let start = self.infer(*start)?;
                let end = self.infer(*end)?;
                interval_result(start, end).ok_or_else(|| SemanticError::DispatchMiss {
                    operator: ":".to_string(),
                    operands: format!("{}, {}", start, end),
                    line,
                })?
            }
            Node::Subscription {
                source,
                indices,
                line,
            } => {
                let (indices, line) = (indices.clone(), *line);
                let source = self.infer(*source)?;
                for index in &indices {
                    let index_ty = self.infer(*index)?;
                    if index_ty != Type::INT32 {
                        return Err(SemanticError::DispatchMiss {
                            operator: "[]".to_string(),
                            operands: index_ty.to_string(),
                            line,
                        });
                    }
                }
                self.subscription_result(source, indices.len(), line)?
            }
            Node::Call {
                callee,
                arguments,
                line,
            } => {
                let (callee, arguments, line) = (callee.clone(), arguments.clone(), *line);
                let mut argument_types = Vec::with_capacity(arguments.len());
                for argument in &arguments {
                    argument_types.push(self.infer(*argument)?);
                }
                match Builtin::lookup(&callee) {
                    Some(builtin) => builtin.signature(&argument_types).ok_or_else(|| {
                        SemanticError::DispatchMiss {
                            operator: callee.clone(),
                            operands: argument_types
                                .iter()
                                .map(Type::to_string)
                                .collect::<Vec<_>>()
                                .join(", "),
                            line,
                        }
                    })?,
                    None => {
                        if self.resolve_identifier(id, &callee, line) != Some(Type::FUNCTION) {
                            warn!("line {}: call to unknown function `{}`", line, callee);
                        }
                        // User function results are untyped until calls are
                        // wired end to end.
                        Type::NOTHING
                    }
                }
            }
            Node::Assignment {
                operator,
                target,
                value,
                line,
            } => {
                let (operator, target, value, line) = (*operator, *target, *value, *line);
                self.infer_assignment(operator, target, value, line)?;
                Type::NOTHING
            }
            Node::If {
                condition,
                body,
                else_body,
                ..
            } => {
                let (condition, body, else_body) = (*condition, *body, *else_body);
                self.infer(condition)?;
                self.infer(body)?;
                if let Some(else_body) = else_body {
                    self.infer(else_body)?;
                }
                Type::NOTHING
            }
            Node::While {
                condition, body, ..
            } => {
                let (condition, body) = (*condition, *body);
                self.infer(condition)?;
                self.infer(body)?;
                Type::NOTHING
            }
            Node::For {
                iterator,
                range,
                body,
                line,
            } => {
                let (iterator, range, body, line) = (*iterator, *range, *body, *line);
                let range_ty = self.infer(range)?;
                if !matches!(range_ty, Type::Range(_)) {
                    return Err(SemanticError::NotIterable {
                        ty: range_ty.to_string(),
                        line,
                    });
                }
                self.info.types[iterator.index()] = Some(range_ty.decapsulate());
                self.infer(body)?;
                Type::NOTHING
            }
            // Function bodies are left untyped: they only run through the
            // call instruction, which the machine does not implement.
            Node::Function { .. } => Type::FUNCTION,
            Node::Return { value, .. } => {
                if let Some(value) = *value {
                    self.infer(value)?;
                }
                Type::NOTHING
            }
            Node::Control { kind, line } => {
                if !self.inside_loop(id) {
                    let keyword = match kind {
                        ControlKind::Break => "break",
                        ControlKind::Continue => "continue",
                    };
                    warn!("line {}: `{}` outside a loop", line, keyword);
                }
                Type::NOTHING
            }
            Node::Print { arguments, .. } => {
                for argument in arguments.clone() {
                    self.infer(argument)?;
                }
                Type::NOTHING
            }
            Node::Block { actions, .. } => {
                for action in actions.clone() {
                    self.infer(action)?;
                }
                Type::NOTHING
            }
            Node::Program { body, .. } => {
                self.infer(*body)?;
                Type::NOTHING
            }
        };
        self.info.types[id.index()] = Some(ty);
        Ok(ty)
    }

    fn infer_vector(
        &mut self,
        id: NodeId,
        elements: Vec<NodeId>,
        line: u32,
    ) -> Result<Type, SemanticError> {
        if elements.is_empty() {
            return Err(SemanticError::EmptyContainer { line });
        }
        let mut element_types = Vec::with_capacity(elements.len());
        for element in &elements {
            element_types.push(self.infer(*element)?);
        }
        let first = element_types[0];
        let Type::Primitive(element) = first else {
            return Err(SemanticError::InhomogeneousVector { line });
        };
        if element_types.iter().any(|ty| *ty != first) {
            return Err(SemanticError::InhomogeneousVector { line });
        }
        self.info.lengths.insert(id, elements.len());
        Ok(Type::Vector(element))
    }

    fn infer_matrix(
        &mut self,
        id: NodeId,
        rows: Vec<NodeId>,
        line: u32,
    ) -> Result<Type, SemanticError> {
        if rows.is_empty() {
            return Err(SemanticError::EmptyContainer { line });
        }
        let mut element: Option<Primitive> = None;
        let mut width: Option<usize> = None;
        for row in &rows {
            let row_ty = self.infer(*row)?;
            let Type::Vector(row_element) = row_ty else {
                return Err(SemanticError::MatrixElementMismatch { line });
            };
            if *element.get_or_insert(row_element) != row_element {
                return Err(SemanticError::MatrixElementMismatch { line });
            }
            let row_length = self.info.length(*row).unwrap_or(0);
            if *width.get_or_insert(row_length) != row_length {
                return Err(SemanticError::RaggedMatrix { line });
            }
        }
        self.info
            .shapes
            .insert(id, (rows.len(), width.unwrap_or(0)));
        Ok(Type::Matrix(element.unwrap_or(Primitive::Nothing)))
    }

    fn subscription_result(
        &self,
        source: Type,
        index_count: usize,
        line: u32,
    ) -> Result<Type, SemanticError> {
        match (source, index_count) {
            (Type::Vector(element) | Type::Range(element), 1) => Ok(Type::Primitive(element)),
            (Type::Matrix(element), 1) => Ok(Type::Vector(element)),
            (Type::Matrix(element), 2) => Ok(Type::Primitive(element)),
            _ => Err(SemanticError::NotIndexable {
                ty: source.to_string(),
                line,
            }),
        }
    }

    fn infer_assignment(
        &mut self,
        operator: AssignOp,
        target: NodeId,
        value: NodeId,
        line: u32,
    ) -> Result<(), SemanticError> {
        let value_ty = self.infer(value)?;
        match self.ast.node(target) {
            Node::Identifier { name, .. } => {
                let name = name.clone();
                let ty = match operator.underlying() {
                    None => value_ty,
                    Some(binary) => {
                        let current = self.resolve_identifier(target, &name, line).unwrap_or_else(
                            || {
                                warn!("line {}: unresolved identifier `{}`", line, name);
                                Type::NOTHING
                            },
                        );
                        self.compound_result(binary, current, value_ty, line)?
                    }
                };
                self.info.types[target.index()] = Some(ty);
            }
            Node::Subscription { .. } => {
                let element_ty = self.infer(target)?;
                if let Some(binary) = operator.underlying() {
                    self.compound_result(binary, element_ty, value_ty, line)?;
                }
            }
            // The parser admits only the two shapes above.
            _ => {}
        }
        Ok(())
    }

    fn compound_result(
        &self,
        operator: BinaryOp,
        left: Type,
        right: Type,
        line: u32,
    ) -> Result<Type, SemanticError> {
        binary_result(operator, left, right).ok_or_else(|| SemanticError::DispatchMiss {
            operator: operator.symbol().to_string(),
            operands: format!("{}, {}", left, right),
            line,
        })
    }

    /// Scans the scope chain for the most recent binding of `name` at or
    /// before `line` whose type has already resolved. A binding without a
    /// resolved type (the assignment being checked, or an abandoned one)
    /// falls through to the next most recent.
    fn resolve_identifier(&self, id: NodeId, name: &str, line: u32) -> Option<Type> {
        let owner = self.linked.owner(id)?;
        for scope_id in self.linked.chain(owner) {
            let scope = self.linked.scope(scope_id);
            let mut candidates: Vec<_> = scope
                .symbols
                .iter()
                .filter(|symbol| symbol.name == name && symbol.line <= line)
                .collect();
            candidates.sort_by_key(|symbol| std::cmp::Reverse(symbol.line));
            for candidate in candidates {
                if let Some(ty) = self.info.types[candidate.node.index()] {
                    return Some(ty);
                }
            }
        }
        None
    }

    fn inside_loop(&self, id: NodeId) -> bool {
        let mut current = self.linked.parent(id);
        while let Some(ancestor) = current {
            if matches!(
                self.ast.node(ancestor),
                Node::While { .. } | Node::For { .. }
            ) {
                return true;
            }
            current = self.linked.parent(ancestor);
        }
        false
    }
}
