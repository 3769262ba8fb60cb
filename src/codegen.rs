//! Typed-tree-to-instruction compiler.
//!
//! Every node compiles to a self-contained section of instructions; parents
//! concatenate their children's sections and splice in their own control
//! flow. All jumps are relative, so a section is position-independent and
//! loop back-patching can work in section-local coordinates: `break` and
//! `continue` are emitted as placeholder jumps and rewritten by the nearest
//! enclosing loop once its body length is known.

use crate::ast::{Ast, ControlKind, Literal, Node, NodeId};
use crate::builtins::Builtin;
use crate::bytecode::{Instruction, Marker, Placeholder};
use crate::dispatch::AssignOp;
use crate::error::CompileError;

pub struct Compiler<'a> {
    ast: &'a Ast,
}

/// Compiles the tree rooted at `root` into one flat instruction sequence.
pub fn compile(ast: &Ast, root: NodeId) -> Result<Vec<Instruction>, CompileError> {
    Compiler::new(ast).compile(root)
}

impl<'a> Compiler<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self { ast }
    }

    pub fn compile(&self, root: NodeId) -> Result<Vec<Instruction>, CompileError> {
        self.emit(root)
    }

    fn emit(&self, id: NodeId) -> Result<Vec<Instruction>, CompileError> {
        let code = match self.ast.node(id) {
            Node::Literal { value, .. } => vec![Instruction::Push(value.clone())],
            Node::Identifier { name, .. } => vec![Instruction::LoadName(name.clone())],
            Node::Vector { elements, .. } => {
                let mut code = vec![Instruction::MakeList];
                for element in elements {
                    code.extend(self.emit(*element)?);
                    code.push(Instruction::Append(-2));
                }
                code
            }
            Node::Matrix { rows, .. } => {
                let mut code = vec![Instruction::MakeList];
                for row in rows {
                    code.extend(self.emit(*row)?);
                    code.push(Instruction::Append(-2));
                }
                code
            }
            Node::Unary {
                operator, operand, ..
            } => {
                let mut code = self.emit(*operand)?;
                code.push(Instruction::Unary(*operator));
                code
            }
            Node::Binary {
                operator,
                left,
                right,
                ..
            } => {
                let mut code = self.emit(*left)?;
                code.extend(self.emit(*right)?);
                code.push(Instruction::Binary(*operator));
                code
            }
            Node::Range { start, end, .. } => {
                let mut code = self.emit(*start)?;
                code.extend(self.emit(*end)?);
                code.push(Instruction::MakeRange);
                code
            }
            Node::Subscription {
                source, indices, ..
            } => {
                let mut code = self.emit(*source)?;
                for index in indices {
                    code.extend(self.emit(*index)?);
                }
                code.push(Instruction::SubscriptRead(indices.len()));
                code
            }
            Node::Call {
                callee, arguments, ..
            } => {
                let mut code = Vec::new();
                for argument in arguments {
                    code.extend(self.emit(*argument)?);
                }
                match Builtin::lookup(callee) {
                    Some(builtin) => {
                        code.push(Instruction::CallBuiltin(builtin, arguments.len()));
                    }
                    None => {
                        code.push(Instruction::Push(Literal::Str(callee.clone())));
                        code.push(Instruction::Call(arguments.len()));
                    }
                }
                code
            }
            Node::Assignment {
                operator,
                target,
                value,
                line,
            } => self.emit_assignment(*operator, *target, *value, *line)?,
            Node::If {
                condition,
                body,
                else_body,
                ..
            } => {
                let mut code = self.emit(*condition)?;
                let true_section = self.emit_statement(*body)?;
                let else_section = match else_body {
                    Some(else_body) => self.emit_statement(*else_body)?,
                    None => Vec::new(),
                };
                code.push(Instruction::JumpIfFalse(true_section.len() as i32 + 1));
                code.extend(true_section);
                // TODO: the true branch falls straight through into the
                // else branch; an unconditional jump over the else section
                // is missing here.
                code.extend(else_section);
                code
            }
            Node::While {
                condition, body, ..
            } => {
                let condition = self.emit(*condition)?;
                let body = self.emit_statement(*body)?;
                let condition_length = condition.len() as i32;
                let body = patch_loop(body, -(condition_length + 1));
                let body_length = body.len() as i32;

                let mut code = vec![Instruction::PushMarker(Marker::BeginLoop)];
                code.extend(condition);
                code.push(Instruction::JumpIfFalse(body_length + 2));
                code.extend(body);
                code.push(Instruction::Jump(-(condition_length + body_length + 1)));
                code.push(Instruction::PushMarker(Marker::EndLoop));
                code.push(Instruction::ClearLoop);
                code
            }
            Node::For {
                iterator,
                range,
                body,
                ..
            } => {
                let Node::Identifier { name, .. } = self.ast.node(*iterator) else {
                    return Err(CompileError::InvalidAssignmentTarget {
                        line: self.ast.node(id).line(),
                    });
                };
                let range = self.emit(*range)?;
                let body = patch_loop(self.emit_statement(*body)?, -2);
                let body_length = body.len() as i32;

                let mut code = vec![Instruction::PushMarker(Marker::BeginLoop)];
                code.extend(range);
                code.push(Instruction::IterNext {
                    iter: -1,
                    exit: body_length + 3,
                });
                code.push(Instruction::StoreName(name.clone()));
                code.extend(body);
                code.push(Instruction::Jump(-(body_length + 2)));
                code.push(Instruction::PushMarker(Marker::EndLoop));
                code.push(Instruction::ClearLoop);
                code
            }
            // Definitions compile to nothing: bodies would only ever run
            // through the unimplemented call instruction.
            Node::Function { .. } => Vec::new(),
            Node::Return { value, .. } => match value {
                None => vec![Instruction::Return],
                Some(value) => {
                    let mut code = self.emit(*value)?;
                    code.push(Instruction::PushMarker(Marker::Return));
                    code.push(Instruction::Return);
                    code
                }
            },
            Node::Control { kind, .. } => {
                let placeholder = match kind {
                    ControlKind::Break => Placeholder::Break,
                    ControlKind::Continue => Placeholder::Continue,
                };
                vec![Instruction::JumpPlaceholder(placeholder)]
            }
            Node::Print { arguments, .. } => {
                let mut code = Vec::new();
                for argument in arguments {
                    code.extend(self.emit(*argument)?);
                }
                code.push(Instruction::Print(arguments.len()));
                code
            }
            Node::Block { actions, .. } => {
                let mut code = Vec::new();
                for action in actions {
                    code.extend(self.emit_statement(*action)?);
                }
                code
            }
            Node::Program { body, .. } => self.emit(*body)?,
        };
        Ok(code)
    }

    /// Emits a node in statement position: an expression used as a
    /// statement has its value discarded.
    fn emit_statement(&self, id: NodeId) -> Result<Vec<Instruction>, CompileError> {
        let mut code = self.emit(id)?;
        if self.produces_value(id) {
            code.push(Instruction::Pop);
        }
        Ok(code)
    }

    fn produces_value(&self, id: NodeId) -> bool {
        matches!(
            self.ast.node(id),
            Node::Literal { .. }
                | Node::Identifier { .. }
                | Node::Vector { .. }
                | Node::Matrix { .. }
                | Node::Unary { .. }
                | Node::Binary { .. }
                | Node::Range { .. }
                | Node::Subscription { .. }
                | Node::Call { .. }
        )
    }

    fn emit_assignment(
        &self,
        operator: AssignOp,
        target: NodeId,
        value: NodeId,
        line: u32,
    ) -> Result<Vec<Instruction>, CompileError> {
        match self.ast.node(target) {
            Node::Identifier { name, .. } => {
                let mut code = Vec::new();
                if let Some(binary) = operator.underlying() {
                    code.push(Instruction::LoadName(name.clone()));
                    code.extend(self.emit(value)?);
                    code.push(Instruction::Binary(binary));
                } else {
                    code.extend(self.emit(value)?);
                }
                code.push(Instruction::StoreName(name.clone()));
                Ok(code)
            }
            Node::Subscription {
                source, indices, ..
            } => match operator.underlying() {
                None => {
                    let mut code = self.emit(*source)?;
                    for index in indices {
                        code.extend(self.emit(*index)?);
                    }
                    code.extend(self.emit(value)?);
                    code.push(Instruction::SubscriptWrite(indices.len()));
                    Ok(code)
                }
                Some(binary) => {
                    // Each index expression is evaluated exactly once into a
                    // frame temporary, then the element is read, combined,
                    // and written back through the same temporaries.
                    let mut code = self.emit(*source)?;
                    code.push(Instruction::StoreName("__source".to_string()));
                    for (position, index) in indices.iter().enumerate() {
                        code.extend(self.emit(*index)?);
                        code.push(Instruction::StoreName(format!("__index_{}", position)));
                    }
                    code.push(Instruction::LoadName("__source".to_string()));
                    for position in 0..indices.len() {
                        code.push(Instruction::LoadName(format!("__index_{}", position)));
                    }
                    code.push(Instruction::SubscriptRead(indices.len()));
                    code.extend(self.emit(value)?);
                    code.push(Instruction::Binary(binary));
                    code.push(Instruction::StoreName("__element".to_string()));
                    code.push(Instruction::LoadName("__source".to_string()));
                    for position in 0..indices.len() {
                        code.push(Instruction::LoadName(format!("__index_{}", position)));
                    }
                    code.push(Instruction::LoadName("__element".to_string()));
                    code.push(Instruction::SubscriptWrite(indices.len()));
                    Ok(code)
                }
            },
            _ => Err(CompileError::InvalidAssignmentTarget { line }),
        }
    }
}

/// Rewrites loop-control placeholders in a loop body to concrete offsets.
/// `break` targets the loop's exit sequence, one instruction past the back
/// jump; `continue` targets `continue_anchor` relative to the body start
/// (the condition for `while`, the iterator step for `for`).
fn patch_loop(body: Vec<Instruction>, continue_anchor: i32) -> Vec<Instruction> {
    let length = body.len() as i32;
    body.into_iter()
        .enumerate()
        .map(|(position, instruction)| {
            let position = position as i32;
            match instruction {
                Instruction::JumpPlaceholder(Placeholder::Break) => {
                    Instruction::Jump(length + 1 - position)
                }
                Instruction::JumpPlaceholder(Placeholder::Continue) => {
                    Instruction::Jump(continue_anchor - position)
                }
                other => other,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::dispatch::BinaryOp;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn compile_source(input: &str) -> Vec<Instruction> {
        let tokens = tokenize(input).expect("tokenize");
        let (ast, root) = parse(&tokens).expect("parse");
        compile(&ast, root).expect("compile")
    }

    #[test]
    fn assignment_and_expression() {
        let code = compile_source("a = 1 + 2;");
        assert_eq!(
            code,
            vec![
                Instruction::Push(Literal::Int(1)),
                Instruction::Push(Literal::Int(2)),
                Instruction::Binary(BinaryOp::Add),
                Instruction::StoreName("a".to_string()),
            ]
        );
    }

    #[test]
    fn compound_assignment_desugars() {
        let code = compile_source("a += 2;");
        assert_eq!(
            code,
            vec![
                Instruction::LoadName("a".to_string()),
                Instruction::Push(Literal::Int(2)),
                Instruction::Binary(BinaryOp::Add),
                Instruction::StoreName("a".to_string()),
            ]
        );
    }

    #[test]
    fn vector_literal_builds_with_appends() {
        let code = compile_source("v = [1, 2];");
        assert_eq!(
            code,
            vec![
                Instruction::MakeList,
                Instruction::Push(Literal::Int(1)),
                Instruction::Append(-2),
                Instruction::Push(Literal::Int(2)),
                Instruction::Append(-2),
                Instruction::StoreName("v".to_string()),
            ]
        );
    }

    #[test]
    fn while_loop_layout() {
        let code = compile_source("while a < 5 { a += 1; }");
        assert_eq!(
            code,
            vec![
                Instruction::PushMarker(Marker::BeginLoop),
                Instruction::LoadName("a".to_string()),
                Instruction::Push(Literal::Int(5)),
                Instruction::Binary(BinaryOp::Less),
                Instruction::JumpIfFalse(6),
                Instruction::LoadName("a".to_string()),
                Instruction::Push(Literal::Int(1)),
                Instruction::Binary(BinaryOp::Add),
                Instruction::StoreName("a".to_string()),
                Instruction::Jump(-8),
                Instruction::PushMarker(Marker::EndLoop),
                Instruction::ClearLoop,
            ]
        );
    }

    #[test]
    fn break_and_continue_are_patched() {
        let code = compile_source("while true { break; continue; }");
        assert!(!code
            .iter()
            .any(|instruction| matches!(instruction, Instruction::JumpPlaceholder(_))));
        assert_eq!(
            code,
            vec![
                Instruction::PushMarker(Marker::BeginLoop),
                Instruction::Push(Literal::Bool(true)),
                Instruction::JumpIfFalse(4),
                // break: forward to the exit sequence
                Instruction::Jump(3),
                // continue: back to the condition
                Instruction::Jump(-3),
                Instruction::Jump(-4),
                Instruction::PushMarker(Marker::EndLoop),
                Instruction::ClearLoop,
            ]
        );
    }

    #[test]
    fn for_loop_layout() {
        let code = compile_source("for (i in 1:3) { print i; }");
        assert_eq!(
            code,
            vec![
                Instruction::PushMarker(Marker::BeginLoop),
                Instruction::Push(Literal::Int(1)),
                Instruction::Push(Literal::Int(3)),
                Instruction::MakeRange,
                Instruction::IterNext { iter: -1, exit: 5 },
                Instruction::StoreName("i".to_string()),
                Instruction::LoadName("i".to_string()),
                Instruction::Print(1),
                Instruction::Jump(-4),
                Instruction::PushMarker(Marker::EndLoop),
                Instruction::ClearLoop,
            ]
        );
    }

    #[test]
    fn conditional_has_no_jump_over_else() {
        // The true branch falls through into the else branch. This layout
        // is the documented baseline; see the regression test in the VM.
        let code = compile_source("if true { print 1; } else { print 2; }");
        assert_eq!(
            code,
            vec![
                Instruction::Push(Literal::Bool(true)),
                Instruction::JumpIfFalse(3),
                Instruction::Push(Literal::Int(1)),
                Instruction::Print(1),
                Instruction::Push(Literal::Int(2)),
                Instruction::Print(1),
            ]
        );
    }

    #[test]
    fn compound_subscripted_assignment_uses_temporaries() {
        let code = compile_source("v[i + 1] += 10;");
        assert_eq!(
            code,
            vec![
                Instruction::LoadName("v".to_string()),
                Instruction::StoreName("__source".to_string()),
                Instruction::LoadName("i".to_string()),
                Instruction::Push(Literal::Int(1)),
                Instruction::Binary(BinaryOp::Add),
                Instruction::StoreName("__index_0".to_string()),
                Instruction::LoadName("__source".to_string()),
                Instruction::LoadName("__index_0".to_string()),
                Instruction::SubscriptRead(1),
                Instruction::Push(Literal::Int(10)),
                Instruction::Binary(BinaryOp::Add),
                Instruction::StoreName("__element".to_string()),
                Instruction::LoadName("__source".to_string()),
                Instruction::LoadName("__index_0".to_string()),
                Instruction::LoadName("__element".to_string()),
                Instruction::SubscriptWrite(1),
            ]
        );
    }

    #[test]
    fn builtin_and_user_calls() {
        let code = compile_source("z = zeros(2, 3);\nw = f(1);");
        assert_eq!(
            code,
            vec![
                Instruction::Push(Literal::Int(2)),
                Instruction::Push(Literal::Int(3)),
                Instruction::CallBuiltin(Builtin::Zeros, 2),
                Instruction::StoreName("z".to_string()),
                Instruction::Push(Literal::Int(1)),
                Instruction::Push(Literal::Str("f".to_string())),
                Instruction::Call(1),
                Instruction::StoreName("w".to_string()),
            ]
        );
    }

    #[test]
    fn compilation_is_deterministic() {
        let input = "i = 0;\nwhile i < 5 { i += 1; if i == 3 { break; } }\nprint i;";
        let tokens = tokenize(input).expect("tokenize");
        let (ast, root) = parse(&tokens).expect("parse");
        let first = compile(&ast, root).expect("compile");
        let second = compile(&ast, root).expect("compile");
        assert_eq!(first, second);
    }
}
