//! Stack virtual machine.
//!
//! One frame per activation: an instruction sequence, a program counter, an
//! operand stack, and a flat binding table. Frames are stepped one
//! instruction at a time so the driving loop can retire a finished frame
//! and resume its caller without native-stack recursion. Only the bottom
//! frame is ever populated today: the call instruction is emitted by the
//! compiler but has no implementation here and fails loudly if reached.

use crate::bytecode::{Instruction, Marker};
use crate::error::RuntimeError;
use crate::value::{apply_binary, apply_unary, Value};
use std::collections::HashMap;
use std::io::{self, Write};
use tracing::trace;

#[derive(Debug)]
pub struct Frame {
    code: Vec<Instruction>,
    ip: usize,
    stack: Vec<Value>,
    bindings: HashMap<String, Value>,
}

/// Outcome of executing one instruction.
enum Step {
    Continue,
    Finished(Option<Value>),
}

impl Frame {
    pub fn new(code: Vec<Instruction>) -> Self {
        Self {
            code,
            ip: 0,
            stack: Vec::new(),
            bindings: HashMap::new(),
        }
    }

    fn step(&mut self, out: &mut dyn Write) -> Result<Step, RuntimeError> {
        if self.ip >= self.code.len() {
            // Fall-through: the frame ends without producing a value.
            return Ok(Step::Finished(None));
        }
        let index = self.ip;
        let instruction = self.code[index].clone();
        trace!("{:>4}  {}", index, instruction);
        self.ip += 1;

        match instruction {
            Instruction::Push(literal) => self.stack.push(literal.into()),
            Instruction::PushMarker(marker) => self.stack.push(Value::Marker(marker)),
            Instruction::Pop => {
                self.pop()?;
            }
            Instruction::Clone => {
                let top = self.peek(-1)?.clone();
                self.stack.push(top);
            }
            Instruction::Swap => {
                let length = self.stack.len();
                if length < 2 {
                    return Err(RuntimeError::StackUnderflow);
                }
                self.stack.swap(length - 1, length - 2);
            }
            Instruction::StoreName(name) => {
                let value = self.pop()?;
                self.bindings.insert(name, value);
            }
            Instruction::LoadName(name) => {
                let value = self
                    .bindings
                    .get(&name)
                    .cloned()
                    .ok_or(RuntimeError::UndefinedName { name })?;
                self.stack.push(value);
            }
            Instruction::Jump(offset) => self.jump(index, offset),
            Instruction::JumpIfFalse(offset) => match self.pop()? {
                Value::Bool(false) => self.jump(index, offset),
                Value::Bool(true) => {}
                value => {
                    return Err(RuntimeError::ConditionNotBoolean {
                        value: value.to_string(),
                    })
                }
            },
            Instruction::JumpPlaceholder(_) => return Err(RuntimeError::UnpatchedJump),
            Instruction::Return => {
                if matches!(self.stack.last(), Some(Value::Marker(Marker::Return))) {
                    self.pop()?;
                    let value = self.pop()?;
                    return Ok(Step::Finished(Some(value)));
                }
                return Ok(Step::Finished(None));
            }
            Instruction::ClearLoop => loop {
                if let Value::Marker(Marker::BeginLoop) = self.pop()? {
                    break;
                }
            },
            Instruction::MakeList => self.stack.push(Value::list(Vec::new())),
            Instruction::Append(offset) => {
                let target = self.offset_index(offset)?;
                let value = self.pop()?;
                match &self.stack[target] {
                    Value::List(elements) => elements.borrow_mut().push(value),
                    other => {
                        return Err(RuntimeError::NotIndexable {
                            value: other.to_string(),
                        })
                    }
                }
            }
            Instruction::Len(offset) => {
                let target = self.offset_index(offset)?;
                let length = match &self.stack[target] {
                    Value::List(elements) => elements.borrow().len(),
                    Value::Range { next, stop } => (stop - next).max(0) as usize,
                    Value::Str(value) => value.chars().count(),
                    other => {
                        return Err(RuntimeError::NotIndexable {
                            value: other.to_string(),
                        })
                    }
                };
                self.stack[target] = Value::Int(length as i32);
            }
            Instruction::MakeRange => {
                let end = self.pop()?;
                let start = self.pop()?;
                match (&start, &end) {
                    (Value::Int(start), Value::Int(end)) => self.stack.push(Value::Range {
                        next: *start,
                        stop: *end,
                    }),
                    _ => {
                        return Err(RuntimeError::OperatorTypeMismatch {
                            operator: ":".to_string(),
                            left: start.to_string(),
                            right: end.to_string(),
                        })
                    }
                }
            }
            Instruction::IterNext { iter, exit } => {
                let target = self.offset_index(iter)?;
                let advanced = match &mut self.stack[target] {
                    Value::Range { next, stop } => {
                        if next < stop {
                            let value = *next;
                            *next += 1;
                            Some(value)
                        } else {
                            None
                        }
                    }
                    other => {
                        return Err(RuntimeError::NotIterable {
                            value: other.to_string(),
                        })
                    }
                };
                match advanced {
                    Some(value) => self.stack.push(Value::Int(value)),
                    None => self.jump(index, exit),
                }
            }
            Instruction::SubscriptRead(count) => {
                let indices = self.pop_many(count)?;
                let mut value = self.pop()?;
                for index in &indices {
                    value = index_value(&value, index)?;
                }
                self.stack.push(value);
            }
            Instruction::SubscriptWrite(count) => {
                let value = self.pop()?;
                let indices = self.pop_many(count)?;
                let mut container = self.pop()?;
                for index in &indices[..count - 1] {
                    container = index_value(&container, index)?;
                }
                write_element(&container, &indices[count - 1], value)?;
            }
            Instruction::Call(_) => {
                let callee = self.pop()?;
                return Err(RuntimeError::CallUnsupported {
                    callee: callee.to_string(),
                });
            }
            Instruction::CallBuiltin(builtin, count) => {
                let arguments = self.pop_arguments(count)?;
                let result = builtin.call(&arguments)?;
                self.stack.push(result);
            }
            Instruction::Print(count) => {
                let values = self.pop_arguments(count)?;
                for value in values {
                    writeln!(out, "{}", value)?;
                }
            }
            Instruction::PrintStack => {
                writeln!(out, "{:?}", self.stack)?;
            }
            Instruction::Binary(operator) => {
                let right = self.pop()?;
                let left = self.pop()?;
                let result = apply_binary(operator, left, right)?;
                self.stack.push(result);
            }
            Instruction::Unary(operator) => {
                let operand = self.pop()?;
                let result = apply_unary(operator, operand)?;
                self.stack.push(result);
            }
        }
        Ok(Step::Continue)
    }

    fn jump(&mut self, index: usize, offset: i32) {
        self.ip = (index as i64 + offset as i64) as usize;
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Pops `count` values, most recently pushed first.
    fn pop_many(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.pop()?);
        }
        Ok(values)
    }

    /// Pops `count` values and restores their push order.
    fn pop_arguments(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        let mut values = self.pop_many(count)?;
        values.reverse();
        Ok(values)
    }

    fn peek(&self, offset: i32) -> Result<&Value, RuntimeError> {
        let index = self.offset_index(offset)?;
        Ok(&self.stack[index])
    }

    fn offset_index(&self, offset: i32) -> Result<usize, RuntimeError> {
        let index = self.stack.len() as i64 + offset as i64;
        if index < 0 || index >= self.stack.len() as i64 {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(index as usize)
    }
}

/// 1-based element read.
fn index_value(container: &Value, index: &Value) -> Result<Value, RuntimeError> {
    let position = match index {
        Value::Int(position) => *position,
        other => {
            return Err(RuntimeError::NotIndexable {
                value: other.to_string(),
            })
        }
    };
    match container {
        Value::List(elements) => {
            let elements = elements.borrow();
            if position < 1 || position as usize > elements.len() {
                return Err(RuntimeError::IndexOutOfBounds {
                    index: position,
                    length: elements.len(),
                });
            }
            Ok(elements[position as usize - 1].clone())
        }
        Value::Range { next, stop } => {
            let length = (stop - next).max(0);
            if position < 1 || position > length {
                return Err(RuntimeError::IndexOutOfBounds {
                    index: position,
                    length: length as usize,
                });
            }
            Ok(Value::Int(next + position - 1))
        }
        other => Err(RuntimeError::NotIndexable {
            value: other.to_string(),
        }),
    }
}

/// 1-based element write; mutates the shared list in place.
fn write_element(container: &Value, index: &Value, value: Value) -> Result<(), RuntimeError> {
    let position = match index {
        Value::Int(position) => *position,
        other => {
            return Err(RuntimeError::NotIndexable {
                value: other.to_string(),
            })
        }
    };
    match container {
        Value::List(elements) => {
            let mut elements = elements.borrow_mut();
            if position < 1 || position as usize > elements.len() {
                return Err(RuntimeError::IndexOutOfBounds {
                    index: position,
                    length: elements.len(),
                });
            }
            elements[position as usize - 1] = value;
            Ok(())
        }
        other => Err(RuntimeError::NotIndexable {
            value: other.to_string(),
        }),
    }
}

pub struct VirtualMachine<W> {
    call_stack: Vec<Frame>,
    out: W,
}

impl VirtualMachine<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for VirtualMachine<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> VirtualMachine<W> {
    pub fn with_output(out: W) -> Self {
        Self {
            call_stack: Vec::new(),
            out,
        }
    }

    /// Queues a compiled unit as the bottom frame of the next run.
    pub fn load(&mut self, code: Vec<Instruction>) {
        self.call_stack.push(Frame::new(code));
    }

    /// Drives the call stack to completion. A finished frame's value, if
    /// any, lands on its caller's stack; the last frame's value is the
    /// program result. Any error unwinds the whole call stack.
    pub fn run(&mut self) -> Result<Option<Value>, RuntimeError> {
        let Self { call_stack, out } = self;
        let mut result = None;
        while let Some(frame) = call_stack.last_mut() {
            match frame.step(&mut *out) {
                Ok(Step::Continue) => {}
                Ok(Step::Finished(value)) => {
                    call_stack.pop();
                    match call_stack.last_mut() {
                        Some(caller) => {
                            if let Some(value) = value {
                                caller.stack.push(value);
                            }
                        }
                        None => result = value,
                    }
                }
                Err(error) => {
                    call_stack.clear();
                    return Err(error);
                }
            }
        }
        Ok(result)
    }

    pub fn into_output(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::codegen::compile;
    use crate::lexer::tokenize;
    use crate::linker::link;
    use crate::parser::parse;
    use crate::typechecker::check;

    fn run_vm_test(input: &str) -> (Option<Value>, String) {
        match try_run(input) {
            Ok(outcome) => outcome,
            Err(error) => panic!("program failed: {}", error),
        }
    }

    fn try_run(input: &str) -> Result<(Option<Value>, String), RuntimeError> {
        let tokens = tokenize(input).expect("tokenize");
        let (ast, root) = parse(&tokens).expect("parse");
        let linked = link(&ast, root);
        check(&ast, &linked, root).expect("typecheck");
        let code = compile(&ast, root).expect("compile");
        let mut vm = VirtualMachine::with_output(Vec::new());
        vm.load(code);
        let result = vm.run()?;
        let output = String::from_utf8(vm.into_output()).expect("utf8 output");
        Ok((result, output))
    }

    fn run_code(code: Vec<Instruction>) -> (Option<Value>, String) {
        let mut vm = VirtualMachine::with_output(Vec::new());
        vm.load(code);
        let result = vm.run().expect("run");
        let output = String::from_utf8(vm.into_output()).expect("utf8 output");
        (result, output)
    }

    #[test]
    fn prints_a_sum() {
        let (_, output) = run_vm_test("a = 2;\nb = 3;\nprint a + b;");
        assert_eq!(output, "5\n");
    }

    #[test]
    fn subscription_is_one_based() {
        let (_, output) = run_vm_test("v = [1, 2, 3];\nprint v[2];");
        assert_eq!(output, "2\n");
    }

    #[test]
    fn while_loop_with_break() {
        let input = "i = 0;\nwhile i < 5 {\n    i += 1;\n    if i == 3 {\n        break;\n    }\n}\nprint i;";
        let (result, output) = run_vm_test(input);
        assert_eq!(output, "3\n");
        // Loop markers are swept on exit; nothing is left behind.
        assert_eq!(result, None);
    }

    #[test]
    fn conditional_fall_through_regression() {
        // Baseline for the known codegen gap: the true branch falls through
        // into the else branch, so both print. A corrected compiler would
        // print only `1`.
        let (_, output) = run_vm_test("if true {\n    print 1;\n} else {\n    print 2;\n}");
        assert_eq!(output, "1\n2\n");
    }

    #[test]
    fn bindings_are_flat_at_runtime() {
        // Lexical scoping affects only compile-time resolution; the frame
        // has a single binding table, so the inner store hits the same slot.
        let (_, output) = run_vm_test("a = 1;\nif true {\n    a = 2;\n}\nprint a;");
        assert_eq!(output, "2\n");
    }

    #[test]
    fn for_loop_over_half_open_range() {
        let (result, output) = run_vm_test("s = 0;\nfor (i in 1:4) {\n    s += i;\n}\nprint s;");
        assert_eq!(output, "6\n");
        assert_eq!(result, None);
    }

    #[test]
    fn empty_range_never_enters_the_body() {
        let (_, output) = run_vm_test("c = 0;\nfor (i in 3:3) {\n    c += 1;\n}\nprint c;");
        assert_eq!(output, "0\n");
    }

    #[test]
    fn continue_skips_to_the_next_element() {
        let input =
            "s = 0;\nfor (i in 1:6) {\n    if i % 2 == 0 {\n        continue;\n    }\n    s += i;\n}\nprint s;";
        let (_, output) = run_vm_test(input);
        assert_eq!(output, "9\n");
    }

    #[test]
    fn subscript_write_mutates_in_place() {
        let (_, output) = run_vm_test("v = [1, 2, 3];\nv[2] = 9;\nprint v;");
        assert_eq!(output, "[1, 9, 3]\n");
    }

    #[test]
    fn compound_subscripted_assignment() {
        let (_, output) = run_vm_test("v = [1, 2, 3];\nv[2] += 10;\nprint v[2];");
        assert_eq!(output, "12\n");
    }

    #[test]
    fn matrix_subscription_applies_innermost_index_first() {
        let (_, output) = run_vm_test("m = [[1, 2], [3, 4]];\nprint m[1, 2];");
        assert_eq!(output, "3\n");
    }

    #[test]
    fn builtins_run_natively() {
        let (_, output) = run_vm_test("print eye(2);\nprint ones(3);");
        assert_eq!(output, "[[1, 0], [0, 1]]\n[1, 1, 1]\n");
    }

    #[test]
    fn broadcast_operators_end_to_end() {
        let (_, output) = run_vm_test("v = [1, 2, 3];\nprint v .* 2;\nprint v .+ v;");
        assert_eq!(output, "[2, 4, 6]\n[2, 4, 6]\n");
    }

    #[test]
    fn explicit_return_is_the_program_result() {
        let (result, _) = run_vm_test("a = 2;\nreturn a * 21;");
        assert_eq!(result, Some(Value::Int(42)));
    }

    #[test]
    fn user_function_calls_fail_loudly() {
        let input = "function f(a) {\n    return a;\n}\nx = f(1);";
        let error = try_run(input).expect_err("call must fail");
        assert!(matches!(
            error,
            RuntimeError::CallUnsupported { callee } if callee == "f"
        ));
    }

    #[test]
    fn undefined_name_is_fatal() {
        let error = try_run("print mystery;").expect_err("load must fail");
        assert!(matches!(error, RuntimeError::UndefinedName { .. }));
    }

    #[test]
    fn division_by_zero_is_fatal() {
        let error = try_run("x = 1 / 0;").expect_err("division must fail");
        assert!(matches!(error, RuntimeError::DivisionByZero));
    }

    #[test]
    fn control_outside_a_loop_reaches_an_unpatched_jump() {
        let error = try_run("break;").expect_err("stray break must fail");
        assert!(matches!(error, RuntimeError::UnpatchedJump));
    }

    #[test]
    fn index_out_of_bounds() {
        let error = try_run("v = [1, 2];\nprint v[3];").expect_err("index must fail");
        assert!(matches!(
            error,
            RuntimeError::IndexOutOfBounds {
                index: 3,
                length: 2
            }
        ));
    }

    #[test]
    fn non_boolean_condition_is_fatal() {
        let error = try_run("while 1 {\n    x = 0;\n}").expect_err("condition must fail");
        assert!(matches!(error, RuntimeError::ConditionNotBoolean { .. }));
    }

    #[test]
    fn stack_manipulation_instructions() {
        let (_, output) = run_code(vec![
            Instruction::Push(Literal::Int(1)),
            Instruction::Push(Literal::Int(2)),
            Instruction::Swap,
            Instruction::Print(2),
        ]);
        assert_eq!(output, "2\n1\n");

        let (_, output) = run_code(vec![
            Instruction::Push(Literal::Int(7)),
            Instruction::Clone,
            Instruction::Binary(crate::dispatch::BinaryOp::Add),
            Instruction::Print(1),
        ]);
        assert_eq!(output, "14\n");
    }

    #[test]
    fn len_replaces_a_container_with_its_length() {
        let (_, output) = run_code(vec![
            Instruction::MakeList,
            Instruction::Push(Literal::Int(4)),
            Instruction::Append(-2),
            Instruction::Push(Literal::Int(5)),
            Instruction::Append(-2),
            Instruction::Len(-1),
            Instruction::Print(1),
        ]);
        assert_eq!(output, "2\n");
    }
}
