mod ast;
mod builtins;
mod bytecode;
mod codegen;
mod dispatch;
mod display;
mod error;
mod lexer;
mod linker;
mod parser;
mod typechecker;
mod types;
mod value;
mod vm;

pub use self::{
    ast::*, builtins::*, bytecode::*, codegen::*, dispatch::*, display::*, error::*, lexer::*,
    linker::*, parser::*, typechecker::*, types::*, value::*, vm::*,
};
