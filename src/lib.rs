//! Tarn: a small dynamically-typed scripting language.
//!
//! # Execution Modes
//!
//! Tarn supports two execution engines over the same AST and object
//! model:
//! - **Bytecode VM** (default): compiles to a compact instruction stream
//!   executed on a stack machine
//! - **Tree-walk interpreter**: direct AST evaluation, kept as an
//!   independently testable reference engine

#![allow(clippy::new_without_default)]

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod repl;
pub mod span;

use error::{RuntimeError, TarnError};
use object::Object;

/// Execution mode for running Tarn programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Tree-walking interpreter
    TreeWalk,
    /// Bytecode virtual machine (default)
    #[default]
    Bytecode,
}

/// Run a Tarn program from source code using the default execution mode.
pub fn run(source: &str) -> Result<(), TarnError> {
    run_with_options(source, ExecutionMode::default(), false)
}

/// Run a Tarn program with full control over execution options.
pub fn run_with_options(
    source: &str,
    mode: ExecutionMode,
    disassemble: bool,
) -> Result<(), TarnError> {
    eval_with_options(source, mode, disassemble).map(|_| ())
}

/// Run a Tarn program from a file path.
pub fn run_file(
    path: &std::path::Path,
    mode: ExecutionMode,
    disassemble: bool,
) -> Result<(), TarnError> {
    let source = std::fs::read_to_string(path)?;
    run_with_options(&source, mode, disassemble)
}

/// Evaluate a Tarn program and return its final value.
pub fn eval(source: &str, mode: ExecutionMode) -> Result<Object, TarnError> {
    eval_with_options(source, mode, false)
}

fn eval_with_options(
    source: &str,
    mode: ExecutionMode,
    disassemble: bool,
) -> Result<Object, TarnError> {
    let program = parse(source)?;

    match mode {
        ExecutionMode::TreeWalk => {
            let mut interpreter = interpreter::Interpreter::new();
            match interpreter.interpret(&program) {
                Object::Error(message) => Err(RuntimeError::general(message).into()),
                value => Ok(value),
            }
        }
        ExecutionMode::Bytecode => {
            let mut compiler = bytecode::Compiler::new();
            let bytecode = compiler.compile(&program)?;

            if disassemble {
                bytecode::print_disassembly(&bytecode);
                println!("---");
            }

            let mut vm = bytecode::Vm::new(bytecode);
            vm.run()?;
            Ok(vm.last_popped())
        }
    }
}

/// Parse source code into an AST without executing.
pub fn parse(source: &str) -> Result<ast::Program, TarnError> {
    let tokens = lexer::Scanner::new(source).scan_tokens()?;
    let program = parser::Parser::new(tokens).parse()?;
    Ok(program)
}

/// Compile source code to bytecode without executing.
pub fn compile(source: &str) -> Result<bytecode::Bytecode, TarnError> {
    let program = parse(source)?;
    let mut compiler = bytecode::Compiler::new();
    Ok(compiler.compile(&program)?)
}

/// Disassemble compiled bytecode to a string.
pub fn disassemble(bytecode: &bytecode::Bytecode) -> String {
    bytecode::disassemble_bytecode(bytecode)
}
