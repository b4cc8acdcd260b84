//! Bytecode compiler: transforms AST into instruction streams.

use std::rc::Rc;

use crate::ast::{Expr, ExprKind, InfixOp, PrefixOp, Program, Stmt, StmtKind};
use crate::bytecode::instruction::{make, OpCode};
use crate::bytecode::symbol_table::{Symbol, SymbolScope, SymbolTable};
use crate::error::CompileError;
use crate::object::{CompiledFunction, Object};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Placeholder operand for jumps patched after their target is known.
const PLACEHOLDER: usize = 9999;

/// Compiler output: the main instruction stream plus the constant pool.
/// Immutable once produced; the VM takes it as-is.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Vec<u8>,
    pub constants: Vec<Object>,
}

/// The last instruction emitted into a scope, remembered for peephole
/// patching (stripping a trailing `Pop`, rewriting it to `ReturnValue`).
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: OpCode,
    position: usize,
}

/// Per-function emission buffer. Exactly one "main" scope exists for
/// top-level code; one more is pushed per function literal being
/// compiled.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

/// The bytecode compiler.
pub struct Compiler {
    /// Shared constant pool, append-only.
    constants: Vec<Object>,
    /// Scope-frame stack mirroring function nesting.
    symbols: SymbolTable,
    /// Emission buffers; the innermost is the compile target.
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    /// A fresh compiler with the builtin registry pre-defined.
    pub fn new() -> Self {
        Self::with_state(SymbolTable::with_builtins(), Vec::new())
    }

    /// A compiler resuming from previous session state. This is how a
    /// REPL keeps definitions and constants across inputs.
    pub fn with_state(symbols: SymbolTable, constants: Vec<Object>) -> Self {
        Self {
            constants,
            symbols,
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Recover the session state for the next compilation.
    pub fn into_state(self) -> (SymbolTable, Vec<Object>) {
        (self.symbols, self.constants)
    }

    /// Compile a program into bytecode. On error the partial output must
    /// be discarded; compilation is not salvageable.
    pub fn compile(&mut self, program: &Program) -> CompileResult<Bytecode> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }

        Ok(Bytecode {
            instructions: self.scopes[0].instructions.clone(),
            constants: self.constants.clone(),
        })
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(OpCode::Pop, &[])?;
            }

            StmtKind::Let { name, value } => {
                self.compile_expression(value)?;
                let symbol = self.symbols.define(name);
                self.emit_store(&symbol)?;
            }

            StmtKind::Return(value) => {
                self.compile_expression(value)?;
                self.emit(OpCode::ReturnValue, &[])?;
            }

            StmtKind::Block(statements) => {
                self.compile_block(statements)?;
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, statements: &[Stmt]) -> CompileResult<()> {
        for stmt in statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::IntLiteral(n) => {
                let index = self.add_constant(Object::Integer(*n))?;
                self.emit(OpCode::Constant, &[index])?;
            }

            ExprKind::StringLiteral(s) => {
                let index = self.add_constant(Object::string(s.clone()))?;
                self.emit(OpCode::Constant, &[index])?;
            }

            ExprKind::BoolLiteral(true) => {
                self.emit(OpCode::True, &[])?;
            }
            ExprKind::BoolLiteral(false) => {
                self.emit(OpCode::False, &[])?;
            }

            ExprKind::Identifier(name) => {
                let symbol = self
                    .symbols
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone(), expr.span))?;
                self.load_symbol(&symbol)?;
            }

            ExprKind::Prefix { operator, operand } => {
                self.compile_expression(operand)?;
                match operator {
                    PrefixOp::Not => self.emit(OpCode::Bang, &[])?,
                    PrefixOp::Negate => self.emit(OpCode::Minus, &[])?,
                };
            }

            ExprKind::Infix {
                left,
                operator,
                right,
            } => {
                // `<` has no opcode of its own: emit the operands
                // mirrored and compare with GreaterThan.
                if *operator == InfixOp::Less {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(OpCode::GreaterThan, &[])?;
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;
                match operator {
                    InfixOp::Add => self.emit(OpCode::Add, &[])?,
                    InfixOp::Subtract => self.emit(OpCode::Sub, &[])?,
                    InfixOp::Multiply => self.emit(OpCode::Mul, &[])?,
                    InfixOp::Divide => self.emit(OpCode::Div, &[])?,
                    InfixOp::Greater => self.emit(OpCode::GreaterThan, &[])?,
                    InfixOp::Equal => self.emit(OpCode::Equal, &[])?,
                    InfixOp::NotEqual => self.emit(OpCode::NotEqual, &[])?,
                    InfixOp::Less => unreachable!("rewritten above"),
                };
            }

            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_if(condition, consequence, alternative.as_deref())?;
            }

            ExprKind::Function {
                name,
                parameters,
                body,
            } => {
                self.compile_function(name.as_deref(), parameters, body)?;
            }

            ExprKind::Call { callee, arguments } => {
                self.compile_expression(callee)?;
                for arg in arguments {
                    self.compile_expression(arg)?;
                }
                self.emit(OpCode::Call, &[arguments.len()])?;
            }

            ExprKind::Index { object, index } => {
                self.compile_expression(object)?;
                self.compile_expression(index)?;
                self.emit(OpCode::Index, &[])?;
            }

            ExprKind::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(OpCode::Array, &[elements.len()])?;
            }

            ExprKind::Hash(pairs) => {
                // Sort by the key's textual rendering so the emitted
                // stream is independent of source map iteration order.
                let mut sorted: Vec<&(Expr, Expr)> = pairs.iter().collect();
                sorted.sort_by_key(|(key, _)| key.to_string());

                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(OpCode::Hash, &[pairs.len() * 2])?;
            }
        }
        Ok(())
    }

    /// An if-expression always leaves exactly one value on the stack:
    /// the taken branch's value, or null when the condition fails and
    /// there is no alternative.
    fn compile_if(
        &mut self,
        condition: &Expr,
        consequence: &[Stmt],
        alternative: Option<&[Stmt]>,
    ) -> CompileResult<()> {
        self.compile_expression(condition)?;

        let jump_not_truthy = self.emit(OpCode::JumpNotTruthy, &[PLACEHOLDER])?;

        self.compile_block(consequence)?;
        if self.last_instruction_is(OpCode::Pop) {
            self.remove_last_pop();
        }

        let jump = self.emit(OpCode::Jump, &[PLACEHOLDER])?;

        let after_consequence = self.current_instructions_len();
        self.change_operand(jump_not_truthy, after_consequence)?;

        match alternative {
            None => {
                self.emit(OpCode::Null, &[])?;
            }
            Some(alternative) => {
                self.compile_block(alternative)?;
                if self.last_instruction_is(OpCode::Pop) {
                    self.remove_last_pop();
                }
            }
        }

        let after_alternative = self.current_instructions_len();
        self.change_operand(jump, after_alternative)?;

        Ok(())
    }

    fn compile_function(
        &mut self,
        name: Option<&str>,
        parameters: &[String],
        body: &[Stmt],
    ) -> CompileResult<()> {
        self.enter_scope();

        // A named literal can call itself; the body resolves the name to
        // the current closure instead of an outer binding.
        if let Some(name) = name {
            self.symbols.define_function_name(name);
        }
        for parameter in parameters {
            self.symbols.define(parameter);
        }

        self.compile_block(body)?;

        // The last expression's value is the implicit return value.
        if self.last_instruction_is(OpCode::Pop) {
            self.replace_last_pop_with_return()?;
        }
        if !self.last_instruction_is(OpCode::ReturnValue) {
            self.emit(OpCode::Return, &[])?;
        }

        let (num_locals, free_symbols) = self.symbols.leave_scope();
        let instructions = self.leave_scope();

        // Load every captured value in capture order so the VM can fold
        // them into the closure it is about to build.
        for symbol in &free_symbols {
            self.load_symbol(symbol)?;
        }

        let function = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        };
        let index = self.add_constant(Object::CompiledFunction(Rc::new(function)))?;
        self.emit(OpCode::Closure, &[index, free_symbols.len()])?;

        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) -> CompileResult<()> {
        match symbol.scope {
            SymbolScope::Global => self.emit(OpCode::GetGlobal, &[symbol.index])?,
            SymbolScope::Local => self.emit(OpCode::GetLocal, &[symbol.index])?,
            SymbolScope::Builtin => self.emit(OpCode::GetBuiltin, &[symbol.index])?,
            SymbolScope::Free => self.emit(OpCode::GetFree, &[symbol.index])?,
            SymbolScope::Function => self.emit(OpCode::CurrentClosure, &[])?,
        };
        Ok(())
    }

    fn emit_store(&mut self, symbol: &Symbol) -> CompileResult<()> {
        match symbol.scope {
            SymbolScope::Global => self.emit(OpCode::SetGlobal, &[symbol.index])?,
            _ => self.emit(OpCode::SetLocal, &[symbol.index])?,
        };
        Ok(())
    }

    // ===== Emission helpers =====

    /// Append a constant to the pool and return its index. The pool is
    /// append-only; identical values get distinct slots.
    fn add_constant(&mut self, object: Object) -> CompileResult<usize> {
        if self.constants.len() > u16::MAX as usize {
            return Err(CompileError::TooManyConstants);
        }
        self.constants.push(object);
        Ok(self.constants.len() - 1)
    }

    /// Encode and append an instruction, returning its byte position.
    fn emit(&mut self, op: OpCode, operands: &[usize]) -> CompileResult<usize> {
        let instruction = make(op, operands)?;
        let scope = self.current_scope();
        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(&instruction);

        scope.previous = scope.last;
        scope.last = Some(EmittedInstruction {
            opcode: op,
            position,
        });

        Ok(position)
    }

    fn current_scope(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn current_instructions_len(&self) -> usize {
        self.scopes
            .last()
            .expect("scope stack is never empty")
            .instructions
            .len()
    }

    fn last_instruction_is(&self, op: OpCode) -> bool {
        self.scopes
            .last()
            .and_then(|scope| scope.last)
            .map(|last| last.opcode == op)
            .unwrap_or(false)
    }

    fn remove_last_pop(&mut self) {
        let scope = self.current_scope();
        if let Some(last) = scope.last {
            scope.instructions.truncate(last.position);
            scope.last = scope.previous;
            scope.previous = None;
        }
    }

    fn replace_last_pop_with_return(&mut self) -> CompileResult<()> {
        let replacement = make(OpCode::ReturnValue, &[])?;
        let scope = self.current_scope();
        let last = scope.last.as_mut().expect("a Pop was just observed");
        scope.instructions[last.position] = replacement[0];
        last.opcode = OpCode::ReturnValue;
        Ok(())
    }

    /// Re-encode the instruction at `position` with a new operand. Only
    /// used for back-patching jumps, whose operand width never changes.
    fn change_operand(&mut self, position: usize, operand: usize) -> CompileResult<()> {
        let scope = self.current_scope();
        let op = OpCode::from_u8(scope.instructions[position]).ok_or_else(|| {
            CompileError::internal(format!("patching unknown opcode at {}", position))
        })?;
        let instruction = make(op, &[operand])?;
        scope.instructions[position..position + instruction.len()]
            .copy_from_slice(&instruction);
        Ok(())
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.symbols.enter_scope();
    }

    fn leave_scope(&mut self) -> Vec<u8> {
        self.scopes
            .pop()
            .expect("scope stack is never empty")
            .instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::disassembler::disassemble;
    use crate::lexer::Scanner;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> Bytecode {
        let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
        let program = Parser::new(tokens).parse().expect("parser error");
        Compiler::new().compile(&program).expect("compile error")
    }

    fn ins(parts: &[(OpCode, &[usize])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (op, operands) in parts {
            out.extend(make(*op, operands).expect("make error"));
        }
        out
    }

    /// Compare instruction streams through the disassembler so failures
    /// read as code, not byte soup.
    fn assert_instructions(actual: &[u8], expected: &[u8]) {
        assert_eq!(disassemble(actual), disassemble(expected));
    }

    #[test]
    fn test_integer_arithmetic() {
        let bytecode = compile("1 + 2");
        assert_eq!(
            bytecode.constants,
            vec![Object::Integer(1), Object::Integer(2)]
        );
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::Constant, &[1]),
                (OpCode::Add, &[]),
                (OpCode::Pop, &[]),
            ]),
        );

        let bytecode = compile("1; 2");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::Pop, &[]),
                (OpCode::Constant, &[1]),
                (OpCode::Pop, &[]),
            ]),
        );

        let bytecode = compile("-1");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::Minus, &[]),
                (OpCode::Pop, &[]),
            ]),
        );
    }

    #[test]
    fn test_constant_pool_is_append_only() {
        // Identical literals get distinct slots; the pool never dedups.
        let bytecode = compile("1 + 1");
        assert_eq!(
            bytecode.constants,
            vec![Object::Integer(1), Object::Integer(1)]
        );
    }

    #[test]
    fn test_boolean_expressions() {
        let bytecode = compile("true");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[(OpCode::True, &[]), (OpCode::Pop, &[])]),
        );

        let bytecode = compile("1 > 2");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::Constant, &[1]),
                (OpCode::GreaterThan, &[]),
                (OpCode::Pop, &[]),
            ]),
        );

        let bytecode = compile("!true");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::True, &[]),
                (OpCode::Bang, &[]),
                (OpCode::Pop, &[]),
            ]),
        );
    }

    #[test]
    fn test_less_than_is_mirrored_greater_than() {
        let bytecode = compile("1 < 2");
        // Operands come out right-then-left.
        assert_eq!(
            bytecode.constants,
            vec![Object::Integer(2), Object::Integer(1)]
        );
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::Constant, &[1]),
                (OpCode::GreaterThan, &[]),
                (OpCode::Pop, &[]),
            ]),
        );
    }

    #[test]
    fn test_conditionals() {
        let bytecode = compile("if (true) { 10 }; 3333;");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::True, &[]),
                (OpCode::JumpNotTruthy, &[10]),
                (OpCode::Constant, &[0]),
                (OpCode::Jump, &[11]),
                (OpCode::Null, &[]),
                (OpCode::Pop, &[]),
                (OpCode::Constant, &[1]),
                (OpCode::Pop, &[]),
            ]),
        );

        let bytecode = compile("if (true) { 10 } else { 20 }; 3333;");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::True, &[]),
                (OpCode::JumpNotTruthy, &[10]),
                (OpCode::Constant, &[0]),
                (OpCode::Jump, &[13]),
                (OpCode::Constant, &[1]),
                (OpCode::Pop, &[]),
                (OpCode::Constant, &[2]),
                (OpCode::Pop, &[]),
            ]),
        );
    }

    #[test]
    fn test_global_let_statements() {
        let bytecode = compile("let one = 1; let two = 2;");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::SetGlobal, &[0]),
                (OpCode::Constant, &[1]),
                (OpCode::SetGlobal, &[1]),
            ]),
        );

        let bytecode = compile("let one = 1; one;");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::SetGlobal, &[0]),
                (OpCode::GetGlobal, &[0]),
                (OpCode::Pop, &[]),
            ]),
        );
    }

    #[test]
    fn test_undefined_variable_is_a_compile_error() {
        let tokens = Scanner::new("foobar").scan_tokens().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let err = Compiler::new().compile(&program).unwrap_err();
        assert!(matches!(err, CompileError::UndefinedVariable(ref name, _) if name == "foobar"));
    }

    #[test]
    fn test_string_expressions() {
        let bytecode = compile(r#""tarn" + "lang""#);
        assert_eq!(
            bytecode.constants,
            vec![Object::string("tarn"), Object::string("lang")]
        );
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::Constant, &[1]),
                (OpCode::Add, &[]),
                (OpCode::Pop, &[]),
            ]),
        );
    }

    #[test]
    fn test_array_literals() {
        let bytecode = compile("[1, 2, 3]");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::Constant, &[1]),
                (OpCode::Constant, &[2]),
                (OpCode::Array, &[3]),
                (OpCode::Pop, &[]),
            ]),
        );

        let bytecode = compile("[]");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[(OpCode::Array, &[0]), (OpCode::Pop, &[])]),
        );
    }

    #[test]
    fn test_hash_literals_sorted_by_key_text() {
        // Source order "b" before "a"; emission order is sorted by the
        // key's rendering, so the stream is deterministic.
        let bytecode = compile(r#"{"b": 2, "a": 1}"#);
        assert_eq!(
            bytecode.constants,
            vec![
                Object::string("a"),
                Object::Integer(1),
                Object::string("b"),
                Object::Integer(2),
            ]
        );
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::Constant, &[1]),
                (OpCode::Constant, &[2]),
                (OpCode::Constant, &[3]),
                (OpCode::Hash, &[4]),
                (OpCode::Pop, &[]),
            ]),
        );

        let bytecode = compile("{}");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[(OpCode::Hash, &[0]), (OpCode::Pop, &[])]),
        );
    }

    #[test]
    fn test_index_expressions() {
        let bytecode = compile("[1, 2][1]");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::Constant, &[1]),
                (OpCode::Array, &[2]),
                (OpCode::Constant, &[2]),
                (OpCode::Index, &[]),
                (OpCode::Pop, &[]),
            ]),
        );
    }

    #[test]
    fn test_functions() {
        let bytecode = compile("fn() { return 5 + 10 }");
        let func = match &bytecode.constants[2] {
            Object::CompiledFunction(func) => func.clone(),
            other => panic!("expected function constant, got {:?}", other),
        };
        assert_instructions(
            &func.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::Constant, &[1]),
                (OpCode::Add, &[]),
                (OpCode::ReturnValue, &[]),
            ]),
        );
        assert_instructions(
            &bytecode.instructions,
            &ins(&[(OpCode::Closure, &[2, 0]), (OpCode::Pop, &[])]),
        );
    }

    #[test]
    fn test_implicit_return_rewrites_trailing_pop() {
        let bytecode = compile("fn() { 5 + 10 }");
        let func = match &bytecode.constants[2] {
            Object::CompiledFunction(func) => func.clone(),
            other => panic!("expected function constant, got {:?}", other),
        };
        assert_instructions(
            &func.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::Constant, &[1]),
                (OpCode::Add, &[]),
                (OpCode::ReturnValue, &[]),
            ]),
        );
    }

    #[test]
    fn test_empty_function_returns_null() {
        let bytecode = compile("fn() { }");
        let func = match &bytecode.constants[0] {
            Object::CompiledFunction(func) => func.clone(),
            other => panic!("expected function constant, got {:?}", other),
        };
        assert_instructions(&func.instructions, &ins(&[(OpCode::Return, &[])]));
    }

    #[test]
    fn test_function_calls() {
        let bytecode = compile("fn() { 24 }();");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Closure, &[1, 0]),
                (OpCode::Call, &[0]),
                (OpCode::Pop, &[]),
            ]),
        );

        let bytecode = compile("let oneArg = fn(a) { a }; oneArg(24);");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Closure, &[0, 0]),
                (OpCode::SetGlobal, &[0]),
                (OpCode::GetGlobal, &[0]),
                (OpCode::Constant, &[1]),
                (OpCode::Call, &[1]),
                (OpCode::Pop, &[]),
            ]),
        );
    }

    #[test]
    fn test_let_statement_scopes() {
        let bytecode = compile("let num = 55; fn() { num }");
        let func = match &bytecode.constants[1] {
            Object::CompiledFunction(func) => func.clone(),
            other => panic!("expected function constant, got {:?}", other),
        };
        assert_instructions(
            &func.instructions,
            &ins(&[(OpCode::GetGlobal, &[0]), (OpCode::ReturnValue, &[])]),
        );

        let bytecode = compile("fn() { let num = 55; num }");
        let func = match &bytecode.constants[1] {
            Object::CompiledFunction(func) => func.clone(),
            other => panic!("expected function constant, got {:?}", other),
        };
        assert_eq!(func.num_locals, 1);
        assert_instructions(
            &func.instructions,
            &ins(&[
                (OpCode::Constant, &[0]),
                (OpCode::SetLocal, &[0]),
                (OpCode::GetLocal, &[0]),
                (OpCode::ReturnValue, &[]),
            ]),
        );
    }

    #[test]
    fn test_builtins() {
        let bytecode = compile("len([]); push([], 1);");
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::GetBuiltin, &[0]),
                (OpCode::Array, &[0]),
                (OpCode::Call, &[1]),
                (OpCode::Pop, &[]),
                (OpCode::GetBuiltin, &[5]),
                (OpCode::Array, &[0]),
                (OpCode::Constant, &[0]),
                (OpCode::Call, &[2]),
                (OpCode::Pop, &[]),
            ]),
        );

        let bytecode = compile("fn() { len([]) }");
        let func = match &bytecode.constants[0] {
            Object::CompiledFunction(func) => func.clone(),
            other => panic!("expected function constant, got {:?}", other),
        };
        assert_instructions(
            &func.instructions,
            &ins(&[
                (OpCode::GetBuiltin, &[0]),
                (OpCode::Array, &[0]),
                (OpCode::Call, &[1]),
                (OpCode::ReturnValue, &[]),
            ]),
        );
    }

    #[test]
    fn test_closures() {
        let bytecode = compile("fn(a) { fn(b) { a + b } }");

        let inner = match &bytecode.constants[0] {
            Object::CompiledFunction(func) => func.clone(),
            other => panic!("expected function constant, got {:?}", other),
        };
        assert_instructions(
            &inner.instructions,
            &ins(&[
                (OpCode::GetFree, &[0]),
                (OpCode::GetLocal, &[0]),
                (OpCode::Add, &[]),
                (OpCode::ReturnValue, &[]),
            ]),
        );

        let outer = match &bytecode.constants[1] {
            Object::CompiledFunction(func) => func.clone(),
            other => panic!("expected function constant, got {:?}", other),
        };
        // The outer function loads its local `a` so the VM can fold it
        // into the closure being built.
        assert_instructions(
            &outer.instructions,
            &ins(&[
                (OpCode::GetLocal, &[0]),
                (OpCode::Closure, &[0, 1]),
                (OpCode::ReturnValue, &[]),
            ]),
        );
    }

    #[test]
    fn test_deeply_nested_closures() {
        let bytecode = compile("fn(a) { fn(b) { fn(c) { a + b + c } } }");

        let innermost = match &bytecode.constants[0] {
            Object::CompiledFunction(func) => func.clone(),
            other => panic!("expected function constant, got {:?}", other),
        };
        assert_instructions(
            &innermost.instructions,
            &ins(&[
                (OpCode::GetFree, &[0]),
                (OpCode::GetFree, &[1]),
                (OpCode::Add, &[]),
                (OpCode::GetLocal, &[0]),
                (OpCode::Add, &[]),
                (OpCode::ReturnValue, &[]),
            ]),
        );

        let middle = match &bytecode.constants[1] {
            Object::CompiledFunction(func) => func.clone(),
            other => panic!("expected function constant, got {:?}", other),
        };
        assert_instructions(
            &middle.instructions,
            &ins(&[
                (OpCode::GetFree, &[0]),
                (OpCode::GetLocal, &[0]),
                (OpCode::Closure, &[0, 2]),
                (OpCode::ReturnValue, &[]),
            ]),
        );
    }

    #[test]
    fn test_recursive_function_uses_current_closure() {
        let bytecode = compile("let countDown = fn(x) { countDown(x - 1); }; countDown(1);");

        let func = match &bytecode.constants[1] {
            Object::CompiledFunction(func) => func.clone(),
            other => panic!("expected function constant, got {:?}", other),
        };
        assert_instructions(
            &func.instructions,
            &ins(&[
                (OpCode::CurrentClosure, &[]),
                (OpCode::GetLocal, &[0]),
                (OpCode::Constant, &[0]),
                (OpCode::Sub, &[]),
                (OpCode::Call, &[1]),
                (OpCode::ReturnValue, &[]),
            ]),
        );
        assert_instructions(
            &bytecode.instructions,
            &ins(&[
                (OpCode::Closure, &[1, 0]),
                (OpCode::SetGlobal, &[0]),
                (OpCode::GetGlobal, &[0]),
                (OpCode::Constant, &[2]),
                (OpCode::Call, &[1]),
                (OpCode::Pop, &[]),
            ]),
        );
    }

    #[test]
    fn test_compiler_scopes_are_isolated() {
        let mut compiler = Compiler::new();
        compiler.emit(OpCode::Mul, &[]).unwrap();

        compiler.enter_scope();
        compiler.emit(OpCode::Sub, &[]).unwrap();
        assert_eq!(compiler.scopes.last().unwrap().instructions.len(), 1);
        assert!(compiler.last_instruction_is(OpCode::Sub));
        let instructions = compiler.leave_scope();
        compiler.symbols.leave_scope();
        assert_eq!(instructions, make(OpCode::Sub, &[]).unwrap());

        compiler.emit(OpCode::Add, &[]).unwrap();
        assert_eq!(compiler.scopes.last().unwrap().instructions.len(), 2);
        assert!(compiler.last_instruction_is(OpCode::Add));
    }
}
