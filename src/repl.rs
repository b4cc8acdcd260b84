//! Line-oriented REPL.
//!
//! In bytecode mode the session state — symbol table, constant pool and
//! globals vector — is owned here and threaded by value through each
//! compile/run cycle, so definitions accumulate across inputs. Tree-walk
//! mode keeps a persistent interpreter instead.

use std::io::{self, Write};
use std::path::PathBuf;

use colored::Colorize;

use crate::bytecode::{Compiler, SymbolTable, Vm, GLOBALS_SIZE};
use crate::error::TarnError;
use crate::interpreter::Interpreter;
use crate::lexer::Scanner;
use crate::object::Object;
use crate::parser::Parser;
use crate::ExecutionMode;

const HISTORY_FILE: &str = ".tarn_history";

pub struct Repl {
    mode: ExecutionMode,
    interpreter: Interpreter,
    symbols: SymbolTable,
    constants: Vec<Object>,
    globals: Vec<Object>,
    history: Vec<String>,
    history_file: PathBuf,
    multiline_buffer: String,
    is_multiline: bool,
    brace_balance: i32,
}

impl Repl {
    pub fn new(mode: ExecutionMode) -> Self {
        let history_file = Self::history_path();
        let mut repl = Self {
            mode,
            interpreter: Interpreter::new(),
            symbols: SymbolTable::with_builtins(),
            constants: Vec::new(),
            globals: vec![Object::Null; GLOBALS_SIZE],
            history: Vec::new(),
            history_file,
            multiline_buffer: String::new(),
            is_multiline: false,
            brace_balance: 0,
        };
        repl.load_history();
        repl
    }

    fn history_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            home.join(HISTORY_FILE)
        } else {
            PathBuf::from(HISTORY_FILE)
        }
    }

    fn load_history(&mut self) {
        if let Ok(content) = std::fs::read_to_string(&self.history_file) {
            for line in content.lines() {
                if !line.trim().is_empty() {
                    self.history.push(line.to_string());
                }
            }
        }
    }

    fn save_history(&self) {
        let content = self.history.join("\n");
        let _ = std::fs::write(&self.history_file, content);
    }

    pub fn run(&mut self) {
        println!("Tarn - REPL ({})", self.mode_name());
        println!("Type .help for available commands.\n");

        let stdin = io::stdin();

        loop {
            print!("{}", self.prompt());
            io::stdout().flush().unwrap();

            let mut line = String::new();
            match stdin.read_line(&mut line) {
                Ok(0) => {
                    self.save_history();
                    println!("Goodbye!");
                    break;
                }
                Ok(_) => {
                    let line = line.trim_end();
                    if line.is_empty() && !self.is_multiline {
                        continue;
                    }

                    if line == "exit" || line == "quit" {
                        self.save_history();
                        println!("Goodbye!");
                        break;
                    }

                    if self.is_multiline {
                        self.handle_multiline_input(line);
                    } else {
                        self.history.push(line.to_string());

                        if line.starts_with('.') {
                            self.handle_command(line);
                        } else if Self::count_braces(line) > 0 {
                            self.enter_multiline(line);
                        } else {
                            self.execute_line(line);
                        }
                    }
                }
                Err(_) => {
                    self.save_history();
                    println!("\nGoodbye!");
                    break;
                }
            }
        }
    }

    fn prompt(&self) -> &'static str {
        if self.is_multiline {
            "... "
        } else {
            ">>> "
        }
    }

    fn mode_name(&self) -> &'static str {
        match self.mode {
            ExecutionMode::Bytecode => "bytecode",
            ExecutionMode::TreeWalk => "tree-walk",
        }
    }

    fn enter_multiline(&mut self, line: &str) {
        self.is_multiline = true;
        self.multiline_buffer = line.to_string();
        self.brace_balance = Self::count_braces(line);
    }

    fn handle_multiline_input(&mut self, line: &str) {
        if line == ".break" {
            self.cancel_multiline();
            return;
        }

        self.multiline_buffer.push('\n');
        self.multiline_buffer.push_str(line);
        self.brace_balance += Self::count_braces(line);

        if self.brace_balance <= 0 {
            self.is_multiline = false;
            let code = std::mem::take(&mut self.multiline_buffer);
            self.history.push(code.replace('\n', " "));
            self.execute_line(&code);
        }
    }

    fn cancel_multiline(&mut self) {
        self.is_multiline = false;
        self.multiline_buffer.clear();
        self.brace_balance = 0;
        println!("(cancelled)");
    }

    /// Brace balance of a line, ignoring braces inside string literals.
    fn count_braces(s: &str) -> i32 {
        let mut balance = 0;
        let mut in_string = false;
        let mut escaped = false;

        for c in s.chars() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
            } else if c == '"' {
                in_string = true;
                escaped = false;
            } else if c == '{' {
                balance += 1;
            } else if c == '}' {
                balance -= 1;
            }
        }
        balance
    }

    fn handle_command(&mut self, line: &str) {
        match line {
            ".help" => self.cmd_help(),
            ".history" => self.cmd_history(),
            ".clear" => self.cmd_clear(),
            ".mode" => self.cmd_mode(),
            ".break" => println!("Not in multi-line mode."),
            _ => println!("Unknown command: {}. Type .help for available commands.", line),
        }
    }

    fn cmd_help(&self) {
        println!();
        println!("Tarn REPL Commands");
        println!();
        println!(".help          - Show this help message");
        println!(".history       - Show command history");
        println!(".clear         - Reset the session state");
        println!(".mode          - Toggle between bytecode and tree-walk engines");
        println!(".break         - Cancel multi-line input");
        println!("exit / Ctrl+D  - Exit the REPL");
        println!();
    }

    fn cmd_history(&self) {
        for (i, entry) in self.history.iter().enumerate() {
            println!("{:4}  {}", i + 1, entry);
        }
    }

    fn cmd_clear(&mut self) {
        self.interpreter = Interpreter::new();
        self.symbols = SymbolTable::with_builtins();
        self.constants = Vec::new();
        self.globals = vec![Object::Null; GLOBALS_SIZE];
        println!("Session reset.");
    }

    fn cmd_mode(&mut self) {
        // Each engine keeps its own session state; switching does not
        // carry definitions across.
        self.mode = match self.mode {
            ExecutionMode::Bytecode => ExecutionMode::TreeWalk,
            ExecutionMode::TreeWalk => ExecutionMode::Bytecode,
        };
        println!("Engine: {}", self.mode_name());
    }

    fn execute_line(&mut self, source: &str) {
        match self.execute(source) {
            Ok(value) => {
                if value.is_error() {
                    println!("{}", value.to_string().red());
                } else {
                    println!("{}", value);
                }
            }
            Err(err) => println!("{}", err.to_string().red()),
        }
    }

    fn execute(&mut self, source: &str) -> Result<Object, TarnError> {
        let tokens = Scanner::new(source).scan_tokens()?;
        let program = Parser::new(tokens).parse()?;

        match self.mode {
            ExecutionMode::TreeWalk => Ok(self.interpreter.interpret(&program)),
            ExecutionMode::Bytecode => {
                let symbols = std::mem::take(&mut self.symbols);
                let constants = std::mem::take(&mut self.constants);

                let mut compiler = Compiler::with_state(symbols, constants);
                let compiled = compiler.compile(&program);
                let (mut symbols, constants) = compiler.into_state();
                if compiled.is_err() {
                    symbols.truncate_to_global();
                }
                self.symbols = symbols;
                self.constants = constants;
                let bytecode = compiled?;

                let globals = std::mem::take(&mut self.globals);
                let mut vm = Vm::with_globals(bytecode, globals);
                let outcome = vm.run();
                let value = vm.last_popped();
                self.globals = vm.into_globals();
                outcome?;

                Ok(value)
            }
        }
    }
}
