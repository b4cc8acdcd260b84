//! Stack-based virtual machine for executing bytecode.

use std::rc::Rc;

use crate::bytecode::compiler::Bytecode;
use crate::bytecode::instruction::{read_u16, OpCode};
use crate::error::RuntimeError;
use crate::object::builtins::{BuiltinDef, BUILTINS};
use crate::object::{Closure, CompiledFunction, HashMap, HashPair, Object};

/// Maximum operand stack depth.
pub const STACK_SIZE: usize = 2048;
/// Size of the globals vector.
pub const GLOBALS_SIZE: usize = 65536;
/// Maximum call frame depth (recursion limit).
pub const MAX_FRAMES: usize = 1024;

/// Result type for VM operations.
pub type VmResult<T> = Result<T, RuntimeError>;

/// A call frame: which closure is running, where its locals begin on the
/// shared operand stack, and its instruction pointer.
#[derive(Debug)]
struct Frame {
    closure: Rc<Closure>,
    ip: usize,
    base_pointer: usize,
}

/// The virtual machine. Owns a fixed operand stack, a globals vector,
/// and a frame stack; runs one compilation unit to completion.
pub struct Vm {
    constants: Vec<Object>,
    stack: Vec<Object>,
    sp: usize,
    globals: Vec<Object>,
    frames: Vec<Frame>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_globals(bytecode, vec![Object::Null; GLOBALS_SIZE])
    }

    /// Build a VM reusing a globals vector from an earlier run. This is
    /// how a REPL keeps top-level bindings alive across inputs.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Object>) -> Self {
        // The top-level instructions run as a zero-argument closure so
        // the call/return machinery is uniform.
        let main_fn = CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        };
        let main_closure = Closure {
            func: Rc::new(main_fn),
            free: Vec::new(),
        };
        let main_frame = Frame {
            closure: Rc::new(main_closure),
            ip: 0,
            base_pointer: 0,
        };

        Self {
            constants: bytecode.constants,
            stack: vec![Object::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames: vec![main_frame],
        }
    }

    /// Hand the globals vector back for the next REPL cycle.
    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    /// The value most recently popped off the stack; what a REPL prints
    /// after a successful run.
    pub fn last_popped(&self) -> Object {
        self.stack[self.sp].clone()
    }

    /// Run the loaded bytecode to completion.
    pub fn run(&mut self) -> VmResult<()> {
        while self.current_frame().ip < self.current_frame().closure.func.instructions.len() {
            let byte = self.read_u8();
            let op = OpCode::from_u8(byte).ok_or(RuntimeError::UnknownOpcode(byte))?;

            match op {
                OpCode::Constant => {
                    let index = self.read_u16_operand();
                    let constant = self.constant(index)?;
                    self.push(constant)?;
                }

                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
                    self.execute_binary(op)?;
                }

                OpCode::Pop => {
                    self.pop()?;
                }

                OpCode::True => self.push(Object::Boolean(true))?,
                OpCode::False => self.push(Object::Boolean(false))?,
                OpCode::Null => self.push(Object::Null)?,

                OpCode::Equal | OpCode::NotEqual | OpCode::GreaterThan => {
                    self.execute_comparison(op)?;
                }

                OpCode::Bang => {
                    let operand = self.pop()?;
                    self.push(Object::Boolean(!operand.is_truthy()))?;
                }

                OpCode::Minus => {
                    let operand = self.pop()?;
                    match operand {
                        Object::Integer(n) => self.push(Object::Integer(-n))?,
                        other => {
                            return Err(RuntimeError::UnsupportedNegation(other.type_name()))
                        }
                    }
                }

                OpCode::Jump => {
                    let target = self.read_u16_operand();
                    self.set_ip(target);
                }

                OpCode::JumpNotTruthy => {
                    let target = self.read_u16_operand();
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.set_ip(target);
                    }
                }

                OpCode::SetGlobal => {
                    let slot = self.read_u16_operand();
                    let value = self.pop()?;
                    self.globals[slot] = value;
                }

                OpCode::GetGlobal => {
                    let slot = self.read_u16_operand();
                    let value = self.globals[slot].clone();
                    self.push(value)?;
                }

                OpCode::SetLocal => {
                    let slot = self.read_u8() as usize;
                    let base = self.current_frame().base_pointer;
                    let value = self.pop()?;
                    self.stack[base + slot] = value;
                }

                OpCode::GetLocal => {
                    let slot = self.read_u8() as usize;
                    let base = self.current_frame().base_pointer;
                    let value = self.stack[base + slot].clone();
                    self.push(value)?;
                }

                OpCode::GetBuiltin => {
                    let index = self.read_u8() as usize;
                    let builtin = BUILTINS.get(index).ok_or_else(|| {
                        RuntimeError::general(format!("no builtin at index {}", index))
                    })?;
                    self.push(Object::Builtin(builtin))?;
                }

                OpCode::GetFree => {
                    let index = self.read_u8() as usize;
                    let value = self.current_frame().closure.free[index].clone();
                    self.push(value)?;
                }

                OpCode::CurrentClosure => {
                    let closure = self.current_frame().closure.clone();
                    self.push(Object::Closure(closure))?;
                }

                OpCode::Array => {
                    let count = self.read_u16_operand();
                    let elements = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Object::Array(Rc::new(elements)))?;
                }

                OpCode::Hash => {
                    let count = self.read_u16_operand();
                    let hash = self.build_hash(count)?;
                    self.sp -= count;
                    self.push(hash)?;
                }

                OpCode::Index => {
                    let index = self.pop()?;
                    let object = self.pop()?;
                    self.execute_index(object, index)?;
                }

                OpCode::Call => {
                    let num_args = self.read_u8() as usize;
                    self.execute_call(num_args)?;
                }

                OpCode::ReturnValue => {
                    let value = self.pop()?;
                    if self.return_from_frame(value)? {
                        return Ok(());
                    }
                }

                OpCode::Return => {
                    if self.return_from_frame(Object::Null)? {
                        return Ok(());
                    }
                }

                OpCode::Closure => {
                    let const_index = self.read_u16_operand();
                    let num_free = self.read_u8() as usize;
                    self.push_closure(const_index, num_free)?;
                }
            }
        }

        Ok(())
    }

    // ===== Dispatch helpers =====

    fn execute_binary(&mut self, op: OpCode) -> VmResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        match (&left, &right) {
            (Object::Integer(a), Object::Integer(b)) => {
                let result = match op {
                    OpCode::Add => a + b,
                    OpCode::Sub => a - b,
                    OpCode::Mul => a * b,
                    OpCode::Div => {
                        if *b == 0 {
                            return Err(RuntimeError::DivisionByZero);
                        }
                        a / b
                    }
                    _ => unreachable!("execute_binary only sees arithmetic opcodes"),
                };
                self.push(Object::Integer(result))
            }
            (Object::String(a), Object::String(b)) if op == OpCode::Add => {
                self.push(Object::string(format!("{}{}", a, b)))
            }
            _ => Err(RuntimeError::UnsupportedBinaryTypes {
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }

    fn execute_comparison(&mut self, op: OpCode) -> VmResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        if let (Object::Integer(a), Object::Integer(b)) = (&left, &right) {
            let result = match op {
                OpCode::Equal => a == b,
                OpCode::NotEqual => a != b,
                OpCode::GreaterThan => a > b,
                _ => unreachable!("execute_comparison only sees comparison opcodes"),
            };
            return self.push(Object::Boolean(result));
        }

        match op {
            OpCode::Equal => self.push(Object::Boolean(left == right)),
            OpCode::NotEqual => self.push(Object::Boolean(left != right)),
            _ => Err(RuntimeError::UnsupportedComparison {
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }

    fn build_hash(&self, count: usize) -> VmResult<Object> {
        let mut map = HashMap::default();

        let start = self.sp - count;
        for i in (start..self.sp).step_by(2) {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();
            let hash_key = key
                .hash_key()
                .ok_or_else(|| RuntimeError::UnhashableKey(key.type_name()))?;
            map.insert(hash_key, HashPair { key, value });
        }

        Ok(Object::Hash(Rc::new(map)))
    }

    fn execute_index(&mut self, object: Object, index: Object) -> VmResult<()> {
        match (&object, &index) {
            (Object::Array(elements), Object::Integer(i)) => {
                let value = if *i < 0 || *i as usize >= elements.len() {
                    Object::Null
                } else {
                    elements[*i as usize].clone()
                };
                self.push(value)
            }
            (Object::Hash(pairs), key) => {
                let hash_key = key
                    .hash_key()
                    .ok_or_else(|| RuntimeError::UnhashableKey(key.type_name()))?;
                let value = pairs
                    .get(&hash_key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Object::Null);
                self.push(value)
            }
            _ => Err(RuntimeError::UnsupportedIndex(object.type_name())),
        }
    }

    fn execute_call(&mut self, num_args: usize) -> VmResult<()> {
        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Object::Closure(closure) => self.call_closure(closure, num_args),
            Object::Builtin(builtin) => self.call_builtin(builtin, num_args),
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, num_args: usize) -> VmResult<()> {
        if num_args != closure.func.num_parameters {
            return Err(RuntimeError::WrongArity {
                want: closure.func.num_parameters,
                got: num_args,
            });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::CallDepthExceeded(MAX_FRAMES));
        }

        // Arguments become the first local slots; the remaining local
        // slots are claimed by bumping sp past them. They hold stale
        // values until first assignment, which is safe because the
        // compiler never emits a read before the corresponding write.
        let base_pointer = self.sp - num_args;
        let next_sp = base_pointer + closure.func.num_locals;
        if next_sp > STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        self.frames.push(Frame {
            closure,
            ip: 0,
            base_pointer,
        });
        self.sp = next_sp;
        Ok(())
    }

    fn call_builtin(&mut self, builtin: &'static BuiltinDef, num_args: usize) -> VmResult<()> {
        let args = self.stack[self.sp - num_args..self.sp].to_vec();
        let result = (builtin.func)(&args);

        // The result (possibly an Error value) replaces callee and args.
        self.sp -= num_args + 1;
        self.push(result)
    }

    /// Pop the current frame and push the return value in its place.
    /// Returns true when the popped frame was the main frame, which ends
    /// the run with `value` as the program result.
    fn return_from_frame(&mut self, value: Object) -> VmResult<bool> {
        let frame = self.frames.pop().expect("frame stack is never empty");

        if self.frames.is_empty() {
            self.sp = frame.base_pointer;
            self.push(value)?;
            self.sp -= 1;
            return Ok(true);
        }

        self.sp = frame.base_pointer - 1;
        self.push(value)?;
        Ok(false)
    }

    fn push_closure(&mut self, const_index: usize, num_free: usize) -> VmResult<()> {
        let constant = self.constant(const_index)?;
        let func = match constant {
            Object::CompiledFunction(func) => func,
            other => {
                return Err(RuntimeError::general(format!(
                    "not a function constant: {}",
                    other.type_name()
                )))
            }
        };

        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;
        self.push(Object::Closure(Rc::new(Closure { func, free })))
    }

    // ===== Stack and frame primitives =====

    fn constant(&self, index: usize) -> VmResult<Object> {
        self.constants
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::general(format!("no constant at index {}", index)))
    }

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty")
    }

    fn set_ip(&mut self, target: usize) {
        self.frames
            .last_mut()
            .expect("frame stack is never empty")
            .ip = target;
    }

    fn read_u8(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("frame stack is never empty");
        let byte = frame.closure.func.instructions[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16_operand(&mut self) -> usize {
        let frame = self.frames.last_mut().expect("frame stack is never empty");
        let value = read_u16(&frame.closure.func.instructions, frame.ip);
        frame.ip += 2;
        value as usize
    }

    fn push(&mut self, value: Object) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> VmResult<Object> {
        if self.sp == 0 {
            return Err(RuntimeError::general("stack underflow"));
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }
}
