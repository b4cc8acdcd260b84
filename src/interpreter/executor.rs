//! The tree-walking evaluator.
//!
//! An independent execution engine over the same AST and object model as
//! the bytecode VM. Faults here are first-class `Object::Error` values
//! that short-circuit evaluation by ordinary data flow; nothing unwinds
//! the host.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{Expr, ExprKind, InfixOp, PrefixOp, Program, Stmt, StmtKind};
use crate::interpreter::Environment;
use crate::object::{builtins, Function, HashMap, HashPair, Object};

type Env = Rc<RefCell<Environment>>;

/// The tree-walking interpreter. Holds the global environment so a REPL
/// can keep definitions across inputs.
pub struct Interpreter {
    env: Env,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    pub fn global_env(&self) -> Env {
        self.env.clone()
    }

    /// Evaluate a program and return its final value. An early `return`
    /// is unwrapped; an `Error` value stops evaluation and is returned
    /// as-is.
    pub fn interpret(&mut self, program: &Program) -> Object {
        let env = self.env.clone();
        let mut result = Object::Null;

        for stmt in &program.statements {
            result = self.eval_statement(stmt, &env);
            match result {
                Object::ReturnValue(value) => return *value,
                Object::Error(_) => return result,
                _ => {}
            }
        }

        result
    }

    fn eval_statement(&mut self, stmt: &Stmt, env: &Env) -> Object {
        match &stmt.kind {
            StmtKind::Expression(expr) => self.eval_expression(expr, env),

            StmtKind::Let { name, value } => {
                let value = self.eval_expression(value, env);
                if value.is_error() {
                    return value;
                }
                env.borrow_mut().define(name.clone(), value);
                Object::Null
            }

            StmtKind::Return(expr) => {
                let value = self.eval_expression(expr, env);
                if value.is_error() {
                    return value;
                }
                Object::ReturnValue(Box::new(value))
            }

            StmtKind::Block(statements) => self.eval_block(statements, env),
        }
    }

    /// Evaluate a block, keeping `ReturnValue` wrapped so it keeps
    /// bubbling through enclosing blocks.
    fn eval_block(&mut self, statements: &[Stmt], env: &Env) -> Object {
        let mut result = Object::Null;
        for stmt in statements {
            result = self.eval_statement(stmt, env);
            if matches!(result, Object::ReturnValue(_) | Object::Error(_)) {
                return result;
            }
        }
        result
    }

    fn eval_expression(&mut self, expr: &Expr, env: &Env) -> Object {
        match &expr.kind {
            ExprKind::IntLiteral(n) => Object::Integer(*n),
            ExprKind::StringLiteral(s) => Object::string(s.clone()),
            ExprKind::BoolLiteral(b) => Object::Boolean(*b),

            ExprKind::Identifier(name) => self.eval_identifier(name, env),

            ExprKind::Prefix { operator, operand } => {
                let operand = self.eval_expression(operand, env);
                if operand.is_error() {
                    return operand;
                }
                self.eval_prefix(*operator, operand)
            }

            ExprKind::Infix {
                left,
                operator,
                right,
            } => {
                let left = self.eval_expression(left, env);
                if left.is_error() {
                    return left;
                }
                let right = self.eval_expression(right, env);
                if right.is_error() {
                    return right;
                }
                self.eval_infix(*operator, left, right)
            }

            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                let condition = self.eval_expression(condition, env);
                if condition.is_error() {
                    return condition;
                }
                if condition.is_truthy() {
                    self.eval_block(consequence, env)
                } else if let Some(alternative) = alternative {
                    self.eval_block(alternative, env)
                } else {
                    Object::Null
                }
            }

            ExprKind::Function {
                parameters, body, ..
            } => Object::Function(Rc::new(Function {
                parameters: parameters.clone(),
                body: body.clone(),
                env: env.clone(),
            })),

            ExprKind::Call { callee, arguments } => {
                let callee = self.eval_expression(callee, env);
                if callee.is_error() {
                    return callee;
                }
                let args = match self.eval_expressions(arguments, env) {
                    Ok(args) => args,
                    Err(err) => return err,
                };
                self.apply_function(callee, args)
            }

            ExprKind::Index { object, index } => {
                let object = self.eval_expression(object, env);
                if object.is_error() {
                    return object;
                }
                let index = self.eval_expression(index, env);
                if index.is_error() {
                    return index;
                }
                self.eval_index(object, index)
            }

            ExprKind::Array(elements) => match self.eval_expressions(elements, env) {
                Ok(elements) => Object::Array(Rc::new(elements)),
                Err(err) => err,
            },

            ExprKind::Hash(pairs) => self.eval_hash(pairs, env),
        }
    }

    fn eval_identifier(&mut self, name: &str, env: &Env) -> Object {
        if let Some(value) = env.borrow().get(name) {
            return value;
        }
        if let Some(builtin) = builtins::lookup(name) {
            return Object::Builtin(builtin);
        }
        Object::error(format!("identifier not found: {}", name))
    }

    fn eval_expressions(&mut self, exprs: &[Expr], env: &Env) -> Result<Vec<Object>, Object> {
        let mut results = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let value = self.eval_expression(expr, env);
            if value.is_error() {
                return Err(value);
            }
            results.push(value);
        }
        Ok(results)
    }

    fn eval_prefix(&mut self, operator: PrefixOp, operand: Object) -> Object {
        match operator {
            PrefixOp::Not => Object::Boolean(!operand.is_truthy()),
            PrefixOp::Negate => match operand {
                Object::Integer(n) => Object::Integer(-n),
                other => Object::error(format!("unknown operator: -{}", other.type_name())),
            },
        }
    }

    fn eval_infix(&mut self, operator: InfixOp, left: Object, right: Object) -> Object {
        match (&left, &right) {
            (Object::Integer(a), Object::Integer(b)) => {
                self.eval_integer_infix(operator, *a, *b)
            }
            (Object::String(a), Object::String(b)) => match operator {
                InfixOp::Add => Object::string(format!("{}{}", a, b)),
                InfixOp::Equal => Object::Boolean(a == b),
                InfixOp::NotEqual => Object::Boolean(a != b),
                _ => Object::error(format!(
                    "unknown operator: {} {} {}",
                    left.type_name(),
                    operator,
                    right.type_name()
                )),
            },
            _ if operator == InfixOp::Equal => Object::Boolean(left == right),
            _ if operator == InfixOp::NotEqual => Object::Boolean(left != right),
            _ if left.type_name() != right.type_name() => Object::error(format!(
                "type mismatch: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
            _ => Object::error(format!(
                "unknown operator: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
        }
    }

    fn eval_integer_infix(&mut self, operator: InfixOp, a: i64, b: i64) -> Object {
        match operator {
            InfixOp::Add => Object::Integer(a + b),
            InfixOp::Subtract => Object::Integer(a - b),
            InfixOp::Multiply => Object::Integer(a * b),
            InfixOp::Divide => {
                if b == 0 {
                    Object::error("division by zero")
                } else {
                    Object::Integer(a / b)
                }
            }
            InfixOp::Less => Object::Boolean(a < b),
            InfixOp::Greater => Object::Boolean(a > b),
            InfixOp::Equal => Object::Boolean(a == b),
            InfixOp::NotEqual => Object::Boolean(a != b),
        }
    }

    fn apply_function(&mut self, callee: Object, args: Vec<Object>) -> Object {
        match callee {
            Object::Function(func) => {
                if args.len() != func.parameters.len() {
                    return Object::error(format!(
                        "wrong number of arguments: want={}, got={}",
                        func.parameters.len(),
                        args.len()
                    ));
                }
                let call_env = Environment::enclosed(func.env.clone());
                for (param, arg) in func.parameters.iter().zip(args) {
                    call_env.borrow_mut().define(param.clone(), arg);
                }
                let result = self.eval_block(&func.body, &call_env);
                match result {
                    Object::ReturnValue(value) => *value,
                    other => other,
                }
            }
            Object::Builtin(builtin) => (builtin.func)(&args),
            other => Object::error(format!("not a function: {}", other.type_name())),
        }
    }

    fn eval_index(&mut self, object: Object, index: Object) -> Object {
        match (&object, &index) {
            (Object::Array(elements), Object::Integer(i)) => {
                if *i < 0 || *i as usize >= elements.len() {
                    Object::Null
                } else {
                    elements[*i as usize].clone()
                }
            }
            (Object::Hash(pairs), key) => match key.hash_key() {
                Some(key) => pairs
                    .get(&key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Object::Null),
                None => Object::error(format!("unusable as hash key: {}", key.type_name())),
            },
            _ => Object::error(format!(
                "index operator not supported: {}",
                object.type_name()
            )),
        }
    }

    fn eval_hash(&mut self, pairs: &[(Expr, Expr)], env: &Env) -> Object {
        let mut map = HashMap::default();

        for (key_expr, value_expr) in pairs {
            let key = self.eval_expression(key_expr, env);
            if key.is_error() {
                return key;
            }
            let hash_key = match key.hash_key() {
                Some(hash_key) => hash_key,
                None => {
                    return Object::error(format!("unusable as hash key: {}", key.type_name()))
                }
            };
            let value = self.eval_expression(value_expr, env);
            if value.is_error() {
                return value;
            }
            map.insert(hash_key, HashPair { key, value });
        }

        Object::Hash(Rc::new(map))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
