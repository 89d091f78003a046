//! Compiled backend: flattens a typed AST into a postfix instruction
//! sequence executed on a value stack.
//!
//! Compilation resolves function names against the registry once, so a
//! [`Program`] carries its function pointers and never touches the registry
//! again. Variables stay symbolic and resolve per run. The instruction
//! operators delegate to the same helpers as the tree-walking interpreter,
//! so both backends produce bit-identical results.

use std::fmt;

use crate::Real;
use crate::context::{FunctionRegistry, VariableStore};
use crate::error::{CalcError, Result};
use crate::eval;
use crate::types::{BinaryOp, CompareOp, DataType, Expr, ExprKind, NativeFn, Value};

/// One postfix instruction.
#[derive(Clone)]
pub(crate) enum Instr {
    PushConst(Value),
    LoadVariable(String),
    Convert(DataType),
    BinaryInt(BinaryOp),
    BinaryReal(BinaryOp),
    CompareInt(CompareOp),
    CompareReal(CompareOp),
    Call {
        name: String,
        arity: usize,
        func: NativeFn,
    },
}

impl fmt::Debug for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::PushConst(v) => write!(f, "PushConst({v:?})"),
            Instr::LoadVariable(name) => write!(f, "LoadVariable({name:?})"),
            Instr::Convert(t) => write!(f, "Convert({t:?})"),
            Instr::BinaryInt(op) => write!(f, "BinaryInt({op:?})"),
            Instr::BinaryReal(op) => write!(f, "BinaryReal({op:?})"),
            Instr::CompareInt(op) => write!(f, "CompareInt({op:?})"),
            Instr::CompareReal(op) => write!(f, "CompareReal({op:?})"),
            Instr::Call { name, arity, .. } => write!(f, "Call({name:?}/{arity})"),
        }
    }
}

/// A compiled formula. Immutable and safe to share across threads; each
/// `run` uses its own evaluation stack.
#[derive(Clone, Debug)]
pub struct Program {
    instrs: Vec<Instr>,
    max_stack: usize,
}

impl Program {
    /// Execute against a variable store, producing the engine's external
    /// float result.
    pub fn run(&self, store: &VariableStore, case_sensitive: bool) -> Result<Real> {
        self.run_value(store, case_sensitive).map(|v| v.as_real())
    }

    pub(crate) fn run_value(&self, store: &VariableStore, case_sensitive: bool) -> Result<Value> {
        let mut stack: Vec<Value> = Vec::with_capacity(self.max_stack);
        let mut scratch: Vec<Real> = Vec::new();

        for instr in &self.instrs {
            match instr {
                Instr::PushConst(v) => stack.push(*v),
                Instr::LoadVariable(name) => {
                    let v = store.get(name, case_sensitive).ok_or_else(|| {
                        CalcError::UnknownVariable { name: name.clone() }
                    })?;
                    stack.push(Value::Float(v));
                }
                Instr::Convert(target) => {
                    let v = pop(&mut stack)?;
                    stack.push(v.convert_to(*target));
                }
                Instr::BinaryInt(op) => {
                    let r = pop(&mut stack)?;
                    let l = pop(&mut stack)?;
                    stack.push(eval::apply_binary(*op, DataType::Integer, l, r)?);
                }
                Instr::BinaryReal(op) => {
                    let r = pop(&mut stack)?;
                    let l = pop(&mut stack)?;
                    stack.push(eval::apply_binary(*op, DataType::FloatingPoint, l, r)?);
                }
                Instr::CompareInt(op) => {
                    let r = pop(&mut stack)?;
                    let l = pop(&mut stack)?;
                    stack.push(eval::apply_compare(*op, DataType::Integer, l, r)?);
                }
                Instr::CompareReal(op) => {
                    let r = pop(&mut stack)?;
                    let l = pop(&mut stack)?;
                    stack.push(eval::apply_compare(*op, DataType::FloatingPoint, l, r)?);
                }
                Instr::Call { arity, func, .. } => {
                    let start = stack
                        .len()
                        .checked_sub(*arity)
                        .ok_or(CalcError::Internal("call underflows value stack"))?;
                    scratch.clear();
                    scratch.extend(stack.drain(start..).map(|v| v.as_real()));
                    stack.push(Value::Float(func(&scratch)));
                }
            }
        }

        let result = pop(&mut stack)?;
        if !stack.is_empty() {
            return Err(CalcError::Internal("value stack not empty after run"));
        }
        Ok(result)
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value> {
    stack.pop().ok_or(CalcError::Internal("value stack underflow"))
}

/// Flatten an AST into a [`Program`]. Fails if the tree calls a function
/// missing from the registry or with the wrong argument count.
pub fn compile(expr: &Expr, registry: &FunctionRegistry) -> Result<Program> {
    let mut compiler = Compiler {
        instrs: Vec::new(),
        depth: 0,
        max_stack: 0,
    };
    compiler.emit(expr, registry)?;
    Ok(Program {
        instrs: compiler.instrs,
        max_stack: compiler.max_stack,
    })
}

struct Compiler {
    instrs: Vec<Instr>,
    depth: usize,
    max_stack: usize,
}

impl Compiler {
    fn push(&mut self, instr: Instr) {
        self.instrs.push(instr);
        self.depth += 1;
        if self.depth > self.max_stack {
            self.max_stack = self.depth;
        }
    }

    fn reduce(&mut self, instr: Instr, popped: usize) -> Result<()> {
        if self.depth < popped {
            return Err(CalcError::Internal("compiler stack accounting underflow"));
        }
        self.instrs.push(instr);
        self.depth -= popped;
        self.depth += 1;
        if self.depth > self.max_stack {
            self.max_stack = self.depth;
        }
        Ok(())
    }

    fn emit(&mut self, expr: &Expr, registry: &FunctionRegistry) -> Result<()> {
        match expr.kind() {
            ExprKind::Constant(v) => {
                self.push(Instr::PushConst(*v));
                Ok(())
            }
            ExprKind::Variable(name) => {
                self.push(Instr::LoadVariable(name.clone()));
                Ok(())
            }
            ExprKind::Conversion { operand } => {
                self.emit(operand, registry)?;
                self.reduce(Instr::Convert(expr.data_type()), 1)
            }
            ExprKind::Binary { op, left, right } => {
                self.emit(left, registry)?;
                self.emit(right, registry)?;
                let instr = match expr.data_type() {
                    DataType::Integer => Instr::BinaryInt(*op),
                    DataType::FloatingPoint => Instr::BinaryReal(*op),
                };
                self.reduce(instr, 2)
            }
            ExprKind::Compare { op, left, right } => {
                self.emit(left, registry)?;
                self.emit(right, registry)?;
                let instr = match left.data_type() {
                    DataType::Integer => Instr::CompareInt(*op),
                    DataType::FloatingPoint => Instr::CompareReal(*op),
                };
                self.reduce(instr, 2)
            }
            ExprKind::Call { name, args } => {
                let info = registry
                    .function_info(name)
                    .ok_or_else(|| CalcError::UnknownFunction { name: name.clone() })?;
                if args.len() != info.arity {
                    return Err(CalcError::ArgumentCountMismatch {
                        name: name.clone(),
                        expected: info.arity,
                        found: args.len(),
                    });
                }
                for arg in args {
                    self.emit(arg, registry)?;
                }
                let call = Instr::Call {
                    name: name.clone(),
                    arity: args.len(),
                    func: info.func.clone(),
                };
                if args.is_empty() {
                    self.push(call);
                    Ok(())
                } else {
                    self.reduce(call, args.len())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_program_is_send_sync() {
        assert_send_sync::<Program>();
    }

    fn both(formula: &str, vars: &VariableStore) -> (Real, Real) {
        let registry = FunctionRegistry::with_defaults();
        let ast = parse_formula(formula, &registry, '.', true).unwrap();
        let interpreted = eval::evaluate(&ast, vars, &registry, true).unwrap();
        let program = compile(&ast, &registry).unwrap();
        let compiled = program.run(vars, true).unwrap();
        (interpreted, compiled)
    }

    #[test]
    fn test_backends_bit_identical() {
        let mut vars = VariableStore::new();
        vars.set("x", 1.3);
        vars.set("y", -7.25);
        let formulas: &[&str] = &[
            "2+3*7",
            "(2+3)*7",
            "2-3-4",
            "2^3^2",
            "-x^2 + y",
            "1/0",
            "x/y + x*y - x^y",
            "(x < y) + (x >= y) * 2",
            "max(x, y) + min(x, y)",
            "pow(x, 3) == x^3",
        ];
        for formula in formulas {
            let (interpreted, compiled) = both(formula, &vars);
            assert_eq!(
                interpreted.to_bits(),
                compiled.to_bits(),
                "backends disagree on {formula}"
            );
        }
    }

    #[cfg(feature = "libm")]
    #[test]
    fn test_backends_bit_identical_transcendental() {
        let mut vars = VariableStore::new();
        vars.set("x", 0.7);
        for formula in ["sin(x) + cos(x)", "atan2(x, 2) * sqrt(x)", "ln(exp(x))"] {
            let (interpreted, compiled) = both(formula, &vars);
            assert_eq!(interpreted.to_bits(), compiled.to_bits());
        }
    }

    #[test]
    fn test_unknown_variable_at_run_time() {
        let registry = FunctionRegistry::with_defaults();
        let ast = parse_formula("missing + 1", &registry, '.', true).unwrap();
        let program = compile(&ast, &registry).unwrap();
        assert_eq!(
            program.run(&VariableStore::new(), true).unwrap_err(),
            CalcError::UnknownVariable {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_integer_semantics_survive_flattening() {
        let registry = FunctionRegistry::with_defaults();
        // comparison on integers must compare as integers, not floats
        let ast = parse_formula("2 == 2", &registry, '.', true).unwrap();
        let program = compile(&ast, &registry).unwrap();
        assert_eq!(
            program.run_value(&VariableStore::new(), true).unwrap(),
            Value::Integer(1)
        );
    }

    #[test]
    fn test_zero_arity_call_compiles() {
        let mut registry = FunctionRegistry::with_defaults();
        registry
            .register_function("answer", 0, true, |_| 42.0)
            .unwrap();
        let ast = parse_formula("answer() + 1", &registry, '.', true).unwrap();
        let program = compile(&ast, &registry).unwrap();
        assert_eq!(program.run(&VariableStore::new(), true).unwrap(), 43.0);
    }

    #[test]
    fn test_compiled_after_optimization() {
        let registry = FunctionRegistry::with_defaults();
        let mut vars = VariableStore::new();
        vars.set("x", 3.5);
        let ast = parse_formula("x * (2 + 3) + 2^4", &registry, '.', true).unwrap();
        let optimized = crate::optimizer::optimize(&ast, &registry).unwrap();
        let program = compile(&optimized, &registry).unwrap();
        assert_eq!(program.run(&vars, true).unwrap(), 33.5);
    }
}
