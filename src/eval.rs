//! Tree-walking interpreter.
//!
//! Walks the typed AST directly, resolving variables from a
//! [`VariableStore`] and functions from a [`FunctionRegistry`] on every
//! call. The arithmetic helpers in this module are shared with the compiled
//! backend so both produce bit-identical results.

use crate::Real;
use crate::context::{FunctionRegistry, VariableStore};
use crate::error::{CalcError, Result};
use crate::functions;
use crate::types::{BinaryOp, CompareOp, DataType, Expr, ExprKind, Value};

/// Evaluate an expression tree to a float, the engine's external result
/// type. Integer-typed trees are widened at the end.
pub fn evaluate(
    expr: &Expr,
    store: &VariableStore,
    registry: &FunctionRegistry,
    case_sensitive: bool,
) -> Result<Real> {
    eval_value(expr, store, registry, case_sensitive).map(|v| v.as_real())
}

/// Evaluate an expression tree, preserving the integer/float distinction.
pub(crate) fn eval_value(
    expr: &Expr,
    store: &VariableStore,
    registry: &FunctionRegistry,
    case_sensitive: bool,
) -> Result<Value> {
    match expr.kind() {
        ExprKind::Constant(value) => Ok(*value),
        ExprKind::Variable(name) => store
            .get(name, case_sensitive)
            .map(Value::Float)
            .ok_or_else(|| CalcError::UnknownVariable { name: name.clone() }),
        ExprKind::Conversion { operand } => {
            let inner = eval_value(operand, store, registry, case_sensitive)?;
            Ok(inner.convert_to(expr.data_type()))
        }
        ExprKind::Binary { op, left, right } => {
            let l = eval_value(left, store, registry, case_sensitive)?;
            let r = eval_value(right, store, registry, case_sensitive)?;
            apply_binary(*op, expr.data_type(), l, r)
        }
        ExprKind::Compare { op, left, right } => {
            let l = eval_value(left, store, registry, case_sensitive)?;
            let r = eval_value(right, store, registry, case_sensitive)?;
            apply_compare(*op, left.data_type(), l, r)
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
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, store, registry, case_sensitive)?);
            }
            Ok(Value::Float((info.func)(&values)))
        }
    }
}

/// Apply a binary operator at the node's resolved type. Division and
/// exponentiation nodes are always floating point, so the integer branch
/// never sees them.
pub(crate) fn apply_binary(
    op: BinaryOp,
    data_type: DataType,
    l: Value,
    r: Value,
) -> Result<Value> {
    match data_type {
        DataType::FloatingPoint => Ok(Value::Float(apply_real(op, l.as_real(), r.as_real()))),
        DataType::Integer => match (l, r) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(apply_int(op, a, b)?)),
            _ => Err(CalcError::Internal("integer node with float operand")),
        },
    }
}

/// Apply a comparison at the unified operand type, yielding integer 1 or 0.
pub(crate) fn apply_compare(
    op: CompareOp,
    operand_type: DataType,
    l: Value,
    r: Value,
) -> Result<Value> {
    let outcome = match operand_type {
        DataType::FloatingPoint => compare_real(op, l.as_real(), r.as_real()),
        DataType::Integer => match (l, r) {
            (Value::Integer(a), Value::Integer(b)) => compare_int(op, a, b),
            _ => return Err(CalcError::Internal("integer comparison with float operand")),
        },
    };
    Ok(Value::Integer(outcome as i64))
}

/// Integer arithmetic wraps on overflow.
pub(crate) fn apply_int(op: BinaryOp, a: i64, b: i64) -> Result<i64> {
    match op {
        BinaryOp::Add => Ok(a.wrapping_add(b)),
        BinaryOp::Sub => Ok(a.wrapping_sub(b)),
        BinaryOp::Mul => Ok(a.wrapping_mul(b)),
        BinaryOp::Div | BinaryOp::Pow => {
            Err(CalcError::Internal("integer-typed division or power node"))
        }
    }
}

pub(crate) fn apply_real(op: BinaryOp, a: Real, b: Real) -> Real {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Pow => functions::pow(a, b),
    }
}

pub(crate) fn compare_int(op: CompareOp, a: i64, b: i64) -> bool {
    match op {
        CompareOp::Lt => a < b,
        CompareOp::Gt => a > b,
        CompareOp::Le => a <= b,
        CompareOp::Ge => a >= b,
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
    }
}

pub(crate) fn compare_real(op: CompareOp, a: Real, b: Real) -> bool {
    match op {
        CompareOp::Lt => a < b,
        CompareOp::Gt => a > b,
        CompareOp::Le => a <= b,
        CompareOp::Ge => a >= b,
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
    }
}
