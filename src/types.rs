//! Core data structures: the two-valued numeric type system, the tagged
//! numeric value, token classification, and the typed abstract syntax tree.
//!
//! The AST is a closed sum type over the fixed node kinds. Every node carries
//! its `DataType` and a `depends_on_variables` flag; both are computed
//! bottom-up by the smart constructors at build time and never recomputed.
//! Trees are immutable after construction: the optimizer produces new nodes
//! rather than mutating in place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Real;

/// The engine's two-valued numeric type.
///
/// `Integer` is a subset of `FloatingPoint` for promotion purposes: any
/// binary operation with one floating-point operand yields floating point.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    FloatingPoint,
}

impl DataType {
    /// Unify two operand types under the promotion rule.
    pub fn promote(a: DataType, b: DataType) -> DataType {
        if a == DataType::FloatingPoint || b == DataType::FloatingPoint {
            DataType::FloatingPoint
        } else {
            DataType::Integer
        }
    }
}

/// Tagged numeric payload capable of holding either an integer or a
/// floating-point value. This is the single value representation used by
/// constants and both evaluation backends.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Float(Real),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::FloatingPoint,
        }
    }

    /// Widen to the calculation float type.
    pub fn as_real(&self) -> Real {
        match *self {
            Value::Integer(v) => v as Real,
            Value::Float(v) => v,
        }
    }

    /// Cast to the target type. Float to integer truncates toward zero and
    /// saturates at the i64 range; NaN converts to 0.
    pub fn convert_to(&self, target: DataType) -> Value {
        match target {
            DataType::Integer => match *self {
                Value::Integer(v) => Value::Integer(v),
                Value::Float(v) => Value::Integer(v as i64),
            },
            DataType::FloatingPoint => Value::Float(self.as_real()),
        }
    }
}

/// Classifies the kind of token produced by the tokenizer.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TokenKind {
    /// An integer literal.
    Integer,
    /// A floating-point literal.
    FloatingPoint,
    /// An identifier: variable, constant, or function name.
    Identifier,
    /// An operator such as `+`, `*`, or `<=`.
    Operator,
    /// `(`
    LeftBracket,
    /// `)`
    RightBracket,
    /// Separator between function arguments.
    ArgumentSeparator,
}

/// Selects how `CalculationEngine::calculate` executes a formula.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Walk the tree recursively on every call.
    Interpreted,
    /// Flatten the tree once into a postfix program and run that.
    Compiled,
}

/// One formal parameter of a typed formula function. Order is significant:
/// parameters map one to one onto positional arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub data_type: DataType,
}

/// Arithmetic operator of a binary AST node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Comparison operator of a comparison AST node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

/// Signature of a registered function implementation.
pub type NativeFn = Arc<dyn Fn(&[Real]) -> Real + Send + Sync>;

/// A function registered with the engine, callable from formulas.
#[derive(Clone)]
pub struct NativeFunction {
    /// Name as used in formulas.
    pub name: String,
    /// Number of arguments the function takes, enforced at parse time.
    pub arity: usize,
    /// True when the function always returns the same output for the same
    /// inputs. Only pure functions participate in constant folding.
    pub pure: bool,
    /// Whether a later registration may replace this entry.
    pub overwritable: bool,
    /// The implementation.
    pub func: NativeFn,
}

/// A named constant resolvable at parse time.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantInfo {
    pub name: String,
    pub value: Real,
    pub overwritable: bool,
}

/// A typed AST node.
///
/// Nodes are only constructed through the smart constructors below, which
/// compute the data type via the promotion rule, insert [`ExprKind::Conversion`]
/// nodes where an operand's natural type differs from the node's unified
/// type, and derive `depends_on_variables` from the children.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub(crate) data_type: DataType,
    pub(crate) depends_on_variables: bool,
    pub(crate) kind: ExprKind,
}

/// The node variants of the typed AST.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// A literal value.
    Constant(Value),
    /// A reference to a variable resolved at evaluation time. Always
    /// floating point, because variable stores hold floats.
    Variable(String),
    /// Cast of the operand to this node's data type.
    Conversion { operand: Box<Expr> },
    /// Binary arithmetic. `Div` and `Pow` nodes are always floating point.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Comparison yielding integer 1 or 0. Operands are unified to a common
    /// type at construction.
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Call of a registered function. Arguments are floating point.
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// True if evaluating this subtree requires runtime variable bindings,
    /// or if it calls a function that is not pure.
    pub fn depends_on_variables(&self) -> bool {
        self.depends_on_variables
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn constant(value: Value) -> Expr {
        Expr {
            data_type: value.data_type(),
            depends_on_variables: false,
            kind: ExprKind::Constant(value),
        }
    }

    pub fn integer(value: i64) -> Expr {
        Expr::constant(Value::Integer(value))
    }

    pub fn float(value: Real) -> Expr {
        Expr::constant(Value::Float(value))
    }

    pub fn variable(name: impl Into<String>) -> Expr {
        Expr {
            data_type: DataType::FloatingPoint,
            depends_on_variables: true,
            kind: ExprKind::Variable(name.into()),
        }
    }

    /// Wrap `operand` in a conversion to `target`. Identity conversions are
    /// elided: converting a node to its own type returns it unchanged.
    pub fn convert(operand: Expr, target: DataType) -> Expr {
        if operand.data_type == target {
            return operand;
        }
        Expr {
            data_type: target,
            depends_on_variables: operand.depends_on_variables,
            kind: ExprKind::Conversion {
                operand: Box::new(operand),
            },
        }
    }

    /// Build a binary arithmetic node. Addition, subtraction, and
    /// multiplication follow the promotion rule; division and exponentiation
    /// always promote to floating point so that `1/2` and `1/0` behave as
    /// IEEE float operations.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let data_type = match op {
            BinaryOp::Div | BinaryOp::Pow => DataType::FloatingPoint,
            _ => DataType::promote(left.data_type, right.data_type),
        };
        let left = Expr::convert(left, data_type);
        let right = Expr::convert(right, data_type);
        Expr {
            data_type,
            depends_on_variables: left.depends_on_variables || right.depends_on_variables,
            kind: ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    /// Build a comparison node. Operands are unified to their promoted type;
    /// the result is integer 1 or 0.
    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Expr {
        let operand_type = DataType::promote(left.data_type, right.data_type);
        let left = Expr::convert(left, operand_type);
        let right = Expr::convert(right, operand_type);
        Expr {
            data_type: DataType::Integer,
            depends_on_variables: left.depends_on_variables || right.depends_on_variables,
            kind: ExprKind::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    /// Build a function call node. Arguments are converted to floating point
    /// because registered functions take float slices. A call to a non-pure
    /// function depends on more than its arguments, so it is never treated
    /// as a constant subtree.
    pub fn call(name: impl Into<String>, args: Vec<Expr>, pure: bool) -> Expr {
        let args: Vec<Expr> = args
            .into_iter()
            .map(|a| Expr::convert(a, DataType::FloatingPoint))
            .collect();
        let depends = !pure || args.iter().any(|a| a.depends_on_variables);
        Expr {
            data_type: DataType::FloatingPoint,
            depends_on_variables: depends,
            kind: ExprKind::Call {
                name: name.into(),
                args,
            },
        }
    }

    /// Desugar unary minus into `0 - operand` of the operand's type.
    pub fn negate(operand: Expr) -> Expr {
        let zero = match operand.data_type {
            DataType::Integer => Expr::integer(0),
            DataType::FloatingPoint => Expr::float(0.0),
        };
        Expr::binary(BinaryOp::Sub, zero, operand)
    }

    /// Rebuild a node from already-typed parts. Used by the optimizer, which
    /// replaces children without changing their data types.
    pub(crate) fn from_parts(data_type: DataType, depends_on_variables: bool, kind: ExprKind) -> Expr {
        Expr {
            data_type,
            depends_on_variables,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_rule() {
        assert_eq!(
            DataType::promote(DataType::Integer, DataType::Integer),
            DataType::Integer
        );
        assert_eq!(
            DataType::promote(DataType::Integer, DataType::FloatingPoint),
            DataType::FloatingPoint
        );
        assert_eq!(
            DataType::promote(DataType::FloatingPoint, DataType::Integer),
            DataType::FloatingPoint
        );
    }

    #[test]
    fn test_value_conversion_truncates_toward_zero() {
        assert_eq!(
            Value::Float(2.9).convert_to(DataType::Integer),
            Value::Integer(2)
        );
        assert_eq!(
            Value::Float(-2.9).convert_to(DataType::Integer),
            Value::Integer(-2)
        );
        assert_eq!(
            Value::Integer(3).convert_to(DataType::FloatingPoint),
            Value::Float(3.0)
        );
    }

    #[test]
    fn test_value_conversion_saturates() {
        assert_eq!(
            Value::Float(Real::INFINITY).convert_to(DataType::Integer),
            Value::Integer(i64::MAX)
        );
        assert_eq!(
            Value::Float(Real::NEG_INFINITY).convert_to(DataType::Integer),
            Value::Integer(i64::MIN)
        );
        assert_eq!(
            Value::Float(Real::NAN).convert_to(DataType::Integer),
            Value::Integer(0)
        );
    }

    #[test]
    fn test_binary_integer_stays_integer() {
        let node = Expr::binary(BinaryOp::Add, Expr::integer(2), Expr::integer(3));
        assert_eq!(node.data_type(), DataType::Integer);
        assert!(!node.depends_on_variables());
    }

    #[test]
    fn test_binary_mixed_promotes_and_inserts_conversion() {
        let node = Expr::binary(BinaryOp::Mul, Expr::integer(2), Expr::float(3.5));
        assert_eq!(node.data_type(), DataType::FloatingPoint);
        match node.kind() {
            ExprKind::Binary { left, .. } => match left.kind() {
                ExprKind::Conversion { operand } => {
                    assert_eq!(operand.data_type(), DataType::Integer);
                    assert_eq!(left.data_type(), DataType::FloatingPoint);
                }
                other => panic!("expected conversion around integer operand, got {other:?}"),
            },
            other => panic!("expected binary node, got {other:?}"),
        }
    }

    #[test]
    fn test_division_always_floating_point() {
        let node = Expr::binary(BinaryOp::Div, Expr::integer(1), Expr::integer(2));
        assert_eq!(node.data_type(), DataType::FloatingPoint);
    }

    #[test]
    fn test_identity_conversion_elided() {
        let node = Expr::convert(Expr::integer(1), DataType::Integer);
        assert!(matches!(node.kind(), ExprKind::Constant(_)));
    }

    #[test]
    fn test_call_depends_on_variables_when_not_pure() {
        let pure = Expr::call("sin", vec![Expr::float(1.0)], true);
        assert!(!pure.depends_on_variables());
        let impure = Expr::call("random", vec![], false);
        assert!(impure.depends_on_variables());
    }

    #[test]
    fn test_variable_dependency_propagates() {
        let node = Expr::binary(
            BinaryOp::Add,
            Expr::integer(1),
            Expr::binary(BinaryOp::Mul, Expr::variable("x"), Expr::integer(2)),
        );
        assert!(node.depends_on_variables());
    }
}
