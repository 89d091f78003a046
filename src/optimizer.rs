//! Constant folding.
//!
//! Any subtree whose `depends_on_variables` flag is false evaluates to the
//! same value on every call, so it is collapsed into a single constant node
//! of the same data type. Folding runs top-down: once a subtree folds, its
//! children are never visited. Subtrees that reference variables or call
//! non-pure functions are rebuilt with folded children, keeping their node
//! type and dependency flag untouched.

use crate::context::{FunctionRegistry, VariableStore};
use crate::error::Result;
use crate::eval;
use crate::types::{Expr, ExprKind};

/// Fold constant subtrees of `expr` into constant nodes. The result is
/// semantically identical to the input and a second pass is a no-op.
pub fn optimize(expr: &Expr, registry: &FunctionRegistry) -> Result<Expr> {
    if !expr.depends_on_variables() {
        if matches!(expr.kind(), ExprKind::Constant(_)) {
            return Ok(expr.clone());
        }
        // Constant subtrees never touch variables, so an empty store and the
        // case rule are irrelevant here.
        let value = eval::eval_value(expr, &VariableStore::new(), registry, true)?;
        return Ok(Expr::constant(value.convert_to(expr.data_type())));
    }

    let kind = match expr.kind() {
        ExprKind::Conversion { operand } => ExprKind::Conversion {
            operand: Box::new(optimize(operand, registry)?),
        },
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op: *op,
            left: Box::new(optimize(left, registry)?),
            right: Box::new(optimize(right, registry)?),
        },
        ExprKind::Compare { op, left, right } => ExprKind::Compare {
            op: *op,
            left: Box::new(optimize(left, registry)?),
            right: Box::new(optimize(right, registry)?),
        },
        ExprKind::Call { name, args } => ExprKind::Call {
            name: name.clone(),
            args: args
                .iter()
                .map(|a| optimize(a, registry))
                .collect::<Result<Vec<_>>>()?,
        },
        ExprKind::Constant(_) | ExprKind::Variable(_) => expr.kind().clone(),
    };
    Ok(Expr::from_parts(
        expr.data_type(),
        expr.depends_on_variables(),
        kind,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use crate::types::{DataType, Value};

    fn optimized(formula: &str) -> Expr {
        let registry = FunctionRegistry::with_defaults();
        let ast = parse_formula(formula, &registry, '.', true).unwrap();
        optimize(&ast, &registry).unwrap()
    }

    fn node_count(e: &Expr) -> usize {
        1 + match e.kind() {
            ExprKind::Constant(_) | ExprKind::Variable(_) => 0,
            ExprKind::Conversion { operand } => node_count(operand),
            ExprKind::Binary { left, right, .. } | ExprKind::Compare { left, right, .. } => {
                node_count(left) + node_count(right)
            }
            ExprKind::Call { args, .. } => args.iter().map(node_count).sum(),
        }
    }

    #[test]
    fn test_fully_constant_tree_folds_to_one_node() {
        let e = optimized("2+3*7");
        assert_eq!(e.kind(), &ExprKind::Constant(Value::Integer(23)));
        assert_eq!(e.data_type(), DataType::Integer);
    }

    #[test]
    fn test_folded_constant_keeps_node_type() {
        // division folds to a float constant even with integer literals
        let e = optimized("6/3");
        assert_eq!(e.kind(), &ExprKind::Constant(Value::Float(2.0)));
        assert_eq!(e.data_type(), DataType::FloatingPoint);
    }

    #[test]
    fn test_constant_subtree_inside_variable_tree_folds() {
        let e = optimized("x + 2*3");
        assert!(e.depends_on_variables());
        match e.kind() {
            ExprKind::Binary { left, right, .. } => {
                assert!(matches!(
                    left.kind(),
                    ExprKind::Variable(name) if name == "x"
                ));
                // the conversion wrapping 2*3 is itself constant, so the
                // whole right side folds to one float constant
                assert_eq!(right.kind(), &ExprKind::Constant(Value::Float(6.0)));
            }
            other => panic!("expected binary root, got {other:?}"),
        }
    }

    #[test]
    fn test_pure_function_of_constants_folds() {
        let e = optimized("max(2, 3) + x");
        match e.kind() {
            ExprKind::Binary { left, .. } => {
                assert_eq!(left.kind(), &ExprKind::Constant(Value::Float(3.0)));
            }
            other => panic!("expected binary root, got {other:?}"),
        }
    }

    #[test]
    fn test_non_pure_function_not_folded() {
        let mut registry = FunctionRegistry::with_defaults();
        registry
            .register_function("roll", 0, false, |_| 4.0)
            .unwrap();
        let ast = parse_formula("roll() + 1", &registry, '.', true).unwrap();
        let e = optimize(&ast, &registry).unwrap();
        assert!(e.depends_on_variables());
        assert!(matches!(e.kind(), ExprKind::Binary { .. }));
    }

    #[test]
    fn test_idempotent() {
        let registry = FunctionRegistry::with_defaults();
        for formula in ["2+3*7", "x*2 + 3^2", "max(1, x) < 4"] {
            let ast = parse_formula(formula, &registry, '.', true).unwrap();
            let once = optimize(&ast, &registry).unwrap();
            let twice = optimize(&once, &registry).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_optimization_preserves_semantics() {
        let registry = FunctionRegistry::with_defaults();
        let mut vars = VariableStore::new();
        vars.set("x", 1.75);
        for formula in [
            "x + 2*3",
            "2^3 + x*4",
            "(x < 3) * 10 + (x >= 3) * 20",
            "max(2, 3) / x",
        ] {
            let ast = parse_formula(formula, &registry, '.', true).unwrap();
            let opt = optimize(&ast, &registry).unwrap();
            assert!(node_count(&opt) <= node_count(&ast));
            assert_eq!(
                eval::evaluate(&ast, &vars, &registry, true).unwrap(),
                eval::evaluate(&opt, &vars, &registry, true).unwrap()
            );
        }
    }
}
