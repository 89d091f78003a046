#![doc = r#"
# calc-engine

An embeddable math expression engine for Rust.

## Overview

calc-engine turns a formula string and a set of named variables into a numeric
result, and can also produce a reusable, typed, natively callable function for
repeated fast evaluation with different variable bindings. It is designed for
host applications (spreadsheets, calculators, scripting layers) that evaluate
user-supplied arithmetic formulas many times with varying inputs.

Key features:
- Typed abstract syntax tree: every node carries an `Integer` or
  `FloatingPoint` data type, with explicit conversion nodes inserted where
  operand types must be unified
- Two execution backends: a tree-walking interpreter for one-shot evaluation
  and a compiled fast path that flattens the tree into a postfix program
  executed by a tight value-stack loop
- Constant-folding optimizer for subtrees that do not depend on variables
- Typed function builder: declare ordered parameters and a result type, get
  back a callable whose positional arguments are marshaled into the variable
  bindings automatically
- Built-in math functions (sin, cos, sqrt, ...) and constants (pi, e) that can
  be extended or overridden at runtime
- Thread-safe formula cache so identical formulas are parsed only once

## Quick Start

```rust
use calc_engine::{CalculationEngine, VariableStore};

let engine = CalculationEngine::new();
let vars = VariableStore::new();

let result = engine.calculate("2 + 3 * 4", &vars).unwrap();
assert_eq!(result, 14.0);
```

## Variables

```rust
use calc_engine::{CalculationEngine, VariableStore};

let engine = CalculationEngine::new();

let mut vars = VariableStore::new();
vars.set("var1", 2.0);
vars.set("var2", 4.0);

let result = engine.calculate("var1 + var2 * 3", &vars).unwrap();
assert_eq!(result, 14.0);
```

## Typed formula functions

For repeated evaluation, build a typed function once and call it many times:

```rust
use calc_engine::{CalculationEngine, DataType};

let engine = CalculationEngine::new();

let formula = engine
    .formula("a + b")
    .parameter("a", DataType::Integer)
    .parameter("b", DataType::Integer)
    .result(DataType::FloatingPoint)
    .build()
    .unwrap();

assert_eq!(formula.call(&[2.0, 3.0]).unwrap(), 5.0);
```

## Custom functions and constants

```rust
use calc_engine::{CalculationEngine, VariableStore};

let mut engine = CalculationEngine::new();
engine.register_function("hypotenuse", 2, true, |args| {
    (args[0] * args[0] + args[1] * args[1]).sqrt()
}).unwrap();

let result = engine.calculate("hypotenuse(3, 4)", &VariableStore::new()).unwrap();
assert_eq!(result, 5.0);
```

## Numeric semantics

- Integer-typed arithmetic (`+`, `-`, `*` over integer operands) wraps on
  overflow using two's complement `i64` semantics.
- Division and exponentiation always promote to floating point, so `1/0`
  evaluates to positive infinity under IEEE semantics rather than failing.
- Floating point to integer conversion truncates toward zero and saturates at
  the `i64` range.

## Feature Flags

- `libm`: enabled by default; backs the built-in math function set. Without
  it only the portable functions (abs, sign, max, min, pow) are registered and
  you must register your own implementations for the rest.
- `f32`: use 32-bit floating point for calculations instead of the default 64-bit.
"#]

pub mod builder;
pub mod compile;
pub mod context;
pub mod engine;
pub mod error;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod types;

pub use builder::{CompiledFormula, FunctionBuilder};
pub use context::{FunctionRegistry, VariableStore};
pub use engine::{CalculationEngine, EngineConfig, calculate};
pub use error::{CalcError, Result};
pub use types::{DataType, ExecutionMode, ParameterInfo, Value};

/// Floating-point type used for all calculations, selected by feature flags.
#[cfg(feature = "f32")]
pub type Real = f32;

#[cfg(not(feature = "f32"))]
pub type Real = f64;

pub mod constants {
    use super::Real;

    #[cfg(feature = "f32")]
    pub const PI: Real = core::f32::consts::PI;
    #[cfg(feature = "f32")]
    pub const E: Real = core::f32::consts::E;
    #[cfg(feature = "f32")]
    pub const TEST_PRECISION: Real = 1e-6;

    #[cfg(not(feature = "f32"))]
    pub const PI: Real = core::f64::consts::PI;
    #[cfg(not(feature = "f32"))]
    pub const E: Real = core::f64::consts::E;
    #[cfg(not(feature = "f32"))]
    pub const TEST_PRECISION: Real = 1e-10;
}

/// Utility macro to check that two floating point values are approximately
/// equal within a specified epsilon. NaN equals NaN and same-signed infinities
/// compare equal for the purposes of this macro.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($left, $right, $crate::constants::TEST_PRECISION)
    };
    ($left:expr, $right:expr, $epsilon:expr $(,)?) => {{
        let left_val: $crate::Real = $left;
        let right_val: $crate::Real = $right;
        let eps: $crate::Real = $epsilon;

        if left_val.is_nan() && right_val.is_nan() {
            // NaN == NaN for our purposes
        } else if left_val.is_infinite()
            && right_val.is_infinite()
            && left_val.signum() == right_val.signum()
        {
            // Same-signed infinities are equal
        } else {
            assert!(
                (left_val - right_val).abs() < eps,
                "assertion failed: `(left ≈ right)` (left: `{}`, right: `{}`, epsilon: `{}`)",
                left_val,
                right_val,
                eps
            );
        }
    }};
}
