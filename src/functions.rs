//! Built-in mathematical functions.
//!
//! The transcendental set is backed by the `libm` crate so results do not
//! depend on the platform's libc, with f32 or f64 variants selected by the
//! `f32` feature. When the `libm` feature is disabled only the portable
//! functions (abs, sign, max, min, pow) are registered and hosts register
//! their own implementations for the rest.

#[cfg(all(feature = "libm", feature = "f32"))]
use libm::{
    acosf as libm_acos, asinf as libm_asin, atan2f as libm_atan2, atanf as libm_atan,
    ceilf as libm_ceil, cosf as libm_cos, coshf as libm_cosh, expf as libm_exp,
    floorf as libm_floor, log10f as libm_log10, logf as libm_ln, sinf as libm_sin,
    sinhf as libm_sinh, sqrtf as libm_sqrt, tanf as libm_tan, tanhf as libm_tanh,
};

#[cfg(all(feature = "libm", not(feature = "f32")))]
use libm::{
    acos as libm_acos, asin as libm_asin, atan as libm_atan, atan2 as libm_atan2,
    ceil as libm_ceil, cos as libm_cos, cosh as libm_cosh, exp as libm_exp, floor as libm_floor,
    log as libm_ln, log10 as libm_log10, sin as libm_sin, sinh as libm_sinh, sqrt as libm_sqrt,
    tan as libm_tan, tanh as libm_tanh,
};

use std::sync::Arc;

use crate::Real;
use crate::context::FunctionRegistry;

/// Exponentiation helper shared by the `^` operator, the `pow` built-in,
/// and both evaluation backends, so interpreted and compiled results are
/// bit-identical.
#[cfg(all(feature = "libm", feature = "f32"))]
pub fn pow(a: Real, b: Real) -> Real {
    libm::powf(a, b)
}

#[cfg(all(feature = "libm", not(feature = "f32")))]
pub fn pow(a: Real, b: Real) -> Real {
    libm::pow(a, b)
}

#[cfg(not(feature = "libm"))]
pub fn pow(a: Real, b: Real) -> Real {
    a.powf(b)
}

pub fn abs(a: Real) -> Real {
    a.abs()
}

/// -1, 0, or 1 by the sign of the argument; NaN propagates.
pub fn sign(a: Real) -> Real {
    if a.is_nan() {
        a
    } else if a > 0.0 {
        1.0
    } else if a < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub fn max(a: Real, b: Real) -> Real {
    if a > b { a } else { b }
}

pub fn min(a: Real, b: Real) -> Real {
    if a < b { a } else { b }
}

/// Register the default function set and the constants `pi` and `e` into a
/// registry. All built-in functions are pure and overwritable; the two
/// constants are not overwritable.
pub fn register_defaults(registry: &mut FunctionRegistry) {
    registry.insert_builtin_constant("pi", crate::constants::PI);
    registry.insert_builtin_constant("e", crate::constants::E);

    registry.insert_builtin_function("abs", 1, Arc::new(|args| abs(args[0])));
    registry.insert_builtin_function("sign", 1, Arc::new(|args| sign(args[0])));
    registry.insert_builtin_function("max", 2, Arc::new(|args| max(args[0], args[1])));
    registry.insert_builtin_function("min", 2, Arc::new(|args| min(args[0], args[1])));
    registry.insert_builtin_function("pow", 2, Arc::new(|args| pow(args[0], args[1])));

    #[cfg(feature = "libm")]
    {
        registry.insert_builtin_function("sin", 1, Arc::new(|args| libm_sin(args[0])));
        registry.insert_builtin_function("cos", 1, Arc::new(|args| libm_cos(args[0])));
        registry.insert_builtin_function("tan", 1, Arc::new(|args| libm_tan(args[0])));
        registry.insert_builtin_function("asin", 1, Arc::new(|args| libm_asin(args[0])));
        registry.insert_builtin_function("acos", 1, Arc::new(|args| libm_acos(args[0])));
        registry.insert_builtin_function("atan", 1, Arc::new(|args| libm_atan(args[0])));
        registry.insert_builtin_function("atan2", 2, Arc::new(|args| libm_atan2(args[0], args[1])));
        registry.insert_builtin_function("sinh", 1, Arc::new(|args| libm_sinh(args[0])));
        registry.insert_builtin_function("cosh", 1, Arc::new(|args| libm_cosh(args[0])));
        registry.insert_builtin_function("tanh", 1, Arc::new(|args| libm_tanh(args[0])));
        registry.insert_builtin_function("exp", 1, Arc::new(|args| libm_exp(args[0])));
        registry.insert_builtin_function("ln", 1, Arc::new(|args| libm_ln(args[0])));
        registry.insert_builtin_function("log10", 1, Arc::new(|args| libm_log10(args[0])));
        registry.insert_builtin_function("sqrt", 1, Arc::new(|args| libm_sqrt(args[0])));
        registry.insert_builtin_function("ceil", 1, Arc::new(|args| libm_ceil(args[0])));
        registry.insert_builtin_function("floor", 1, Arc::new(|args| libm_floor(args[0])));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign() {
        assert_eq!(sign(42.0), 1.0);
        assert_eq!(sign(-0.5), -1.0);
        assert_eq!(sign(0.0), 0.0);
        assert!(sign(Real::NAN).is_nan());
    }

    #[test]
    fn test_min_max() {
        assert_eq!(max(1.0, 2.0), 2.0);
        assert_eq!(min(1.0, 2.0), 1.0);
    }

    #[cfg(feature = "libm")]
    #[test]
    fn test_defaults_registered() {
        let registry = FunctionRegistry::with_defaults();
        for name in [
            "sin", "cos", "tan", "asin", "acos", "atan", "atan2", "sinh", "cosh", "tanh", "exp",
            "ln", "log10", "sqrt", "ceil", "floor", "abs", "sign", "max", "min", "pow",
        ] {
            assert!(registry.is_function_name(name), "missing builtin {name}");
        }
        assert!(registry.is_constant_name("pi"));
        assert!(registry.is_constant_name("e"));
    }

    #[cfg(feature = "libm")]
    #[test]
    fn test_pow_matches_operator_helper() {
        let registry = FunctionRegistry::with_defaults();
        let f = &registry.function_info("pow").unwrap().func;
        assert_eq!(f(&[2.0, 10.0]), pow(2.0, 10.0));
    }
}
