//! Runtime variable bindings and the function/constant registry.
//!
//! The registry answers name-resolution queries from the parser and both
//! evaluation backends. The engine never mutates a registry during
//! evaluation; registration happens up front through
//! [`crate::CalculationEngine`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::Real;
use crate::error::{CalcError, Result};
use crate::types::{ConstantInfo, NativeFunction};

/// Runtime name → value bindings supplied per evaluation call.
///
/// A store is never shared mutably across concurrent calls: each
/// `calculate` or compiled-function invocation uses its own store.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct VariableStore {
    values: HashMap<String, Real>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a binding. Returns the previous value, if any.
    pub fn set(&mut self, name: impl Into<String>, value: Real) -> Option<Real> {
        self.values.insert(name.into(), value)
    }

    /// Look up a binding under the engine's case rule. Exact matches win;
    /// in case-insensitive mode a miss falls back to an ASCII
    /// case-insensitive scan.
    pub fn get(&self, name: &str, case_sensitive: bool) -> Option<Real> {
        if let Some(v) = self.values.get(name) {
            return Some(*v);
        }
        if !case_sensitive {
            return self
                .values
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| *v);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Real)> for VariableStore {
    fn from_iter<I: IntoIterator<Item = (S, Real)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Registry of named functions and constants resolvable from formulas.
///
/// Lookups are exact on the stored key; the engine normalizes keys (lower
/// casing in case-insensitive mode) before registration and before parsing,
/// so the case rule is applied uniformly in one place.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, NativeFunction>,
    constants: HashMap<String, ConstantInfo>,
}

impl FunctionRegistry {
    /// An empty registry with no functions or constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in math functions and the
    /// constants `pi` and `e`. The function set depends on the `libm`
    /// feature; see [`crate::functions`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::functions::register_defaults(&mut registry);
        registry
    }

    /// Register a function under `name`. Replacing an existing entry is
    /// only allowed when that entry is overwritable.
    pub fn register_function<F>(
        &mut self,
        name: &str,
        arity: usize,
        pure: bool,
        func: F,
    ) -> Result<()>
    where
        F: Fn(&[Real]) -> Real + Send + Sync + 'static,
    {
        if let Some(existing) = self.functions.get(name) {
            if !existing.overwritable {
                return Err(CalcError::NotOverwritable {
                    name: name.to_string(),
                });
            }
        }
        self.functions.insert(
            name.to_string(),
            NativeFunction {
                name: name.to_string(),
                arity,
                pure,
                overwritable: true,
                func: Arc::new(func),
            },
        );
        Ok(())
    }

    /// Register a constant under `name`, subject to the same overwrite rule
    /// as functions. Built-in constants (`pi`, `e`) are not overwritable.
    pub fn register_constant(&mut self, name: &str, value: Real) -> Result<()> {
        if let Some(existing) = self.constants.get(name) {
            if !existing.overwritable {
                return Err(CalcError::NotOverwritable {
                    name: name.to_string(),
                });
            }
        }
        self.constants.insert(
            name.to_string(),
            ConstantInfo {
                name: name.to_string(),
                value,
                overwritable: true,
            },
        );
        Ok(())
    }

    pub(crate) fn insert_builtin_function(
        &mut self,
        name: &str,
        arity: usize,
        func: crate::types::NativeFn,
    ) {
        self.functions.insert(
            name.to_string(),
            NativeFunction {
                name: name.to_string(),
                arity,
                pure: true,
                overwritable: true,
                func,
            },
        );
    }

    pub(crate) fn insert_builtin_constant(&mut self, name: &str, value: Real) {
        self.constants.insert(
            name.to_string(),
            ConstantInfo {
                name: name.to_string(),
                value,
                overwritable: false,
            },
        );
    }

    pub fn is_function_name(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn function_info(&self, name: &str) -> Option<&NativeFunction> {
        self.functions.get(name)
    }

    pub fn is_constant_name(&self, name: &str) -> bool {
        self.constants.contains_key(name)
    }

    pub fn constant_info(&self, name: &str) -> Option<&ConstantInfo> {
        self.constants.get(name)
    }
}
