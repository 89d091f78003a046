//! The calculation engine facade.
//!
//! Owns the configuration, the function registry, and a concurrent cache of
//! parsed formulas keyed by formula text. `calculate` is `&self` and safe to
//! call from many threads at once; registration is `&mut self` and clears
//! the cache because cached programs hold resolved function pointers.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::Real;
use crate::builder::FunctionBuilder;
use crate::compile::{self, Program};
use crate::context::{FunctionRegistry, VariableStore};
use crate::error::Result;
use crate::eval;
use crate::optimizer;
use crate::parser;
use crate::types::{Expr, ExecutionMode};

/// Engine configuration, fixed for the lifetime of an engine instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Decimal separator for number literals. When `,`, the argument
    /// separator becomes `;`.
    pub decimal_separator: char,
    /// Whether identifier and variable matching is case sensitive.
    pub case_sensitive: bool,
    /// Backend used by [`CalculationEngine::calculate`].
    pub execution_mode: ExecutionMode,
    /// Whether constant subtrees are folded after parsing.
    pub optimizer_enabled: bool,
    /// Whether parsed formulas are cached by formula text.
    pub cache_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            case_sensitive: false,
            execution_mode: ExecutionMode::Compiled,
            optimizer_enabled: true,
            cache_enabled: true,
        }
    }
}

/// A parsed (and possibly optimized) formula held by the engine cache. The
/// compiled program is produced lazily on first compiled-mode use.
pub(crate) struct ParsedFormula {
    ast: Arc<Expr>,
    program: OnceLock<Arc<Program>>,
}

impl ParsedFormula {
    fn new(ast: Expr) -> Self {
        Self {
            ast: Arc::new(ast),
            program: OnceLock::new(),
        }
    }

    pub(crate) fn ast(&self) -> &Arc<Expr> {
        &self.ast
    }

    /// The compiled form, building it on first use. A losing racer compiles
    /// redundantly and drops its copy.
    pub(crate) fn program(&self, registry: &FunctionRegistry) -> Result<Arc<Program>> {
        if let Some(program) = self.program.get() {
            return Ok(program.clone());
        }
        let compiled = Arc::new(compile::compile(&self.ast, registry)?);
        Ok(self.program.get_or_init(|| compiled).clone())
    }
}

/// Parses, optimizes, caches, and evaluates formulas.
///
/// ```
/// use calc_engine::{CalculationEngine, VariableStore};
///
/// let engine = CalculationEngine::new();
/// let mut vars = VariableStore::new();
/// vars.set("var1", 2.0);
/// let result = engine.calculate("var1 * (3 + 4)", &vars).unwrap();
/// assert_eq!(result, 14.0);
/// ```
pub struct CalculationEngine {
    config: EngineConfig,
    registry: Arc<FunctionRegistry>,
    cache: DashMap<String, Arc<ParsedFormula>>,
}

impl Default for CalculationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CalculationEngine {
    /// An engine with the default configuration and the built-in function
    /// set.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            registry: Arc::new(FunctionRegistry::with_defaults()),
            cache: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Register a function callable from formulas. The name is folded under
    /// the engine's case rule. Fails with [`crate::CalcError::NotOverwritable`]
    /// when the name is taken by a protected entry.
    ///
    /// Clears the formula cache: cached programs hold function pointers
    /// resolved against the previous registry.
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
        let name = self.fold(name);
        Arc::make_mut(&mut self.registry).register_function(&name, arity, pure, func)?;
        self.cache.clear();
        Ok(())
    }

    /// Register a named constant resolvable at parse time. Subject to the
    /// same overwrite and case rules as functions.
    pub fn register_constant(&mut self, name: &str, value: Real) -> Result<()> {
        let name = self.fold(name);
        Arc::make_mut(&mut self.registry).register_constant(&name, value)?;
        self.cache.clear();
        Ok(())
    }

    /// Evaluate a formula against the given variables, using the configured
    /// execution mode.
    pub fn calculate(&self, formula: &str, vars: &VariableStore) -> Result<Real> {
        let parsed = self.parsed(formula)?;
        match self.config.execution_mode {
            ExecutionMode::Interpreted => eval::evaluate(
                parsed.ast(),
                vars,
                &self.registry,
                self.config.case_sensitive,
            ),
            ExecutionMode::Compiled => parsed
                .program(&self.registry)?
                .run(vars, self.config.case_sensitive),
        }
    }

    /// Start building a typed function from a formula. See
    /// [`FunctionBuilder`].
    pub fn formula(&self, text: impl Into<String>) -> FunctionBuilder<'_> {
        FunctionBuilder::new(self, text.into())
    }

    /// Fetch a formula from the cache, parsing and optimizing on a miss.
    pub(crate) fn parsed(&self, formula: &str) -> Result<Arc<ParsedFormula>> {
        if self.config.cache_enabled {
            if let Some(hit) = self.cache.get(formula) {
                return Ok(hit.clone());
            }
        }

        let mut ast = parser::parse_formula(
            formula,
            &self.registry,
            self.config.decimal_separator,
            self.config.case_sensitive,
        )?;
        if self.config.optimizer_enabled {
            ast = optimizer::optimize(&ast, &self.registry)?;
        }
        let parsed = Arc::new(ParsedFormula::new(ast));

        if self.config.cache_enabled {
            self.cache.insert(formula.to_string(), parsed.clone());
        }
        Ok(parsed)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of formulas currently cached.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn fold(&self, name: &str) -> String {
        if self.config.case_sensitive {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        }
    }
}

/// Evaluate a single formula with a throwaway default engine. Convenient for
/// one-off calculations; repeated evaluation should use a shared
/// [`CalculationEngine`] to benefit from the cache.
pub fn calculate(formula: &str, vars: &VariableStore) -> Result<Real> {
    CalculationEngine::new().calculate(formula, vars)
}
