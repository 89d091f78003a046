//! Typed function builder: turns a formula into a callable with a declared
//! parameter list and result type.
//!
//! The builder borrows the engine for its configuration, registry, and
//! formula cache; the [`CompiledFormula`] it produces is self-contained and
//! owns clones of everything it needs, so it outlives the borrow and can be
//! moved across threads.

use std::sync::Arc;

use crate::Real;
use crate::compile::Program;
use crate::context::{FunctionRegistry, VariableStore};
use crate::engine::CalculationEngine;
use crate::error::{CalcError, Result};
use crate::eval;
use crate::types::{DataType, Expr, ParameterInfo, Value};

/// Builds a [`CompiledFormula`] from a formula string. Obtained from
/// [`CalculationEngine::formula`]; methods consume and return the builder so
/// a finished build cannot be reused.
///
/// ```
/// use calc_engine::{CalculationEngine, DataType};
///
/// let engine = CalculationEngine::new();
/// let f = engine
///     .formula("a + b * 2")
///     .parameter("a", DataType::FloatingPoint)
///     .parameter("b", DataType::FloatingPoint)
///     .result(DataType::FloatingPoint)
///     .build()
///     .unwrap();
/// assert_eq!(f.call(&[1.0, 2.0]).unwrap(), 5.0);
/// ```
pub struct FunctionBuilder<'e> {
    engine: &'e CalculationEngine,
    formula: String,
    parameters: Vec<ParameterInfo>,
    result_type: Option<DataType>,
}

impl<'e> FunctionBuilder<'e> {
    pub(crate) fn new(engine: &'e CalculationEngine, formula: String) -> Self {
        Self {
            engine,
            formula,
            parameters: Vec::new(),
            result_type: None,
        }
    }

    /// Declare the next positional parameter. The name is folded under the
    /// engine's case rule.
    pub fn parameter(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        let name = if self.engine.config().case_sensitive {
            name
        } else {
            name.to_ascii_lowercase()
        };
        self.parameters.push(ParameterInfo { name, data_type });
        self
    }

    /// Declare the result type. Required; [`build`](Self::build) fails
    /// without it.
    pub fn result(mut self, data_type: DataType) -> Self {
        self.result_type = Some(data_type);
        self
    }

    /// Parse the formula and produce the callable. Parse errors and a
    /// missing result type surface here, never at call time.
    pub fn build(self) -> Result<CompiledFormula> {
        let result_type = self.result_type.ok_or(CalcError::MissingResultType)?;
        let parsed = self.engine.parsed(&self.formula)?;
        let config = self.engine.config();
        let registry = self.engine.registry().clone();

        let evaluator = match config.execution_mode {
            crate::ExecutionMode::Interpreted => Evaluator::Interpreted(parsed.ast().clone()),
            crate::ExecutionMode::Compiled => Evaluator::Compiled(parsed.program(&registry)?),
        };

        Ok(CompiledFormula {
            formula: self.formula,
            parameters: self.parameters,
            result_type,
            case_sensitive: config.case_sensitive,
            registry,
            evaluator,
        })
    }
}

enum Evaluator {
    Interpreted(Arc<Expr>),
    Compiled(Arc<Program>),
}

/// A formula bound to a typed signature. Call it positionally through
/// [`call`](Self::call) or adapt it to a fixed-arity closure with the
/// `bind` methods.
pub struct CompiledFormula {
    formula: String,
    parameters: Vec<ParameterInfo>,
    result_type: DataType,
    case_sensitive: bool,
    registry: Arc<FunctionRegistry>,
    evaluator: Evaluator,
}

impl core::fmt::Debug for CompiledFormula {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompiledFormula")
            .field("formula", &self.formula)
            .field("parameters", &self.parameters)
            .field("result_type", &self.result_type)
            .field("case_sensitive", &self.case_sensitive)
            .finish_non_exhaustive()
    }
}

impl CompiledFormula {
    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    pub fn result_type(&self) -> DataType {
        self.result_type
    }

    /// Invoke with positional arguments, one per declared parameter.
    /// Integer-typed parameters truncate their argument toward zero before
    /// evaluation; an integer result type truncates the final value.
    pub fn call(&self, args: &[Real]) -> Result<Real> {
        if args.len() != self.parameters.len() {
            return Err(CalcError::ArgumentCountMismatch {
                name: self.formula.clone(),
                expected: self.parameters.len(),
                found: args.len(),
            });
        }

        let store: VariableStore = self
            .parameters
            .iter()
            .zip(args)
            .map(|(param, &arg)| {
                let value = match param.data_type {
                    DataType::Integer => Value::Float(arg)
                        .convert_to(DataType::Integer)
                        .as_real(),
                    DataType::FloatingPoint => arg,
                };
                (param.name.clone(), value)
            })
            .collect();

        let raw = match &self.evaluator {
            Evaluator::Interpreted(ast) => {
                eval::evaluate(ast, &store, &self.registry, self.case_sensitive)?
            }
            Evaluator::Compiled(program) => program.run(&store, self.case_sensitive)?,
        };

        Ok(match self.result_type {
            DataType::Integer => Value::Float(raw).convert_to(DataType::Integer).as_real(),
            DataType::FloatingPoint => raw,
        })
    }

    /// Adapt to a one-argument closure. Fails now, not at call time, if the
    /// signature has a different parameter count.
    pub fn bind1(self) -> Result<impl Fn(Real) -> Result<Real>> {
        self.check_bind_arity(1)?;
        Ok(move |a| self.call(&[a]))
    }

    pub fn bind2(self) -> Result<impl Fn(Real, Real) -> Result<Real>> {
        self.check_bind_arity(2)?;
        Ok(move |a, b| self.call(&[a, b]))
    }

    pub fn bind3(self) -> Result<impl Fn(Real, Real, Real) -> Result<Real>> {
        self.check_bind_arity(3)?;
        Ok(move |a, b, c| self.call(&[a, b, c]))
    }

    pub fn bind4(self) -> Result<impl Fn(Real, Real, Real, Real) -> Result<Real>> {
        self.check_bind_arity(4)?;
        Ok(move |a, b, c, d| self.call(&[a, b, c, d]))
    }

    fn check_bind_arity(&self, expected: usize) -> Result<()> {
        if self.parameters.len() != expected {
            return Err(CalcError::ArgumentCountMismatch {
                name: self.formula.clone(),
                expected,
                found: self.parameters.len(),
            });
        }
        Ok(())
    }
}
