//! Error types for formula parsing, compilation, and evaluation.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = core::result::Result<T, CalcError>;

/// Error type for formula parsing and evaluation.
///
/// All errors are reported synchronously to the caller; the engine has no
/// transient failure conditions and never retries internally. Division by
/// zero is deliberately NOT an error: it follows IEEE floating-point
/// semantics and yields infinity or NaN.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    /// The formula string was empty or contained only whitespace.
    #[error("formula is empty")]
    EmptyInput,

    /// The tokenizer or parser hit a character or token it cannot accept at
    /// this position. Unparseable numeric runs and unknown characters report
    /// this error instead of being silently dropped.
    #[error("unexpected token at position {position}: '{found}'")]
    UnexpectedToken { position: usize, found: String },

    /// A left bracket was never closed.
    #[error("missing closing bracket for '(' opened at position {position}")]
    MissingClosingBracket { position: usize },

    /// A name was used in call position but is not a registered function.
    #[error("unknown function: '{name}'")]
    UnknownFunction { name: String },

    /// A variable referenced by the formula was absent from the variable
    /// store at evaluation time.
    #[error("unknown variable: '{name}'")]
    UnknownVariable { name: String },

    /// A function was called with the wrong number of arguments, or a typed
    /// formula function was invoked with the wrong number of positional
    /// arguments.
    #[error("'{name}' expects {expected} arguments, found {found}")]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// `FunctionBuilder::build` was called before a result type was declared.
    #[error("result type must be declared before building a formula function")]
    MissingResultType,

    /// Attempt to overwrite a built-in function or constant that is not
    /// marked overwritable.
    #[error("'{name}' is not overwritable")]
    NotOverwritable { name: String },

    /// The formula nests deeper than the parser's recursion limit.
    #[error("formula too deeply nested: exceeded recursion depth {limit}")]
    RecursionLimit { limit: usize },

    /// Invariant violation inside an evaluation backend. Indicates a
    /// malformed tree or program, not a user error.
    #[error("internal evaluation error: {0}")]
    Internal(&'static str),
}
