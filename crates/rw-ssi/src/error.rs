//! Error types for directive parsing and expression evaluation.
//!
//! None of these escape [`SsiProcessor::process`](crate::SsiProcessor::process):
//! they are logged and turned into the configured error message, or into the
//! stop-processing signal for malformed conditional expressions.

/// Directive-level parse failure.
///
/// The processor replaces the offending directive with the configured error
/// message and keeps scanning.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DirectiveError {
    /// No command is registered under this name.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    /// A quoted parameter value was never closed.
    #[error("Error parsing directive parameters")]
    MalformedParams,
    /// Parameter names and values did not line up.
    #[error(
        "Parameter names count ({names}) does not match parameter values count ({values}) on command: {command}"
    )]
    ParamCountMismatch {
        /// Command name as written in the directive.
        command: String,
        /// Number of parsed parameter names.
        names: usize,
        /// Number of parsed parameter values.
        values: usize,
    },
}

/// Malformed `#if`/`#elif` expression.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExpressionError {
    /// The expression contains no tokens.
    #[error("empty expression")]
    Empty,
    /// Input ended where an operand or `)` was required.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// A token appeared where it is not allowed.
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    /// `(` without matching `)` or the reverse.
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    /// A comparison operand was not a string.
    #[error("operator '{0}' requires string operands")]
    StrayOperator(String),
}

/// Encoding name outside `url`, `entity`, `none`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown encoding: {0}")]
pub struct UnknownEncoding(pub String);
