//! Error types.
//!
//! Reading a ruleset never stops at the first problem: syntax errors and
//! resolution errors are collected as [`TransformError`] values and handed
//! back as a list. Template compilation is the exception; a [`FormatError`]
//! is returned immediately from the compile call, and surfaces in a ruleset
//! diagnostic through [`ResolutionError::Template`].

use thiserror::Error;

/// One diagnostic produced while reading a ruleset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("SSSOM/Transform syntax error, line {line}, column {column}: {message}")]
    Syntax { line: usize, column: usize, message: String },

    #[error("Undeclared prefix: {0}")]
    UndeclaredPrefix(String),

    #[error("line {line}, column {column}: {error}")]
    Resolution { line: usize, column: usize, error: ResolutionError },
}

/// A rule that parsed fine but could not be turned into a compiled rule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("Unrecognised function: {0}")]
    UnrecognisedFunction(String),

    #[error("Unrecognised filter: {0}")]
    UnrecognisedFilter(String),

    #[error("Invalid call for function {0}")]
    InvalidCall(String),

    #[error("Invalid number of arguments for function {name}: expected {expected}, found {found}")]
    InvalidArity { name: String, expected: String, found: usize },

    #[error("Invalid value \"{value}\" for filter {field}")]
    InvalidFilterValue { field: String, value: String },

    #[error("Invalid slot name: {0}")]
    InvalidSlot(String),

    #[error("Invalid value \"{value}\" for slot \"{slot}\"")]
    InvalidSlotValue { slot: String, value: String },

    #[error("Cannot set slot \"{0}\" to nothing")]
    CannotClear(String),

    #[error(transparent)]
    Template(#[from] FormatError),

    #[error("{name}: {message}")]
    Function { name: String, message: String },
}

/// Template compilation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Unterminated placeholder in format string")]
    UnterminatedPlaceholder,

    #[error("Extra text after modifier call")]
    ExtraTextAfterModifier,

    #[error("Unknown modifier: {0}")]
    UnknownModifier(String),

    #[error("Invalid call for modifier {name}: expected {expected} argument(s), found {found}")]
    InvalidModifierCall { name: String, expected: String, found: usize },

    #[error("Invalid placeholder name: {0}")]
    InvalidPlaceholderName(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    #[error("Undefined variable: {0}")]
    Undefined(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("Value does not fit slot {0}")]
    SlotMismatch(&'static str),
}

/// A ruleset that produced at least one diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} error(s) in ruleset", .0.len())]
pub struct RulesetError(pub Vec<TransformError>);

impl RulesetError {
    pub fn errors(&self) -> &[TransformError] {
        &self.0
    }
}
