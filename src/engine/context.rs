//! Compilation and execution context.

use super::format::{Formatter, Template};
use super::variables::VariableManager;
use crate::error::FormatError;
use crate::mapping::Mapping;
use crate::prefix::PrefixManager;
use std::rc::Rc;

/// State shared by every stage of reading and running a ruleset.
///
/// Compilation takes it by `&mut` (prefix declarations, directives, template
/// cache); filters, preprocessors and generators read it through `&`;
/// callbacks get `&mut` so they can update variables.
#[derive(Debug, Default)]
pub struct TransformContext {
    pub prefixes: PrefixManager,
    pub variables: VariableManager,
    pub formatter: Formatter,
    /// Set once cardinality has been inferred during the current run.
    pub(crate) cardinality_ready: bool,
}

impl TransformContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefixes(prefixes: PrefixManager) -> Self {
        Self { prefixes, ..Self::default() }
    }

    pub fn compile_template(&mut self, text: &str) -> Result<Rc<Template>, FormatError> {
        self.formatter.compile(text)
    }

    /// Compile (or fetch from cache) and render in one go.
    pub fn format(&mut self, text: &str, mapping: &Mapping) -> Result<String, FormatError> {
        let template = self.compile_template(text)?;
        Ok(template.render(mapping, self))
    }

    /// Declare a variable and expose it as a `%{name}` placeholder.
    pub fn declare_variable(&mut self, name: &str, default: &str) {
        self.variables.declare(name, default);
        self.formatter.set_variable_substitution(name);
    }
}
