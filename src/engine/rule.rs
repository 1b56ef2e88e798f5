//! Compiled rules.

use super::context::TransformContext;
use super::filter::Filter;
use super::registry::{CallbackFn, GeneratorFn, PreprocessorFn};
use crate::mapping::Mapping;
use std::collections::BTreeSet;
use std::fmt;

/// One leaf action of a ruleset together with everything needed to run it:
/// the combined filter of its enclosing scopes, the union of their tags, and
/// the handler its function name resolved to.
///
/// At most one of preprocessor, generator and callback is set by the reader;
/// a rule with none of them is legal and does nothing.
pub struct CompiledRule<T> {
    filter: Option<Filter>,
    preprocessor: Option<PreprocessorFn>,
    generator: Option<GeneratorFn<T>>,
    callback: Option<CallbackFn>,
    tags: BTreeSet<String>,
    action: String,
}

impl<T> CompiledRule<T> {
    /// `action` is the call as written, used for display only.
    pub fn new(filter: Option<Filter>, action: impl Into<String>) -> Self {
        Self {
            filter,
            preprocessor: None,
            generator: None,
            callback: None,
            tags: BTreeSet::new(),
            action: action.into(),
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: PreprocessorFn) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    pub fn with_generator(mut self, generator: GeneratorFn<T>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_callback(mut self, callback: CallbackFn) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub fn uses_cardinality(&self) -> bool {
        self.filter.as_ref().is_some_and(Filter::uses_cardinality)
    }

    /// Whether the rule applies to `mapping` (always, without a filter).
    pub fn apply(&self, mapping: &Mapping, ctx: &TransformContext) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(mapping, ctx))
    }

    /// The mapping to carry forward, or `None` if it is dropped.
    pub fn preprocess(&self, mapping: Mapping, ctx: &TransformContext) -> Option<Mapping> {
        match &self.preprocessor {
            Some(p) => p(&mapping, ctx),
            None => Some(mapping),
        }
    }

    pub fn generate(&self, mapping: &Mapping, ctx: &TransformContext) -> Option<T> {
        self.generator.as_ref().and_then(|g| g(mapping, ctx))
    }

    /// Run the callback, if any, on the whole list. Returns whether the rule
    /// still has per-mapping work to do.
    pub fn call(&self, mappings: &mut [Mapping], ctx: &mut TransformContext) -> bool {
        if let Some(callback) = &self.callback {
            match &self.filter {
                Some(filter) => callback(filter, mappings, ctx),
                None => callback(&Filter::all(), mappings, ctx),
            }
        }
        self.preprocessor.is_some() || self.generator.is_some()
    }
}

impl<T> fmt::Display for CompiledRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
            write!(f, "[{}] ", tags.join(", "))?;
        }
        match &self.filter {
            Some(filter) => write!(f, "{filter}")?,
            None => f.write_str("*")?,
        }
        write!(f, " -> {}", self.action)
    }
}

impl<T> fmt::Debug for CompiledRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("filter", &self.filter)
            .field("tags", &self.tags)
            .field("action", &self.action)
            .field("preprocessor", &self.preprocessor.is_some())
            .field("generator", &self.generator.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
