//! Ruleset reader: source text to compiled rules.
//!
//! Reading happens in one pass over the syntax tree:
//!
//! 1. prefix declarations are added to the context,
//! 2. header actions run as directives,
//! 3. the rule tree is walked depth-first; every action call becomes one
//!    [`CompiledRule`] whose filter is the conjunction of the filters of all
//!    enclosing scopes and whose tags are the union of their tags.
//!
//! Errors do not stop the walk. A rule that fails to resolve is left out and
//! its error recorded; if any error was recorded, none of the rules from that
//! source are kept.
//!
//! Filters are compiled again for every leaf, so a stateful function filter
//! like `is_duplicate` in a shared scope has independent state per action.

use super::context::TransformContext;
use super::filter::{self, Filter};
use super::parser::{CallSyntax, FilterExpr, Position, RuleBody, RuleSyntax, parse_ruleset};
use super::registry::{Action, FilterFn, FunctionRegistry};
use super::rule::CompiledRule;
use crate::error::{ResolutionError, TransformError};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

pub struct TransformReader<T> {
    registry: FunctionRegistry<T>,
    rules: Vec<CompiledRule<T>>,
    errors: Vec<TransformError>,
}

impl<T> TransformReader<T> {
    pub fn new(registry: FunctionRegistry<T>) -> Self {
        Self { registry, rules: Vec::new(), errors: Vec::new() }
    }

    pub fn registry(&self) -> &FunctionRegistry<T> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry<T> {
        &mut self.registry
    }

    /// Read a ruleset, appending its rules to the ones already read.
    ///
    /// Returns `false` if the source has any error; [`errors`](Self::errors)
    /// then lists them, and no rule from this source was added.
    pub fn read(&mut self, src: &str, ctx: &mut TransformContext) -> bool {
        self.errors.clear();
        ctx.prefixes.clear_unresolved();

        let (tree, mut errors) = parse_ruleset(src);
        for decl in &tree.prefixes {
            ctx.prefixes.add(decl.name.as_str(), decl.iri.as_str());
        }

        let mut compiler = Compiler { registry: &self.registry, rules: Vec::new(), errors: Vec::new() };
        for header in &tree.headers {
            compiler.run_header(header, ctx);
        }
        let mut scopes = Vec::new();
        let mut tags = Vec::new();
        for rule in &tree.rules {
            compiler.walk(rule, &mut scopes, &mut tags, ctx);
        }
        let Compiler { rules, errors: resolution_errors, .. } = compiler;

        errors.extend(resolution_errors);
        errors.extend(ctx.prefixes.unresolved().iter().map(|name| TransformError::UndeclaredPrefix(name.clone())));
        for error in errors {
            if !self.errors.contains(&error) {
                self.errors.push(error);
            }
        }

        debug!(rules = rules.len(), errors = self.errors.len(), "ruleset read");
        if !self.errors.is_empty() {
            return false;
        }
        self.rules.extend(rules);
        true
    }

    pub fn read_file(&mut self, path: impl AsRef<Path>, ctx: &mut TransformContext) -> io::Result<bool> {
        let src = fs::read_to_string(path)?;
        Ok(self.read(&src, ctx))
    }

    pub fn rules(&self) -> &[CompiledRule<T>] {
        &self.rules
    }

    pub fn take_rules(&mut self) -> Vec<CompiledRule<T>> {
        std::mem::take(&mut self.rules)
    }

    /// Errors from the last call to [`read`](Self::read).
    pub fn errors(&self) -> &[TransformError] {
        &self.errors
    }
}

struct Compiler<'r, T> {
    registry: &'r FunctionRegistry<T>,
    rules: Vec<CompiledRule<T>>,
    errors: Vec<TransformError>,
}

impl<'r, T> Compiler<'r, T> {
    fn report(&mut self, pos: Position, error: ResolutionError) {
        self.errors.push(TransformError::Resolution { line: pos.line, column: pos.column, error });
    }

    fn arguments(call: &CallSyntax, ctx: &mut TransformContext) -> Vec<String> {
        call.args.iter().map(|a| filter::resolve_argument(a, ctx)).collect()
    }

    fn run_header(&mut self, call: &CallSyntax, ctx: &mut TransformContext) {
        let args = Self::arguments(call, ctx);
        if let Err(e) = self.registry.run_directive(&call.name, &args, ctx) {
            self.report(call.pos, e);
        }
    }

    fn walk<'t>(
        &mut self,
        rule: &'t RuleSyntax,
        scopes: &mut Vec<&'t FilterExpr>,
        tags: &mut Vec<String>,
        ctx: &mut TransformContext,
    ) {
        scopes.push(&rule.filter);
        let tag_mark = tags.len();
        tags.extend(rule.tags.iter().cloned());

        match &rule.body {
            RuleBody::Actions(calls) => {
                for call in calls {
                    self.compile_leaf(scopes, tags, call, ctx);
                }
            }
            RuleBody::Nested(children) => {
                for child in children {
                    self.walk(child, scopes, tags, ctx);
                }
            }
        }

        tags.truncate(tag_mark);
        scopes.pop();
    }

    fn compile_leaf(&mut self, scopes: &[&FilterExpr], tags: &[String], call: &CallSyntax, ctx: &mut TransformContext) {
        let registry = self.registry;
        let functions =
            |call: &CallSyntax, args: Vec<String>, ctx: &mut TransformContext| -> Result<FilterFn, ResolutionError> {
                registry.resolve_filter(&call.name, &args, ctx).map_err(|e| match e {
                    ResolutionError::UnrecognisedFunction(name) => ResolutionError::UnrecognisedFilter(name),
                    other => other,
                })
            };

        let mut filters = Vec::with_capacity(scopes.len());
        for expr in scopes {
            match filter::compile(expr, ctx, &functions) {
                Ok(f) if f.is_match_all() => {}
                Ok(f) => filters.push(f),
                Err((pos, e)) => return self.report(pos, e),
            }
        }
        let filter = Filter::all_of(filters);

        let args = Self::arguments(call, ctx);
        let mut rule = match registry.resolve_action(&call.name, &args, ctx) {
            Ok(Action::Callback(callback)) => CompiledRule::new(filter, call.to_string()).with_callback(callback),
            Ok(Action::Preprocessor(preprocessor)) => {
                CompiledRule::new(filter, call.to_string()).with_preprocessor(preprocessor)
            }
            Ok(Action::Generator(generator)) => CompiledRule::new(filter, call.to_string()).with_generator(generator),
            Err(e) => return self.report(call.pos, e),
        };

        rule.add_tags(tags.iter().cloned());
        self.rules.push(rule);
    }
}
