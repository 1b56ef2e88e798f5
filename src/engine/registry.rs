//! Function dispatch.
//!
//! Every name that can appear in a ruleset (as an action, a header call, or a
//! function filter) is bound here to a factory in one of five roles:
//!
//! ```text
//!   Role          factory returns       used for
//!   ----          ---------------       --------
//!   Filter        FilterFn              `name(args)` inside a filter
//!   Directive     () (side effects)     header calls before the first rule
//!   Callback      CallbackFn            whole-list hooks run before per-mapping work
//!   Preprocessor  PreprocessorFn        mapping -> mapping (or drop)
//!   Generator     GeneratorFn<T>        mapping -> product
//! ```
//!
//! The same name may be registered in several roles (`set_var` is both a
//! directive and a callback). When an action follows a filter, roles are
//! tried in the order Callback, Preprocessor, Generator and the first hit wins.
//!
//! Factories run once per compiled rule, with arguments already resolved to
//! strings and arity already checked against the entry's [`Signature`].

use super::context::TransformContext;
use super::filter::Filter;
use crate::error::ResolutionError;
use crate::mapping::Mapping;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub type FilterFn = Rc<dyn Fn(&Mapping, &TransformContext) -> bool>;
/// Returns `None` to drop the mapping.
pub type PreprocessorFn = Rc<dyn Fn(&Mapping, &TransformContext) -> Option<Mapping>>;
pub type GeneratorFn<T> = Rc<dyn Fn(&Mapping, &TransformContext) -> Option<T>>;
/// Receives the rule's filter and the full current mapping list.
pub type CallbackFn = Rc<dyn Fn(&Filter, &mut [Mapping], &mut TransformContext)>;

type Factory<X> = Box<dyn Fn(&[String], &mut TransformContext) -> Result<X, ResolutionError>>;

/// Arity signature: a regex over one `S` per supplied argument.
///
/// `"SS"` takes exactly two arguments, `"S?"` zero or one, `"(SS)+"` a
/// non-zero even number.
#[derive(Debug, Clone)]
pub struct Signature {
    pattern: String,
    regex: Regex,
}

impl Signature {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self { pattern: pattern.to_string(), regex })
    }

    /// Build from an already anchored regex (see the `signature!` macro).
    pub fn from_regex(pattern: &str, regex: Regex) -> Self {
        Self { pattern: pattern.to_string(), regex }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn accepts(&self, count: usize) -> bool {
        self.regex.is_match(&"S".repeat(count))
    }

    /// Human-readable arity, used in error messages.
    pub fn describe(&self) -> String {
        let p = self.pattern.as_str();
        match p {
            "S?" => return "0 or 1".to_string(),
            "S*" => return "any number".to_string(),
            "S+" => return "at least 1".to_string(),
            _ => {}
        }
        if p.chars().all(|c| c == 'S') {
            return p.len().to_string();
        }
        if let Some(group) = p.strip_prefix('(').and_then(|r| r.strip_suffix(")+")) {
            if !group.is_empty() && group.chars().all(|c| c == 'S') {
                return format!("a non-zero multiple of {}", group.len());
            }
        }
        if p.chars().all(|c| c == 'S' || c == '?') && !p.starts_with('?') && !p.contains("??") {
            let max = p.matches('S').count();
            let min = max - p.matches('?').count();
            return format!("{min} to {max}");
        }
        p.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Filter,
    Directive,
    Callback,
    Preprocessor,
    Generator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Filter => "filter",
            Role::Directive => "directive",
            Role::Callback => "callback",
            Role::Preprocessor => "preprocessor",
            Role::Generator => "generator",
        })
    }
}

pub enum Handler<T> {
    Filter(Factory<FilterFn>),
    Directive(Factory<()>),
    Callback(Factory<CallbackFn>),
    Preprocessor(Factory<PreprocessorFn>),
    Generator(Factory<GeneratorFn<T>>),
}

impl<T> Handler<T> {
    pub fn role(&self) -> Role {
        match self {
            Handler::Filter(_) => Role::Filter,
            Handler::Directive(_) => Role::Directive,
            Handler::Callback(_) => Role::Callback,
            Handler::Preprocessor(_) => Role::Preprocessor,
            Handler::Generator(_) => Role::Generator,
        }
    }
}

pub struct RegisteredFunction<T> {
    pub name: String,
    pub signature: Signature,
    pub handler: Handler<T>,
}

impl<T> fmt::Debug for RegisteredFunction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredFunction")
            .field("name", &self.name)
            .field("role", &self.handler.role())
            .field("signature", &self.signature.pattern())
            .finish()
    }
}

/// A resolved rule action.
pub(crate) enum Action<T> {
    Callback(CallbackFn),
    Preprocessor(PreprocessorFn),
    Generator(GeneratorFn<T>),
}

/// Name to handler table, keyed by `(role, name)`.
pub struct FunctionRegistry<T> {
    entries: HashMap<(Role, String), RegisteredFunction<T>>,
}

impl<T: 'static> Default for FunctionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> FunctionRegistry<T> {
    /// A registry holding the built-in functions.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        super::functions::register_builtins(&mut registry);
        registry
    }
}

impl<T> FunctionRegistry<T> {
    pub fn empty() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Add or replace a function in the role given by its handler.
    pub fn register(&mut self, name: &str, signature: Signature, handler: Handler<T>) {
        let key = (handler.role(), name.to_string());
        self.entries.insert(key, RegisteredFunction { name: name.to_string(), signature, handler });
    }

    pub fn register_filter(
        &mut self,
        name: &str,
        signature: Signature,
        factory: impl Fn(&[String], &mut TransformContext) -> Result<FilterFn, ResolutionError> + 'static,
    ) {
        self.register(name, signature, Handler::Filter(Box::new(factory)));
    }

    pub fn register_directive(
        &mut self,
        name: &str,
        signature: Signature,
        factory: impl Fn(&[String], &mut TransformContext) -> Result<(), ResolutionError> + 'static,
    ) {
        self.register(name, signature, Handler::Directive(Box::new(factory)));
    }

    pub fn register_callback(
        &mut self,
        name: &str,
        signature: Signature,
        factory: impl Fn(&[String], &mut TransformContext) -> Result<CallbackFn, ResolutionError> + 'static,
    ) {
        self.register(name, signature, Handler::Callback(Box::new(factory)));
    }

    pub fn register_preprocessor(
        &mut self,
        name: &str,
        signature: Signature,
        factory: impl Fn(&[String], &mut TransformContext) -> Result<PreprocessorFn, ResolutionError> + 'static,
    ) {
        self.register(name, signature, Handler::Preprocessor(Box::new(factory)));
    }

    pub fn register_generator(
        &mut self,
        name: &str,
        signature: Signature,
        factory: impl Fn(&[String], &mut TransformContext) -> Result<GeneratorFn<T>, ResolutionError> + 'static,
    ) {
        self.register(name, signature, Handler::Generator(Box::new(factory)));
    }

    pub fn get(&self, role: Role, name: &str) -> Option<&RegisteredFunction<T>> {
        self.entries.get(&(role, name.to_string()))
    }

    /// Whether `name` is registered in any role.
    pub fn has_any(&self, name: &str) -> bool {
        self.entries.keys().any(|(_, n)| n == name)
    }

    /// All entries, sorted by name then role.
    pub fn functions(&self) -> Vec<&RegisteredFunction<T>> {
        let mut all: Vec<_> = self.entries.values().collect();
        all.sort_by(|a, b| (&a.name, a.handler.role()).cmp(&(&b.name, b.handler.role())));
        all
    }

    pub(crate) fn resolve_filter(
        &self,
        name: &str,
        args: &[String],
        ctx: &mut TransformContext,
    ) -> Result<FilterFn, ResolutionError> {
        let entry = self.lookup(&[Role::Filter], name, args)?;
        match &entry.handler {
            Handler::Filter(factory) => factory(args, ctx),
            _ => Err(ResolutionError::InvalidCall(name.to_string())),
        }
    }

    pub(crate) fn run_directive(
        &self,
        name: &str,
        args: &[String],
        ctx: &mut TransformContext,
    ) -> Result<(), ResolutionError> {
        let entry = self
            .get(Role::Directive, name)
            .ok_or_else(|| ResolutionError::UnrecognisedFunction(name.to_string()))?;
        check_arity(entry, args)?;
        match &entry.handler {
            Handler::Directive(factory) => factory(args, ctx),
            _ => Err(ResolutionError::InvalidCall(name.to_string())),
        }
    }

    pub(crate) fn resolve_action(
        &self,
        name: &str,
        args: &[String],
        ctx: &mut TransformContext,
    ) -> Result<Action<T>, ResolutionError> {
        let entry = self.lookup(&[Role::Callback, Role::Preprocessor, Role::Generator], name, args)?;
        match &entry.handler {
            Handler::Callback(factory) => factory(args, ctx).map(Action::Callback),
            Handler::Preprocessor(factory) => factory(args, ctx).map(Action::Preprocessor),
            Handler::Generator(factory) => factory(args, ctx).map(Action::Generator),
            _ => Err(ResolutionError::InvalidCall(name.to_string())),
        }
    }

    /// First entry for `name` among `roles`, with its arity checked.
    fn lookup(&self, roles: &[Role], name: &str, args: &[String]) -> Result<&RegisteredFunction<T>, ResolutionError> {
        match roles.iter().find_map(|role| self.get(*role, name)) {
            Some(entry) => {
                check_arity(entry, args)?;
                Ok(entry)
            }
            None if self.has_any(name) => Err(ResolutionError::InvalidCall(name.to_string())),
            None => Err(ResolutionError::UnrecognisedFunction(name.to_string())),
        }
    }
}

fn check_arity<T>(entry: &RegisteredFunction<T>, args: &[String]) -> Result<(), ResolutionError> {
    if entry.signature.accepts(args.len()) {
        Ok(())
    } else {
        Err(ResolutionError::InvalidArity {
            name: entry.name.clone(),
            expected: entry.signature.describe(),
            found: args.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(p: &str) -> Signature {
        Signature::new(p).unwrap()
    }

    #[test]
    fn signatures_accept_argument_counts() {
        assert!(sig("").accepts(0));
        assert!(!sig("").accepts(1));
        assert!(sig("S?").accepts(0) && sig("S?").accepts(1) && !sig("S?").accepts(2));
        assert!(sig("(SS)+").accepts(4));
        assert!(!sig("(SS)+").accepts(0));
        assert!(!sig("(SSS)+").accepts(4));
        assert!(sig("S*").accepts(7));
    }

    #[test]
    fn signatures_describe_themselves() {
        assert_eq!(sig("").describe(), "0");
        assert_eq!(sig("SS").describe(), "2");
        assert_eq!(sig("S?").describe(), "0 or 1");
        assert_eq!(sig("S+").describe(), "at least 1");
        assert_eq!(sig("S*").describe(), "any number");
        assert_eq!(sig("(SSS)+").describe(), "a non-zero multiple of 3");
        assert_eq!(sig("S?S?S?").describe(), "0 to 3");
        assert_eq!(sig("SS?").describe(), "1 to 2");
        assert_eq!(sig("S|SSSS").describe(), "S|SSSS");
    }

    fn registry() -> FunctionRegistry<String> {
        let mut reg = FunctionRegistry::empty();
        reg.register_preprocessor("keep", sig(""), |_, _| {
            Ok(Rc::new(|m: &Mapping, _: &TransformContext| Some(m.clone())))
        });
        reg.register_generator("name", sig("S"), |args, _| {
            let label = args[0].clone();
            Ok(Rc::new(move |_: &Mapping, _: &TransformContext| Some(label.clone())))
        });
        reg.register_preprocessor("both", sig(""), |_, _| Ok(Rc::new(|_: &Mapping, _: &TransformContext| None)));
        reg.register_generator("both", sig(""), |_, _| Ok(Rc::new(|_: &Mapping, _: &TransformContext| None)));
        reg.register_directive("setup", sig("S?"), |_, _| Ok(()));
        reg
    }

    #[test]
    fn actions_resolve_by_role_priority() {
        let reg = registry();
        let mut ctx = TransformContext::new();
        assert!(matches!(reg.resolve_action("both", &[], &mut ctx), Ok(Action::Preprocessor(_))));
        match reg.resolve_action("name", &["x".to_string()], &mut ctx) {
            Ok(Action::Generator(g)) => assert_eq!(g(&Mapping::default(), &ctx), Some("x".to_string())),
            _ => panic!("expected a generator"),
        }
    }

    #[test]
    fn unknown_names_and_wrong_roles() {
        let reg = registry();
        let mut ctx = TransformContext::new();
        assert!(matches!(
            reg.resolve_action("nope", &[], &mut ctx),
            Err(ResolutionError::UnrecognisedFunction(name)) if name == "nope"
        ));
        assert!(matches!(
            reg.resolve_action("setup", &[], &mut ctx),
            Err(ResolutionError::InvalidCall(name)) if name == "setup"
        ));
        assert!(matches!(reg.resolve_filter("keep", &[], &mut ctx), Err(ResolutionError::InvalidCall(_))));
        assert!(matches!(reg.run_directive("keep", &[], &mut ctx), Err(ResolutionError::UnrecognisedFunction(_))));
        assert!(reg.run_directive("setup", &[], &mut ctx).is_ok());
    }

    #[test]
    fn arity_is_checked_before_the_factory_runs() {
        let reg = registry();
        let mut ctx = TransformContext::new();
        let err = reg.resolve_action("name", &[], &mut ctx).err().unwrap();
        assert_eq!(err, ResolutionError::InvalidArity { name: "name".into(), expected: "1".into(), found: 0 });
    }

    #[test]
    fn builtins_are_registered() {
        let reg: FunctionRegistry<()> = FunctionRegistry::new();
        for (role, name) in [
            (Role::Preprocessor, "stop"),
            (Role::Preprocessor, "invert"),
            (Role::Preprocessor, "assign"),
            (Role::Preprocessor, "replace"),
            (Role::Preprocessor, "edit"),
            (Role::Directive, "set_var"),
            (Role::Callback, "set_var"),
            (Role::Filter, "is_duplicate"),
            (Role::Filter, "has_extension"),
            (Role::Callback, "infer_cardinality"),
        ] {
            assert!(reg.get(role, name).is_some(), "missing {role} {name}");
        }
    }
}
