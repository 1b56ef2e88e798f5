//! Placeholder templates.
//!
//! A template is literal text with placeholders that are filled from a mapping:
//!
//! ```text
//!   "%{subject_id|short} is %{subject_label|default('unnamed')|upper}"
//!     │               │                    │                   │
//!     │               │                    └── modifier with one argument
//!     │               └── modifier, no arguments
//!     └── placeholder name: a slot, `hash`, a variable, a custom
//!         substitution, or (fallback) an extension slot
//! ```
//!
//! Other forms:
//!
//! - `%%` is a literal `%`.
//! - `%name` (legacy) reads a run of letters and underscores; if the run is a
//!   known placeholder it is substituted, otherwise `%name` stays as literal text.
//!   In `%hash-suffix` the run stops at `-`, so only `hash` is substituted.
//! - A `%` followed by anything else, or at the very end, is literal.
//!
//! Names are resolved when the template is compiled, in this order: standard
//! slots and `hash`, then variables and custom substitutions, then extension
//! slots (raw name first, then its prefix-expanded form).
//!
//! Compiled templates are cached by source text. Registering a modifier or a
//! substitution clears the cache, since it can change how a name resolves.

use super::context::TransformContext;
use super::hash::MappingHasher;
use super::modifiers;
use super::registry::Signature;
use crate::error::FormatError;
use crate::mapping::{Mapping, Slot, SlotValue};
use crate::prefix::PrefixManager;
use std::collections::HashMap;
use std::fmt;
use std::iter::Peekable;
use std::rc::Rc;
use std::str::Chars;
use tracing::warn;

/// A value flowing through a modifier chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    List(Vec<String>),
}

impl Value {
    /// Final rendering: nothing for `Null`, items joined by `", "` for lists.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::List(items) => items.join(", "),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
        }
    }

    /// Apply `f` to a single value or to every list item.
    pub fn map_text(self, f: impl Fn(String) -> String) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Text(s) => Value::Text(f(s)),
            Value::List(items) => Value::List(items.into_iter().map(f).collect()),
        }
    }
}

impl From<SlotValue> for Value {
    fn from(value: SlotValue) -> Self {
        match value {
            SlotValue::Empty => Value::Null,
            SlotValue::List(items) => Value::List(items),
            other => other.as_text().map_or(Value::Null, Value::Text),
        }
    }
}

/// `(value, arguments, prefixes) -> value`
pub type ModifierFn = Rc<dyn Fn(Value, &[String], &PrefixManager) -> Value>;
pub type SubstitutionFn = Rc<dyn Fn(&Mapping) -> Value>;

#[derive(Clone)]
enum Substitution {
    Variable,
    Custom(SubstitutionFn),
}

#[derive(Clone)]
enum Source {
    Slot(Slot),
    Hash,
    Variable(String),
    Custom(SubstitutionFn),
    Extension(String),
}

#[derive(Clone)]
struct ModifierCall {
    apply: ModifierFn,
    args: Vec<String>,
}

#[derive(Clone)]
enum Part {
    Literal(String),
    Placeholder { source: Source, modifiers: Vec<ModifierCall> },
}

/// A compiled template.
#[derive(Clone)]
pub struct Template {
    text: String,
    parts: Vec<Part>,
}

impl Template {
    /// The source text this template was compiled from.
    pub fn source(&self) -> &str {
        &self.text
    }

    /// Whether the template has no placeholders at all.
    pub fn is_literal(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, Part::Literal(_)))
    }

    pub fn render(&self, mapping: &Mapping, ctx: &TransformContext) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Placeholder { source, modifiers } => {
                    let mut value = resolve(source, mapping, ctx);
                    for call in modifiers {
                        value = (call.apply)(value, &call.args, &ctx.prefixes);
                    }
                    out.push_str(&value.render());
                }
            }
        }
        out
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Template").field(&self.text).finish()
    }
}

fn resolve(source: &Source, m: &Mapping, ctx: &TransformContext) -> Value {
    match source {
        Source::Slot(slot) => m.get(*slot).into(),
        Source::Hash => Value::Text(MappingHasher::hash(m)),
        Source::Variable(name) => match ctx.variables.expand(name, m) {
            Ok(v) => Value::Text(v.to_string()),
            Err(e) => {
                warn!(error = %e, "variable placeholder left empty");
                Value::Null
            }
        },
        Source::Custom(f) => f(m),
        Source::Extension(name) => m
            .extensions
            .get(name)
            .or_else(|| m.extensions.get(&ctx.prefixes.expand(name)))
            .map_or(Value::Null, |v| Value::Text(v.clone())),
    }
}

/// Template compiler: modifier table, substitutions and the template cache.
pub struct Formatter {
    modifiers: HashMap<String, (Signature, ModifierFn)>,
    substitutions: HashMap<String, Substitution>,
    cache: HashMap<String, Rc<Template>>,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modifiers: Vec<_> = self.modifiers.keys().collect();
        modifiers.sort();
        let mut substitutions: Vec<_> = self.substitutions.keys().collect();
        substitutions.sort();
        f.debug_struct("Formatter")
            .field("modifiers", &modifiers)
            .field("substitutions", &substitutions)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl Formatter {
    /// A formatter with the standard modifiers.
    pub fn new() -> Self {
        let mut formatter = Self { modifiers: HashMap::new(), substitutions: HashMap::new(), cache: HashMap::new() };
        for (name, signature, f) in modifiers::standard() {
            formatter.modifiers.insert(name.to_string(), (signature, f));
        }
        formatter
    }

    pub fn set_modifier(&mut self, name: &str, signature: Signature, f: ModifierFn) {
        self.modifiers.insert(name.to_string(), (signature, f));
        self.cache.clear();
    }

    pub fn has_modifier(&self, name: &str) -> bool {
        self.modifiers.contains_key(name)
    }

    /// Register a host-provided placeholder.
    pub fn set_substitution(&mut self, name: &str, f: SubstitutionFn) -> Result<(), FormatError> {
        if name.is_empty() || name.contains(['}', '|']) {
            return Err(FormatError::InvalidPlaceholderName(name.to_string()));
        }
        self.substitutions.insert(name.to_string(), Substitution::Custom(f));
        self.cache.clear();
        Ok(())
    }

    pub(crate) fn set_variable_substitution(&mut self, name: &str) {
        self.substitutions.insert(name.to_string(), Substitution::Variable);
        self.cache.clear();
    }

    pub fn compile(&mut self, text: &str) -> Result<Rc<Template>, FormatError> {
        if let Some(cached) = self.cache.get(text) {
            return Ok(Rc::clone(cached));
        }
        let template = Rc::new(Template { text: text.to_string(), parts: self.parse(text)? });
        self.cache.insert(text.to_string(), Rc::clone(&template));
        Ok(template)
    }

    fn is_known(&self, name: &str) -> bool {
        name == "hash" || Slot::from_name(name).is_some() || self.substitutions.contains_key(name)
    }

    fn source_for(&self, name: &str) -> Source {
        if name == "hash" {
            return Source::Hash;
        }
        if let Some(slot) = Slot::from_name(name) {
            return Source::Slot(slot);
        }
        match self.substitutions.get(name) {
            Some(Substitution::Variable) => Source::Variable(name.to_string()),
            Some(Substitution::Custom(f)) => Source::Custom(Rc::clone(f)),
            None => Source::Extension(name.to_string()),
        }
    }

    fn parse(&self, text: &str) -> Result<Vec<Part>, FormatError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            match chars.peek().copied() {
                Some('%') => {
                    chars.next();
                    literal.push('%');
                }
                Some('{') => {
                    chars.next();
                    flush(&mut literal, &mut parts);
                    parts.push(self.parse_bracketed(&mut chars)?);
                }
                Some(n) if n.is_ascii_alphabetic() || n == '_' => {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if !(n.is_ascii_alphabetic() || n == '_') {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    if self.is_known(&name) {
                        flush(&mut literal, &mut parts);
                        parts.push(Part::Placeholder { source: self.source_for(&name), modifiers: Vec::new() });
                    } else {
                        literal.push('%');
                        literal.push_str(&name);
                    }
                }
                _ => literal.push('%'),
            }
        }
        flush(&mut literal, &mut parts);
        Ok(parts)
    }

    /// Parse `name|mod(args)|...}` (the `%{` is already consumed).
    fn parse_bracketed(&self, chars: &mut Peekable<Chars<'_>>) -> Result<Part, FormatError> {
        let mut name = String::new();
        let mut modifiers = Vec::new();
        loop {
            match chars.next() {
                None => return Err(FormatError::UnterminatedPlaceholder),
                Some('}') => return Ok(Part::Placeholder { source: self.source_for(name.trim()), modifiers }),
                Some('|') => break,
                Some(c) => name.push(c),
            }
        }

        loop {
            let (call, terminator) = self.parse_modifier(chars)?;
            modifiers.push(call);
            if terminator == '}' {
                return Ok(Part::Placeholder { source: self.source_for(name.trim()), modifiers });
            }
        }
    }

    /// Parse one `mod` or `mod(args)`; returns the call and the `|` or `}` after it.
    fn parse_modifier(&self, chars: &mut Peekable<Chars<'_>>) -> Result<(ModifierCall, char), FormatError> {
        let mut name = String::new();
        let mut args = Vec::new();
        let terminator = loop {
            match chars.next() {
                None => return Err(FormatError::UnterminatedPlaceholder),
                Some(c @ ('|' | '}')) => break c,
                Some('(') => {
                    args = parse_arguments(chars)?;
                    skip_whitespace(chars);
                    match chars.next() {
                        None => return Err(FormatError::UnterminatedPlaceholder),
                        Some(c @ ('|' | '}')) => break c,
                        Some(_) => return Err(FormatError::ExtraTextAfterModifier),
                    }
                }
                Some(c) => name.push(c),
            }
        };

        let name = name.trim();
        let (signature, apply) =
            self.modifiers.get(name).ok_or_else(|| FormatError::UnknownModifier(name.to_string()))?;
        if !signature.accepts(args.len()) {
            return Err(FormatError::InvalidModifierCall {
                name: name.to_string(),
                expected: signature.describe(),
                found: args.len(),
            });
        }
        Ok((ModifierCall { apply: Rc::clone(apply), args }, terminator))
    }
}

fn flush(literal: &mut String, parts: &mut Vec<Part>) {
    if !literal.is_empty() {
        parts.push(Part::Literal(std::mem::take(literal)));
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

/// Arguments up to and including the closing `)`.
fn parse_arguments(chars: &mut Peekable<Chars<'_>>) -> Result<Vec<String>, FormatError> {
    let mut args = Vec::new();
    skip_whitespace(chars);
    if chars.next_if_eq(&')').is_some() {
        return Ok(args);
    }
    loop {
        skip_whitespace(chars);
        let arg = match chars.peek().copied() {
            None => return Err(FormatError::UnterminatedPlaceholder),
            Some(quote @ ('\'' | '"')) => {
                chars.next();
                let mut arg = String::new();
                loop {
                    match chars.next() {
                        None => return Err(FormatError::UnterminatedPlaceholder),
                        Some('\\') => match chars.next() {
                            Some(escaped) => arg.push(escaped),
                            None => return Err(FormatError::UnterminatedPlaceholder),
                        },
                        Some(c) if c == quote => break,
                        Some(c) => arg.push(c),
                    }
                }
                arg
            }
            Some(_) => {
                let mut arg = String::new();
                while let Some(c) = chars.next_if(|c| !c.is_whitespace() && !matches!(c, ',' | '(' | ')' | '}')) {
                    arg.push(c);
                }
                arg
            }
        };
        args.push(arg);
        skip_whitespace(chars);
        match chars.next() {
            Some(',') => continue,
            Some(')') => return Ok(args),
            None => return Err(FormatError::UnterminatedPlaceholder),
            Some(_) => return Err(FormatError::ExtraTextAfterModifier),
        }
    }
}
