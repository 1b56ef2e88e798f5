//! Compiled filters.
//!
//! A [`Filter`] is a small boolean tree over a [`Mapping`]:
//!
//! ```text
//!            And
//!           /   \
//!        Atom    Not
//!  subject==X:*   |
//!                Atom
//!          predicate==skos:exactMatch
//! ```
//!
//! Items of a filter chain combine strictly left to right, so
//! `a || b && c` compiles to `And(Or(a, b), c)`; parentheses produce an
//! independent subtree that joins the chain as a single item.
//!
//! ## Matching rules worth knowing
//!
//! - `field==*` matches everything, records without the field included.
//!   `field==X*` is a prefix match and needs a value.
//! - `field==~` (and `field==""` on text fields) matches absent or empty values.
//! - Multi-valued fields match if any element matches.
//! - `predicate==X` and `predicate_label==X` never match a mapping whose
//!   predicate modifier is `Not`. Negation is applied to the result afterwards,
//!   so `!predicate==X` does match such mappings.
//! - Numeric comparisons are false when the field is absent.
//! - `cardinality==*:1` is sugar for `cardinality==1:1 || cardinality==n:1`
//!   (likewise `*:n`, `1:*`, `n:*`).
//!
//! Every node carries a canonical text form (see the `Display` impl) and a set
//! of [`FilterTraits`] propagated bottom-up at compile time.

use super::context::TransformContext;
use super::parser::{CallSyntax, CompareOp, Connective, FilterExpr, FilterItem, Literal, Position};
use super::registry::FilterFn;
use crate::error::ResolutionError;
use crate::mapping::{EntityType, Mapping, MappingCardinality, PredicateModifier, Slot, SlotValue};
use std::fmt;
use std::rc::Rc;

bitflags::bitflags! {
    /// Capabilities of a filter, computed once when it is compiled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FilterTraits: u8 {
        /// Reads `mapping_cardinality`.
        const USES_CARDINALITY = 1 << 0;
        /// Contains a function filter, which may keep state between calls.
        const STATEFUL         = 1 << 1;
        /// Reads at least one subject-side slot.
        const SUBJECT_SIDE     = 1 << 2;
        /// Reads at least one object-side slot.
        const OBJECT_SIDE      = 1 << 3;
    }
}

/// A compiled filter.
#[derive(Clone)]
pub struct Filter {
    node: Node,
    traits: FilterTraits,
}

#[derive(Clone)]
enum Node {
    All,
    Atom { test: Atom, text: String },
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

#[derive(Clone)]
enum Atom {
    /// Single-valued string slot. `guard_not` rejects mappings with a `Not` modifier.
    Text { slot: Slot, pattern: Pattern, guard_not: bool },
    List { slot: Slot, pattern: Pattern },
    Number { slot: Slot, op: CompareOp, value: Option<f64> },
    Cardinality(Option<Vec<MappingCardinality>>),
    EntityType { slot: Slot, accept: Option<EntityType> },
    Modifier(Option<PredicateModifier>),
    Function(FilterFn),
    Any,
}

#[derive(Debug, Clone, PartialEq)]
enum Pattern {
    Any,
    Empty,
    Prefix(String),
    Exact(String),
}

impl Pattern {
    fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Empty => value.is_none_or(str::is_empty),
            Pattern::Prefix(p) => value.is_some_and(|v| v.starts_with(p.as_str())),
            Pattern::Exact(s) => value == Some(s.as_str()),
        }
    }

    fn matches_any(&self, values: &[String]) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Empty => values.is_empty(),
            _ => values.iter().any(|v| self.matches(Some(v))),
        }
    }
}

impl Filter {
    /// The match-all filter.
    pub fn all() -> Self {
        Self { node: Node::All, traits: FilterTraits::empty() }
    }

    /// Wrap a host-provided predicate; `name` is used for the text form.
    pub fn from_fn(name: impl Into<String>, test: FilterFn) -> Self {
        Self { node: Node::Atom { test: Atom::Function(test), text: name.into() }, traits: FilterTraits::STATEFUL }
    }

    pub fn matches(&self, mapping: &Mapping, ctx: &TransformContext) -> bool {
        self.node.eval(mapping, ctx)
    }

    pub fn traits(&self) -> FilterTraits {
        self.traits
    }

    pub fn uses_cardinality(&self) -> bool {
        self.traits.contains(FilterTraits::USES_CARDINALITY)
    }

    /// True only for the literal match-all filter (`*` or no filter at all).
    pub fn is_match_all(&self) -> bool {
        matches!(self.node, Node::All)
    }

    pub fn and(self, other: Filter) -> Filter {
        Filter { traits: self.traits | other.traits, node: Node::And(Box::new(self.node), Box::new(other.node)) }
    }

    pub fn or(self, other: Filter) -> Filter {
        Filter { traits: self.traits | other.traits, node: Node::Or(Box::new(self.node), Box::new(other.node)) }
    }

    pub fn negate(self) -> Filter {
        Filter { traits: self.traits, node: Node::Not(Box::new(self.node)) }
    }

    /// AND-combine filters from enclosing scopes; a single filter is used as is.
    pub fn all_of(filters: impl IntoIterator<Item = Filter>) -> Option<Filter> {
        filters.into_iter().reduce(Filter::and)
    }
}

impl Node {
    fn eval(&self, m: &Mapping, ctx: &TransformContext) -> bool {
        match self {
            Node::All => true,
            Node::Atom { test, .. } => test.eval(m, ctx),
            Node::Not(inner) => !inner.eval(m, ctx),
            Node::And(a, b) => a.eval(m, ctx) && b.eval(m, ctx),
            Node::Or(a, b) => a.eval(m, ctx) || b.eval(m, ctx),
        }
    }
}

impl Atom {
    fn eval(&self, m: &Mapping, ctx: &TransformContext) -> bool {
        match self {
            Atom::Any => true,
            Atom::Text { slot, pattern, guard_not } => {
                if *pattern == Pattern::Any {
                    return true;
                }
                if *guard_not && m.predicate_modifier == Some(PredicateModifier::Not) {
                    return false;
                }
                pattern.matches(m.get(*slot).as_text().as_deref())
            }
            Atom::List { slot, pattern } => match m.get(*slot) {
                SlotValue::List(values) => pattern.matches_any(&values),
                _ => pattern.matches_any(&[]),
            },
            Atom::Number { slot, op, value } => {
                let field = match m.get(*slot) {
                    SlotValue::Double(d) => Some(d),
                    _ => None,
                };
                match (field, value) {
                    (None, None) => true,
                    (Some(_), None) | (None, Some(_)) => false,
                    (Some(f), Some(v)) => match op {
                        CompareOp::Eq => f == *v,
                        CompareOp::Gt => f > *v,
                        CompareOp::Ge => f >= *v,
                        CompareOp::Lt => f < *v,
                        CompareOp::Le => f <= *v,
                    },
                }
            }
            Atom::Cardinality(accepted) => match (accepted, m.mapping_cardinality) {
                (None, actual) => actual.is_none(),
                (Some(set), Some(actual)) => set.contains(&actual),
                (Some(_), None) => false,
            },
            Atom::EntityType { slot, accept } => {
                let actual = match m.get(*slot) {
                    SlotValue::EntityType(t) => Some(t),
                    _ => None,
                };
                actual == *accept
            }
            Atom::Modifier(expected) => m.predicate_modifier == *expected,
            Atom::Function(test) => test(m, ctx),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node.fmt(f)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::All => f.write_str("*"),
            Node::Atom { text, .. } => f.write_str(text),
            Node::Not(inner) => write!(f, "!{inner}"),
            Node::And(a, b) => write!(f, "({a} && {b})"),
            Node::Or(a, b) => write!(f, "({a} || {b})"),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("text", &self.to_string()).field("traits", &self.traits).finish()
    }
}

// --- Compilation -------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Id,
    Text,
    IdList,
    TextList,
    Number,
    Cardinality,
    EntityType,
    Modifier,
}

struct FieldDef {
    name: &'static str,
    slot: Slot,
    kind: FieldKind,
}

const fn field(name: &'static str, slot: Slot, kind: FieldKind) -> FieldDef {
    FieldDef { name, slot, kind }
}

const FIELDS: &[FieldDef] = &[
    field("subject", Slot::SubjectId, FieldKind::Id),
    field("subject_id", Slot::SubjectId, FieldKind::Id),
    field("predicate", Slot::PredicateId, FieldKind::Id),
    field("predicate_id", Slot::PredicateId, FieldKind::Id),
    field("object", Slot::ObjectId, FieldKind::Id),
    field("object_id", Slot::ObjectId, FieldKind::Id),
    field("mapping_justification", Slot::MappingJustification, FieldKind::Id),
    field("justification", Slot::MappingJustification, FieldKind::Id),
    field("subject_source", Slot::SubjectSource, FieldKind::Id),
    field("object_source", Slot::ObjectSource, FieldKind::Id),
    field("mapping_source", Slot::MappingSource, FieldKind::Id),
    field("mapping_provider", Slot::MappingProvider, FieldKind::Id),
    field("mapping_tool_id", Slot::MappingToolId, FieldKind::Id),
    field("license", Slot::License, FieldKind::Id),
    field("issue_tracker_item", Slot::IssueTrackerItem, FieldKind::Id),
    field("record_id", Slot::RecordId, FieldKind::Id),
    field("subject_label", Slot::SubjectLabel, FieldKind::Text),
    field("predicate_label", Slot::PredicateLabel, FieldKind::Text),
    field("object_label", Slot::ObjectLabel, FieldKind::Text),
    field("subject_category", Slot::SubjectCategory, FieldKind::Text),
    field("object_category", Slot::ObjectCategory, FieldKind::Text),
    field("subject_source_version", Slot::SubjectSourceVersion, FieldKind::Text),
    field("object_source_version", Slot::ObjectSourceVersion, FieldKind::Text),
    field("mapping_tool", Slot::MappingTool, FieldKind::Text),
    field("mapping_tool_version", Slot::MappingToolVersion, FieldKind::Text),
    field("similarity_measure", Slot::SimilarityMeasure, FieldKind::Text),
    field("other", Slot::Other, FieldKind::Text),
    field("comment", Slot::Comment, FieldKind::Text),
    field("author", Slot::AuthorId, FieldKind::IdList),
    field("author_id", Slot::AuthorId, FieldKind::IdList),
    field("creator", Slot::CreatorId, FieldKind::IdList),
    field("creator_id", Slot::CreatorId, FieldKind::IdList),
    field("reviewer", Slot::ReviewerId, FieldKind::IdList),
    field("reviewer_id", Slot::ReviewerId, FieldKind::IdList),
    field("curation_rule", Slot::CurationRule, FieldKind::IdList),
    field("subject_match_field", Slot::SubjectMatchField, FieldKind::IdList),
    field("object_match_field", Slot::ObjectMatchField, FieldKind::IdList),
    field("subject_preprocessing", Slot::SubjectPreprocessing, FieldKind::IdList),
    field("object_preprocessing", Slot::ObjectPreprocessing, FieldKind::IdList),
    field("author_label", Slot::AuthorLabel, FieldKind::TextList),
    field("creator_label", Slot::CreatorLabel, FieldKind::TextList),
    field("reviewer_label", Slot::ReviewerLabel, FieldKind::TextList),
    field("curation_rule_text", Slot::CurationRuleText, FieldKind::TextList),
    field("see_also", Slot::SeeAlso, FieldKind::TextList),
    field("match_string", Slot::MatchString, FieldKind::TextList),
    field("confidence", Slot::Confidence, FieldKind::Number),
    field("similarity_score", Slot::SimilarityScore, FieldKind::Number),
    field("cardinality", Slot::MappingCardinality, FieldKind::Cardinality),
    field("mapping_cardinality", Slot::MappingCardinality, FieldKind::Cardinality),
    field("subject_type", Slot::SubjectType, FieldKind::EntityType),
    field("object_type", Slot::ObjectType, FieldKind::EntityType),
    field("predicate_modifier", Slot::PredicateModifier, FieldKind::Modifier),
];

/// Resolves a function filter call (already validated syntactically) into a predicate.
pub(crate) type FunctionResolver<'r> =
    dyn Fn(&CallSyntax, Vec<String>, &mut TransformContext) -> Result<FilterFn, ResolutionError> + 'r;

/// Compile a parsed filter chain.
pub(crate) fn compile(
    expr: &FilterExpr,
    ctx: &mut TransformContext,
    functions: &FunctionResolver<'_>,
) -> Result<Filter, (Position, ResolutionError)> {
    let mut acc = compile_item(&expr.first, ctx, functions)?;
    for (connective, item) in &expr.rest {
        let next = compile_item(item, ctx, functions)?;
        acc = match connective {
            Connective::And => acc.and(next),
            Connective::Or => acc.or(next),
        };
    }
    Ok(acc)
}

fn compile_item(
    item: &FilterItem,
    ctx: &mut TransformContext,
    functions: &FunctionResolver<'_>,
) -> Result<Filter, (Position, ResolutionError)> {
    match item {
        FilterItem::All => Ok(Filter::all()),
        FilterItem::Not(inner) => Ok(compile_item(inner, ctx, functions)?.negate()),
        FilterItem::Group(expr) => compile(expr, ctx, functions),
        FilterItem::Call(call) => {
            let args = call.args.iter().map(|a| resolve_argument(a, ctx)).collect();
            let test = functions(call, args, ctx).map_err(|e| (call.pos, e))?;
            Ok(Filter::from_fn(call.to_string(), test))
        }
        FilterItem::Compare { field, op, value, pos } => {
            compile_comparison(field, *op, value, ctx).map_err(|e| (*pos, e))
        }
    }
}

/// Turn an argument literal into its string value, expanding bare CURIEs.
pub(crate) fn resolve_argument(literal: &Literal, ctx: &mut TransformContext) -> String {
    match literal {
        Literal::Quoted(s) | Literal::Iri(s) => s.clone(),
        Literal::Bare(s) => ctx.prefixes.resolve(s),
    }
}

fn compile_comparison(
    name: &str,
    op: CompareOp,
    value: &Literal,
    ctx: &mut TransformContext,
) -> Result<Filter, ResolutionError> {
    let def = FIELDS
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| ResolutionError::UnrecognisedFilter(name.to_string()))?;
    let text = format!("{name}{}{value}", op.as_str());
    let invalid = || ResolutionError::InvalidFilterValue { field: name.to_string(), value: value.to_string() };

    if op != CompareOp::Eq && def.kind != FieldKind::Number {
        return Err(invalid());
    }

    let raw = match value {
        Literal::Quoted(s) | Literal::Iri(s) | Literal::Bare(s) => s.as_str(),
    };
    let is_wildcard = raw == "*" && !matches!(value, Literal::Iri(_));
    let is_absent =
        matches!(value, Literal::Bare(s) if s == "~") || matches!(value, Literal::Quoted(s) if s.is_empty());

    let test = match def.kind {
        FieldKind::Id | FieldKind::Text | FieldKind::IdList | FieldKind::TextList => {
            let pattern = if is_wildcard {
                Pattern::Any
            } else if is_absent {
                Pattern::Empty
            } else {
                let resolved = match value {
                    Literal::Bare(s) if matches!(def.kind, FieldKind::Id | FieldKind::IdList) => {
                        ctx.prefixes.resolve(s)
                    }
                    _ => raw.to_string(),
                };
                match resolved.strip_suffix('*') {
                    Some(prefix) => Pattern::Prefix(prefix.to_string()),
                    None => Pattern::Exact(resolved),
                }
            };
            match def.kind {
                FieldKind::IdList | FieldKind::TextList => Atom::List { slot: def.slot, pattern },
                _ => Atom::Text {
                    slot: def.slot,
                    pattern,
                    guard_not: matches!(def.slot, Slot::PredicateId | Slot::PredicateLabel),
                },
            }
        }
        FieldKind::Number => {
            if is_wildcard {
                Atom::Any
            } else if is_absent {
                if op != CompareOp::Eq {
                    return Err(invalid());
                }
                Atom::Number { slot: def.slot, op, value: None }
            } else {
                let number = raw.parse::<f64>().map_err(|_| invalid())?;
                Atom::Number { slot: def.slot, op, value: Some(number) }
            }
        }
        FieldKind::Cardinality => {
            if is_wildcard {
                Atom::Any
            } else if is_absent {
                Atom::Cardinality(None)
            } else {
                Atom::Cardinality(Some(cardinality_set(raw).ok_or_else(invalid)?))
            }
        }
        FieldKind::EntityType => {
            if is_wildcard {
                Atom::Any
            } else if is_absent {
                Atom::EntityType { slot: def.slot, accept: None }
            } else {
                Atom::EntityType { slot: def.slot, accept: Some(EntityType::parse(raw).ok_or_else(invalid)?) }
            }
        }
        FieldKind::Modifier => {
            if is_wildcard {
                Atom::Any
            } else if is_absent {
                Atom::Modifier(None)
            } else {
                Atom::Modifier(Some(PredicateModifier::parse(raw).ok_or_else(invalid)?))
            }
        }
    };

    let mut traits = FilterTraits::empty();
    if def.kind == FieldKind::Cardinality {
        traits |= FilterTraits::USES_CARDINALITY;
    }
    if def.slot.is_subject_side() {
        traits |= FilterTraits::SUBJECT_SIDE;
    }
    if def.slot.is_object_side() {
        traits |= FilterTraits::OBJECT_SIDE;
    }
    Ok(Filter { node: Node::Atom { test, text }, traits })
}

/// Concrete cardinalities accepted by a cardinality pattern (`1:1`, `*:n`, ...).
fn cardinality_set(pattern: &str) -> Option<Vec<MappingCardinality>> {
    if let Some(exact) = MappingCardinality::parse(pattern) {
        return Some(vec![exact]);
    }
    let (left, right) = pattern.split_once(':')?;
    let sides = |s: &str| -> Option<Vec<&'static str>> {
        match s {
            "1" => Some(vec!["1"]),
            "n" => Some(vec!["n"]),
            "*" => Some(vec!["1", "n"]),
            _ => None,
        }
    };
    let mut set = Vec::new();
    for l in sides(left)? {
        for r in sides(right)? {
            set.extend(MappingCardinality::parse(&format!("{l}:{r}")));
        }
    }
    Some(set)
}
