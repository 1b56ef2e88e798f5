//! SSSOM/Transform engine.
//!
//! The engine is split into focused submodules under `src/engine/`; this file
//! only wires them together and re-exports the public surface.
//!
//! ## How the parts work together
//!
//! Reading a ruleset and running it over mappings is a two-phase pipeline:
//!
//! ```text
//! ruleset text
//!      │  parse_ruleset                    (lexer.rs + parser.rs)
//!      v
//! RulesetSyntax: prefixes, header calls, nested rule tree
//!      │  TransformReader::read            (reader.rs)
//!      │    - declare prefixes
//!      │    - run header directives
//!      │    - walk the rule tree carrying (filters, tags) down each level
//!      │    - compile filters              (filter.rs)
//!      │    - dispatch action names        (registry.rs, functions.rs)
//!      │      compiling placeholder args   (format.rs, modifiers.rs)
//!      v
//! Vec<CompiledRule<T>>                     (rule.rs)
//!      │  MappingProcessor::process        (processor.rs)
//!      │    for each selected rule:
//!      │      callback(full list)          (cardinality.rs, variables.rs)
//!      │      for each surviving mapping:
//!      │        filter -> preprocess -> generate
//!      v
//! surviving mappings + Vec<T> products (+ ProcessingMetrics, metrics.rs)
//! ```
//!
//! All mutable state used while compiling and running (prefixes, variables,
//! the template cache) lives in an explicit [`TransformContext`] passed down
//! the call chain.
//!
//! ## Responsibilities by module
//!
//! - `lexer.rs`: cursor over the source text; trivia skipping and token regexes.
//! - `parser.rs`: recursive-descent parser producing the syntax tree, with
//!   error recovery at rule boundaries.
//! - `filter.rs`: compiled filter trees, their canonical text form and
//!   capability flags.
//! - `format.rs` / `modifiers.rs`: placeholder templates and the standard
//!   modifier functions.
//! - `registry.rs`: the five-role function table and arity signatures.
//! - `functions.rs`: built-in functions (stop, invert, assign, ...).
//! - `editor.rs`: typed slot assignment and text replacement on mappings.
//! - `variables.rs`: mapping-dependent variables.
//! - `cardinality.rs`: cardinality inference.
//! - `hash.rs`: content hash behind the `hash` placeholder.
//! - `rule.rs`, `reader.rs`, `processor.rs`, `metrics.rs`: rule model, ruleset
//!   reading, rule-major execution and its metrics.
//!
//! ## Debugging
//!
//! Everything logs through `tracing`; run the binary with
//! `SSSOMT_LOG=sssomt=debug` to see per-rule decisions.

#[path = "engine/cardinality.rs"]
mod cardinality;
#[path = "engine/context.rs"]
mod context;
#[path = "engine/editor.rs"]
mod editor;
#[path = "engine/filter.rs"]
mod filter;
#[path = "engine/format.rs"]
mod format;
#[path = "engine/functions.rs"]
mod functions;
#[path = "engine/hash.rs"]
mod hash;
#[path = "engine/lexer.rs"]
mod lexer;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/modifiers.rs"]
mod modifiers;
#[path = "engine/parser.rs"]
mod parser;
#[path = "engine/processor.rs"]
mod processor;
#[path = "engine/reader.rs"]
mod reader;
#[path = "engine/registry.rs"]
mod registry;
#[path = "engine/rule.rs"]
mod rule;
#[path = "engine/variables.rs"]
mod variables;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub use cardinality::Cardinalizer;
pub use context::TransformContext;
pub use editor::MappingEditor;
pub use filter::{Filter, FilterTraits};
pub use format::{Formatter, ModifierFn, SubstitutionFn, Template, Value};
pub use hash::MappingHasher;
pub use metrics::{ProcessingMetrics, ProcessingResult, RuleMetrics};
pub use processor::{MappingProcessor, TagSelection};
pub use reader::TransformReader;
pub use registry::{
    CallbackFn, FilterFn, FunctionRegistry, GeneratorFn, Handler, PreprocessorFn, RegisteredFunction, Role, Signature,
};
pub use rule::CompiledRule;
pub use variables::{Variable, VariableManager};
