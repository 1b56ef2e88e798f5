use crate::engine::{
    CompiledRule, FunctionRegistry, MappingProcessor, ProcessingMetrics, TagSelection, TransformContext,
    TransformReader,
};
use crate::error::RulesetError;
use crate::mapping::Mapping;
use crate::prefix::PrefixManager;
use std::collections::BTreeMap;
use tracing::debug;

/// Options that affect how a ruleset is compiled and run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Which rules run, by tag.
    pub selection: TagSelection,
    /// Extra prefix declarations, added before the ruleset is read.
    pub prefixes: BTreeMap<String, String>,
    /// Infer cardinality automatically before the first rule that filters on it.
    pub infer_cardinality_on_demand: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { selection: TagSelection::All, prefixes: BTreeMap::new(), infer_cardinality_on_demand: true }
    }
}

impl Options {
    /// A fresh context holding the built-in prefixes plus [`prefixes`](Self::prefixes).
    pub fn context(&self) -> TransformContext {
        let mut prefixes = PrefixManager::new();
        for (name, iri) in &self.prefixes {
            prefixes.add(name.as_str(), iri.as_str());
        }
        TransformContext::with_prefixes(prefixes)
    }
}

/// Result from [`apply`] and [`apply_with`].
#[derive(Debug, Clone)]
pub struct TransformOutcome<T> {
    /// Generated products, in generation order.
    pub products: Vec<T>,
    /// Display form of every compiled rule, selected or not.
    pub rules: Vec<String>,
    pub metrics: ProcessingMetrics,
}

/// Compile `source` with the built-in functions and run it over `mappings`.
///
/// # Example
/// ```
/// use sssomt::{Mapping, apply};
///
/// let mut mappings = vec![Mapping { subject_id: Some("http://x.org/a".into()), ..Default::default() }];
/// apply(r#"* -> assign("comment", "seen");"#, &mut mappings).unwrap();
/// assert_eq!(mappings[0].comment.as_deref(), Some("seen"));
/// ```
pub fn apply(source: &str, mappings: &mut Vec<Mapping>) -> Result<TransformOutcome<()>, RulesetError> {
    apply_with(source, mappings, FunctionRegistry::new(), &Options::default())
}

/// Compile `source` against `registry` and run it over `mappings` in place.
///
/// Nothing runs if the ruleset has any error; all of them are returned.
pub fn apply_with<T>(
    source: &str,
    mappings: &mut Vec<Mapping>,
    registry: FunctionRegistry<T>,
    options: &Options,
) -> Result<TransformOutcome<T>, RulesetError> {
    let mut ctx = options.context();
    let rules = compile(source, registry, &mut ctx)?;
    let names = rules.iter().map(ToString::to_string).collect();

    let mut processor = MappingProcessor::new();
    processor.set_selection(options.selection.clone());
    processor.set_infer_cardinality_on_demand(options.infer_cardinality_on_demand);
    processor.add_rules(rules);
    let run = processor.process_with_metrics(mappings, &mut ctx);
    debug!(total = ?run.metrics.total, products = run.products.len(), "ruleset applied");

    Ok(TransformOutcome { products: run.products, rules: names, metrics: run.metrics })
}

/// Read `source` into compiled rules, or return every diagnostic.
pub fn compile<T>(
    source: &str,
    registry: FunctionRegistry<T>,
    ctx: &mut TransformContext,
) -> Result<Vec<CompiledRule<T>>, RulesetError> {
    let mut reader = TransformReader::new(registry);
    if reader.read(source, ctx) { Ok(reader.take_rules()) } else { Err(RulesetError(reader.errors().to_vec())) }
}
