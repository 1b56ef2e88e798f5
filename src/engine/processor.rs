//! Rule-major mapping processor.
//!
//! ```text
//! for rule in selected rules:
//!     [fill missing cardinalities, once per run, if the filter needs it]
//!     callback(filter, full current list)
//!     for mapping in current list:
//!         filter rejects  -> keep unchanged
//!         preprocess None -> drop (gone for every later rule)
//!         otherwise       -> keep preprocessed mapping, collect generated product
//! ```
//!
//! Each rule runs over every surviving mapping before the next rule starts.
//! A callback therefore sees the list as left by all earlier rules, and none
//! of its own rule's per-mapping effects.

use super::cardinality::Cardinalizer;
use super::context::TransformContext;
use super::metrics::{ProcessingMetrics, ProcessingResult, RuleMetrics};
use super::rule::CompiledRule;
use crate::mapping::Mapping;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, trace};

/// Which rules run, by tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagSelection {
    #[default]
    All,
    /// Rules carrying at least one of these tags; untagged rules are skipped.
    Include(BTreeSet<String>),
    /// Rules carrying none of these tags; untagged rules always run.
    Exclude(BTreeSet<String>),
}

impl TagSelection {
    pub fn selects(&self, tags: &BTreeSet<String>) -> bool {
        match self {
            TagSelection::All => true,
            TagSelection::Include(set) => tags.iter().any(|t| set.contains(t)),
            TagSelection::Exclude(set) => !tags.iter().any(|t| set.contains(t)),
        }
    }
}

type Listener<T> = Box<dyn FnMut(&CompiledRule<T>, &Mapping, &T)>;

pub struct MappingProcessor<T> {
    rules: Vec<CompiledRule<T>>,
    selection: TagSelection,
    infer_cardinality_on_demand: bool,
    listeners: Vec<Listener<T>>,
}

impl<T> Default for MappingProcessor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MappingProcessor<T> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            selection: TagSelection::All,
            infer_cardinality_on_demand: true,
            listeners: Vec::new(),
        }
    }

    pub fn add_rule(&mut self, rule: CompiledRule<T>) {
        self.rules.push(rule);
    }

    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = CompiledRule<T>>) {
        self.rules.extend(rules);
    }

    pub fn rules(&self) -> &[CompiledRule<T>] {
        &self.rules
    }

    pub fn set_selection(&mut self, selection: TagSelection) {
        self.selection = selection;
    }

    /// Infer missing cardinalities before the first rule whose filter tests
    /// cardinality, unless an `infer_cardinality` callback already did.
    /// Cardinalities present in the input are kept.
    pub fn set_infer_cardinality_on_demand(&mut self, enabled: bool) {
        self.infer_cardinality_on_demand = enabled;
    }

    /// Called with the rule, the mapping and the product each time a
    /// generator yields something, before the product is collected.
    pub fn add_listener(&mut self, listener: impl FnMut(&CompiledRule<T>, &Mapping, &T) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Apply the rules to `mappings` in place. Dropped mappings are removed;
    /// the generated products are returned in generation order.
    pub fn process(&mut self, mappings: &mut Vec<Mapping>, ctx: &mut TransformContext) -> Vec<T> {
        self.run(mappings, ctx, None)
    }

    /// Same as [`process`](Self::process), also measuring what each rule did.
    pub fn process_with_metrics(
        &mut self,
        mappings: &mut Vec<Mapping>,
        ctx: &mut TransformContext,
    ) -> ProcessingResult<T> {
        let start = Instant::now();
        let mut metrics = ProcessingMetrics { mappings_in: mappings.len(), ..Default::default() };
        let products = self.run(mappings, ctx, Some(&mut metrics));
        metrics.mappings_out = mappings.len();
        metrics.products = products.len();
        metrics.dropped = metrics.rules.iter().map(|r| r.dropped).sum();
        metrics.total = start.elapsed();
        ProcessingResult { products, metrics }
    }

    fn run(
        &mut self,
        mappings: &mut Vec<Mapping>,
        ctx: &mut TransformContext,
        mut metrics: Option<&mut ProcessingMetrics>,
    ) -> Vec<T> {
        let mut products = Vec::new();
        ctx.cardinality_ready = false;
        debug!(rules = self.rules.len(), mappings = mappings.len(), "processing");

        for rule in &self.rules {
            if !self.selection.selects(rule.tags()) {
                debug!(rule = %rule, "skipped by tag selection");
                continue;
            }
            let started = Instant::now();
            let mut stats = RuleMetrics { rule: rule.to_string(), ..Default::default() };

            if self.infer_cardinality_on_demand && rule.uses_cardinality() && !ctx.cardinality_ready {
                debug!(rule = %rule, "inferring missing cardinalities on demand");
                Cardinalizer::default().fill_missing(mappings);
                ctx.cardinality_ready = true;
            }

            if rule.has_callback() {
                debug!(rule = %rule, mappings = mappings.len(), "running callback");
            }
            if rule.call(mappings, ctx) {
                let mut kept = Vec::with_capacity(mappings.len());
                for mapping in mappings.drain(..) {
                    if !rule.apply(&mapping, ctx) {
                        kept.push(mapping);
                        continue;
                    }
                    stats.matched += 1;
                    let Some(mapping) = rule.preprocess(mapping, ctx) else {
                        trace!(rule = %rule, "dropped");
                        stats.dropped += 1;
                        continue;
                    };
                    if let Some(product) = rule.generate(&mapping, ctx) {
                        for listener in &mut self.listeners {
                            listener(rule, &mapping, &product);
                        }
                        products.push(product);
                        stats.produced += 1;
                    }
                    kept.push(mapping);
                }
                *mappings = kept;
            }

            debug!(
                rule = %rule,
                matched = stats.matched,
                dropped = stats.dropped,
                produced = stats.produced,
                "rule done"
            );
            if let Some(metrics) = metrics.as_deref_mut() {
                stats.duration = started.elapsed();
                metrics.rules.push(stats);
            }
        }

        debug!(remaining = mappings.len(), products = products.len(), "processing done");
        products
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Filter;
    use crate::engine::filter::compile;
    use crate::engine::parser::{CallSyntax, parse_filter_source};
    use crate::engine::registry::FilterFn;
    use crate::error::ResolutionError;
    use crate::mapping::MappingCardinality;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn mapping(subject: &str, object: &str) -> Mapping {
        Mapping { subject_id: Some(subject.into()), object_id: Some(object.into()), ..Default::default() }
    }

    fn subject_is(id: &'static str) -> Filter {
        Filter::from_fn(id, Rc::new(move |m: &Mapping, _: &TransformContext| m.subject_id.as_deref() == Some(id)))
    }

    fn no_functions(call: &CallSyntax, _: Vec<String>, _: &mut TransformContext) -> Result<FilterFn, ResolutionError> {
        Err(ResolutionError::UnrecognisedFunction(call.name.clone()))
    }

    fn drop_rule(id: &'static str) -> CompiledRule<String> {
        CompiledRule::new(Some(subject_is(id)), "stop()")
            .with_preprocessor(Rc::new(|_: &Mapping, _: &TransformContext| None::<Mapping>))
    }

    fn echo_rule() -> CompiledRule<String> {
        CompiledRule::new(None, "echo()")
            .with_generator(Rc::new(|m: &Mapping, _: &TransformContext| m.subject_id.clone()))
    }

    fn tagged(mut rule: CompiledRule<String>, tags: &[&str]) -> CompiledRule<String> {
        rule.add_tags(tags.iter().copied());
        rule
    }

    fn set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn dropped_mappings_skip_every_later_rule() {
        let mut processor = MappingProcessor::new();
        processor.add_rules([drop_rule("a"), echo_rule()]);
        let mut mappings = vec![mapping("a", "x"), mapping("b", "y")];
        let products = processor.process(&mut mappings, &mut TransformContext::new());
        assert_eq!(products, vec!["b".to_string()]);
        assert_eq!(mappings, vec![mapping("b", "y")]);
    }

    #[test]
    fn callbacks_see_the_list_before_later_drops() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let counter = CompiledRule::new(None, "count()").with_callback(Rc::new(
            move |_: &Filter, mappings: &mut [Mapping], _: &mut TransformContext| {
                sink.borrow_mut().push(mappings.len());
            },
        ));
        let mut processor = MappingProcessor::new();
        processor.add_rules([counter, drop_rule("a")]);
        let mut mappings = vec![mapping("a", "x"), mapping("b", "y")];
        processor.process(&mut mappings, &mut TransformContext::new());
        assert_eq!(*seen.borrow(), vec![2]);
        assert_eq!(mappings.len(), 1);
    }

    #[test]
    fn tag_selection_modes() {
        assert!(TagSelection::All.selects(&set(&[])));
        assert!(!TagSelection::Include(set(&["x"])).selects(&set(&[])));
        assert!(TagSelection::Include(set(&["x"])).selects(&set(&["x", "y"])));
        assert!(TagSelection::Exclude(set(&["x"])).selects(&set(&[])));
        assert!(!TagSelection::Exclude(set(&["x"])).selects(&set(&["y", "x"])));

        let build = || {
            let mut p = MappingProcessor::new();
            p.add_rules([tagged(drop_rule("a"), &["cleanup"]), echo_rule()]);
            p
        };

        let mut include = build();
        include.set_selection(TagSelection::Include(set(&["cleanup"])));
        let mut mappings = vec![mapping("a", "x"), mapping("b", "y")];
        assert!(include.process(&mut mappings, &mut TransformContext::new()).is_empty());
        assert_eq!(mappings.len(), 1);

        let mut exclude = build();
        exclude.set_selection(TagSelection::Exclude(set(&["cleanup"])));
        let mut mappings = vec![mapping("a", "x"), mapping("b", "y")];
        assert_eq!(exclude.process(&mut mappings, &mut TransformContext::new()).len(), 2);
    }

    #[test]
    fn listeners_observe_each_product() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let mut processor = MappingProcessor::new();
        processor.add_rule(echo_rule());
        processor.add_listener(move |rule: &CompiledRule<String>, m: &Mapping, product: &String| {
            sink.borrow_mut().push(format!("{} {} {product}", rule.action(), m.object_id.as_deref().unwrap_or("")));
        });
        let mut mappings = vec![mapping("a", "x"), mapping("b", "y")];
        processor.process(&mut mappings, &mut TransformContext::new());
        assert_eq!(*log.borrow(), vec!["echo() x a", "echo() y b"]);
    }

    #[test]
    fn cardinality_is_inferred_on_demand() {
        let needs_cardinality = |ctx: &mut TransformContext| {
            let expr = parse_filter_source("cardinality==1:n").unwrap();
            compile(&expr, ctx, &no_functions).unwrap()
        };

        let mut ctx = TransformContext::new();
        let mut processor = MappingProcessor::new();
        processor.add_rule(
            CompiledRule::new(Some(needs_cardinality(&mut ctx)), "echo()")
                .with_generator(Rc::new(|m: &Mapping, _: &TransformContext| m.object_id.clone())),
        );
        let mut mappings = vec![mapping("a", "x"), mapping("a", "y"), mapping("b", "z")];
        let products = processor.process(&mut mappings, &mut ctx);
        assert_eq!(products, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(mappings[2].mapping_cardinality, Some(MappingCardinality::OneToOne));

        let mut off = MappingProcessor::new();
        off.set_infer_cardinality_on_demand(false);
        off.add_rule(
            CompiledRule::new(Some(needs_cardinality(&mut ctx)), "echo()")
                .with_generator(Rc::new(|m: &Mapping, _: &TransformContext| m.object_id.clone())),
        );
        let mut mappings = vec![mapping("a", "x"), mapping("a", "y")];
        assert!(off.process(&mut mappings, &mut ctx).is_empty());
    }

    #[test]
    fn on_demand_inference_keeps_given_cardinalities() {
        let expr = parse_filter_source("cardinality==1:n").unwrap();
        let mut ctx = TransformContext::new();
        let filter = compile(&expr, &mut ctx, &no_functions).unwrap();
        let mut processor = MappingProcessor::new();
        processor.add_rule(
            CompiledRule::new(Some(filter), "echo()")
                .with_generator(Rc::new(|m: &Mapping, _: &TransformContext| m.object_id.clone())),
        );

        let mut given = mapping("a", "x");
        given.mapping_cardinality = Some(MappingCardinality::OneToMany);
        let mut mappings = vec![given, mapping("b", "y")];
        let products = processor.process(&mut mappings, &mut ctx);
        assert_eq!(products, vec!["x".to_string()]);
        assert_eq!(mappings[0].mapping_cardinality, Some(MappingCardinality::OneToMany));
        assert_eq!(mappings[1].mapping_cardinality, Some(MappingCardinality::OneToOne));
    }

    #[test]
    fn metrics_count_per_rule() {
        let mut processor = MappingProcessor::new();
        processor.add_rules([drop_rule("a"), echo_rule()]);
        let mut mappings = vec![mapping("a", "x"), mapping("b", "y"), mapping("c", "z")];
        let result = processor.process_with_metrics(&mut mappings, &mut TransformContext::new());
        let metrics = &result.metrics;
        assert_eq!((metrics.mappings_in, metrics.mappings_out), (3, 2));
        assert_eq!((metrics.dropped, metrics.products), (1, 2));
        assert_eq!(metrics.rules.len(), 2);
        assert_eq!((metrics.rules[0].matched, metrics.rules[0].dropped), (1, 1));
        assert_eq!((metrics.rules[1].matched, metrics.rules[1].produced), (2, 2));
        assert_eq!(result.products, vec!["b".to_string(), "c".to_string()]);
    }
}
