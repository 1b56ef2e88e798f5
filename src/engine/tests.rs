//! Whole-pipeline scenarios: ruleset text through the reader and processor.

use super::*;
use crate::error::{ResolutionError, TransformError};
use crate::mapping::{Mapping, MappingCardinality, PredicateModifier};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

const EXACT: &str = "http://www.w3.org/2004/02/skos/core#exactMatch";
const NARROW: &str = "http://www.w3.org/2004/02/skos/core#narrowMatch";
const BROAD: &str = "http://www.w3.org/2004/02/skos/core#broadMatch";

fn mapping(subject: &str, predicate: &str, object: &str) -> Mapping {
    Mapping {
        subject_id: Some(subject.into()),
        predicate_id: Some(predicate.into()),
        object_id: Some(object.into()),
        ..Default::default()
    }
}

fn generator(f: impl Fn(&Mapping, &TransformContext) -> Option<String> + 'static) -> GeneratorFn<String> {
    Rc::new(f)
}

/// Built-ins plus `render(template)`, a string generator.
fn registry() -> FunctionRegistry<String> {
    let mut registry: FunctionRegistry<String> = FunctionRegistry::new();
    registry.register_generator("render", signature!("S"), |args, ctx| {
        let template = ctx.compile_template(&args[0])?;
        Ok(generator(move |m, ctx| Some(template.render(m, ctx))))
    });
    registry
}

struct Run {
    products: Vec<String>,
    mappings: Vec<Mapping>,
}

fn run_with(src: &str, registry: FunctionRegistry<String>, selection: TagSelection, mappings: Vec<Mapping>) -> Run {
    let mut ctx = TransformContext::new();
    let mut reader = TransformReader::new(registry);
    assert!(reader.read(src, &mut ctx), "{:?}", reader.errors());
    let mut processor = MappingProcessor::new();
    processor.set_selection(selection);
    processor.add_rules(reader.take_rules());
    let mut mappings = mappings;
    let products = processor.process(&mut mappings, &mut ctx);
    Run { products, mappings }
}

fn run(src: &str, mappings: Vec<Mapping>) -> Run {
    run_with(src, registry(), TagSelection::All, mappings)
}

fn tags(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn uberon_rules_drop_and_assign() {
    let uberon =
        mapping("http://purl.obolibrary.org/obo/UBERON_0000001", EXACT, "http://purl.obolibrary.org/obo/FBbt_1");
    let other = mapping("http://purl.obolibrary.org/obo/ZFA_0000001", EXACT, "http://purl.obolibrary.org/obo/FBbt_2");
    let src = r#"
        prefix UBERON: <http://purl.obolibrary.org/obo/UBERON_>

        subject==UBERON:*{ predicate==skos:exactMatch -> stop(); }
        subject==* -> assign("mapping_tool", "testtool");
    "#;

    let mut reader: TransformReader<()> = TransformReader::new(FunctionRegistry::new());
    let mut ctx = TransformContext::new();
    assert!(reader.read(src, &mut ctx), "{:?}", reader.errors());
    let mut processor = MappingProcessor::new();
    processor.add_rules(reader.take_rules());
    let mut mappings = vec![uberon, other.clone()];
    let products = processor.process(&mut mappings, &mut ctx);

    assert!(products.is_empty());
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].subject_id, other.subject_id);
    assert_eq!(mappings[0].mapping_tool.as_deref(), Some("testtool"));
}

#[test]
fn callbacks_see_mappings_that_later_rules_drop() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut registry = registry();
    let sink = seen.clone();
    registry.register_callback("count", signature!(""), move |_, _| {
        let sink = sink.clone();
        let callback: CallbackFn =
            Rc::new(move |filter: &Filter, mappings: &mut [Mapping], ctx: &mut TransformContext| {
                let n = mappings.iter().filter(|m| filter.matches(m, ctx)).count();
                sink.borrow_mut().push(n);
            });
        Ok(callback)
    });

    let src = r#"
        * -> count();
        object==http://x.org/drop -> stop();
        * -> count();
    "#;
    let result = run_with(
        src,
        registry,
        TagSelection::All,
        vec![
            mapping("http://x.org/a", EXACT, "http://x.org/drop"),
            mapping("http://x.org/b", EXACT, "http://x.org/keep"),
        ],
    );
    assert_eq!(*seen.borrow(), vec![2, 1]);
    assert_eq!(result.mappings.len(), 1);
}

#[test]
fn tag_selection_picks_rules() {
    let src = r#"
        [a] * -> render("a");
        [b] * -> render("b");
        * -> render("untagged");
    "#;
    let one = || vec![mapping("http://x.org/a", EXACT, "http://x.org/b")];

    let include = run_with(src, registry(), TagSelection::Include(tags(&["a"])), one());
    assert_eq!(include.products, vec!["a"]);

    let exclude = run_with(src, registry(), TagSelection::Exclude(tags(&["a"])), one());
    assert_eq!(exclude.products, vec!["b", "untagged"]);

    let all = run(src, one());
    assert_eq!(all.products, vec!["a", "b", "untagged"]);
}

#[test]
fn nested_tags_accumulate() {
    let src = r#"
        [outer] * {
            [inner] * -> render("both");
            * -> render("outer only");
        }
    "#;
    let one = || vec![mapping("http://x.org/a", EXACT, "http://x.org/b")];
    let inner = run_with(src, registry(), TagSelection::Include(tags(&["inner"])), one());
    assert_eq!(inner.products, vec!["both"]);
    let not_inner = run_with(src, registry(), TagSelection::Exclude(tags(&["inner"])), one());
    assert_eq!(not_inner.products, vec!["outer only"]);
}

#[test]
fn is_duplicate_drops_repeats() {
    let result = run(
        r#"is_duplicate("%{subject_id}") -> stop();"#,
        vec![
            mapping("http://x.org/a", EXACT, "http://x.org/1"),
            mapping("http://x.org/b", EXACT, "http://x.org/2"),
            mapping("http://x.org/a", EXACT, "http://x.org/3"),
        ],
    );
    let objects: Vec<_> = result.mappings.iter().map(|m| m.object_id.clone().unwrap_or_default()).collect();
    assert_eq!(objects, vec!["http://x.org/1", "http://x.org/2"]);
}

#[test]
fn cardinality_wildcards_match_their_expansion() {
    let records = || {
        vec![
            mapping("A", EXACT, "X"),
            mapping("A", EXACT, "Y"),
            mapping("B", EXACT, "Y"),
            mapping("C", EXACT, "Z"),
            mapping("D", EXACT, "W"),
            mapping("E", EXACT, "W"),
        ]
    };
    let sugar = run("* -> infer_cardinality(); cardinality==*:1 -> render(\"%{subject_id}\");", records());
    let spelled = run(
        "* -> infer_cardinality(); cardinality==1:1 || cardinality==n:1 -> render(\"%{subject_id}\");",
        records(),
    );
    assert_eq!(sugar.products, vec!["B", "C", "D", "E"]);
    assert_eq!(sugar.products, spelled.products);
}

#[test]
fn cardinality_is_inferred_when_a_filter_needs_it() {
    let result = run(
        "cardinality==1:n -> render(\"%{object_id}\");",
        vec![mapping("A", EXACT, "X"), mapping("A", EXACT, "Y"), mapping("B", EXACT, "Z")],
    );
    assert_eq!(result.products, vec!["X", "Y"]);
    assert_eq!(result.mappings[2].mapping_cardinality, Some(MappingCardinality::OneToOne));
}

#[test]
fn given_cardinalities_survive_on_demand_inference() {
    let mut given = mapping("A", EXACT, "X");
    given.mapping_cardinality = Some(MappingCardinality::OneToMany);
    let result = run("cardinality==1:n -> render(\"%{object_id}\");", vec![given, mapping("B", EXACT, "Y")]);
    assert_eq!(result.products, vec!["X"]);
    assert_eq!(result.mappings[0].mapping_cardinality, Some(MappingCardinality::OneToMany));
}

#[test]
fn cardinality_arguments_are_not_curies() {
    let result = run(
        "* -> assign(\"mapping_cardinality\", 1:n); cardinality==1:n -> render(\"%{object_id}\");",
        vec![mapping("A", EXACT, "X")],
    );
    assert_eq!(result.products, vec!["X"]);
    assert_eq!(result.mappings[0].mapping_cardinality, Some(MappingCardinality::OneToMany));
}

#[test]
fn hash_placeholder_with_trailing_text() {
    let m = mapping("http://x.org/a", EXACT, "http://x.org/b");
    let result = run(r#"* -> render("%hash-suffix");"#, vec![m.clone()]);
    assert_eq!(result.products, vec![format!("{}-suffix", MappingHasher::hash(&m))]);
}

#[test]
fn negated_predicate_filter_includes_negated_mappings() {
    let mut negated = mapping("http://x.org/a", EXACT, "http://x.org/b");
    negated.predicate_modifier = Some(PredicateModifier::Not);

    let plain = run(r#"predicate==skos:exactMatch -> render("hit");"#, vec![negated.clone()]);
    assert!(plain.products.is_empty());

    let inverted = run(r#"!predicate==skos:exactMatch -> render("hit");"#, vec![negated]);
    assert_eq!(inverted.products, vec!["hit"]);
}

#[test]
fn invert_swaps_sides() {
    let result = run(
        "predicate==skos:narrowMatch -> invert();",
        vec![mapping("http://x.org/a", NARROW, "http://x.org/b"), mapping("http://x.org/c", EXACT, "http://x.org/d")],
    );
    assert_eq!(result.mappings[0].subject_id.as_deref(), Some("http://x.org/b"));
    assert_eq!(result.mappings[0].predicate_id.as_deref(), Some(BROAD));
    assert_eq!(result.mappings[1].subject_id.as_deref(), Some("http://x.org/c"));
}

#[test]
fn invert_renders_its_predicate_per_mapping() {
    let mut commented = mapping("http://x.org/a", EXACT, "http://x.org/b");
    commented.comment = Some("http://x.org/q".into());
    let result = run(
        r#"subject==* -> invert("%{comment}");"#,
        vec![commented, mapping("http://x.org/c", EXACT, "http://x.org/d")],
    );
    assert_eq!(result.mappings.len(), 1);
    assert_eq!(result.mappings[0].predicate_id.as_deref(), Some("http://x.org/q"));
    assert_eq!(result.mappings[0].subject_id.as_deref(), Some("http://x.org/b"));
}

#[test]
fn listeners_see_the_preprocessed_mapping() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut ctx = TransformContext::new();
    let mut reader = TransformReader::new(registry());
    assert!(reader.read(r#"* -> assign("comment", "seen"); * -> render("%{subject_id}");"#, &mut ctx));

    let mut processor = MappingProcessor::new();
    processor.add_rules(reader.take_rules());
    let sink = seen.clone();
    processor.add_listener(move |rule: &CompiledRule<String>, m: &Mapping, product: &String| {
        sink.borrow_mut().push((rule.action().to_string(), m.comment.clone(), product.clone()));
    });
    let mut mappings = vec![mapping("http://x.org/a", EXACT, "http://x.org/b")];
    let products = processor.process(&mut mappings, &mut ctx);

    assert_eq!(products, vec!["http://x.org/a"]);
    assert_eq!(
        *seen.borrow(),
        vec![(r#"render("%{subject_id}")"#.to_string(), Some("seen".to_string()), "http://x.org/a".to_string())]
    );
}

#[test]
fn variables_follow_set_var_scopes() {
    let src = r#"
        prefix ORG: <https://example.org/>

        set_var("kind", "other");
        subject==ORG:1 -> set_var("kind", "special");
        object==ORG:target -> set_var("kind", "by object");
        * -> render("%{subject_id} is %{kind}");
    "#;
    let result = run(
        src,
        vec![
            mapping("https://example.org/1", EXACT, "https://example.org/x"),
            mapping("https://example.org/2", EXACT, "https://example.org/y"),
            mapping("https://example.org/3", EXACT, "https://example.org/target"),
        ],
    );
    assert_eq!(
        result.products,
        vec!["https://example.org/1 is special", "https://example.org/2 is other", "https://example.org/3 is by object"]
    );
}

#[test]
fn set_var_callback_works_without_a_declaration() {
    let src = r#"
        prefix ORG: <https://example.org/>
        subject==ORG:1 -> set_var("kind", "special");
        * -> render("%{subject_id}=%{kind}");
    "#;
    let result = run(
        src,
        vec![
            mapping("https://example.org/1", EXACT, "https://example.org/x"),
            mapping("https://example.org/2", EXACT, "https://example.org/y"),
        ],
    );
    assert_eq!(result.products, vec!["https://example.org/1=special", "https://example.org/2="]);
}

#[test]
fn errors_keep_the_ruleset_out() {
    let mut ctx = TransformContext::new();
    let mut reader = TransformReader::new(registry());
    let ok = reader.read(
        r#"
        * -> stop("x");
        * -> frobnicate();
        subject==NOPE:1 -> render("%{subject_id}");
        "#,
        &mut ctx,
    );
    assert!(!ok);
    let errors = reader.errors();
    assert_eq!(errors.len(), 3, "{errors:?}");
    assert!(matches!(
        &errors[0],
        TransformError::Resolution { line: 2, error: ResolutionError::InvalidArity { .. }, .. }
    ));
    assert!(errors[0].to_string().contains("Invalid number of arguments for function stop"));
    assert!(matches!(
        &errors[1],
        TransformError::Resolution { line: 3, error: ResolutionError::UnrecognisedFunction(_), .. }
    ));
    assert_eq!(errors[2].to_string(), "Undeclared prefix: NOPE");
    assert!(reader.rules().is_empty());
}

#[test]
fn template_errors_surface_as_resolution_errors() {
    let mut ctx = TransformContext::new();
    let mut reader = TransformReader::new(registry());
    assert!(!reader.read(r#"* -> render("%{subject_id|shout}");"#, &mut ctx));
    assert!(matches!(
        reader.errors(),
        [TransformError::Resolution { error: ResolutionError::Template(_), .. }]
    ));
}
