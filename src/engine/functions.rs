//! Built-in functions, available in every registry created with
//! [`FunctionRegistry::new`].
//!
//! | name                   | role         | arity       |
//! |------------------------|--------------|-------------|
//! | `stop()`               | preprocessor | 0           |
//! | `invert(pred?)`        | preprocessor | 0 or 1      |
//! | `assign(slot, value…)` | preprocessor | pairs       |
//! | `replace(slot, a, b…)` | preprocessor | triples     |
//! | `edit("slot=value"…)`  | preprocessor | at least 1  |
//! | `set_var(name, value)` | directive    | 2           |
//! | `set_var(name, value)` | callback     | 2           |
//! | `is_duplicate(tmpl)`   | filter       | 1           |
//! | `has_extension(name)`  | filter       | 1           |
//! | `infer_cardinality(…)` | callback     | any         |

use super::cardinality::Cardinalizer;
use super::context::TransformContext;
use super::editor::MappingEditor;
use super::filter::{Filter, FilterTraits};
use super::registry::{CallbackFn, FilterFn, FunctionRegistry, PreprocessorFn};
use crate::error::ResolutionError;
use crate::mapping::{Mapping, Slot, inverse_predicate};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, warn};

pub(crate) fn register_builtins<T: 'static>(registry: &mut FunctionRegistry<T>) {
    registry.register_preprocessor("stop", signature!(""), |_, _| Ok(preprocessor(|_, _| None)));
    registry.register_preprocessor("invert", signature!("S?"), invert);
    registry.register_preprocessor("assign", signature!("(SS)+"), assign);
    registry.register_preprocessor("replace", signature!("(SSS)+"), replace);
    registry.register_preprocessor("edit", signature!("S+"), edit);
    registry.register_directive("set_var", signature!("SS"), |args, ctx| {
        ctx.declare_variable(&args[0], &args[1]);
        Ok(())
    });
    registry.register_callback("set_var", signature!("SS"), set_var);
    registry.register_filter("is_duplicate", signature!("S"), is_duplicate);
    registry.register_filter("has_extension", signature!("S"), has_extension);
    registry.register_callback("infer_cardinality", signature!("S*"), infer_cardinality);
}

fn preprocessor(f: impl Fn(&Mapping, &TransformContext) -> Option<Mapping> + 'static) -> PreprocessorFn {
    Rc::new(f)
}

/// The explicit predicate is a template; a mapping for which it renders empty is dropped.
fn invert(args: &[String], ctx: &mut TransformContext) -> Result<PreprocessorFn, ResolutionError> {
    let explicit = args.first().map(|text| ctx.compile_template(text)).transpose()?;
    Ok(preprocessor(move |m, ctx| {
        let predicate = match &explicit {
            Some(template) => Some(template.render(m, ctx)).filter(|p| !p.is_empty())?,
            None => inverse_predicate(m.predicate_id.as_deref()?)?.to_string(),
        };
        Some(m.inverted(&predicate))
    }))
}

fn editing(editor: MappingEditor) -> PreprocessorFn {
    preprocessor(move |m, ctx| Some(editor.apply(m, ctx)))
}

fn assign(args: &[String], ctx: &mut TransformContext) -> Result<PreprocessorFn, ResolutionError> {
    let mut editor = MappingEditor::new();
    for pair in args.chunks(2) {
        editor.add_assignment(&pair[0], &pair[1], ctx)?;
    }
    Ok(editing(editor))
}

fn replace(args: &[String], _: &mut TransformContext) -> Result<PreprocessorFn, ResolutionError> {
    let mut editor = MappingEditor::new();
    for triple in args.chunks(3) {
        editor.add_replacement(&triple[0], &triple[1], &triple[2])?;
    }
    Ok(editing(editor))
}

fn edit(args: &[String], ctx: &mut TransformContext) -> Result<PreprocessorFn, ResolutionError> {
    let mut editor = MappingEditor::new();
    for arg in args {
        let (slot, value) = arg.split_once('=').ok_or_else(|| ResolutionError::Function {
            name: "edit".into(),
            message: format!("expected slot=value, found \"{arg}\""),
        })?;
        editor.add_assignment(slot, value, ctx)?;
    }
    Ok(editing(editor))
}

fn set_var(args: &[String], ctx: &mut TransformContext) -> Result<CallbackFn, ResolutionError> {
    let (name, value) = (args[0].clone(), args[1].clone());
    if !ctx.variables.is_declared(&name) {
        debug!(variable = %name, "declaring variable with an empty default");
        ctx.declare_variable(&name, "");
    }
    Ok(Rc::new(move |filter: &Filter, mappings: &mut [Mapping], ctx: &mut TransformContext| {
        let traits = filter.traits();
        let by_object = traits.contains(FilterTraits::OBJECT_SIDE) && !traits.contains(FilterTraits::SUBJECT_SIDE);
        let keys: Vec<String> = mappings
            .iter()
            .filter(|m| filter.matches(m, ctx))
            .filter_map(|m| if by_object { m.object_id.clone() } else { m.subject_id.clone() })
            .collect();
        debug!(variable = %name, by_object, count = keys.len(), "setting variable overrides");
        for key in keys {
            let result = if by_object {
                ctx.variables.set_for_object(&name, &key, &value)
            } else {
                ctx.variables.set_for_subject(&name, &key, &value)
            };
            if let Err(e) = result {
                warn!(error = %e, "set_var");
            }
        }
    }))
}

fn is_duplicate(args: &[String], ctx: &mut TransformContext) -> Result<FilterFn, ResolutionError> {
    let template = ctx.compile_template(&args[0])?;
    let seen: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
    Ok(Rc::new(move |m: &Mapping, ctx: &TransformContext| !seen.borrow_mut().insert(template.render(m, ctx))))
}

fn has_extension(args: &[String], ctx: &mut TransformContext) -> Result<FilterFn, ResolutionError> {
    let raw = args[0].clone();
    let expanded = ctx.prefixes.expand(&raw);
    Ok(Rc::new(move |m: &Mapping, _: &TransformContext| {
        m.extensions.contains_key(&raw) || m.extensions.contains_key(&expanded)
    }))
}

fn infer_cardinality(args: &[String], _: &mut TransformContext) -> Result<CallbackFn, ResolutionError> {
    let scope = args
        .iter()
        .map(|name| Slot::from_name(name).ok_or_else(|| ResolutionError::InvalidSlot(name.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    let cardinalizer = Cardinalizer::new(scope);
    Ok(Rc::new(move |filter: &Filter, mappings: &mut [Mapping], ctx: &mut TransformContext| {
        if filter.is_match_all() {
            cardinalizer.infer(mappings);
        } else {
            cardinalizer.infer_where(mappings, |m| filter.matches(m, ctx));
        }
        ctx.cardinality_ready = true;
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::registry::Action;
    use crate::mapping::MappingCardinality;

    const EXACT: &str = "http://www.w3.org/2004/02/skos/core#exactMatch";
    const NARROW: &str = "http://www.w3.org/2004/02/skos/core#narrowMatch";
    const BROAD: &str = "http://www.w3.org/2004/02/skos/core#broadMatch";
    const RELATED: &str = "http://www.w3.org/2004/02/skos/core#relatedMatch";

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn mapping(subject: &str, predicate: &str, object: &str) -> Mapping {
        Mapping {
            subject_id: Some(subject.into()),
            predicate_id: Some(predicate.into()),
            object_id: Some(object.into()),
            ..Default::default()
        }
    }

    #[test]
    fn stop_drops_everything() {
        let reg: FunctionRegistry<()> = FunctionRegistry::new();
        let mut ctx = TransformContext::new();
        let Ok(Action::Preprocessor(stop)) = reg.resolve_action("stop", &[], &mut ctx) else {
            panic!("stop is a preprocessor");
        };
        assert_eq!(stop(&mapping("a", EXACT, "b"), &ctx), None);
    }

    #[test]
    fn invert_uses_known_or_explicit_inverse() {
        let mut ctx = TransformContext::new();
        let auto = invert(&[], &mut ctx).unwrap();
        let inverted = auto(&mapping("a", NARROW, "b"), &ctx).unwrap();
        assert_eq!(inverted.subject_id.as_deref(), Some("b"));
        assert_eq!(inverted.predicate_id.as_deref(), Some(BROAD));
        assert_eq!(auto(&mapping("a", RELATED, "b"), &ctx), None);

        let explicit = invert(&args(&[RELATED]), &mut ctx).unwrap();
        let inverted = explicit(&mapping("a", RELATED, "b"), &ctx).unwrap();
        assert_eq!(inverted.object_id.as_deref(), Some("a"));
        assert_eq!(inverted.predicate_id.as_deref(), Some(RELATED));
    }

    #[test]
    fn invert_renders_the_explicit_predicate() {
        let mut ctx = TransformContext::new();
        let templated = invert(&args(&["%{comment}"]), &mut ctx).unwrap();
        let mut m = mapping("a", RELATED, "b");
        m.comment = Some(NARROW.into());
        assert_eq!(templated(&m, &ctx).unwrap().predicate_id.as_deref(), Some(NARROW));
        assert_eq!(templated(&mapping("a", RELATED, "b"), &ctx), None);
    }

    #[test]
    fn edit_requires_slot_value_pairs() {
        let mut ctx = TransformContext::new();
        let ok = edit(&args(&["comment=hello", "mapping_tool = x"]), &mut ctx).unwrap();
        let m = ok(&mapping("a", EXACT, "b"), &ctx).unwrap();
        assert_eq!(m.comment.as_deref(), Some("hello"));
        assert_eq!(m.mapping_tool.as_deref(), Some("x"));
        assert!(matches!(edit(&args(&["comment"]), &mut ctx), Err(ResolutionError::Function { .. })));
    }

    #[test]
    fn set_var_callback_declares_missing_variables() {
        let mut ctx = TransformContext::new();
        let callback = set_var(&args(&["v", "x"]), &mut ctx).unwrap();
        assert!(ctx.variables.is_declared("v"));
        assert_eq!(ctx.variables.expand("v", &mapping("s1", EXACT, "o1")).unwrap(), "");

        let mut mappings = vec![mapping("s1", EXACT, "o1")];
        callback(&Filter::all(), &mut mappings, &mut ctx);
        assert_eq!(ctx.variables.expand("v", &mapping("s1", EXACT, "o2")).unwrap(), "x");

        ctx.declare_variable("w", "kept");
        set_var(&args(&["w", "y"]), &mut ctx).unwrap();
        assert_eq!(ctx.variables.expand("w", &mapping("s1", EXACT, "o1")).unwrap(), "kept");
    }

    #[test]
    fn set_var_keys_on_the_filtered_side() {
        let mut ctx = TransformContext::new();
        ctx.declare_variable("v", "default");
        let callback = set_var(&args(&["v", "set"]), &mut ctx).unwrap();
        let object_only = Filter::from_fn("object_side", Rc::new(|m: &Mapping, _: &TransformContext| {
            m.object_id.as_deref() == Some("o1")
        }));
        let mut mappings = vec![mapping("s1", EXACT, "o1"), mapping("s2", EXACT, "o2")];

        // A function filter has no side flags: keyed on subjects.
        callback(&object_only, &mut mappings, &mut ctx);
        assert_eq!(ctx.variables.expand("v", &mapping("s1", EXACT, "other")).unwrap(), "set");
        assert_eq!(ctx.variables.expand("v", &mapping("other", EXACT, "o1")).unwrap(), "default");
    }

    #[test]
    fn is_duplicate_keeps_a_running_set() {
        let mut ctx = TransformContext::new();
        let filter = is_duplicate(&args(&["%{subject_id}"]), &mut ctx).unwrap();
        let results: Vec<bool> = [mapping("a", EXACT, "1"), mapping("b", EXACT, "2"), mapping("a", EXACT, "3")]
            .iter()
            .map(|m| filter(m, &ctx))
            .collect();
        assert_eq!(results, vec![false, false, true]);
    }

    #[test]
    fn has_extension_checks_raw_and_expanded_keys() {
        let mut ctx = TransformContext::new();
        let filter = has_extension(&args(&["sssom:custom"]), &mut ctx).unwrap();
        let mut m = mapping("a", EXACT, "b");
        assert!(!filter(&m, &ctx));
        m.extensions.insert("https://w3id.org/sssom/custom".into(), "1".into());
        assert!(filter(&m, &ctx));
    }

    #[test]
    fn infer_cardinality_marks_the_run_ready() {
        let mut ctx = TransformContext::new();
        let callback = infer_cardinality(&[], &mut ctx).unwrap();
        let mut mappings = vec![mapping("a", EXACT, "x"), mapping("a", EXACT, "y")];
        callback(&Filter::all(), &mut mappings, &mut ctx);
        assert!(ctx.cardinality_ready);
        assert_eq!(mappings[0].mapping_cardinality, Some(MappingCardinality::OneToMany));

        assert!(matches!(infer_cardinality(&args(&["colour"]), &mut ctx), Err(ResolutionError::InvalidSlot(_))));
    }
}
