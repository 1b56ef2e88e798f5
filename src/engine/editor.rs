//! Slot assignment and text replacement (`assign`, `replace`, `edit`).
//!
//! An editor is built once per rule and applied to each mapping, producing an
//! edited copy; the input mapping is never touched.
//!
//! Assigned values are parsed according to the target slot:
//!
//! | slot kind          | accepted text                                  |
//! |--------------------|------------------------------------------------|
//! | entity             | IRI or CURIE (expanded)                        |
//! | entity/text list   | items separated by `|` (entities expanded)     |
//! | double             | any float                                      |
//! | date               | `YYYY-MM-DD`                                   |
//! | entity type        | SSSOM label, e.g. `owl class`                  |
//! | cardinality        | `1:1`, `1:n`, `n:1`, `n:n`, `1:0`, `0:1`       |
//! | predicate modifier | `Not`                                          |
//!
//! An empty value clears the slot, except for `subject_id`, `predicate_id`
//! and `object_id`. Values containing `%{` are templates rendered against
//! each mapping and parsed at that point; a rendered value that does not
//! parse is skipped with a warning.

use super::context::TransformContext;
use super::format::Template;
use crate::error::ResolutionError;
use crate::mapping::{EntityType, Mapping, MappingCardinality, PredicateModifier, Slot, SlotKind, SlotValue};
use chrono::NaiveDate;
use std::rc::Rc;
use tracing::warn;

#[derive(Debug, Clone)]
enum Assignment {
    Fixed(SlotValue),
    Deferred(Rc<Template>),
}

#[derive(Debug, Clone)]
struct Replacement {
    slot: Slot,
    find: String,
    with: String,
}

#[derive(Debug, Clone, Default)]
pub struct MappingEditor {
    assignments: Vec<(Slot, Assignment)>,
    replacements: Vec<Replacement>,
}

impl MappingEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.replacements.is_empty()
    }

    /// Queue `slot := value`.
    pub fn add_assignment(
        &mut self,
        slot: &str,
        value: &str,
        ctx: &mut TransformContext,
    ) -> Result<(), ResolutionError> {
        let slot = lookup_slot(slot)?;
        let assignment = if value.contains("%{") {
            Assignment::Deferred(ctx.compile_template(value)?)
        } else {
            Assignment::Fixed(parse_slot_value(slot, value, &mut |curie: &str| ctx.prefixes.resolve(curie))?)
        };
        self.assignments.push((slot, assignment));
        Ok(())
    }

    /// Queue a literal substring replacement on a text slot.
    pub fn add_replacement(&mut self, slot: &str, find: &str, with: &str) -> Result<(), ResolutionError> {
        let slot = lookup_slot(slot)?;
        if !slot.kind().is_textual() {
            return Err(ResolutionError::InvalidSlotValue { slot: slot.name().to_string(), value: find.to_string() });
        }
        self.replacements.push(Replacement { slot, find: find.to_string(), with: with.to_string() });
        Ok(())
    }

    pub fn apply(&self, mapping: &Mapping, ctx: &TransformContext) -> Mapping {
        let mut edited = mapping.clone();

        for (slot, assignment) in &self.assignments {
            let value = match assignment {
                Assignment::Fixed(value) => value.clone(),
                Assignment::Deferred(template) => {
                    let text = template.render(mapping, ctx);
                    match parse_slot_value(*slot, &text, &mut |curie: &str| ctx.prefixes.expand(curie)) {
                        Ok(value) => value,
                        Err(e) => {
                            warn!(slot = slot.name(), value = %text, error = %e, "skipping assignment");
                            continue;
                        }
                    }
                }
            };
            if let Err(e) = edited.set(*slot, value) {
                warn!(error = %e, "skipping assignment");
            }
        }

        for r in &self.replacements {
            if r.find.is_empty() {
                continue;
            }
            let replaced = match edited.get(r.slot) {
                SlotValue::Text(s) => SlotValue::Text(s.replace(&r.find, &r.with)),
                SlotValue::List(items) => SlotValue::List(items.iter().map(|s| s.replace(&r.find, &r.with)).collect()),
                _ => continue,
            };
            if let Err(e) = edited.set(r.slot, replaced) {
                warn!(error = %e, "skipping replacement");
            }
        }

        edited
    }
}

fn lookup_slot(name: &str) -> Result<Slot, ResolutionError> {
    Slot::from_name(name.trim()).ok_or_else(|| ResolutionError::InvalidSlot(name.to_string()))
}

/// Parse the text form of a slot value. `expand` turns CURIEs into IRIs.
pub(crate) fn parse_slot_value(
    slot: Slot,
    text: &str,
    expand: &mut dyn FnMut(&str) -> String,
) -> Result<SlotValue, ResolutionError> {
    let text = text.trim();
    if text.is_empty() {
        return match slot {
            Slot::SubjectId | Slot::PredicateId | Slot::ObjectId => {
                Err(ResolutionError::CannotClear(slot.name().to_string()))
            }
            _ => Ok(SlotValue::Empty),
        };
    }
    let invalid = || ResolutionError::InvalidSlotValue { slot: slot.name().to_string(), value: text.to_string() };

    Ok(match slot.kind() {
        SlotKind::Entity => SlotValue::Text(expand(text)),
        SlotKind::Text => SlotValue::Text(text.to_string()),
        SlotKind::EntityList => {
            SlotValue::List(text.split('|').map(str::trim).filter(|s| !s.is_empty()).map(|s| expand(s)).collect())
        }
        SlotKind::TextList => {
            SlotValue::List(text.split('|').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        }
        SlotKind::Double => SlotValue::Double(text.parse().map_err(|_| invalid())?),
        SlotKind::Date => SlotValue::Date(NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| invalid())?),
        SlotKind::EntityType => SlotValue::EntityType(EntityType::parse(text).ok_or_else(invalid)?),
        SlotKind::Cardinality => SlotValue::Cardinality(MappingCardinality::parse(text).ok_or_else(invalid)?),
        SlotKind::Modifier => SlotValue::Modifier(PredicateModifier::parse(text).ok_or_else(invalid)?),
    })
}
