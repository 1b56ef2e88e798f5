//! Cardinality inference.
//!
//! For each mapping, the left side of its cardinality says how many distinct
//! subjects share its object, the right side how many distinct objects share
//! its subject ("1" when exactly one, "n" otherwise):
//!
//! ```text
//!   A -> X        A has objects {X, Y}      -> right side n
//!   A -> Y        X has subjects {A}        -> left side 1      => A->X is 1:n
//!   B -> Y        Y has subjects {A, B}     -> left side n      => A->Y is n:n
//! ```
//!
//! Scope slots extend the identity of both sides: with scope
//! `predicate_id`, `A -> X` via exactMatch and `A -> Y` via broadMatch do not
//! count against each other. Entities typed `rdfs literal` are identified by
//! their label instead of their id, in a key space of their own: a literal
//! labelled `X` is never the entity `X`.
//!
//! Mappings with `sssom:NoTermFound` on either side are not counted, and
//! their cardinality and scope are cleared.

use crate::mapping::{EntityType, Mapping, MappingCardinality, Slot};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct Cardinalizer {
    scope: Vec<Slot>,
}

impl Cardinalizer {
    pub fn new(scope: Vec<Slot>) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> &[Slot] {
        &self.scope
    }

    /// Infer over every mapping.
    pub fn infer(&self, mappings: &mut [Mapping]) {
        self.infer_where(mappings, |_| true);
    }

    /// Infer over the mappings accepted by `select`; the others are untouched.
    pub fn infer_where(&self, mappings: &mut [Mapping], select: impl Fn(&Mapping) -> bool) {
        self.run(mappings, select, true);
    }

    /// Count every mapping, but only write a cardinality where none is set yet.
    pub fn fill_missing(&self, mappings: &mut [Mapping]) {
        self.run(mappings, |_| true, false);
    }

    fn run(&self, mappings: &mut [Mapping], select: impl Fn(&Mapping) -> bool, overwrite: bool) {
        let selected: Vec<usize> = (0..mappings.len()).filter(|&i| select(&mappings[i])).collect();

        let mut subjects_of: HashMap<String, HashSet<String>> = HashMap::new();
        let mut objects_of: HashMap<String, HashSet<String>> = HashMap::new();
        let mut keys: HashMap<usize, (String, String)> = HashMap::new();
        for &i in &selected {
            let m = &mappings[i];
            if m.is_unmapped() {
                continue;
            }
            let subject = self.key(m.subject_id.as_deref(), m.subject_label.as_deref(), m.subject_type, m);
            let object = self.key(m.object_id.as_deref(), m.object_label.as_deref(), m.object_type, m);
            subjects_of.entry(object.clone()).or_default().insert(subject.clone());
            objects_of.entry(subject.clone()).or_default().insert(object.clone());
            keys.insert(i, (subject, object));
        }

        let scope: Vec<String> = self.scope.iter().map(|s| s.name().to_string()).collect();
        for &i in &selected {
            let m = &mut mappings[i];
            if !overwrite && m.mapping_cardinality.is_some() {
                continue;
            }
            let Some((subject, object)) = keys.get(&i) else {
                m.mapping_cardinality = None;
                m.cardinality_scope.clear();
                continue;
            };
            let one_subject = subjects_of.get(object).is_some_and(|s| s.len() == 1);
            let one_object = objects_of.get(subject).is_some_and(|o| o.len() == 1);
            m.mapping_cardinality = Some(match (one_subject, one_object) {
                (true, true) => MappingCardinality::OneToOne,
                (true, false) => MappingCardinality::OneToMany,
                (false, true) => MappingCardinality::ManyToOne,
                (false, false) => MappingCardinality::ManyToMany,
            });
            m.cardinality_scope = scope.clone();
        }
    }

    /// `L\0label` for literals, `E\0id` for entities, then `\0value` per scope slot.
    fn key(&self, id: Option<&str>, label: Option<&str>, kind: Option<EntityType>, m: &Mapping) -> String {
        let mut key = match kind {
            Some(EntityType::RdfsLiteral) => format!("L\0{}", label.unwrap_or_default()),
            _ => format!("E\0{}", id.unwrap_or_default()),
        };
        for slot in &self.scope {
            key.push('\0');
            key.push_str(&m.get(*slot).as_text().unwrap_or_default());
        }
        key
    }
}
