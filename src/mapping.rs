//! The mapping record consumed and produced by the engine.
//!
//! Slots are declared once through `mapping_slots!` (see `macros.rs`), which
//! gives every slot a struct field, a [`Slot`] variant, a name and a
//! [`SlotKind`]. Filters, placeholders and the editor all go through
//! [`Mapping::get`] / [`Mapping::set`] so they agree on names and value shapes.

use crate::error::MappingError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Object identifier used for "no matching term" on either side.
pub const NO_TERM_FOUND: &str = "https://w3id.org/sssom/NoTermFound";

mapping_slots! {
    RecordId => record_id: Entity (Option<String>),
    SubjectId => subject_id: Entity (Option<String>),
    SubjectLabel => subject_label: Text (Option<String>),
    SubjectCategory => subject_category: Text (Option<String>),
    SubjectType => subject_type: EntityType (Option<EntityType>),
    SubjectSource => subject_source: Entity (Option<String>),
    SubjectSourceVersion => subject_source_version: Text (Option<String>),
    SubjectMatchField => subject_match_field: EntityList (Vec<String>),
    SubjectPreprocessing => subject_preprocessing: EntityList (Vec<String>),
    PredicateId => predicate_id: Entity (Option<String>),
    PredicateLabel => predicate_label: Text (Option<String>),
    PredicateModifier => predicate_modifier: Modifier (Option<PredicateModifier>),
    ObjectId => object_id: Entity (Option<String>),
    ObjectLabel => object_label: Text (Option<String>),
    ObjectCategory => object_category: Text (Option<String>),
    ObjectType => object_type: EntityType (Option<EntityType>),
    ObjectSource => object_source: Entity (Option<String>),
    ObjectSourceVersion => object_source_version: Text (Option<String>),
    ObjectMatchField => object_match_field: EntityList (Vec<String>),
    ObjectPreprocessing => object_preprocessing: EntityList (Vec<String>),
    MappingJustification => mapping_justification: Entity (Option<String>),
    AuthorId => author_id: EntityList (Vec<String>),
    AuthorLabel => author_label: TextList (Vec<String>),
    ReviewerId => reviewer_id: EntityList (Vec<String>),
    ReviewerLabel => reviewer_label: TextList (Vec<String>),
    CreatorId => creator_id: EntityList (Vec<String>),
    CreatorLabel => creator_label: TextList (Vec<String>),
    License => license: Entity (Option<String>),
    MappingProvider => mapping_provider: Entity (Option<String>),
    MappingSource => mapping_source: Entity (Option<String>),
    MappingCardinality => mapping_cardinality: Cardinality (Option<MappingCardinality>),
    CardinalityScope => cardinality_scope: TextList (Vec<String>),
    MappingTool => mapping_tool: Text (Option<String>),
    MappingToolId => mapping_tool_id: Entity (Option<String>),
    MappingToolVersion => mapping_tool_version: Text (Option<String>),
    MappingDate => mapping_date: Date (Option<NaiveDate>),
    PublicationDate => publication_date: Date (Option<NaiveDate>),
    Confidence => confidence: Double (Option<f64>),
    CurationRule => curation_rule: EntityList (Vec<String>),
    CurationRuleText => curation_rule_text: TextList (Vec<String>),
    MatchString => match_string: TextList (Vec<String>),
    SimilarityScore => similarity_score: Double (Option<f64>),
    SimilarityMeasure => similarity_measure: Text (Option<String>),
    SeeAlso => see_also: TextList (Vec<String>),
    IssueTrackerItem => issue_tracker_item: Entity (Option<String>),
    Other => other: Text (Option<String>),
    Comment => comment: Text (Option<String>),
}

/// Value shape of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// A single identifier; CURIEs are expanded when assigned.
    Entity,
    Text,
    EntityList,
    TextList,
    Double,
    Date,
    EntityType,
    Cardinality,
    Modifier,
}

impl SlotKind {
    pub fn is_list(self) -> bool {
        matches!(self, SlotKind::EntityList | SlotKind::TextList)
    }

    pub fn is_entity(self) -> bool {
        matches!(self, SlotKind::Entity | SlotKind::EntityList)
    }

    /// Whether the slot holds plain strings (and is thus open to text replacement).
    pub fn is_textual(self) -> bool {
        matches!(self, SlotKind::Entity | SlotKind::Text | SlotKind::EntityList | SlotKind::TextList)
    }
}

impl Slot {
    /// Slots describing the subject side of a mapping.
    pub fn is_subject_side(self) -> bool {
        self.name().starts_with("subject_")
    }

    pub fn is_object_side(self) -> bool {
        self.name().starts_with("object_")
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dynamically typed slot value.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Empty,
    Text(String),
    List(Vec<String>),
    Double(f64),
    Date(NaiveDate),
    EntityType(EntityType),
    Cardinality(MappingCardinality),
    Modifier(PredicateModifier),
}

impl SlotValue {
    pub fn is_empty(&self) -> bool {
        match self {
            SlotValue::Empty => true,
            SlotValue::Text(s) => s.is_empty(),
            SlotValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Single-string rendering; `None` for empty values and lists.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SlotValue::Empty | SlotValue::List(_) => None,
            SlotValue::Text(s) => Some(s.clone()),
            SlotValue::Double(d) => Some(d.to_string()),
            SlotValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            SlotValue::EntityType(t) => Some(t.as_str().to_string()),
            SlotValue::Cardinality(c) => Some(c.as_str().to_string()),
            SlotValue::Modifier(m) => Some(m.as_str().to_string()),
        }
    }
}

/// Conversion between a concrete field type and [`SlotValue`].
pub(crate) trait SlotField: Sized {
    fn to_value(&self) -> SlotValue;
    fn from_value(value: SlotValue) -> Option<Self>;
    fn is_unset(&self) -> bool;
}

pub(crate) fn is_unset<F: SlotField>(field: &F) -> bool {
    field.is_unset()
}

impl SlotField for Option<String> {
    fn to_value(&self) -> SlotValue {
        self.clone().map_or(SlotValue::Empty, SlotValue::Text)
    }

    fn from_value(value: SlotValue) -> Option<Self> {
        match value {
            SlotValue::Empty => Some(None),
            SlotValue::Text(s) => Some(Some(s)),
            _ => None,
        }
    }

    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

impl SlotField for Vec<String> {
    fn to_value(&self) -> SlotValue {
        if self.is_empty() { SlotValue::Empty } else { SlotValue::List(self.clone()) }
    }

    fn from_value(value: SlotValue) -> Option<Self> {
        match value {
            SlotValue::Empty => Some(Vec::new()),
            SlotValue::List(items) => Some(items),
            SlotValue::Text(s) => Some(vec![s]),
            _ => None,
        }
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

// Scalar non-string slots share one shape: `Option<T>` wrapped in a `SlotValue` variant.
macro_rules! scalar_slot_field {
    ($ty:ty, $variant:ident) => {
        impl SlotField for Option<$ty> {
            fn to_value(&self) -> SlotValue {
                self.map_or(SlotValue::Empty, SlotValue::$variant)
            }

            fn from_value(value: SlotValue) -> Option<Self> {
                match value {
                    SlotValue::Empty => Some(None),
                    SlotValue::$variant(v) => Some(Some(v)),
                    _ => None,
                }
            }

            fn is_unset(&self) -> bool {
                self.is_none()
            }
        }
    };
}

scalar_slot_field!(f64, Double);
scalar_slot_field!(NaiveDate, Date);
scalar_slot_field!(EntityType, EntityType);
scalar_slot_field!(MappingCardinality, Cardinality);
scalar_slot_field!(PredicateModifier, Modifier);

// --- Enumerated slot values --------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MappingCardinality {
    #[serde(rename = "1:1")]
    OneToOne,
    #[serde(rename = "1:n")]
    OneToMany,
    #[serde(rename = "n:1")]
    ManyToOne,
    #[serde(rename = "n:n")]
    ManyToMany,
    #[serde(rename = "1:0")]
    OneToNone,
    #[serde(rename = "0:1")]
    NoneToOne,
}

impl MappingCardinality {
    pub const ALL: [MappingCardinality; 6] = [
        MappingCardinality::OneToOne,
        MappingCardinality::OneToMany,
        MappingCardinality::ManyToOne,
        MappingCardinality::ManyToMany,
        MappingCardinality::OneToNone,
        MappingCardinality::NoneToOne,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MappingCardinality::OneToOne => "1:1",
            MappingCardinality::OneToMany => "1:n",
            MappingCardinality::ManyToOne => "n:1",
            MappingCardinality::ManyToMany => "n:n",
            MappingCardinality::OneToNone => "1:0",
            MappingCardinality::NoneToOne => "0:1",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }

    /// Cardinality of the same mapping read from object to subject.
    pub fn inverse(self) -> Self {
        match self {
            MappingCardinality::OneToMany => MappingCardinality::ManyToOne,
            MappingCardinality::ManyToOne => MappingCardinality::OneToMany,
            MappingCardinality::OneToNone => MappingCardinality::NoneToOne,
            MappingCardinality::NoneToOne => MappingCardinality::OneToNone,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateModifier {
    Not,
}

impl PredicateModifier {
    pub fn as_str(self) -> &'static str {
        "Not"
    }

    pub fn parse(value: &str) -> Option<Self> {
        (value == "Not").then_some(PredicateModifier::Not)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "owl class")]
    OwlClass,
    #[serde(rename = "owl object property")]
    OwlObjectProperty,
    #[serde(rename = "owl data property")]
    OwlDataProperty,
    #[serde(rename = "owl annotation property")]
    OwlAnnotationProperty,
    #[serde(rename = "owl named individual")]
    OwlNamedIndividual,
    #[serde(rename = "skos concept")]
    SkosConcept,
    #[serde(rename = "rdfs resource")]
    RdfsResource,
    #[serde(rename = "rdfs class")]
    RdfsClass,
    #[serde(rename = "rdfs literal")]
    RdfsLiteral,
    #[serde(rename = "rdfs datatype")]
    RdfsDatatype,
    #[serde(rename = "rdf property")]
    RdfProperty,
}

impl EntityType {
    pub const ALL: [EntityType; 11] = [
        EntityType::OwlClass,
        EntityType::OwlObjectProperty,
        EntityType::OwlDataProperty,
        EntityType::OwlAnnotationProperty,
        EntityType::OwlNamedIndividual,
        EntityType::SkosConcept,
        EntityType::RdfsResource,
        EntityType::RdfsClass,
        EntityType::RdfsLiteral,
        EntityType::RdfsDatatype,
        EntityType::RdfProperty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::OwlClass => "owl class",
            EntityType::OwlObjectProperty => "owl object property",
            EntityType::OwlDataProperty => "owl data property",
            EntityType::OwlAnnotationProperty => "owl annotation property",
            EntityType::OwlNamedIndividual => "owl named individual",
            EntityType::SkosConcept => "skos concept",
            EntityType::RdfsResource => "rdfs resource",
            EntityType::RdfsClass => "rdfs class",
            EntityType::RdfsLiteral => "rdfs literal",
            EntityType::RdfsDatatype => "rdfs datatype",
            EntityType::RdfProperty => "rdf property",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

// --- Inversion ---------------------------------------------------------------

static INVERSE_PREDICATES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("http://www.w3.org/2004/02/skos/core#exactMatch", "http://www.w3.org/2004/02/skos/core#exactMatch"),
        ("http://www.w3.org/2004/02/skos/core#narrowMatch", "http://www.w3.org/2004/02/skos/core#broadMatch"),
        ("http://www.w3.org/2004/02/skos/core#broadMatch", "http://www.w3.org/2004/02/skos/core#narrowMatch"),
        ("http://www.w3.org/2002/07/owl#equivalentClass", "http://www.w3.org/2002/07/owl#equivalentClass"),
        (
            "https://w3id.org/semapv/vocab/crossSpeciesExactMatch",
            "https://w3id.org/semapv/vocab/crossSpeciesExactMatch",
        ),
        (
            "https://w3id.org/semapv/vocab/crossSpeciesNarrowMatch",
            "https://w3id.org/semapv/vocab/crossSpeciesBroadMatch",
        ),
        (
            "https://w3id.org/semapv/vocab/crossSpeciesBroadMatch",
            "https://w3id.org/semapv/vocab/crossSpeciesNarrowMatch",
        ),
    ])
});

/// Known inverse of a predicate IRI, if any.
pub fn inverse_predicate(predicate: &str) -> Option<&'static str> {
    INVERSE_PREDICATES.get(predicate).copied()
}

impl Mapping {
    /// Whether either side is the "no term found" placeholder.
    pub fn is_unmapped(&self) -> bool {
        self.subject_id.as_deref() == Some(NO_TERM_FOUND) || self.object_id.as_deref() == Some(NO_TERM_FOUND)
    }

    /// The same mapping read from object to subject, using `predicate` as the
    /// new predicate. The predicate label is kept only if the predicate is unchanged.
    pub fn inverted(&self, predicate: &str) -> Mapping {
        let mut m = self.clone();
        std::mem::swap(&mut m.subject_id, &mut m.object_id);
        std::mem::swap(&mut m.subject_label, &mut m.object_label);
        std::mem::swap(&mut m.subject_category, &mut m.object_category);
        std::mem::swap(&mut m.subject_type, &mut m.object_type);
        std::mem::swap(&mut m.subject_source, &mut m.object_source);
        std::mem::swap(&mut m.subject_source_version, &mut m.object_source_version);
        std::mem::swap(&mut m.subject_match_field, &mut m.object_match_field);
        std::mem::swap(&mut m.subject_preprocessing, &mut m.object_preprocessing);
        if m.predicate_id.as_deref() != Some(predicate) {
            m.predicate_label = None;
            m.predicate_id = Some(predicate.to_string());
        }
        m.mapping_cardinality = m.mapping_cardinality.map(MappingCardinality::inverse);
        m
    }
}
