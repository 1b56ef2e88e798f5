//! SSSOM/Transform: a small rule language for filtering and rewriting SSSOM
//! mappings, and the engine that runs it.
//!
//! ```text
//! prefix UBERON: <http://purl.obolibrary.org/obo/UBERON_>
//!
//! subject==UBERON:* {
//!     predicate==skos:exactMatch -> stop();
//! }
//! [curation] confidence<0.5 -> assign("comment", "low confidence: %{subject_label|upper}");
//! ```
//!
//! The quickest way in is [`apply`]: compile a ruleset and run it over a
//! list of [`Mapping`]s in one call. Hosts that produce their own output
//! type register generators on a [`FunctionRegistry`] and go through
//! [`apply_with`], or drive [`TransformReader`] and [`MappingProcessor`]
//! directly.

#[macro_use]
mod macros;

pub mod api;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod prefix;

pub use api::{Options, TransformOutcome, apply, apply_with, compile};
pub use engine::{
    CompiledRule, Filter, FunctionRegistry, MappingProcessor, ProcessingMetrics, TagSelection, TransformContext,
    TransformReader,
};
pub use error::{FormatError, ResolutionError, RulesetError, TransformError};
pub use mapping::{Mapping, MappingCardinality, Slot, SlotValue};
pub use prefix::PrefixManager;
