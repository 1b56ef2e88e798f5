//! Processing metrics.
//!
//! The intended usage is:
//!
//! - `MappingProcessor::process` for normal operation.
//! - `MappingProcessor::process_with_metrics` for profiling, debugging a
//!   ruleset, and seeing what each rule did.
//!
//! Metrics are opt-in and cheap: counters plus one `Instant` per rule.

use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessingMetrics {
    /// Total elapsed time of the run.
    pub total: Duration,
    /// Mappings handed to the processor.
    pub mappings_in: usize,
    /// Mappings left after the run.
    pub mappings_out: usize,
    /// Mappings dropped by a preprocessor.
    pub dropped: usize,
    /// Products collected from generators.
    pub products: usize,
    /// One entry per rule that ran (rules skipped by tag selection are absent).
    pub rules: Vec<RuleMetrics>,
}

/// What a single rule did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RuleMetrics {
    /// The rule's display form.
    pub rule: String,
    /// Mappings accepted by the filter.
    pub matched: usize,
    pub dropped: usize,
    pub produced: usize,
    /// Elapsed time for the rule, callback included.
    pub duration: Duration,
}

/// Processor output bundled with metrics.
#[derive(Debug, Clone)]
pub struct ProcessingResult<T> {
    pub products: Vec<T>,
    pub metrics: ProcessingMetrics,
}
