use thiserror::Error;

/// Planning-stage failures. Any of these aborts the run before a write is
/// attempted, so the target file is guaranteed unmodified. "Already applied"
/// is not an error; it is reported through diagnostics.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("intent '{intent}': anchor {pattern} not found in its window")]
    AnchorNotFound { intent: String, pattern: String },

    #[error("intent '{intent}': anchor {pattern} matched {count} lines, expected exactly one")]
    AnchorAmbiguous {
        intent: String,
        pattern: String,
        count: usize,
    },

    #[error("intents '{first}' and '{second}' resolve to overlapping line ranges")]
    RangeOverlap { first: String, second: String },

    #[error("intent '{intent}': end rule resolved at or before its start anchor")]
    EndBeforeStart { intent: String },

    #[error("intent '{intent}': document shows a partially applied state; refusing to patch")]
    InconsistentState { intent: String },

    #[error("invalid anchor regex '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
