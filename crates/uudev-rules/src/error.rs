//! Error types for rule loading and compilation

use thiserror::Error;

use crate::duration::DurationError;

/// Result type for rule operations
pub type RuleResult<T> = Result<T, RuleError>;

/// Errors that can occur while loading or compiling rules
#[derive(Debug, Error)]
pub enum RuleError {
    /// A rule document failed to decode (malformed YAML or unknown field)
    #[error("failed to decode rule document: {0}")]
    Decode(#[from] serde_yaml::Error),

    /// An env pattern failed to compile
    #[error("rule '{rule}': invalid pattern for field '{field}': {source}")]
    InvalidPattern {
        rule: String,
        field: String,
        #[source]
        source: regex::Error,
    },

    /// The delay string failed to parse
    #[error("rule '{rule}': invalid delay: {source}")]
    InvalidDelay {
        rule: String,
        #[source]
        source: DurationError,
    },
}
