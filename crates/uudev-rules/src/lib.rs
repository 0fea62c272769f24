//! Rule engine for uudev
//!
//! This crate provides the rule system: declarative rule records loaded from
//! YAML, compiled into executable matchers with debounce and cooldown state.
//!
//! # Architecture
//!
//! ```text
//! RULE = ENV PREDICATES → COMMAND (+ delay, timeout policy)
//! ```
//!
//! - [`RuleSpec`]: the declarative form as it appears in the rule file
//!   (strict schema, unknown fields rejected at decode time)
//! - [`Rule`]: the compiled form, with validated regexes, the resolved
//!   delay, and the mutable last-successful-run slot behind the cooldown
//!   guard
//! - [`load_rules`]: decode + compile an entire rule file, all or nothing

mod duration;
mod error;
mod rule;
mod spec;

pub use duration::{DurationError, HumanDuration};
pub use error::{RuleError, RuleResult};
pub use rule::{Rule, COOLDOWN, DEFAULT_DELAY};
pub use spec::{load_rules, RuleSpec};
