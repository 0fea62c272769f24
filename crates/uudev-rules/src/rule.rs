//! Compiled rules: matching and the cooldown guard

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use regex::Regex;
use uudev_core::Event;

/// Debounce delay applied when a rule does not specify one.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

/// Minimum spacing between successful runs of the same rule's command.
pub const COOLDOWN: Duration = Duration::from_secs(10);

/// The validated, executable form of a [`RuleSpec`](crate::RuleSpec).
///
/// A rule matches an event iff every env regex finds a match in the event's
/// value for that field. A rule with an empty command line never runs a
/// command but still participates in matching and logging.
#[derive(Debug)]
pub struct Rule {
    name: String,
    env: HashMap<String, Regex>,
    run: String,
    delay: Duration,
    no_timeout: bool,
    /// Instant of the last successful command run; `None` means never run.
    ///
    /// Mutated only by the dispatch task that completed the run. The mutex
    /// makes the individual load/store well defined; the cooldown guard
    /// around it stays read-then-act, so two dispatches racing through
    /// [`Rule::must_run`] may both pass before either records a run. The
    /// cooldown is approximate, not at-most-once-per-window.
    last_run: Mutex<Option<Instant>>,
}

impl Rule {
    pub(crate) fn new(
        name: String,
        env: HashMap<String, Regex>,
        run: String,
        delay: Duration,
        no_timeout: bool,
    ) -> Self {
        Self {
            name,
            env,
            run,
            delay,
            no_timeout,
            last_run: Mutex::new(None),
        }
    }

    /// Rule name, used for logging.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command line to execute on match (may be empty).
    pub fn command(&self) -> &str {
        &self.run
    }

    /// Settle window between a match and the cooldown re-check.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether the execution timeout is disabled for this rule.
    pub fn no_timeout(&self) -> bool {
        self.no_timeout
    }

    /// Whether this rule applies to `event`.
    ///
    /// Every env regex must find a match (unanchored search) in the event's
    /// value for its field; an absent field is matched as the empty string.
    /// An empty env map matches every event.
    pub fn matches(&self, event: &Event) -> bool {
        self.env
            .iter()
            .all(|(field, pattern)| pattern.is_match(event.field_or_empty(field)))
    }

    /// Cooldown guard: whether the command should run now.
    ///
    /// True iff the command line is non-empty and more than [`COOLDOWN`] has
    /// elapsed since the last recorded successful run.
    pub fn must_run(&self) -> bool {
        if self.run.is_empty() {
            return false;
        }
        match self.last_run() {
            Some(last) => last.elapsed() > COOLDOWN,
            None => true,
        }
    }

    /// Record a successful command run at the current instant.
    pub fn record_success(&self) {
        *self
            .last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn last_run(&self) -> Option<Instant> {
        *self
            .last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
