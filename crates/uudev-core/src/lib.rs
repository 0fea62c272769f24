//! Core event type for uudev
//!
//! A udev hotplug occurrence is reported as a flat set of `KEY=VALUE`
//! attributes. This crate provides the [`Event`] type carrying that mapping,
//! shared by the monitor (which produces events) and the rule engine (which
//! matches against them).

use std::collections::HashMap;

use serde::Serialize;

/// One reported hotplug occurrence, as a flat field mapping.
///
/// Keys are whatever attributes the upstream source reports (e.g. `ACTION`,
/// `SUBSYSTEM`, `DEVNAME`). There is no fixed schema; fields a rule does not
/// mention are ignored by that rule. An event is constructed fresh per
/// occurrence, consumed synchronously by the matching phase, then discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Event(HashMap<String, String>);

impl Event {
    /// Create an empty event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute on the event.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    /// Get an attribute value, if the event carries it.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Attribute value for `field`, or the empty string when absent.
    ///
    /// Rule matching is total over string inputs: a missing attribute is
    /// matched as `""`, which normally fails unless the pattern accepts the
    /// empty string.
    pub fn field_or_empty(&self, field: &str) -> &str {
        self.get(field).unwrap_or("")
    }

    /// Number of attributes on the event.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the event carries no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, String>> for Event {
    fn from(fields: HashMap<String, String>) -> Self {
        Self(fields)
    }
}

impl FromIterator<(String, String)> for Event {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
