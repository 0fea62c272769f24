//! Declarative rule records and rule-set loading

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::duration::HumanDuration;
use crate::error::{RuleError, RuleResult};
use crate::rule::{Rule, DEFAULT_DELAY};

/// A rule as it appears in the rule file.
///
/// The schema is strict: a record carrying an unrecognized field is rejected
/// at decode time, before any compilation is attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Rule name, used for logging.
    #[serde(default)]
    pub name: String,

    /// Attribute name → regex pattern. All patterns must match (unanchored
    /// search) for the rule to apply; an empty map matches every event.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Command line to execute on match. Whitespace-split, no shell
    /// quoting. May be empty for a logging-only rule.
    #[serde(default)]
    pub run: String,

    /// Debounce delay, e.g. `"300ms"`, `"3s"`, `"1m30s"`. Defaults to 3s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<String>,

    /// Disable the execution timeout for this rule's command.
    #[serde(default, rename = "no-timeout")]
    pub no_timeout: bool,
}

impl RuleSpec {
    /// Validate this record into an executable [`Rule`].
    ///
    /// Compiles every env pattern and parses the delay string; the first
    /// failure aborts with the rule and field identified. No side effects
    /// beyond validation.
    pub fn compile(&self) -> RuleResult<Rule> {
        let mut env = HashMap::with_capacity(self.env.len());
        for (field, pattern) in &self.env {
            let compiled =
                regex::Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
                    rule: self.name.clone(),
                    field: field.clone(),
                    source,
                })?;
            env.insert(field.clone(), compiled);
        }

        let delay = match self.delay.as_deref() {
            None | Some("") => DEFAULT_DELAY,
            Some(s) => s
                .parse::<HumanDuration>()
                .map_err(|source| RuleError::InvalidDelay {
                    rule: self.name.clone(),
                    source,
                })?
                .into(),
        };

        Ok(Rule::new(
            self.name.clone(),
            env,
            self.run.clone(),
            delay,
            self.no_timeout,
        ))
    }

    /// One example record in the serialized rule format, for `uudev -t`.
    pub fn template() -> Self {
        Self {
            name: "Hook Template".to_string(),
            env: HashMap::new(),
            run: "/usr/bin/true".to_string(),
            delay: Some(HumanDuration::from(DEFAULT_DELAY).to_string()),
            no_timeout: false,
        }
    }
}

/// Load and compile every rule document from a YAML stream.
///
/// The input holds zero or more `---`-separated rule documents. Decoding is
/// strict (unknown fields rejected); the first invalid document or rule
/// aborts loading, so no partial rule set is ever installed.
pub fn load_rules(input: &str) -> RuleResult<Vec<Rule>> {
    let mut specs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(input) {
        specs.push(RuleSpec::deserialize(document)?);
    }

    specs.iter().map(RuleSpec::compile).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_compile_defaults() {
        let spec: RuleSpec = serde_yaml::from_str("name: usb hook\nrun: /usr/bin/true\n").unwrap();
        let rule = spec.compile().unwrap();

        assert_eq!(rule.name(), "usb hook");
        assert_eq!(rule.command(), "/usr/bin/true");
        assert_eq!(rule.delay(), DEFAULT_DELAY);
        assert!(!rule.no_timeout());
    }

    #[test]
    fn test_compile_parses_delay() {
        let spec: RuleSpec = serde_yaml::from_str("delay: 200ms\n").unwrap();
        assert_eq!(spec.compile().unwrap().delay(), Duration::from_millis(200));
    }

    #[test]
    fn test_compile_empty_delay_uses_default() {
        let spec = RuleSpec {
            delay: Some(String::new()),
            ..RuleSpec::template()
        };
        assert_eq!(spec.compile().unwrap().delay(), DEFAULT_DELAY);
    }

    #[test]
    fn test_compile_rejects_bad_pattern() {
        let spec: RuleSpec =
            serde_yaml::from_str("name: broken\nenv:\n  SUBSYSTEM: '('\n").unwrap();

        let err = spec.compile().unwrap_err();
        assert!(matches!(
            err,
            RuleError::InvalidPattern { ref rule, ref field, .. }
                if rule == "broken" && field == "SUBSYSTEM"
        ));
    }

    #[test]
    fn test_compile_rejects_bad_delay() {
        let spec: RuleSpec = serde_yaml::from_str("name: broken\ndelay: soon\n").unwrap();

        let err = spec.compile().unwrap_err();
        assert!(matches!(err, RuleError::InvalidDelay { ref rule, .. } if rule == "broken"));
    }

    #[test]
    fn test_unknown_field_rejected_at_decode_time() {
        let result: Result<RuleSpec, _> =
            serde_yaml::from_str("name: bad\ncommand: /usr/bin/true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_template_round_trips_under_strict_schema() {
        let yaml = serde_yaml::to_string(&RuleSpec::template()).unwrap();
        let spec: RuleSpec = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(spec.name, "Hook Template");
        assert_eq!(spec.run, "/usr/bin/true");
        assert_eq!(spec.delay.as_deref(), Some("3s"));
        spec.compile().unwrap();
    }
}
